//! Shared deterministic types for broker core logic.
//!
//! These types are the records exchanged on the command/event log and the
//! timer state consumed by the trigger processor. They carry no I/O and must
//! serialize identically across runs so replay yields the same log.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw log encoding of [`ElementInstanceRef::Unowned`].
pub const NO_ELEMENT_INSTANCE: i64 = -1;

/// Raw log encoding of [`Repetitions::Infinite`].
pub const INFINITE_REPETITIONS: i64 = -1;

/// Raised when a raw log value does not map onto a typed field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RawValueError {
    #[error("invalid element instance key {0} (expected >= 0 or -1)")]
    ElementInstance(i64),
    #[error("element instance key {0} does not fit the log encoding (max 2^63 - 1)")]
    ElementInstanceOutOfRange(u64),
    #[error("invalid repetition count {0} (expected 0..=4294967295 or -1)")]
    Repetitions(i64),
}

/// Key of a running element instance.
///
/// Always at most [`ElementInstanceKey::MAX`], so it stays distinct from the
/// negative sentinel once written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementInstanceKey(u64);

impl ElementInstanceKey {
    pub const MAX: u64 = i64::MAX as u64;

    pub fn new(key: u64) -> Result<Self, RawValueError> {
        if key > Self::MAX {
            return Err(RawValueError::ElementInstanceOutOfRange(key));
        }
        Ok(Self(key))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Owner of a timer: a running element instance, or none for a workflow
/// start-event timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ElementInstanceRef {
    Owned(ElementInstanceKey),
    Unowned,
}

impl ElementInstanceRef {
    pub fn owned(key: u64) -> Result<Self, RawValueError> {
        ElementInstanceKey::new(key).map(ElementInstanceRef::Owned)
    }
}

impl TryFrom<i64> for ElementInstanceRef {
    type Error = RawValueError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            NO_ELEMENT_INSTANCE => Ok(ElementInstanceRef::Unowned),
            key if key >= 0 => Ok(ElementInstanceRef::Owned(ElementInstanceKey(key as u64))),
            other => Err(RawValueError::ElementInstance(other)),
        }
    }
}

impl From<ElementInstanceRef> for i64 {
    fn from(value: ElementInstanceRef) -> Self {
        match value {
            // Bounded by `ElementInstanceKey::MAX`, so the cast is exact.
            ElementInstanceRef::Owned(key) => key.get() as i64,
            ElementInstanceRef::Unowned => NO_ELEMENT_INSTANCE,
        }
    }
}

/// Remaining firings of a timer.
///
/// Encoded as an `i64` on the log so every finite count round-trips exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Repetitions {
    Infinite,
    Finite(u32),
}

impl TryFrom<i64> for Repetitions {
    type Error = RawValueError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            INFINITE_REPETITIONS => Ok(Repetitions::Infinite),
            count => u32::try_from(count)
                .map(Repetitions::Finite)
                .map_err(|_| RawValueError::Repetitions(count)),
        }
    }
}

impl From<Repetitions> for i64 {
    fn from(value: Repetitions) -> Self {
        match value {
            Repetitions::Infinite => INFINITE_REPETITIONS,
            Repetitions::Finite(count) => i64::from(count),
        }
    }
}

/// Repetition count paired with the period between firings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatingInterval {
    pub repetitions: Repetitions,
    pub interval_ms: u64,
}

/// Timer payload carried by timer commands and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub element_instance: ElementInstanceRef,
    pub workflow_key: u64,
    pub handler_node_id: String,
    pub due_date: i64,
    pub repetitions: Repetitions,
}

/// Armed timer as held by the timer store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerInstance {
    pub key: u64,
    pub element_instance: ElementInstanceRef,
    pub workflow_key: u64,
    pub handler_node_id: String,
    pub due_date: i64,
    pub repetitions: Repetitions,
}

impl TimerInstance {
    pub fn to_record(&self) -> TimerRecord {
        TimerRecord {
            element_instance: self.element_instance,
            workflow_key: self.workflow_key,
            handler_node_id: self.handler_node_id.clone(),
            due_date: self.due_date,
            repetitions: self.repetitions,
        }
    }
}

/// A `TRIGGER` command read from the log. `key` is the timer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerCommand {
    pub key: u64,
    pub value: TimerRecord,
}

impl TimerCommand {
    pub fn intent(&self) -> Intent {
        Intent::Timer(TimerIntent::Trigger)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerIntent {
    Create,
    Created,
    Trigger,
    Triggered,
    Cancel,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowInstanceIntent {
    ElementActivating,
    ElementActivated,
    EventOccurred,
    ElementCompleting,
    ElementCompleted,
    ElementTerminated,
}

/// Intent of any record this crate writes to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "value_type", content = "intent", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Timer(TimerIntent),
    WorkflowInstance(WorkflowInstanceIntent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BpmnElementType {
    Process,
    StartEvent,
    IntermediateCatchEvent,
    BoundaryEvent,
    ReceiveTask,
    ServiceTask,
    EndEvent,
}

/// Workflow instance event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInstanceRecord {
    pub workflow_key: u64,
    pub element_instance: ElementInstanceRef,
    pub element_id: String,
    pub bpmn_element_type: BpmnElementType,
    pub payload: serde_json::Value,
}

impl WorkflowInstanceRecord {
    /// Start-event occurrence for a timer that has no owning element instance.
    pub fn start_event(workflow_key: u64, element_id: impl Into<String>) -> Self {
        Self {
            workflow_key,
            element_instance: ElementInstanceRef::Unowned,
            element_id: element_id.into(),
            bpmn_element_type: BpmnElementType::StartEvent,
            payload: empty_payload(),
        }
    }
}

/// Record body appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "value_type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordValue {
    Timer(TimerRecord),
    WorkflowInstance(WorkflowInstanceRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionType {
    NotFound,
    InvalidState,
}

/// Result of processing one trigger command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The command was rejected back to its originator; nothing was fired.
    Rejected(RejectionType),
    /// The timer fired; `rescheduled` reports whether a create command was emitted.
    Triggered { rescheduled: bool },
}

/// Empty structured payload (`{}`) passed on occurrence.
pub fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
