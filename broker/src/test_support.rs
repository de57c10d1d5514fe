//! Test-only builders for messages, timers, and workflow state.
//!
//! Workflows built here declare two timers: a boundary event `reminder`
//! (5s period) and a start event `tick` (60s period). Timer builders pick the
//! handler that matches their owner so fixtures line up without extra wiring.

use std::ops::ControlFlow;

use crate::core::message::Message;
use crate::core::types::{
    BpmnElementType, ElementInstanceKey, ElementInstanceRef, RepeatingInterval, Repetitions, TimerCommand,
    TimerInstance,
};
use crate::core::workflow::{
    CatchEventElement, DeployedWorkflow, ElementInstance, ElementLifecycle, FlowElement,
    TimerDefinition,
};
use crate::io::catch_event::CatchEventBehavior;
use crate::io::init::{BrokerPaths, InitOptions, init_broker};
use crate::io::kv::{KvEngine, PartitionId, StoreError};
use crate::io::log_writer::LogWriter;

pub const BOUNDARY_TIMER_ID: &str = "reminder";
pub const START_TIMER_ID: &str = "tick";
pub const BOUNDARY_INTERVAL_MS: u64 = 5_000;
pub const START_INTERVAL_MS: u64 = 60_000;

/// Temporary data root with a freshly initialized `.broker/`.
///
/// Keep the returned `TempDir` alive for as long as the paths are used.
pub fn initialized_root() -> anyhow::Result<(tempfile::TempDir, BrokerPaths)> {
    let temp = tempfile::tempdir()?;
    let paths = init_broker(temp.path(), &InitOptions { force: false })?;
    Ok((temp, paths))
}

/// Element instance key for fixtures; panics past the log range.
pub fn instance_key(key: u64) -> ElementInstanceKey {
    ElementInstanceKey::new(key).expect("fixture element instance key in range")
}

/// Timer owner for fixtures; panics past the log range.
pub fn owned(key: u64) -> ElementInstanceRef {
    ElementInstanceRef::owned(key).expect("fixture element instance key in range")
}

/// Message without id or payload.
pub fn message(name: &str, correlation_key: &str, time_to_live: i64) -> Message {
    Message::new(name, correlation_key, time_to_live)
}

/// Armed timer owned by `element_instance`, handled by the matching fixture event.
pub fn timer_instance(
    key: u64,
    element_instance: ElementInstanceRef,
    repetitions: Repetitions,
) -> TimerInstance {
    let handler = match element_instance {
        ElementInstanceRef::Owned(_) => BOUNDARY_TIMER_ID,
        ElementInstanceRef::Unowned => START_TIMER_ID,
    };
    TimerInstance {
        key,
        element_instance,
        workflow_key: 7,
        handler_node_id: handler.to_string(),
        due_date: 1_000,
        repetitions,
    }
}

/// `TRIGGER` command addressed at `timer`.
pub fn command_for(timer: &TimerInstance) -> TimerCommand {
    TimerCommand {
        key: timer.key,
        value: timer.to_record(),
    }
}

fn timer_event(id: &str, element_type: BpmnElementType, interval_ms: u64) -> FlowElement {
    FlowElement::CatchEvent(CatchEventElement {
        id: id.to_string(),
        element_type,
        timer: Some(TimerDefinition {
            interval_ms,
            repetitions: Repetitions::Infinite,
        }),
    })
}

/// Workflow with a timer start event, a task, and a timer boundary event on it.
pub fn boundary_timer_workflow(key: u64) -> DeployedWorkflow {
    DeployedWorkflow {
        key,
        bpmn_process_id: "billing".to_string(),
        elements: vec![
            timer_event(START_TIMER_ID, BpmnElementType::StartEvent, START_INTERVAL_MS),
            FlowElement::Activity {
                id: "charge".to_string(),
                element_type: BpmnElementType::ServiceTask,
            },
            timer_event(
                BOUNDARY_TIMER_ID,
                BpmnElementType::BoundaryEvent,
                BOUNDARY_INTERVAL_MS,
            ),
        ],
    }
}

/// Activated boundary event instance in `workflow_key`.
pub fn activated_instance(key: u64, workflow_key: u64) -> ElementInstance {
    ElementInstance {
        key,
        workflow_key,
        element_id: BOUNDARY_TIMER_ID.to_string(),
        element_type: BpmnElementType::BoundaryEvent,
        state: ElementLifecycle::Activated,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub element_instance: ElementInstanceRef,
    pub workflow_key: u64,
    pub handler_node_id: String,
    pub interval: RepeatingInterval,
}

/// Catch-event behavior with a fixed occurrence answer that records calls.
#[derive(Debug, Default)]
pub struct ScriptedCatchEventBehavior {
    pub occurs: bool,
    pub occurrences: Vec<(u64, String)>,
    pub subscriptions: Vec<Subscription>,
}

impl ScriptedCatchEventBehavior {
    pub fn occurring() -> Self {
        Self {
            occurs: true,
            ..Self::default()
        }
    }

    pub fn refusing() -> Self {
        Self::default()
    }
}

impl CatchEventBehavior for ScriptedCatchEventBehavior {
    fn occur_event_for_element(
        &mut self,
        element_instance: ElementInstanceKey,
        handler_node_id: &str,
        _payload: &serde_json::Value,
        _writer: &mut dyn LogWriter,
    ) -> Result<bool, StoreError> {
        self.occurrences
            .push((element_instance.get(), handler_node_id.to_string()));
        Ok(self.occurs)
    }

    fn subscribe_to_timer_event(
        &mut self,
        element_instance: ElementInstanceRef,
        workflow_key: u64,
        handler_node_id: &str,
        interval: RepeatingInterval,
        _writer: &mut dyn LogWriter,
    ) -> Result<(), StoreError> {
        self.subscriptions.push(Subscription {
            element_instance,
            workflow_key,
            handler_node_id: handler_node_id.to_string(),
            interval,
        });
        Ok(())
    }
}

/// Engine wrapper whose writes start failing after `writes_left` succeed.
#[derive(Debug)]
pub struct FailingEngine<E: KvEngine> {
    inner: E,
    writes_left: usize,
}

impl<E: KvEngine> FailingEngine<E> {
    pub fn new(inner: E, writes_left: usize) -> Self {
        Self { inner, writes_left }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    fn take_write(&mut self) -> Result<(), StoreError> {
        if self.writes_left == 0 {
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        self.writes_left -= 1;
        Ok(())
    }
}

impl<E: KvEngine> KvEngine for FailingEngine<E> {
    fn create_partition(&mut self, name: &str) -> Result<PartitionId, StoreError> {
        self.inner.create_partition(name)
    }

    fn put(&mut self, partition: PartitionId, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.take_write()?;
        self.inner.put(partition, key, value)
    }

    fn delete(&mut self, partition: PartitionId, key: &[u8]) -> Result<(), StoreError> {
        self.take_write()?;
        self.inner.delete(partition, key)
    }

    fn get_into(
        &self,
        partition: PartitionId,
        key: &[u8],
        buf: &mut [u8],
    ) -> Result<Option<usize>, StoreError> {
        self.inner.get_into(partition, key, buf)
    }

    fn contains(&self, partition: PartitionId, key: &[u8]) -> Result<bool, StoreError> {
        self.inner.contains(partition, key)
    }

    fn scan(
        &self,
        partition: PartitionId,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> Result<(), StoreError> {
        self.inner.scan(partition, visitor)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.inner.flush()
    }
}
