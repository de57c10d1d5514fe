//! Catch-event behavior: occurring events on elements and re-arming timers.
//!
//! The [`CatchEventBehavior`] trait is the seam the trigger processor calls
//! through. Tests use scripted behaviors; the broker uses
//! [`DefaultCatchEventBehavior`], which reads element instances and writes
//! follow-up records.

use tracing::debug;

use super::clock::Clock;
use super::kv::StoreError;
use super::log_writer::LogWriter;
use super::workflow::ElementInstanceState;
use crate::core::types::{
    ElementInstanceKey, ElementInstanceRef, Intent, RecordValue, RepeatingInterval, TimerIntent, TimerRecord,
    WorkflowInstanceIntent, WorkflowInstanceRecord,
};

pub trait CatchEventBehavior {
    /// Occur the event `handler_node_id` on the element instance.
    ///
    /// Returns `false` when the element no longer accepts events (for example,
    /// it was already left).
    fn occur_event_for_element(
        &mut self,
        element_instance: ElementInstanceKey,
        handler_node_id: &str,
        payload: &serde_json::Value,
        writer: &mut dyn LogWriter,
    ) -> Result<bool, StoreError>;

    /// Emit the command that arms a timer for `handler_node_id`.
    fn subscribe_to_timer_event(
        &mut self,
        element_instance: ElementInstanceRef,
        workflow_key: u64,
        handler_node_id: &str,
        interval: RepeatingInterval,
        writer: &mut dyn LogWriter,
    ) -> Result<(), StoreError>;
}

pub struct DefaultCatchEventBehavior<'a, I: ElementInstanceState, C: Clock> {
    instances: &'a I,
    clock: C,
}

impl<'a, I: ElementInstanceState, C: Clock> DefaultCatchEventBehavior<'a, I, C> {
    pub fn new(instances: &'a I, clock: C) -> Self {
        Self { instances, clock }
    }
}

impl<I: ElementInstanceState, C: Clock> CatchEventBehavior for DefaultCatchEventBehavior<'_, I, C> {
    fn occur_event_for_element(
        &mut self,
        element_instance: ElementInstanceKey,
        handler_node_id: &str,
        payload: &serde_json::Value,
        writer: &mut dyn LogWriter,
    ) -> Result<bool, StoreError> {
        let element_instance_key = element_instance.get();
        let Some(instance) = self.instances.instance(element_instance_key)? else {
            debug!(element_instance_key, handler_node_id, "no element instance to occur on");
            return Ok(false);
        };
        if !instance.accepts_events() {
            debug!(
                element_instance_key,
                handler_node_id,
                state = ?instance.state,
                "element does not accept events"
            );
            return Ok(false);
        }

        writer.append_follow_up_event(
            element_instance_key,
            Intent::WorkflowInstance(WorkflowInstanceIntent::EventOccurred),
            RecordValue::WorkflowInstance(WorkflowInstanceRecord {
                workflow_key: instance.workflow_key,
                element_instance: ElementInstanceRef::Owned(element_instance),
                element_id: instance.element_id,
                bpmn_element_type: instance.element_type,
                payload: payload.clone(),
            }),
        );
        Ok(true)
    }

    fn subscribe_to_timer_event(
        &mut self,
        element_instance: ElementInstanceRef,
        workflow_key: u64,
        handler_node_id: &str,
        interval: RepeatingInterval,
        writer: &mut dyn LogWriter,
    ) -> Result<(), StoreError> {
        let offset = i64::try_from(interval.interval_ms).unwrap_or(i64::MAX);
        let due_date = self.clock.now_ms().saturating_add(offset);
        writer.append_new_command(
            Intent::Timer(TimerIntent::Create),
            RecordValue::Timer(TimerRecord {
                element_instance,
                workflow_key,
                handler_node_id: handler_node_id.to_string(),
                due_date,
                repetitions: interval.repetitions,
            }),
        );
        Ok(())
    }
}
