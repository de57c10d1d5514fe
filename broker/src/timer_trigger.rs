//! Orchestration for processing one `TRIGGER` timer command.
//!
//! Each command ends in exactly one of: a rejection, or a `TRIGGERED` event
//! optionally followed by a command that re-arms the timer. The timer
//! instance is removed before anything fires, so replaying the command (or a
//! duplicate delivery) finds nothing and is rejected instead of firing twice.

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::core::reschedule::{
    ResolveError, catch_event_by_id, next_interval, should_reschedule, start_event_by_id,
};
use crate::core::types::{
    ElementInstanceRef, Intent, RecordValue, RejectionType, RepeatingInterval, TimerCommand,
    TimerIntent, TimerRecord, TriggerOutcome, WorkflowInstanceIntent, WorkflowInstanceRecord,
    empty_payload,
};
use crate::core::workflow::CatchEventElement;
use crate::io::catch_event::CatchEventBehavior;
use crate::io::kv::StoreError;
use crate::io::log_writer::LogWriter;
use crate::io::timer_state::TimerState;
use crate::io::workflow::{ElementInstanceState, WorkflowRepository};

/// Fatal failure: the command cannot be completed and must not be skipped.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("inconsistent state for triggered timer {timer_key}: {source}")]
    Inconsistent {
        timer_key: u64,
        #[source]
        source: ResolveError,
    },
}

pub fn no_timer_found_message(key: u64) -> String {
    format!("Expected to trigger timer with key '{key}', but no such timer was found")
}

pub fn no_event_occurred_message(key: u64) -> String {
    format!("Expected to trigger a timer with key '{key}', but the timer is not active anymore")
}

/// Processes trigger commands against borrowed timer and workflow state.
pub struct TriggerTimerProcessor<'a, T, I, R, B>
where
    T: TimerState,
    I: ElementInstanceState,
    R: WorkflowRepository,
    B: CatchEventBehavior,
{
    timers: &'a mut T,
    instances: &'a I,
    workflows: &'a R,
    behavior: B,
}

impl<'a, T, I, R, B> TriggerTimerProcessor<'a, T, I, R, B>
where
    T: TimerState,
    I: ElementInstanceState,
    R: WorkflowRepository,
    B: CatchEventBehavior,
{
    pub fn new(timers: &'a mut T, instances: &'a I, workflows: &'a R, behavior: B) -> Self {
        Self {
            timers,
            instances,
            workflows,
            behavior,
        }
    }

    /// Catch-event behavior the processor drives.
    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    #[instrument(skip_all, fields(timer_key = command.key, handler = %command.value.handler_node_id))]
    pub fn process<W: LogWriter>(
        &mut self,
        command: &TimerCommand,
        writer: &mut W,
    ) -> Result<TriggerOutcome, TriggerError> {
        let timer = &command.value;
        let element_instance = timer.element_instance;

        let Some(instance) = self.timers.get(element_instance, command.key)? else {
            warn!("no timer to trigger");
            writer.append_rejection(
                command,
                RejectionType::NotFound,
                no_timer_found_message(command.key),
            );
            return Ok(TriggerOutcome::Rejected(RejectionType::NotFound));
        };

        self.timers.remove(&instance)?;

        let occurred = match element_instance {
            ElementInstanceRef::Unowned => {
                writer.append_new_event(
                    Intent::WorkflowInstance(WorkflowInstanceIntent::EventOccurred),
                    RecordValue::WorkflowInstance(WorkflowInstanceRecord::start_event(
                        timer.workflow_key,
                        timer.handler_node_id.clone(),
                    )),
                );
                true
            }
            ElementInstanceRef::Owned(key) => self.behavior.occur_event_for_element(
                key,
                &timer.handler_node_id,
                &empty_payload(),
                writer,
            )?,
        };

        if !occurred {
            warn!("timer element no longer accepts events");
            writer.append_rejection(
                command,
                RejectionType::InvalidState,
                no_event_occurred_message(command.key),
            );
            return Ok(TriggerOutcome::Rejected(RejectionType::InvalidState));
        }

        writer.append_follow_up_event(
            command.key,
            Intent::Timer(TimerIntent::Triggered),
            RecordValue::Timer(timer.clone()),
        );

        if !should_reschedule(timer.repetitions) {
            info!(rescheduled = false, "timer triggered");
            return Ok(TriggerOutcome::Triggered { rescheduled: false });
        }

        let (event, interval) = self.resolve_reschedule(command.key, timer)?;
        self.behavior.subscribe_to_timer_event(
            element_instance,
            timer.workflow_key,
            &event.id,
            interval,
            writer,
        )?;
        info!(
            rescheduled = true,
            repetitions = i64::from(interval.repetitions),
            "timer triggered"
        );
        Ok(TriggerOutcome::Triggered { rescheduled: true })
    }

    fn resolve_reschedule(
        &self,
        timer_key: u64,
        timer: &TimerRecord,
    ) -> Result<(CatchEventElement, RepeatingInterval), TriggerError> {
        let inconsistent = |source: ResolveError| {
            error!(%source, "cannot reschedule repeating timer");
            TriggerError::Inconsistent { timer_key, source }
        };

        let event = match timer.element_instance {
            ElementInstanceRef::Owned(key) => {
                let instance = self
                    .instances
                    .instance(key.get())?
                    .ok_or(ResolveError::ElementInstanceNotFound(key.get()))
                    .map_err(inconsistent)?;
                let workflow = self.workflows.workflow_by_key(instance.workflow_key)?;
                catch_event_by_id(
                    workflow.as_ref(),
                    instance.workflow_key,
                    &timer.handler_node_id,
                )
                .cloned()
                .map_err(inconsistent)?
            }
            ElementInstanceRef::Unowned => {
                let workflow = self.workflows.workflow_by_key(timer.workflow_key)?;
                start_event_by_id(workflow.as_ref(), timer.workflow_key, &timer.handler_node_id)
                    .cloned()
                    .map_err(inconsistent)?
            }
        };

        let interval = next_interval(timer, &event).map_err(inconsistent)?;
        Ok((event, interval))
    }
}
