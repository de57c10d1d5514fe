//! Rescheduling rules for repeating timers.
//!
//! A timer that fired is re-armed only while it has firings left. Resolving
//! the catch event to re-arm happens after the timer was consumed, so every
//! failure here is an internal inconsistency and never a rejection.

use thiserror::Error;

use crate::core::types::{RepeatingInterval, Repetitions, TimerRecord};
use crate::core::workflow::{CatchEventElement, DeployedWorkflow, FlowElement};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(
        "Expected to reschedule timer for element instance with key '{0}', but no such element instance was found"
    )]
    ElementInstanceNotFound(u64),
    #[error(
        "Expected to reschedule timer in workflow with key '{0}', but no such workflow was found"
    )]
    WorkflowNotFound(u64),
    #[error(
        "Expected to reschedule timer for element with id '{0}', but no such element was found"
    )]
    ElementNotFound(String),
    #[error(
        "Expected to reschedule timer for element with id '{0}', but the element is not a timer catch event"
    )]
    NotCatchEvent(String),
    #[error(
        "Expected to reschedule timer start event with id '{element_id}' in workflow with key '{workflow_key}', but no such start event was found"
    )]
    StartEventNotFound {
        workflow_key: u64,
        element_id: String,
    },
    #[error(
        "Expected to reschedule repeating timer for element with id '{0}', but no timer definition was found"
    )]
    NoTimerDefinition(String),
}

/// Infinite timers always repeat; finite ones repeat while more than one firing remains.
pub fn should_reschedule(repetitions: Repetitions) -> bool {
    match repetitions {
        Repetitions::Infinite => true,
        Repetitions::Finite(count) => count > 1,
    }
}

pub fn next_repetitions(repetitions: Repetitions) -> Repetitions {
    match repetitions {
        Repetitions::Infinite => Repetitions::Infinite,
        Repetitions::Finite(count) => Repetitions::Finite(count.saturating_sub(1)),
    }
}

/// Resolve a catch event of `workflow` by element id.
pub fn catch_event_by_id<'a>(
    workflow: Option<&'a DeployedWorkflow>,
    workflow_key: u64,
    element_id: &str,
) -> Result<&'a CatchEventElement, ResolveError> {
    let workflow = workflow.ok_or(ResolveError::WorkflowNotFound(workflow_key))?;
    match workflow.element_by_id(element_id) {
        Some(FlowElement::CatchEvent(event)) => Ok(event),
        Some(FlowElement::Activity { .. }) => {
            Err(ResolveError::NotCatchEvent(element_id.to_string()))
        }
        None => Err(ResolveError::ElementNotFound(element_id.to_string())),
    }
}

/// Resolve one of the declared start events of `workflow` by element id.
pub fn start_event_by_id<'a>(
    workflow: Option<&'a DeployedWorkflow>,
    workflow_key: u64,
    element_id: &str,
) -> Result<&'a CatchEventElement, ResolveError> {
    let workflow = workflow.ok_or(ResolveError::WorkflowNotFound(workflow_key))?;
    workflow
        .start_events()
        .find(|event| event.id == element_id)
        .ok_or_else(|| ResolveError::StartEventNotFound {
            workflow_key,
            element_id: element_id.to_string(),
        })
}

/// Interval for the next arming of `record`, using the period declared by `event`.
pub fn next_interval(
    record: &TimerRecord,
    event: &CatchEventElement,
) -> Result<RepeatingInterval, ResolveError> {
    let timer = event
        .timer
        .as_ref()
        .ok_or_else(|| ResolveError::NoTimerDefinition(event.id.clone()))?;
    Ok(RepeatingInterval {
        repetitions: next_repetitions(record.repetitions),
        interval_ms: timer.interval_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BpmnElementType;
    use crate::core::workflow::TimerDefinition;
    use crate::test_support::owned;

    fn timer_event(id: &str, element_type: BpmnElementType, interval_ms: u64) -> FlowElement {
        FlowElement::CatchEvent(CatchEventElement {
            id: id.to_string(),
            element_type,
            timer: Some(TimerDefinition {
                interval_ms,
                repetitions: Repetitions::Finite(3),
            }),
        })
    }

    fn workflow() -> DeployedWorkflow {
        DeployedWorkflow {
            key: 7,
            bpmn_process_id: "billing".to_string(),
            elements: vec![
                timer_event("start", BpmnElementType::StartEvent, 60_000),
                FlowElement::Activity {
                    id: "charge".to_string(),
                    element_type: BpmnElementType::ServiceTask,
                },
                timer_event("reminder", BpmnElementType::BoundaryEvent, 5_000),
                FlowElement::CatchEvent(CatchEventElement {
                    id: "plain".to_string(),
                    element_type: BpmnElementType::IntermediateCatchEvent,
                    timer: None,
                }),
            ],
        }
    }

    fn record(repetitions: Repetitions) -> TimerRecord {
        TimerRecord {
            element_instance: owned(11),
            workflow_key: 7,
            handler_node_id: "reminder".to_string(),
            due_date: 1_000,
            repetitions,
        }
    }

    /// Finite counts of one or less stop; anything larger or infinite repeats.
    #[test]
    fn should_reschedule_follows_remaining_firings() {
        assert!(should_reschedule(Repetitions::Infinite));
        assert!(should_reschedule(Repetitions::Finite(2)));
        assert!(!should_reschedule(Repetitions::Finite(1)));
        assert!(!should_reschedule(Repetitions::Finite(0)));
    }

    #[test]
    fn next_repetitions_decrements_finite_only() {
        assert_eq!(next_repetitions(Repetitions::Infinite), Repetitions::Infinite);
        assert_eq!(
            next_repetitions(Repetitions::Finite(3)),
            Repetitions::Finite(2)
        );
        assert_eq!(
            next_repetitions(Repetitions::Finite(0)),
            Repetitions::Finite(0)
        );
    }

    #[test]
    fn catch_event_by_id_resolves_timer_events() {
        let workflow = workflow();
        let event = catch_event_by_id(Some(&workflow), 7, "reminder").expect("resolve");
        assert_eq!(event.id, "reminder");
    }

    /// Each way the definition can be missing maps to a distinct error.
    #[test]
    fn catch_event_by_id_reports_each_failure() {
        let workflow = workflow();
        assert_eq!(
            catch_event_by_id(None, 9, "reminder"),
            Err(ResolveError::WorkflowNotFound(9))
        );
        assert_eq!(
            catch_event_by_id(Some(&workflow), 7, "nope"),
            Err(ResolveError::ElementNotFound("nope".to_string()))
        );
        assert_eq!(
            catch_event_by_id(Some(&workflow), 7, "charge"),
            Err(ResolveError::NotCatchEvent("charge".to_string()))
        );
    }

    #[test]
    fn start_event_by_id_only_matches_start_events() {
        let workflow = workflow();
        assert!(start_event_by_id(Some(&workflow), 7, "start").is_ok());
        assert_eq!(
            start_event_by_id(Some(&workflow), 7, "reminder"),
            Err(ResolveError::StartEventNotFound {
                workflow_key: 7,
                element_id: "reminder".to_string()
            })
        );
    }

    #[test]
    fn next_interval_uses_declared_period_and_decrements() {
        let workflow = workflow();
        let event = catch_event_by_id(Some(&workflow), 7, "reminder").expect("resolve");
        let interval = next_interval(&record(Repetitions::Finite(3)), event).expect("interval");
        assert_eq!(
            interval,
            RepeatingInterval {
                repetitions: Repetitions::Finite(2),
                interval_ms: 5_000
            }
        );
    }

    #[test]
    fn next_interval_requires_timer_definition() {
        let workflow = workflow();
        let event = catch_event_by_id(Some(&workflow), 7, "plain").expect("resolve");
        let err = next_interval(&record(Repetitions::Infinite), event).expect_err("no timer");
        assert_eq!(err, ResolveError::NoTimerDefinition("plain".to_string()));
        assert!(err.to_string().contains("no timer definition was found"));
    }
}
