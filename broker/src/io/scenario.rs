//! Timer scenario files: armed timers plus the workflow state they refer to.
//!
//! The `timer trigger` command reads one of these, processes a single trigger
//! command against it, and writes the remaining timers back.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::config::write_atomic;
use super::timer_state::MemoryTimerState;
use super::workflow::{MemoryElementInstances, MemoryWorkflowRepository};
use crate::core::types::{ElementInstanceRef, Repetitions, TimerCommand, TimerInstance, TimerRecord};
use crate::core::workflow::{DeployedWorkflow, ElementInstance};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Pinned wall clock in epoch milliseconds; the system clock is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now_ms: Option<i64>,
    pub timers: Vec<TimerInstance>,
    pub element_instances: Vec<ElementInstance>,
    pub workflows: Vec<DeployedWorkflow>,
}

impl Scenario {
    pub fn timer_state(&self) -> MemoryTimerState {
        MemoryTimerState::from_timers(self.timers.iter().cloned())
    }

    pub fn element_instances(&self) -> MemoryElementInstances {
        MemoryElementInstances::from_instances(self.element_instances.iter().cloned())
    }

    pub fn workflow_repository(&self) -> MemoryWorkflowRepository {
        MemoryWorkflowRepository::from_workflows(self.workflows.iter().cloned())
    }

    /// Build the `TRIGGER` command for timer `key`.
    ///
    /// The command carries the armed timer's record when one with that key
    /// exists. `element_instance` overrides the addressed owner, which lets a
    /// caller address a timer that does not exist under that owner.
    pub fn trigger_command(
        &self,
        key: u64,
        element_instance: Option<ElementInstanceRef>,
    ) -> TimerCommand {
        let mut value = self
            .timers
            .iter()
            .find(|timer| timer.key == key)
            .map_or_else(
                || TimerRecord {
                    element_instance: ElementInstanceRef::Unowned,
                    workflow_key: 0,
                    handler_node_id: String::new(),
                    due_date: 0,
                    repetitions: Repetitions::Finite(1),
                },
                TimerInstance::to_record,
            );
        if let Some(owner) = element_instance {
            value.element_instance = owner;
        }
        TimerCommand { key, value }
    }
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read scenario {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse scenario {}", path.display()))
}

/// Atomically write `scenario` as pretty JSON.
pub fn write_scenario(path: &Path, scenario: &Scenario) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(scenario).context("serialize scenario")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{activated_instance, boundary_timer_workflow, owned, timer_instance};

    fn scenario() -> Scenario {
        Scenario {
            now_ms: Some(10_000),
            timers: vec![timer_instance(
                3,
                owned(4),
                Repetitions::Finite(2),
            )],
            element_instances: vec![activated_instance(4, 7)],
            workflows: vec![boundary_timer_workflow(7)],
        }
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("timers.json");
        write_scenario(&path, &scenario()).expect("write");
        assert_eq!(load_scenario(&path).expect("load"), scenario());
    }

    /// Missing sections parse as empty so a bare `{}` is a valid scenario.
    #[test]
    fn empty_object_is_empty_scenario() {
        let parsed: Scenario = serde_json::from_str("{}").expect("parse");
        assert_eq!(parsed, Scenario::default());
    }

    #[test]
    fn trigger_command_uses_armed_timer_record() {
        let command = scenario().trigger_command(3, None);
        assert_eq!(command.key, 3);
        assert_eq!(command.value.element_instance, owned(4));
        assert_eq!(command.value.repetitions, Repetitions::Finite(2));
    }

    #[test]
    fn trigger_command_owner_override_and_unknown_key() {
        let overridden = scenario().trigger_command(3, Some(owned(9)));
        assert_eq!(
            overridden.value.element_instance,
            owned(9)
        );

        let unknown = scenario().trigger_command(42, None);
        assert_eq!(unknown.value.element_instance, ElementInstanceRef::Unowned);
        assert!(unknown.value.handler_node_id.is_empty());
    }
}
