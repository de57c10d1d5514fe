//! Deployed workflow definitions and element instances, as plain data.

use serde::{Deserialize, Serialize};

use crate::core::types::{BpmnElementType, Repetitions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDefinition {
    pub interval_ms: u64,
    pub repetitions: Repetitions,
}

/// Element that waits for a timer or message before proceeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchEventElement {
    pub id: String,
    pub element_type: BpmnElementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowElement {
    CatchEvent(CatchEventElement),
    Activity {
        id: String,
        element_type: BpmnElementType,
    },
}

impl FlowElement {
    pub fn id(&self) -> &str {
        match self {
            FlowElement::CatchEvent(event) => &event.id,
            FlowElement::Activity { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedWorkflow {
    pub key: u64,
    pub bpmn_process_id: String,
    pub elements: Vec<FlowElement>,
}

impl DeployedWorkflow {
    pub fn element_by_id(&self, id: &str) -> Option<&FlowElement> {
        self.elements.iter().find(|element| element.id() == id)
    }

    pub fn start_events(&self) -> impl Iterator<Item = &CatchEventElement> {
        self.elements.iter().filter_map(|element| match element {
            FlowElement::CatchEvent(event) if event.element_type == BpmnElementType::StartEvent => {
                Some(event)
            }
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementLifecycle {
    Activating,
    Activated,
    Completing,
    Completed,
    Terminated,
}

/// Running instance of a workflow element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInstance {
    pub key: u64,
    pub workflow_key: u64,
    pub element_id: String,
    pub element_type: BpmnElementType,
    pub state: ElementLifecycle,
}

impl ElementInstance {
    /// Only activated elements can have a catch event occur on them.
    pub fn accepts_events(&self) -> bool {
        self.state == ElementLifecycle::Activated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow() -> DeployedWorkflow {
        DeployedWorkflow {
            key: 1,
            bpmn_process_id: "process".to_string(),
            elements: vec![
                FlowElement::CatchEvent(CatchEventElement {
                    id: "start".to_string(),
                    element_type: BpmnElementType::StartEvent,
                    timer: None,
                }),
                FlowElement::Activity {
                    id: "task".to_string(),
                    element_type: BpmnElementType::ServiceTask,
                },
                FlowElement::CatchEvent(CatchEventElement {
                    id: "wait".to_string(),
                    element_type: BpmnElementType::IntermediateCatchEvent,
                    timer: None,
                }),
            ],
        }
    }

    #[test]
    fn start_events_only_lists_start_catch_events() {
        let workflow = workflow();
        let ids: Vec<&str> = workflow.start_events().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["start"]);
    }

    #[test]
    fn element_by_id_finds_activities_and_events() {
        let workflow = workflow();
        assert!(matches!(
            workflow.element_by_id("task"),
            Some(FlowElement::Activity { .. })
        ));
        assert!(workflow.element_by_id("missing").is_none());
    }

    #[test]
    fn flow_elements_parse_from_tagged_json() {
        let json = r#"{"kind":"catch_event","id":"t","element_type":"BOUNDARY_EVENT",
            "timer":{"interval_ms":1000,"repetitions":-1}}"#;
        let element: FlowElement = serde_json::from_str(json).expect("parse");
        let FlowElement::CatchEvent(event) = element else {
            panic!("expected catch event");
        };
        assert_eq!(
            event.timer,
            Some(TimerDefinition {
                interval_ms: 1000,
                repetitions: Repetitions::Infinite
            })
        );
    }
}
