//! Workflow definition repository and element instance lookups.

use std::collections::BTreeMap;

use super::kv::StoreError;
use crate::core::workflow::{DeployedWorkflow, ElementInstance, ElementLifecycle};

pub trait WorkflowRepository {
    fn workflow_by_key(&self, key: u64) -> Result<Option<DeployedWorkflow>, StoreError>;
}

pub trait ElementInstanceState {
    fn instance(&self, key: u64) -> Result<Option<ElementInstance>, StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryWorkflowRepository {
    workflows: BTreeMap<u64, DeployedWorkflow>,
}

impl MemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_workflows(workflows: impl IntoIterator<Item = DeployedWorkflow>) -> Self {
        let mut repository = Self::new();
        for workflow in workflows {
            repository.deploy(workflow);
        }
        repository
    }

    pub fn deploy(&mut self, workflow: DeployedWorkflow) {
        self.workflows.insert(workflow.key, workflow);
    }
}

impl WorkflowRepository for MemoryWorkflowRepository {
    fn workflow_by_key(&self, key: u64) -> Result<Option<DeployedWorkflow>, StoreError> {
        Ok(self.workflows.get(&key).cloned())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryElementInstances {
    instances: BTreeMap<u64, ElementInstance>,
}

impl MemoryElementInstances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_instances(instances: impl IntoIterator<Item = ElementInstance>) -> Self {
        let mut state = Self::new();
        for instance in instances {
            state.insert(instance);
        }
        state
    }

    pub fn insert(&mut self, instance: ElementInstance) {
        self.instances.insert(instance.key, instance);
    }

    /// Move an instance to `state`; returns false if the key is unknown.
    pub fn set_state(&mut self, key: u64, state: ElementLifecycle) -> bool {
        match self.instances.get_mut(&key) {
            Some(instance) => {
                instance.state = state;
                true
            }
            None => false,
        }
    }
}

impl ElementInstanceState for MemoryElementInstances {
    fn instance(&self, key: u64) -> Result<Option<ElementInstance>, StoreError> {
        Ok(self.instances.get(&key).cloned())
    }
}
