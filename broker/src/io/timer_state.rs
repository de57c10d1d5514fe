//! Timer instance store consumed by the trigger processor.

use std::collections::BTreeMap;

use tracing::debug;

use super::kv::StoreError;
use crate::core::types::{ElementInstanceRef, TimerInstance};

/// Armed timers, addressed by owning element instance and timer key.
pub trait TimerState {
    fn get(
        &self,
        element_instance: ElementInstanceRef,
        key: u64,
    ) -> Result<Option<TimerInstance>, StoreError>;

    fn remove(&mut self, timer: &TimerInstance) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryTimerState {
    timers: BTreeMap<(ElementInstanceRef, u64), TimerInstance>,
}

impl MemoryTimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_timers(timers: impl IntoIterator<Item = TimerInstance>) -> Self {
        let mut state = Self::new();
        for timer in timers {
            state.put(timer);
        }
        state
    }

    pub fn put(&mut self, timer: TimerInstance) {
        self.timers.insert((timer.element_instance, timer.key), timer);
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Remaining timers in key order.
    pub fn timers(&self) -> Vec<TimerInstance> {
        self.timers.values().cloned().collect()
    }
}

impl TimerState for MemoryTimerState {
    fn get(
        &self,
        element_instance: ElementInstanceRef,
        key: u64,
    ) -> Result<Option<TimerInstance>, StoreError> {
        Ok(self.timers.get(&(element_instance, key)).cloned())
    }

    fn remove(&mut self, timer: &TimerInstance) -> Result<(), StoreError> {
        let removed = self
            .timers
            .remove(&(timer.element_instance, timer.key))
            .is_some();
        debug!(key = timer.key, removed, "remove timer");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Repetitions;
    use crate::test_support::owned;

    fn timer(key: u64, element_instance: ElementInstanceRef) -> TimerInstance {
        TimerInstance {
            key,
            element_instance,
            workflow_key: 1,
            handler_node_id: "timer".to_string(),
            due_date: 0,
            repetitions: Repetitions::Finite(1),
        }
    }

    /// The same timer key under a different owner is a different timer.
    #[test]
    fn get_is_scoped_by_element_instance() {
        let state = MemoryTimerState::from_timers([timer(3, owned(9))]);
        assert!(
            state
                .get(owned(9), 3)
                .expect("get")
                .is_some()
        );
        assert!(
            state
                .get(ElementInstanceRef::Unowned, 3)
                .expect("get")
                .is_none()
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let t = timer(3, ElementInstanceRef::Unowned);
        let mut state = MemoryTimerState::from_timers([t.clone()]);
        state.remove(&t).expect("remove");
        state.remove(&t).expect("remove again");
        assert!(state.is_empty());
    }
}
