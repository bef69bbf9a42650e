// src/schedule/events.rs

use std::collections::BTreeMap;

use crate::engine::WorkerType;

/// Static event name -> worker types table.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    triggers: BTreeMap<String, Vec<WorkerType>>,
}

impl EventTable {
    pub fn new(triggers: BTreeMap<String, Vec<WorkerType>>) -> Self {
        Self { triggers }
    }

    /// Worker types woken by `event`, in configured order. Unknown events map
    /// to nothing.
    pub fn workers_for(&self, event: &str) -> &[WorkerType] {
        self.triggers
            .get(event)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.triggers.keys().map(String::as_str)
    }
}
