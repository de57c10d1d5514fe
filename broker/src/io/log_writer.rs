//! Command/event log writer abstraction.
//!
//! Processors never append to the log directly; they hand records to a
//! [`LogWriter`]. The [`RecordingWriter`] keeps them in append order, which
//! is what the CLI prints and what tests assert on.

use serde::Serialize;

use crate::core::types::{Intent, RecordValue, RejectionType, TimerCommand};

/// One record handed to the writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "record_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoggedRecord {
    Event {
        /// Key of the command this event follows up, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        source_key: Option<u64>,
        intent: Intent,
        value: RecordValue,
    },
    Command {
        intent: Intent,
        value: RecordValue,
    },
    Rejection {
        key: u64,
        intent: Intent,
        value: RecordValue,
        rejection_type: RejectionType,
        reason: String,
    },
}

impl LoggedRecord {
    pub fn intent(&self) -> Intent {
        match self {
            LoggedRecord::Event { intent, .. }
            | LoggedRecord::Command { intent, .. }
            | LoggedRecord::Rejection { intent, .. } => *intent,
        }
    }
}

pub trait LogWriter {
    fn append_follow_up_event(&mut self, key: u64, intent: Intent, value: RecordValue);

    fn append_new_event(&mut self, intent: Intent, value: RecordValue);

    fn append_new_command(&mut self, intent: Intent, value: RecordValue);

    fn append_rejection(
        &mut self,
        command: &TimerCommand,
        rejection_type: RejectionType,
        reason: String,
    );
}

/// Writer that keeps every appended record in memory, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingWriter {
    records: Vec<LoggedRecord>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[LoggedRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<LoggedRecord> {
        self.records
    }

    pub fn rejections(&self) -> impl Iterator<Item = &LoggedRecord> {
        self.records
            .iter()
            .filter(|record| matches!(record, LoggedRecord::Rejection { .. }))
    }

    pub fn commands(&self) -> impl Iterator<Item = &LoggedRecord> {
        self.records
            .iter()
            .filter(|record| matches!(record, LoggedRecord::Command { .. }))
    }
}

impl LogWriter for RecordingWriter {
    fn append_follow_up_event(&mut self, key: u64, intent: Intent, value: RecordValue) {
        self.records.push(LoggedRecord::Event {
            source_key: Some(key),
            intent,
            value,
        });
    }

    fn append_new_event(&mut self, intent: Intent, value: RecordValue) {
        self.records.push(LoggedRecord::Event {
            source_key: None,
            intent,
            value,
        });
    }

    fn append_new_command(&mut self, intent: Intent, value: RecordValue) {
        self.records.push(LoggedRecord::Command { intent, value });
    }

    fn append_rejection(
        &mut self,
        command: &TimerCommand,
        rejection_type: RejectionType,
        reason: String,
    ) {
        self.records.push(LoggedRecord::Rejection {
            key: command.key,
            intent: command.intent(),
            value: RecordValue::Timer(command.value.clone()),
            rejection_type,
            reason,
        });
    }
}
