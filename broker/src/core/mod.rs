//! Deterministic, pure logic shared by the broker.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs, so replaying the same commands
//! always yields the same records.

pub mod keys;
pub mod message;
pub mod reschedule;
pub mod types;
pub mod workflow;
