//! Side-effecting collaborators: storage engines, state stores, log writers.

pub mod catch_event;
pub mod clock;
pub mod config;
pub mod init;
pub mod kv;
pub mod log_writer;
pub mod memory_kv;
pub mod message_store;
pub mod scenario;
pub mod timer_state;
pub mod workflow;
