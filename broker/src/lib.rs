//! Message expiry store and timer trigger processing for a workflow broker.
//!
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (record types, key layouts, value
//!   codec, reschedule rules). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (key-value engines, the message
//!   store, timer and workflow state, log writers). Each sits behind a trait so
//!   tests can substitute it.
//!
//! [`timer_trigger`] orchestrates core logic with those collaborators to
//! process one timer `TRIGGER` command.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod timer_trigger;
