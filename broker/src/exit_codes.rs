//! Stable exit codes for broker CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid config, arguments, or a fatal store error.
pub const INVALID: i32 = 1;
/// `broker message find` or `exists` found nothing.
pub const NOT_FOUND: i32 = 2;
/// `broker timer trigger` was rejected (no such timer, or element not active).
pub const REJECTED: i32 = 3;
