//! Stable exit codes for the `satbench` CLI.

/// Every trial ran (per-instance failures are recorded as statuses).
pub const OK: i32 = 0;
/// Startup failed (invalid config, missing instance root, unwritable output) or
/// the result table could not be written.
pub const FATAL: i32 = 1;
/// The run was interrupted; rows exist only for trials that finished.
pub const CANCELLED: i32 = 130;
