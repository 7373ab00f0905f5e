//! Stable exit codes for forge CLI commands.

/// All requested tasks were solved.
pub const OK: i32 = 0;
/// Invalid arguments, config, or an unusable task.
pub const INVALID: i32 = 1;
/// A task exhausted its iteration budget without a passing candidate.
pub const EXHAUSTED: i32 = 2;
/// The run was cancelled between iterations.
pub const CANCELLED: i32 = 3;
