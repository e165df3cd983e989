//! Stable exit codes for the CLI.

/// The run stopped on an explicit termination condition.
pub const OK: i32 = 0;
/// Invalid config/arguments, or a fatal run error (container, inference).
pub const INVALID: i32 = 1;
/// The run hit the hard turn cap without a termination condition firing.
pub const TURN_CAP: i32 = 2;
/// The run was cancelled (signal or deadline).
pub const CANCELLED: i32 = 3;
