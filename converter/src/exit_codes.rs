//! Stable exit codes for converter CLI commands.

/// Every requested conversion succeeded.
pub const OK: i32 = 0;
/// At least one conversion failed or was rolled back.
pub const FAILED: i32 = 1;
/// Invalid arguments, config or project path.
pub const INVALID: i32 = 2;
