//! Stable exit codes for flowctl CLI commands.

/// Command succeeded, or the exit gate allowed the session to close.
pub const OK: i32 = 0;
/// Command failed: invalid configuration, template, spec, or session state.
pub const INVALID: i32 = 1;
/// The exit gate blocked the session. A normal outcome, not a failure.
pub const BLOCKED: i32 = 2;
