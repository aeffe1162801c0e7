//! Stable exit codes for the provisioner CLI.

/// Full run, verification, or plan listing succeeded.
pub const OK: i32 = 0;
/// A required step or the final verification phase failed.
pub const FAILED: i32 = 1;
/// The process was not running with root privileges.
pub const NOT_ROOT: i32 = 2;
