//! Stable exit codes for sprint-runner commands.

/// Command succeeded or the session ended gracefully (all done, session
/// complete, prime directive created).
pub const OK: i32 = 0;
/// Invalid status file, config, or any other error.
pub const INVALID: i32 = 1;
/// The agent could not be started or exited unsuccessfully.
pub const PHASE_FAILED: i32 = 2;
/// The same unit of work stalled too many times.
pub const STALLED: i32 = 3;
/// `auto` hit its iteration limit with work still pending.
pub const MAX_ITERATIONS: i32 = 4;
