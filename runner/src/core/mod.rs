//! Deterministic, pure logic shared by the runner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (status bytes, parsed documents, output lines) and return
//! deterministic results suitable for tests.

pub mod last_lines;
pub mod phase;
pub mod scheduler;
pub mod stall;
pub mod status;
pub mod stream;
