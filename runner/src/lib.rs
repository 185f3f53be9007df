//! Autonomous sprint loop for BMAD projects.
//!
//! The runner reads a sprint status file, decides the next unit of work, and
//! drives an external coding agent through the phases for it until the sprint
//! is done. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (status model, scheduling, stall
//!   detection, output parsing). No I/O.
//! - **[`io`]**: Side effects (files, agent processes, terminal).
//!
//! Orchestration modules ([`orchestrator`], [`pipeline`], [`planning`],
//! [`looping`]) combine the two to implement CLI commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod orchestrator;
pub mod pipeline;
pub mod planning;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
