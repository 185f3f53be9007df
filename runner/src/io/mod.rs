//! Side-effecting helpers: files, agent processes, and the terminal.

pub mod agent;
pub mod artifacts;
pub mod config;
pub mod display;
pub mod executor;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod status_file;
pub mod templates;
