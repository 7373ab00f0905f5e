//! Side-effecting collaborators around the repair loop.

pub mod analysis;
pub mod attempt_log;
pub mod codegen;
pub mod config;
pub mod executor;
pub mod process;
pub mod prompt;
pub mod table;
