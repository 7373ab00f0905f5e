//! Bounded generate-test-repair loop for tabular data extractors.
//!
//! Given a document and a ground-truth CSV, forge asks an external code
//! generator for a parser, runs the candidate in an isolated interpreter
//! process, diffs its output against the ground truth, and feeds the diff
//! back into the next generation round — until the output matches or the
//! iteration budget runs out. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (table comparison, loop types).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (code generator CLI,
//!   interpreter subprocess, CSV readers, config, audit artifacts).
//! - **[`workflow`]**: The state machine binding core logic to the
//!   collaborators.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
