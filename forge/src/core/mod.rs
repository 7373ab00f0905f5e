//! Pure, deterministic logic shared by the repair loop.
//!
//! Core modules are free of I/O side effects. They operate on in-memory data
//! and return deterministic outputs suitable for direct testing.

pub mod diff;
pub mod types;
