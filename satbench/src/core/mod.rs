//! Deterministic, pure logic shared by the harness.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values (paths, log contents, result rows) and return deterministic outputs
//! suitable for tests.

pub mod naming;
pub mod row;
pub mod status;
pub mod types;
