//! Deterministic, pure logic shared by the conversation loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod fragment;
pub mod selector;
pub mod termination;
pub mod types;
