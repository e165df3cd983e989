//! Three-role code-running conversation loop.
//!
//! This crate coordinates a Proposer, a Validator, and an Executor through a
//! bounded conversation: the Proposer writes code, the Validator reviews it
//! for safety, and the Executor persists and runs it inside an isolated
//! container. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (turn selection, termination
//!   evaluation, fragment extraction and naming). No I/O, fully testable in
//!   isolation.
//! - **[`io`]**: Side-effecting collaborators (config, processes, container
//!   sandbox, model client, fragment files). Isolated behind traits to enable
//!   scripted doubles in tests.
//!
//! Orchestration modules ([`runner`], [`roles`], [`driver`]) coordinate core
//! logic with I/O to implement one run of a task.

pub mod core;
pub mod driver;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod roles;
pub mod runner;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
