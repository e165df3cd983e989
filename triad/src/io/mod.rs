//! I/O collaborators for the conversation loop.

pub mod config;
pub mod fragment_store;
pub mod model;
pub mod process;
pub mod sandbox;
pub mod workspace;
