//! Command implementations for the difflog CLI
//!
//! Each command module provides a `run` function that executes the command logic.

pub mod diff;
pub mod dirs;
pub mod extract;
pub mod files;
