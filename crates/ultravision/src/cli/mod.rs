//! Subcommand implementations.

pub mod config;
pub mod discover;
pub mod process;
