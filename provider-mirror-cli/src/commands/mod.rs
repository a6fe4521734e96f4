//! CLI subcommands.

pub mod mirror;
mod progress;
pub mod verify;
