//! Experiment data CLI library.
//!
//! This crate provides the `xp` command-line interface over `xp-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::{BonusArgs, Cli, Commands, ProcessArgs, SplitArgs};
pub use config::Config;
