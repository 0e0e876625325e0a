//! CLI subcommand implementations.

pub mod bonus;
pub mod process;
pub mod rules;
pub mod split;
