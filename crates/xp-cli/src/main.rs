use std::io::{Write, stdout};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use xp_cli::commands::{bonus, process, rules, split};
use xp_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so summaries on stdout stay pipeable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let stdout = stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Process(args)) => {
            let config = load_config(cli.config.as_deref())?;
            process::run(&mut out, args, &config)?;
        }
        Some(Commands::Split(args)) => {
            let config = load_config(cli.config.as_deref())?;
            split::run(&mut out, args, &config)?;
        }
        Some(Commands::Bonus(args)) => {
            let config = load_config(cli.config.as_deref())?;
            bonus::run(&mut out, args, &config)?;
        }
        Some(Commands::Rules) => {
            // Listing rules doesn't need config
            rules::run(&mut out, &xp_core::Registry::default())?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    out.flush()?;
    Ok(())
}
