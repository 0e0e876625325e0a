//! Split command: turn a psiTurk participant export into event files.

use std::io::Write;

use anyhow::{Context, Result};
use xp_core::psiturk::{load_export, split_export};
use xp_core::{SplitConfig, SplitSummary};

use crate::{Config, SplitArgs};

pub fn run<W: Write>(writer: &mut W, args: &SplitArgs, config: &Config) -> Result<SplitSummary> {
    let version = config.resolve_version(args.version.as_deref())?;
    let version_dir = config.raw_dir(&version);

    let participants = load_export(&args.export)?;
    tracing::debug!(rows = participants.len(), mode = %args.mode, "loaded participant export");

    let split_config = SplitConfig {
        mode: args.mode,
        debug_marker: config.debug_marker.clone(),
        preview_worker_prefix: config.preview_worker_prefix.clone(),
        salt: config.anonymize_salt.clone(),
    };
    let summary = split_export(&participants, &version_dir, &split_config)
        .with_context(|| format!("failed to split export into {}", version_dir.display()))?;

    writeln!(writer, "{} participant(s) written to {}", summary.participants, summary.events_dir.display())?;
    if summary.filtered > 0 {
        writeln!(writer, "{} debug/preview participant(s) dropped", summary.filtered)?;
    }
    if summary.missing_data > 0 {
        writeln!(writer, "{} participant(s) had no data", summary.missing_data)?;
    }
    if summary.invalid > 0 {
        writeln!(writer, "{} participant(s) had unreadable data or worker ids", summary.invalid)?;
    }
    if summary.dropped_trials > 0 {
        writeln!(writer, "{} trial(s) without trialdata dropped", summary.dropped_trials)?;
    }
    writeln!(writer, "{}", summary.participants_csv.display())?;
    writeln!(
        writer,
        "{} and {} contain raw worker ids; do not share them",
        summary.identifiers.display(),
        summary.bonus.display()
    )?;

    Ok(summary)
}
