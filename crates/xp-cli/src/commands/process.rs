//! Process command: run the extraction rules over participant event files.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use xp_core::{Aggregator, ExtractOptions, Registry, RunSummary};

use crate::{Config, ProcessArgs};

pub fn run<W: Write>(writer: &mut W, args: &ProcessArgs, config: &Config) -> Result<RunSummary> {
    let (input, output) = match (&args.input, &args.output) {
        (Some(input), Some(output)) => (input.clone(), output.clone()),
        _ => {
            let version = config.resolve_version(args.version.as_deref())?;
            (
                args.input
                    .clone()
                    .unwrap_or_else(|| config.raw_dir(&version).join("events")),
                args.output
                    .clone()
                    .unwrap_or_else(|| config.processed_dir(&version)),
            )
        }
    };

    let registry = Registry::default().select(args.rules.as_slice())?;
    let options = ExtractOptions {
        instructions_end_fallback: config.instructions_end_fallback,
    };
    let summary = Aggregator::new(registry, options)
        .run(&input, &output)
        .with_context(|| format!("failed to process {}", input.display()))?;

    if args.json {
        serde_json::to_writer_pretty(&mut *writer, &summary).context("failed to serialize summary")?;
        writeln!(writer)?;
    } else {
        write_summary(writer, &summary, &input)?;
    }

    if args.strict && summary.has_problems() {
        anyhow::bail!(
            "{} file(s) skipped and {} rule failure(s); rerun without --strict to accept partial output",
            summary.skipped.len(),
            summary.failures.len()
        );
    }

    Ok(summary)
}

/// Renders the run summary for the operator.
pub fn write_summary<W: Write>(writer: &mut W, summary: &RunSummary, input: &Path) -> Result<()> {
    writeln!(
        writer,
        "Processed {} participant(s) from {}",
        summary.participants,
        input.display()
    )?;

    if !summary.skipped.is_empty() {
        writeln!(writer, "Skipped {} file(s):", summary.skipped.len())?;
        for skipped in &summary.skipped {
            writeln!(writer, "- {}: {}", skipped.path.display(), skipped.reason)?;
        }
    }

    if !summary.failures.is_empty() {
        writeln!(writer, "Rule failures ({}):", summary.failures.len())?;
        for failure in &summary.failures {
            writeln!(writer, "- {} [{}]: {}", failure.wid, failure.rule, failure.reason)?;
        }
    }

    writeln!(writer, "Wrote:")?;
    for output in &summary.outputs {
        writeln!(writer, "- {} ({} row(s))", output.path.display(), output.rows)?;
    }

    Ok(())
}
