//! Bonus command: build the bonus payment table for a version.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use anyhow::{Context, Result};
use xp_core::bonus::{BonusSummary, read_question_data, summarize, write_bonus_csv};

use crate::{BonusArgs, Config};

pub fn run<W: Write>(writer: &mut W, args: &BonusArgs, config: &Config) -> Result<BonusSummary> {
    let version = config.resolve_version(args.version.as_deref())?;
    let raw_dir = config.raw_dir(&version);
    let input = raw_dir.join("questiondata.csv");
    let output = args.output.clone().unwrap_or_else(|| raw_dir.join("bonus.csv"));

    let file = File::open(&input).with_context(|| format!("failed to open {}", input.display()))?;
    let bonuses = read_question_data(BufReader::new(file))
        .with_context(|| format!("failed to read {}", input.display()))?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let out_file = File::create(&output).with_context(|| format!("failed to create {}", output.display()))?;
    write_bonus_csv(BufWriter::new(out_file), &bonuses)?;

    let summary = summarize(&bonuses);
    writeln!(writer, "{} participant(s) to receive bonuses", summary.count)?;
    if let (Some(mean), Some(median)) = (summary.mean, summary.median) {
        writeln!(writer, "mean: ${mean:.2}  median: ${median:.2}  total: ${:.2}", summary.total)?;
    }
    writeln!(writer, "Wrote {}", output.display())?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use insta::assert_snapshot;

    #[test]
    fn bonus_command_writes_table_and_stats() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: temp.path().to_path_buf(),
            ..Config::default()
        };
        let raw_dir = config.raw_dir("v1");
        fs::create_dir_all(&raw_dir).unwrap();
        fs::write(
            raw_dir.join("questiondata.csv"),
            "W1:A1,bonus,1.00\nW1:A1,age,30\nW2:A2,bonus,0.5\nW3:A3,bonus,2.25\n",
        )
        .unwrap();

        let args = BonusArgs {
            version: Some("v1".to_string()),
            output: None,
        };
        let mut out = Vec::new();
        let summary = run(&mut out, &args, &config).unwrap();
        assert_eq!(summary.count, 3);

        assert_eq!(
            fs::read_to_string(raw_dir.join("bonus.csv")).unwrap(),
            "W1,1.00\nW2,0.50\nW3,2.25\n"
        );
        let rendered = String::from_utf8(out)
            .unwrap()
            .replace(&temp.path().display().to_string(), "[TEMP]");
        assert_snapshot!(rendered, @r"
        3 participant(s) to receive bonuses
        mean: $1.25  median: $1.00  total: $3.75
        Wrote [TEMP]/raw/v1/bonus.csv
        ");
    }

    #[test]
    fn missing_question_data_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: temp.path().to_path_buf(),
            ..Config::default()
        };
        let args = BonusArgs {
            version: Some("v9".to_string()),
            output: None,
        };
        let err = run(&mut Vec::new(), &args, &config).unwrap_err();
        assert!(err.to_string().contains("questiondata.csv"));
    }
}
