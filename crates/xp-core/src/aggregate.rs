//! Batch extraction over a directory of participant event files.
//!
//! Files are discovered with a `*.json` glob and sorted by name so output is
//! reproducible. Parsing runs in parallel; extraction and concatenation run in
//! file order, so each participant's records stay contiguous and in the order
//! their rule emitted them.
//!
//! Failures are isolated: an unreadable file is skipped for every rule, and a
//! rule that fails for one participant only loses that participant's rows for
//! that rule. Both are reported in the [`RunSummary`].

use std::path::{Path, PathBuf};

use glob::glob;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::output::{OutputError, write_rule_output};
use crate::rules::{ExtractOptions, Record, Registry, Rule};
use crate::session::{LoadError, Session};

/// Errors that abort a batch run.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("input directory does not exist: {path}")]
    MissingInput { path: PathBuf },
    #[error("invalid input path {path}: {source}")]
    Glob {
        path: PathBuf,
        #[source]
        source: glob::PatternError,
    },
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// A participant file that contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// A rule that failed for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub wid: String,
    pub rule: String,
    pub reason: String,
}

/// Rows written for one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutput {
    pub rule: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Outcome of a batch run, for the operator to check before downstream use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub participants: usize,
    pub skipped: Vec<SkippedFile>,
    pub failures: Vec<RuleFailure>,
    pub outputs: Vec<RuleOutput>,
}

impl RunSummary {
    /// Returns true if any file was skipped or any rule failed.
    pub fn has_problems(&self) -> bool {
        !self.skipped.is_empty() || !self.failures.is_empty()
    }
}

/// Records collected in memory, before writing.
#[derive(Debug)]
pub struct Batch {
    /// One entry per rule, in registry order.
    pub records: Vec<(Rule, Vec<Record>)>,
    pub participants: usize,
    pub skipped: Vec<SkippedFile>,
    pub failures: Vec<RuleFailure>,
}

/// Lists `*.json` files in `dir`, sorted by file name.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, AggregateError> {
    if !dir.is_dir() {
        return Err(AggregateError::MissingInput {
            path: dir.to_path_buf(),
        });
    }

    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{escaped}/*.json");
    let entries = glob(&pattern).map_err(|source| AggregateError::Glob {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Runs every rule over every participant file.
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: Registry,
    options: ExtractOptions,
}

impl Aggregator {
    pub const fn new(registry: Registry, options: ExtractOptions) -> Self {
        Self { registry, options }
    }

    /// Loads and extracts `files` in the given order.
    pub fn process(&self, files: &[PathBuf]) -> Batch {
        let loaded: Vec<Result<Session, LoadError>> =
            files.par_iter().map(|path| Session::load(path)).collect();

        let mut records: Vec<(Rule, Vec<Record>)> =
            self.registry.iter().map(|rule| (*rule, Vec::new())).collect();
        let mut participants = 0;
        let mut skipped = Vec::new();
        let mut failures = Vec::new();

        for (path, result) in files.iter().zip(loaded) {
            let session = match result {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping participant file");
                    skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            tracing::debug!(wid = %session.wid, events = session.events.len(), "processing participant");
            participants += 1;

            for (rule, rows) in &mut records {
                match rule.run(&session, &self.options) {
                    Ok(extracted) => rows.extend(extracted),
                    Err(e) => {
                        tracing::warn!(wid = %session.wid, rule = rule.name, error = %e, "rule failed");
                        failures.push(RuleFailure {
                            wid: session.wid.to_string(),
                            rule: rule.name.to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        Batch {
            records,
            participants,
            skipped,
            failures,
        }
    }

    /// Processes every participant file in `input_dir` and writes one artifact
    /// per rule into `output_dir`.
    pub fn run(&self, input_dir: &Path, output_dir: &Path) -> Result<RunSummary, AggregateError> {
        let files = discover(input_dir)?;
        tracing::info!(input = %input_dir.display(), files = files.len(), "processing participant files");

        let batch = self.process(&files);

        let mut outputs = Vec::with_capacity(batch.records.len());
        for (rule, rows) in &batch.records {
            let path = write_rule_output(output_dir, rule, rows)?;
            tracing::info!(rule = rule.name, rows = rows.len(), path = %path.display(), "wrote output");
            outputs.push(RuleOutput {
                rule: rule.name.to_string(),
                path,
                rows: rows.len(),
            });
        }

        Ok(RunSummary {
            participants: batch.participants,
            skipped: batch.skipped,
            failures: batch.failures,
            outputs,
        })
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(Registry::default(), ExtractOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use insta::assert_snapshot;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn write_participant(dir: &Path, wid: &str, events: &Value) {
        fs::write(dir.join(format!("{wid}.json")), events.to_string()).unwrap();
    }

    fn rows_for<'a>(batch: &'a Batch, rule: &str) -> &'a [Record] {
        &batch
            .records
            .iter()
            .find(|(r, _)| r.name == rule)
            .unwrap()
            .1
    }

    #[test]
    fn discover_sorts_and_filters_json() {
        let dir = TempDir::new().unwrap();
        for name in ["wb.json", "wa.json", "notes.txt", "wc.json"] {
            fs::write(dir.path().join(name), "[]").unwrap();
        }
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = discover(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["wa.json", "wb.json", "wc.json"]);
    }

    #[test]
    fn discover_requires_existing_directory() {
        let dir = TempDir::new().unwrap();
        let err = discover(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, AggregateError::MissingInput { .. }));
    }

    #[test]
    fn trials_across_two_participants() {
        let dir = TempDir::new().unwrap();
        write_participant(
            dir.path(),
            "w1",
            &json!([
                {"event": "task.p1.hit", "timestamp": 1},
                {"event": "task.p1.outcome", "outcome": "win", "timestamp": 2}
            ]),
        );
        write_participant(dir.path(), "w2", &json!([{"event": "task.p2.miss", "timestamp": 1}]));

        let aggregator = Aggregator::new(
            Registry::default().select(&["trials"]).unwrap(),
            ExtractOptions::default(),
        );
        let batch = aggregator.process(&discover(dir.path()).unwrap());

        assert_eq!(batch.participants, 2);
        let rows: Vec<Value> = rows_for(&batch, "trials")
            .iter()
            .map(|r| Value::Object(r.clone()))
            .collect();
        assert_eq!(
            rows,
            vec![
                json!({"wid": "w1", "practice": false, "trial_id": "p1", "n_hit": 1, "outcome": "win", "start": 1, "end": 2}),
                json!({"wid": "w2", "practice": false, "trial_id": "p2", "n_hit": 0, "outcome": null, "start": 1, "end": 1}),
            ]
        );
    }

    #[test]
    fn failures_are_isolated_per_participant_and_rule() {
        let dir = TempDir::new().unwrap();
        write_participant(
            dir.path(),
            "w1",
            &json!([
                {"event": "task.hit", "uniqueID": "t1", "timestamp": 1},
                {"event": "debrief.submitted", "difficulty": 2, "timestamp": 5}
            ]),
        );
        write_participant(dir.path(), "w2", &json!([{"event": "task.hit", "uniqueID": "t1", "timestamp": 3}]));
        fs::write(dir.path().join("w3.json"), "not json").unwrap();

        let batch = Aggregator::default().process(&discover(dir.path()).unwrap());

        assert_eq!(batch.participants, 2);
        assert_eq!(batch.skipped.len(), 1);
        assert!(batch.skipped[0].path.ends_with("w3.json"));
        assert_eq!(
            batch.failures,
            vec![RuleFailure {
                wid: "w2".to_string(),
                rule: "debrief".to_string(),
                reason: "no 'debrief.submitted' event recorded".to_string(),
            }]
        );
        assert_eq!(rows_for(&batch, "debrief").len(), 1);
        assert_eq!(rows_for(&batch, "clicks").len(), 2);
        assert_eq!(rows_for(&batch, "trials").len(), 2);
    }

    #[test]
    fn run_writes_every_artifact_even_when_empty() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_participant(
            input.path(),
            "w1",
            &json!([
                {"event": "timeline.start.task", "timestamp": 10},
                {"event": "timeline.end.task", "timestamp": 25},
                {"event": "debrief.submitted", "difficulty": 4, "feedback": "ok", "timestamp": 30}
            ]),
        );

        let summary = Aggregator::default().run(input.path(), output.path()).unwrap();
        assert_eq!(summary.participants, 1);
        assert!(!summary.has_problems());

        let counts: Vec<(String, usize)> = summary
            .outputs
            .iter()
            .map(|o| (o.rule.clone(), o.rows))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("clicks".to_string(), 0),
                ("debrief".to_string(), 1),
                ("survey".to_string(), 0),
                ("timeline".to_string(), 1),
                ("trials".to_string(), 0),
            ]
        );

        let read = |name: &str| fs::read_to_string(output.path().join(name)).unwrap();
        assert_eq!(read("clicks.csv"), "wid,trial_id,timestamp,event_type,x,y\n");
        assert_eq!(read("survey.json"), "[]");
        assert_snapshot!(read("timeline.csv"), @r"
        wid,block,start,end,duration
        w1,task,10,25,15
        ");
        assert_snapshot!(read("debrief.csv"), @r"
        wid,difficulty,feedback
        w1,4,ok
        ");
    }

    #[test]
    fn empty_input_directory_is_not_an_error() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();

        let summary = Aggregator::default().run(input.path(), output.path()).unwrap();
        assert_eq!(summary.participants, 0);
        assert_eq!(summary.outputs.len(), 5);
        assert!(summary.outputs.iter().all(|o| o.rows == 0 && o.path.exists()));
    }
}
