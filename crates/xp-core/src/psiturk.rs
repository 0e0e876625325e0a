//! Splitting a psiTurk participant export into per-participant event files.
//!
//! The export is a JSON array of participant rows as stored by psiTurk, each
//! with a JSON-encoded `datastring`. Splitting writes, under a version
//! directory:
//!
//! - `events/<wid>.json`: the `trialdata` of every recorded trial
//! - `participants.csv`: one metadata row per participant
//! - `identifiers.json`: the anonymization map (sensitive)
//! - `bonus.json`: bonus amounts keyed by raw worker id (sensitive)
//!
//! Worker ids that cannot be used as a file name, and trials without
//! `trialdata`, are skipped with a warning.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::anonymize::{AnonymizeError, Anonymizer, AnonymizerConfig};
use crate::output::{OutputError, write_table};
use crate::rules::Record;
use crate::types::ParticipantId;

/// Datastring keys copied into the participant metadata row.
const META_KEYS: [&str; 7] = [
    "condition",
    "counterbalance",
    "assignmentId",
    "hitId",
    "useragent",
    "mode",
    "status",
];

/// Question data keys that are flattened one level, compared case-insensitively.
const PARAMS_KEY: &str = "params";

/// Params entries too large to be useful in a CSV cell.
const SKIPPED_PARAMS: [&str; 1] = ["graphRenderOptions"];

/// Errors while splitting an export.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid participant export {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Anonymize(#[from] AnonymizeError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Which participants are kept and whether ids are anonymized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Real participants only, anonymized.
    #[default]
    Live,
    /// Everyone, raw ids.
    Debug,
    /// Everyone, raw ids, from a local database export.
    Local,
}

impl SplitMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Debug => "debug",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(Self::Live),
            "debug" => Ok(Self::Debug),
            "local" => Ok(Self::Local),
            _ => Err(format!("invalid split mode: {s}")),
        }
    }
}

/// Settings for [`split_export`].
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub mode: SplitMode,
    /// Substring marking test participants (`uniqueid`) and exempt worker ids.
    pub debug_marker: String,
    /// Worker id prefix of the recruitment platform's preview participant.
    pub preview_worker_prefix: String,
    pub salt: Option<String>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            mode: SplitMode::Live,
            debug_marker: "debug".to_string(),
            preview_worker_prefix: "601055".to_string(),
            salt: None,
        }
    }
}

/// One participant row from the psiTurk export.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportedParticipant {
    pub workerid: String,
    pub uniqueid: String,
    #[serde(default)]
    pub datastring: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataString {
    #[serde(default)]
    data: Vec<TrialEntry>,
    #[serde(default)]
    questiondata: Map<String, Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TrialEntry {
    #[serde(default)]
    trialdata: Option<Value>,
}

/// What a split produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitSummary {
    /// Participants written.
    pub participants: usize,
    /// Participants dropped as debug or preview in live mode.
    pub filtered: usize,
    /// Participants without a datastring.
    pub missing_data: usize,
    /// Participants whose datastring or worker id could not be used.
    pub invalid: usize,
    /// Participants with a bonus entry.
    pub bonuses: usize,
    /// Trials dropped because they carried no `trialdata`.
    pub dropped_trials: usize,
    pub events_dir: PathBuf,
    pub participants_csv: PathBuf,
    pub identifiers: PathBuf,
    pub bonus: PathBuf,
}

impl SplitConfig {
    fn keeps(&self, participant: &ExportedParticipant) -> bool {
        if self.mode != SplitMode::Live {
            return true;
        }
        let debug = participant.uniqueid.contains(&self.debug_marker);
        let preview = !self.preview_worker_prefix.is_empty()
            && participant.workerid.starts_with(&self.preview_worker_prefix);
        !debug && !preview
    }
}

/// Builds the metadata row for one participant.
fn metadata_row(wid: &ParticipantId, data: &DataString) -> Record {
    let mut row = Record::new();
    for key in META_KEYS {
        row.insert(key.to_string(), data.rest.get(key).cloned().unwrap_or(Value::Null));
    }
    row.insert("wid".to_string(), Value::from(wid.as_str()));

    for (key, value) in &data.questiondata {
        match value {
            Value::Object(params) if key.eq_ignore_ascii_case(PARAMS_KEY) => {
                for (param, v) in params {
                    if !SKIPPED_PARAMS.contains(&param.as_str()) {
                        row.insert(param.clone(), v.clone());
                    }
                }
            }
            _ => {
                row.insert(key.clone(), value.clone());
            }
        }
    }
    row
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SplitError> {
    let write_err = |source| SplitError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(write_err)?);
    serde_json::to_writer(&mut writer, value).map_err(|source| SplitError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(write_err)
}

/// Parses a psiTurk participant export.
pub fn load_export(path: &Path) -> Result<Vec<ExportedParticipant>, SplitError> {
    let content = fs::read_to_string(path).map_err(|source| SplitError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SplitError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Splits `participants` into event files and metadata under `version_dir`.
pub fn split_export(
    participants: &[ExportedParticipant],
    version_dir: &Path,
    config: &SplitConfig,
) -> Result<SplitSummary, SplitError> {
    let events_dir = version_dir.join("events");
    fs::create_dir_all(&events_dir).map_err(|source| SplitError::Write {
        path: events_dir.clone(),
        source,
    })?;

    let mut anonymizer = Anonymizer::new(AnonymizerConfig {
        enabled: config.mode == SplitMode::Live,
        debug_marker: config.debug_marker.clone(),
        salt: config.salt.clone(),
    });

    let mut summary = SplitSummary {
        events_dir: events_dir.clone(),
        participants_csv: version_dir.join("participants.csv"),
        identifiers: version_dir.join("identifiers.json"),
        bonus: version_dir.join("bonus.json"),
        ..SplitSummary::default()
    };
    let mut rows: Vec<Record> = Vec::new();
    let mut bonus: BTreeMap<String, Value> = BTreeMap::new();

    for participant in participants {
        if !config.keeps(participant) {
            summary.filtered += 1;
            continue;
        }
        let Some(datastring) = participant.datastring.as_deref() else {
            summary.missing_data += 1;
            continue;
        };
        let data: DataString = match serde_json::from_str(datastring) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(uniqueid = %participant.uniqueid, error = %e, "skipping participant with invalid datastring");
                summary.invalid += 1;
                continue;
            }
        };
        let wid = match ParticipantId::new(anonymizer.anonymize(&participant.workerid)?) {
            Ok(wid) => wid,
            Err(e) => {
                tracing::warn!(uniqueid = %participant.uniqueid, error = %e, "skipping participant with unusable worker id");
                summary.invalid += 1;
                continue;
            }
        };

        let row = metadata_row(&wid, &data);
        if let Some(amount) = row.get("bonus") {
            bonus.insert(participant.workerid.clone(), amount.clone());
        }
        rows.push(row);

        let trialdata: Vec<&Value> = data
            .data
            .iter()
            .filter_map(|entry| entry.trialdata.as_ref().filter(|v| !v.is_null()))
            .collect();
        let dropped = data.data.len() - trialdata.len();
        if dropped > 0 {
            tracing::warn!(%wid, dropped, "skipping trials without trialdata");
            summary.dropped_trials += dropped;
        }
        write_json(&events_dir.join(format!("{wid}.json")), &trialdata)?;
        tracing::debug!(%wid, events = trialdata.len(), "wrote participant events");
    }

    let csv_file = File::create(&summary.participants_csv).map_err(|source| SplitError::Write {
        path: summary.participants_csv.clone(),
        source,
    })?;
    write_table(BufWriter::new(csv_file), &[], &rows)?;
    anonymizer.save(&summary.identifiers)?;
    write_json(&summary.bonus, &bonus)?;

    summary.participants = rows.len();
    summary.bonuses = bonus.len();
    tracing::info!(
        participants = summary.participants,
        filtered = summary.filtered,
        missing_data = summary.missing_data,
        invalid = summary.invalid,
        dropped_trials = summary.dropped_trials,
        "split participant export"
    );
    Ok(summary)
}
