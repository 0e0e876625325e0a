//! Per-participant event logs.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::event::Event;
use crate::pattern::Pattern;
use crate::types::{ParticipantId, ValidationError};

/// Errors that can occur while loading a participant's event file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file name has no usable stem to derive a participant id from.
    #[error("cannot derive participant id from {path}")]
    InvalidFileName { path: PathBuf },
    /// The participant id was rejected.
    #[error("invalid participant id: {0}")]
    InvalidId(#[from] ValidationError),
    /// The contents are not a JSON array of events.
    #[error("invalid event data for {wid}: {source}")]
    Parse {
        wid: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One participant's ordered event log.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The (possibly anonymized) worker id.
    pub wid: ParticipantId,
    /// Events in recording order.
    pub events: Vec<Event>,
}

impl Session {
    /// Creates a session from already-parsed events.
    pub const fn new(wid: ParticipantId, events: Vec<Event>) -> Self {
        Self { wid, events }
    }

    /// Loads `<wid>.json`, taking the participant id from the file stem.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let wid = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| LoadError::InvalidFileName {
                path: path.to_path_buf(),
            })?;
        let wid = ParticipantId::new(wid)?;

        let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(wid, &content)
    }

    /// Parses a JSON array of events.
    pub fn from_json(wid: ParticipantId, json: &str) -> Result<Self, LoadError> {
        let events: Vec<Event> = serde_json::from_str(json).map_err(|source| LoadError::Parse {
            wid: wid.to_string(),
            source,
        })?;
        tracing::trace!(%wid, events = events.len(), "loaded session");
        Ok(Self { wid, events })
    }

    /// Events matching `pattern`, in recording order.
    pub fn find(&self, pattern: &Pattern) -> Vec<&Event> {
        pattern.filter(&self.events)
    }
}
