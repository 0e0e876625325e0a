//! Extraction rules: named transformations from a participant's event log to
//! flat output records.
//!
//! Each rule declares its [`OutputKind`], which decides whether the aggregated
//! records are written as `<name>.csv` or `<name>.json`. The set of rules is an
//! explicit table ([`Registry`]) rather than anything discovered at runtime.

mod clicks;
mod debrief;
mod survey;
mod timeline;
mod trials;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::event::Event;
use crate::session::Session;

/// One output row: field name to JSON value, in insertion order.
pub type Record = Map<String, Value>;

/// Signature shared by every extraction rule.
pub type ExtractFn = fn(&Session, &ExtractOptions) -> Result<Vec<Record>, ExtractError>;

/// Errors raised by an extraction rule for a single participant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// An event the rule requires was never recorded.
    #[error("no '{pattern}' event recorded")]
    MissingEvent { pattern: String },
}

/// Errors when resolving rules by name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown rule '{name}' (available: {available})")]
    UnknownRule { name: String, available: String },
}

/// How a rule's records are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Comma-separated text with a header row.
    Table,
    /// A JSON array of objects; values may be nested.
    Json,
}

impl OutputKind {
    /// File extension for this kind.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Table => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Json => "json",
        })
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" | "csv" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("invalid output kind: {s}")),
        }
    }
}

/// Experiment-specific knobs for the built-in rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractOptions {
    /// Practice threshold used by `trials` when no `timeline.end.instructions`
    /// event exists. With the default of 0 every trial is non-practice.
    pub instructions_end_fallback: f64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            instructions_end_fallback: 0.0,
        }
    }
}

/// A named extraction rule.
#[derive(Clone, Copy)]
pub struct Rule {
    /// Rule name; also the output file stem.
    pub name: &'static str,
    /// Serialization format of the output file.
    pub kind: OutputKind,
    /// Columns emitted by the rule, used for the header of an empty table.
    pub columns: &'static [&'static str],
    /// The extraction function.
    pub extract: ExtractFn,
}

impl Rule {
    /// Runs the rule over one participant's events.
    pub fn run(&self, session: &Session, options: &ExtractOptions) -> Result<Vec<Record>, ExtractError> {
        (self.extract)(session, options)
    }

    /// Output file name, e.g. `trials.csv`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.kind.extension())
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// The built-in rules, in output order.
const BUILTIN: [Rule; 5] = [
    clicks::RULE,
    debrief::RULE,
    survey::RULE,
    timeline::RULE,
    trials::RULE,
];

/// An explicit table of extraction rules.
#[derive(Debug, Clone)]
pub struct Registry {
    rules: Vec<Rule>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            rules: BUILTIN.to_vec(),
        }
    }
}

impl Registry {
    /// Creates a registry from an explicit list of rules.
    pub const fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Looks up a rule by name.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Iterates over all rules.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Restricts the registry to the named rules, keeping registry order.
    ///
    /// An empty selection keeps every rule.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, RegistryError> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        for name in names {
            if self.get(name.as_ref()).is_none() {
                return Err(RegistryError::UnknownRule {
                    name: name.as_ref().to_string(),
                    available: self.rules.iter().map(|r| r.name).collect::<Vec<_>>().join(", "),
                });
            }
        }
        let rules = self
            .rules
            .iter()
            .filter(|r| names.iter().any(|n| n.as_ref() == r.name))
            .copied()
            .collect();
        Ok(Self { rules })
    }
}

/// Key used to group the events of one trial.
///
/// Uses the `uniqueID` field when present. Otherwise events named like
/// `task.<id>.hit` are keyed by their second segment, and anything else falls
/// into the empty-string group.
pub(crate) fn correlation_key(event: &Event) -> String {
    match event.field("uniqueID") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => {
            let mut segments = event.segments();
            match (segments.next(), segments.next(), segments.next()) {
                (Some(_), Some(id), Some(_)) => id.to_string(),
                _ => String::new(),
            }
        }
    }
}

/// Starts a record with the participant id.
pub(crate) fn record_for(session: &Session) -> Record {
    let mut record = Record::new();
    record.insert("wid".to_string(), Value::from(session.wid.as_str()));
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn default_registry_has_builtin_rules() {
        let registry = Registry::default();
        let names: Vec<_> = registry.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["clicks", "debrief", "survey", "timeline", "trials"]);
        assert_eq!(registry.get("survey").unwrap().kind, OutputKind::Json);
        assert_eq!(registry.get("trials").unwrap().file_name(), "trials.csv");
    }

    #[test]
    fn select_keeps_registry_order() {
        let registry = Registry::default().select(&["trials", "clicks"]).unwrap();
        let names: Vec<_> = registry.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["clicks", "trials"]);
    }

    #[test]
    fn select_rejects_unknown_rules() {
        let err = Registry::default().select(&["trails"]).unwrap_err();
        assert!(err.to_string().starts_with("unknown rule 'trails'"));
    }

    #[test]
    fn empty_selection_keeps_everything() {
        let none: [&str; 0] = [];
        assert_eq!(Registry::default().select(&none).unwrap().len(), 5);
    }

    #[test]
    fn correlation_key_prefers_unique_id() {
        let event = Event::new("task.p1.hit", 0.0).with_field("uniqueID", "trial-7");
        assert_eq!(correlation_key(&event), "trial-7");

        let numeric = Event::new("task.hit", 0.0).with_field("uniqueID", json!(7));
        assert_eq!(correlation_key(&numeric), "7");
    }

    #[test]
    fn correlation_key_falls_back_to_name() {
        assert_eq!(correlation_key(&Event::new("task.p1.hit", 0.0)), "p1");
        assert_eq!(correlation_key(&Event::new("task.hit", 0.0)), "");
    }

    #[test]
    fn output_kind_parses_aliases() {
        assert_eq!("csv".parse::<OutputKind>().unwrap(), OutputKind::Table);
        assert_eq!("json".parse::<OutputKind>().unwrap(), OutputKind::Json);
        assert!("xml".parse::<OutputKind>().is_err());
    }
}
