//! Core data pipeline for behavioral experiment exports.
//!
//! This crate contains:
//! - Events and sessions: per-participant event logs
//! - Patterns: dotted event-name queries with wildcards and alternation
//! - Rules: extraction of trials, clicks, survey, debrief and timeline records
//! - Aggregation: batch extraction over a directory, one artifact per rule
//! - Anonymization: deterministic one-way worker id tokens
//! - psiTurk export splitting and bonus tables

pub mod aggregate;
pub mod anonymize;
pub mod bonus;
pub mod event;
pub mod output;
pub mod pattern;
pub mod psiturk;
pub mod rules;
pub mod session;
pub mod types;

pub use aggregate::{AggregateError, Aggregator, RunSummary, discover};
pub use anonymize::{AnonymizeError, Anonymizer, AnonymizerConfig};
pub use event::Event;
pub use pattern::{Pattern, PatternError};
pub use psiturk::{SplitConfig, SplitMode, SplitSummary};
pub use rules::{ExtractError, ExtractOptions, OutputKind, Record, Registry, Rule};
pub use session::{LoadError, Session};
pub use types::{ParticipantId, ValidationError};
