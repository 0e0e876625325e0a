//! One row per task trial.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::Value;

use super::{ExtractError, ExtractOptions, OutputKind, Record, Rule, correlation_key, record_for};
use crate::event::{Event, number_value};
use crate::pattern::Pattern;
use crate::session::Session;

static TASK: LazyLock<Pattern> = LazyLock::new(|| Pattern::parse("task").expect("valid pattern"));
static INSTRUCTIONS_END: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::parse("timeline.end.instructions").expect("valid pattern"));

pub(super) const RULE: Rule = Rule {
    name: "trials",
    kind: OutputKind::Table,
    columns: &["wid", "practice", "trial_id", "n_hit", "outcome", "start", "end"],
    extract,
};

/// Groups `task.*` events by trial, in order of first appearance.
fn group_by_trial<'a>(events: &[&'a Event]) -> Vec<(String, Vec<&'a Event>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&'a Event>)> = Vec::new();
    for &event in events {
        let key = correlation_key(event);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(event);
    }
    groups
}

fn extract(session: &Session, options: &ExtractOptions) -> Result<Vec<Record>, ExtractError> {
    let instructions_end = session
        .find(&INSTRUCTIONS_END)
        .first()
        .map_or(options.instructions_end_fallback, |e| e.timestamp);

    let tasks = session.find(&TASK);
    let records = group_by_trial(&tasks)
        .into_iter()
        .map(|(trial_id, events)| {
            let n_hit = events.iter().filter(|e| e.name.ends_with(".hit")).count();
            let outcome = events
                .iter()
                .find(|e| e.name.ends_with(".outcome"))
                .map_or(Value::Null, |e| e.field_or_null("outcome"));
            let start = events.iter().map(|e| e.timestamp).fold(f64::INFINITY, f64::min);
            let end = events.iter().map(|e| e.timestamp).fold(f64::NEG_INFINITY, f64::max);

            let mut record = record_for(session);
            record.insert("practice".into(), Value::Bool(start < instructions_end));
            record.insert("trial_id".into(), Value::String(trial_id));
            record.insert("n_hit".into(), Value::from(n_hit));
            record.insert("outcome".into(), outcome);
            record.insert("start".into(), number_value(start));
            record.insert("end".into(), number_value(end));
            record
        })
        .collect();

    Ok(records)
}
