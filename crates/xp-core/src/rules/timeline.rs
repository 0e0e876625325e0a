//! Block durations from `*.start.<block>` / `*.end.<block>` pairs.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::Value;

use super::{ExtractError, ExtractOptions, OutputKind, Record, Rule, record_for};
use crate::event::number_value;
use crate::pattern::Pattern;
use crate::session::Session;

static TIMELINE: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::parse("timeline").expect("valid pattern"));

pub(super) const RULE: Rule = Rule {
    name: "timeline",
    kind: OutputKind::Table,
    columns: &["wid", "block", "start", "end", "duration"],
    extract,
};

/// Block name following `marker`, e.g. `instructions` in `timeline.start.instructions`.
fn block_after<'a>(name: &'a str, marker: &str) -> Option<&'a str> {
    name.split(marker).nth(1)
}

fn extract(session: &Session, _options: &ExtractOptions) -> Result<Vec<Record>, ExtractError> {
    // open intervals: block -> start timestamp (last start wins)
    let mut open: HashMap<&str, f64> = HashMap::new();
    let mut records = Vec::new();

    for event in session.find(&TIMELINE) {
        if let Some(block) = block_after(&event.name, ".start.") {
            open.insert(block, event.timestamp);
        } else if let Some(block) = block_after(&event.name, ".end.") {
            let Some(start) = open.remove(block) else {
                tracing::trace!(wid = %session.wid, block, "dropping unmatched end event");
                continue;
            };
            let mut record = record_for(session);
            record.insert("block".into(), Value::from(block));
            record.insert("start".into(), number_value(start));
            record.insert("end".into(), event.timestamp_value());
            record.insert("duration".into(), number_value(event.timestamp - start));
            records.push(record);
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::event::Event;
    use crate::types::ParticipantId;

    fn run(events: Vec<Event>) -> Vec<Record> {
        let session = Session::new(ParticipantId::new("w1").unwrap(), events);
        extract(&session, &ExtractOptions::default()).unwrap()
    }

    #[test]
    fn pairs_start_and_end() {
        let rows = run(vec![
            Event::new("timeline.start.instructions", 100.0),
            Event::new("timeline.start.task", 400.0),
            Event::new("timeline.end.instructions", 350.0),
            Event::new("timeline.end.task", 900.0),
        ]);
        assert_eq!(
            rows.iter().map(|r| Value::Object(r.clone())).collect::<Vec<_>>(),
            vec![
                json!({"wid": "w1", "block": "instructions", "start": 100, "end": 350, "duration": 250}),
                json!({"wid": "w1", "block": "task", "start": 400, "end": 900, "duration": 500}),
            ]
        );
    }

    #[test]
    fn last_start_wins() {
        let rows = run(vec![
            Event::new("timeline.start.X", 1.0),
            Event::new("timeline.start.X", 5.0),
            Event::new("timeline.end.X", 8.0),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["start"], json!(5));
        assert_eq!(rows[0]["duration"], json!(3));
    }

    #[test]
    fn unmatched_end_is_dropped() {
        let rows = run(vec![
            Event::new("timeline.end.X", 2.0),
            Event::new("timeline.start.X", 3.0),
            Event::new("timeline.end.X", 4.0),
            Event::new("timeline.end.X", 6.0),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["end"], json!(4));
    }

    #[test]
    fn blocks_can_reopen_after_closing() {
        let rows = run(vec![
            Event::new("timeline.start.break", 0.0),
            Event::new("timeline.end.break", 10.0),
            Event::new("timeline.start.break", 20.0),
            Event::new("timeline.end.break", 35.0),
        ]);
        let durations: Vec<_> = rows.iter().map(|r| r["duration"].clone()).collect();
        assert_eq!(durations, vec![json!(10), json!(15)]);
    }

    #[test]
    fn other_timeline_events_are_ignored() {
        let rows = run(vec![
            Event::new("timeline.progress", 0.0),
            Event::new("task.start.X", 1.0),
            Event::new("timeline.end.X", 2.0),
        ]);
        assert!(rows.is_empty());
    }
}
