//! One row per click, miss, or timeout within a task.

use std::sync::LazyLock;

use serde_json::Value;

use super::{ExtractError, ExtractOptions, OutputKind, Record, Rule, record_for};
use crate::pattern::Pattern;
use crate::session::Session;

static RESPONSES: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::parse("task.(hit|miss|timeout)").expect("valid pattern"));

pub(super) const RULE: Rule = Rule {
    name: "clicks",
    kind: OutputKind::Table,
    columns: &["wid", "trial_id", "timestamp", "event_type", "x", "y"],
    extract,
};

fn extract(session: &Session, _options: &ExtractOptions) -> Result<Vec<Record>, ExtractError> {
    Ok(session
        .find(&RESPONSES)
        .into_iter()
        .map(|event| {
            let mut record = record_for(session);
            record.insert("trial_id".into(), event.field_or_null("uniqueID"));
            record.insert("timestamp".into(), event.timestamp_value());
            record.insert("event_type".into(), Value::from(event.last_segment()));
            record.insert("x".into(), event.field_or_null("x"));
            record.insert("y".into(), event.field_or_null("y"));
            record
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::event::Event;
    use crate::types::ParticipantId;

    #[test]
    fn extracts_responses_with_coordinates() {
        let session = Session::new(
            ParticipantId::new("w1").unwrap(),
            vec![
                Event::new("task.start", 0.0).with_field("uniqueID", "t1"),
                Event::new("task.hit", 120.0)
                    .with_field("uniqueID", "t1")
                    .with_field("x", 10)
                    .with_field("y", 20),
                Event::new("task.outcome", 150.0).with_field("uniqueID", "t1"),
                Event::new("task.timeout", 900.0).with_field("uniqueID", "t2"),
            ],
        );

        let rows = extract(&session, &ExtractOptions::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            Value::Object(rows[0].clone()),
            json!({"wid": "w1", "trial_id": "t1", "timestamp": 120, "event_type": "hit", "x": 10, "y": 20})
        );
        assert_eq!(rows[1]["event_type"], json!("timeout"));
        assert_eq!(rows[1]["x"], Value::Null);
    }

    #[test]
    fn event_type_is_the_terminal_segment() {
        let session = Session::new(
            ParticipantId::new("w1").unwrap(),
            vec![Event::new("task.miss.left", 1.0)],
        );
        let rows = extract(&session, &ExtractOptions::default()).unwrap();
        assert_eq!(rows[0]["event_type"], json!("left"));
        assert_eq!(rows[0]["trial_id"], Value::Null);
    }
}
