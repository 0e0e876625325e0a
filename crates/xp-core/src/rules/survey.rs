//! Survey responses, kept nested.

use std::sync::LazyLock;

use super::{ExtractError, ExtractOptions, OutputKind, Record, Rule, record_for};
use crate::pattern::Pattern;
use crate::session::Session;

static SURVEY_DONE: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::parse("survey.done").expect("valid pattern"));

pub(super) const RULE: Rule = Rule {
    name: "survey",
    kind: OutputKind::Json,
    columns: &["wid", "survey_id", "results"],
    extract,
};

fn extract(session: &Session, _options: &ExtractOptions) -> Result<Vec<Record>, ExtractError> {
    Ok(session
        .find(&SURVEY_DONE)
        .into_iter()
        .map(|event| {
            let mut record = record_for(session);
            record.insert("survey_id".into(), event.field_or_null("uniqueID"));
            record.insert("results".into(), event.field_or_null("results"));
            record
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    use crate::event::Event;
    use crate::types::ParticipantId;

    #[test]
    fn carries_results_verbatim() {
        let results = json!({"age": 31, "answers": [{"q": "fun", "a": 4}], "notes": null});
        let session = Session::new(
            ParticipantId::new("w1").unwrap(),
            vec![
                Event::new("survey.start", 1.0),
                Event::new("survey.done", 2.0)
                    .with_field("uniqueID", "demographics")
                    .with_field("results", results.clone()),
            ],
        );

        let rows = extract(&session, &ExtractOptions::default()).unwrap();
        assert_eq!(
            Value::Object(rows[0].clone()),
            json!({"wid": "w1", "survey_id": "demographics", "results": results})
        );
    }
}
