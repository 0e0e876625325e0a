//! The end-of-experiment debrief form.

use std::sync::LazyLock;

use super::{ExtractError, ExtractOptions, OutputKind, Record, Rule, record_for};
use crate::pattern::Pattern;
use crate::session::Session;

static SUBMITTED: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::parse("debrief.submitted").expect("valid pattern"));

pub(super) const RULE: Rule = Rule {
    name: "debrief",
    kind: OutputKind::Table,
    columns: &["wid", "difficulty", "feedback"],
    extract,
};

/// Every participant who finished must have submitted the debrief, so a
/// missing event is an error rather than an empty row.
fn extract(session: &Session, _options: &ExtractOptions) -> Result<Vec<Record>, ExtractError> {
    let submitted = session.find(&SUBMITTED);
    let Some(event) = submitted.first() else {
        return Err(ExtractError::MissingEvent {
            pattern: SUBMITTED.to_string(),
        });
    };
    if submitted.len() > 1 {
        tracing::warn!(
            wid = %session.wid,
            count = submitted.len(),
            "multiple debrief submissions, using the first"
        );
    }

    let mut record = record_for(session);
    record.insert("difficulty".into(), event.field_or_null("difficulty"));
    record.insert("feedback".into(), event.field_or_null("feedback"));
    Ok(vec![record])
}
