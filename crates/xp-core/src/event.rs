//! Timestamped events recorded by the experiment frontend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single named observation from a participant's session log.
///
/// Only `event` and `timestamp` are required. Every other key is kept verbatim
/// in [`Event::fields`], in the order it appeared in the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Dot-delimited hierarchical name, e.g. `task.start.instructions`.
    #[serde(rename = "event")]
    pub name: String,
    /// Milliseconds reported by the frontend clock.
    pub timestamp: f64,
    /// Rule-specific payload (`uniqueID`, `outcome`, `x`, `y`, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    /// Creates an event with no extra fields.
    pub fn new(name: impl Into<String>, timestamp: f64) -> Self {
        Self {
            name: name.into(),
            timestamp,
            fields: Map::new(),
        }
    }

    /// Adds a field, replacing any previous value under `key`.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns a payload field, treating JSON `null` as absent.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// Returns a payload field or `null`.
    pub fn field_or_null(&self, key: &str) -> Value {
        self.field(key).cloned().unwrap_or(Value::Null)
    }

    /// Iterates over the dotted name segments.
    pub fn segments(&self) -> std::str::Split<'_, char> {
        self.name.split('.')
    }

    /// The final name segment (`task.hit` -> `hit`).
    pub fn last_segment(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Timestamp as a JSON number, integral values rendered without a fraction.
    pub fn timestamp_value(&self) -> Value {
        number_value(self.timestamp)
    }
}

/// Largest integer exactly representable in an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Converts a float to a JSON number, preferring an integer representation.
///
/// Frontend timestamps are integral milliseconds; emitting them as `1700000000000`
/// rather than `1700000000000.0` keeps the CSV output stable.
#[expect(
    clippy::cast_possible_truncation,
    reason = "value is integral and within the f64 safe integer range"
)]
pub fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}
