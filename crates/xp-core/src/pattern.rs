//! Dotted query patterns for selecting events by hierarchical name.
//!
//! A pattern such as `task.(hit|miss).*` is split on `.` and compared segment
//! by segment against an event name:
//!
//! - `*` matches any single segment
//! - `(a|b|c)` matches any of the listed literals
//! - anything else must match exactly
//!
//! Matching is prefix-based: an event name may have more segments than the
//! pattern, but never fewer.
//!
//! Empty segments (`task..hit`, a leading or trailing `.`) are a parse error,
//! not an empty literal.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::event::Event;

/// Errors produced while parsing a pattern.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// The pattern string was empty.
    #[error("pattern cannot be empty")]
    Empty,
    /// A segment between two dots was empty.
    #[error("empty segment at position {position} in pattern '{pattern}'")]
    EmptySegment { pattern: String, position: usize },
    /// An alternation segment was not enclosed in a single pair of parentheses.
    #[error("unbalanced parentheses in segment '{segment}'")]
    Unbalanced { segment: String },
    /// An alternation contained an empty option, e.g. `(a||b)`.
    #[error("empty option in alternation '{segment}'")]
    EmptyOption { segment: String },
}

/// One position in a dotted pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `*`
    Any,
    /// `(a|b|c)`
    OneOf(Vec<String>),
    /// Exact text.
    Literal(String),
}

impl Segment {
    fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw == "*" {
            return Ok(Self::Any);
        }

        let opens = raw.matches('(').count();
        let closes = raw.matches(')').count();
        if opens == 0 && closes == 0 {
            return Ok(Self::Literal(raw.to_string()));
        }

        let inner = raw
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .filter(|_| opens == 1 && closes == 1)
            .ok_or_else(|| PatternError::Unbalanced {
                segment: raw.to_string(),
            })?;

        let options: Vec<String> = inner.split('|').map(str::to_string).collect();
        if options.iter().any(String::is_empty) {
            return Err(PatternError::EmptyOption {
                segment: raw.to_string(),
            });
        }
        Ok(Self::OneOf(options))
    }

    /// Returns true if this segment accepts the given name segment.
    pub fn matches(&self, segment: &str) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(options) => options.iter().any(|o| o == segment),
            Self::Literal(literal) => literal == segment,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::OneOf(options) => write!(f, "({})", options.join("|")),
            Self::Literal(literal) => f.write_str(literal),
        }
    }
}

/// A parsed dotted query pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses a dotted pattern string.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        let segments = pattern
            .split('.')
            .enumerate()
            .map(|(position, raw)| {
                if raw.is_empty() {
                    Err(PatternError::EmptySegment {
                        pattern: pattern.to_string(),
                        position,
                    })
                } else {
                    Segment::parse(raw)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }

    /// The parsed segments, in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true if `name` has at least as many segments as the pattern and
    /// every pattern segment matches its positional counterpart.
    pub fn matches(&self, name: &str) -> bool {
        let mut parts = name.split('.');
        self.segments
            .iter()
            .all(|segment| parts.next().is_some_and(|part| segment.matches(part)))
    }

    /// Selects the events whose names match, preserving input order.
    ///
    /// Accepts any sequence of event references, so the result of one query can
    /// be narrowed further by another.
    pub fn filter<'a, I>(&self, events: I) -> Vec<&'a Event>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        events
            .into_iter()
            .filter(|event| self.matches(&event.name))
            .collect()
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
