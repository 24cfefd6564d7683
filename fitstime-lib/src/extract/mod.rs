//! Conversion of raw header text and numbers into canonical values.
//!
//! Extractors are pure apart from the [ParseContext] threaded through them, which
//! carries the year hint and date order override for the current file and collects
//! diagnostic notes.
mod date;
mod number;
mod time;

pub use date::{parse_date, CalendarDate, DateOrder, ParsedDate};
pub use number::single_number;
pub use time::{parse_time, time_from_number, AngleMode, Hms};

pub(crate) use number::unsigned_tokens;

use crate::diag::{Note, Transcript};

/// Error converting a single field. Always local to the field; never fatal.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("expected {expected} numbers in {text:?}, found {found}")]
    TokenCount {
        text: String,
        expected: usize,
        found: usize,
    },
    #[error("two numbers but no month name in {0:?}")]
    MissingMonth(String),
    #[error("{what} out of range in {text:?}")]
    OutOfRange { what: &'static str, text: String },
    #[error("too short to be a time: {0:?}")]
    TooShort(String),
    #[error("{0} looks like a UNIX timestamp, not a time of day")]
    Timestamp(f64),
    #[error("not a usable time value: {0}")]
    InvalidNumber(f64),
}

/// How sure an extractor is about the value it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Certainty {
    /// The value could only be read one way.
    Certain,
    /// Ambiguous, resolved by an explicitly configured date order.
    Assisted,
    /// Ambiguous and guessed.
    Guessed,
}

impl Certainty {
    /// Multiplier applied to a field's base confidence.
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Certainty::Certain => 1.0,
            Certainty::Assisted => 0.5,
            Certainty::Guessed => 0.0,
        }
    }
}

/// A header value, either a bare number or (unquoted) text.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    /// Interpret a raw card value, numeric first, falling back to the trimmed text with
    /// any enclosing quotes removed.
    #[must_use]
    pub fn from_raw(raw: &str) -> FieldValue {
        let raw = raw.trim();
        match raw.parse::<f64>() {
            Ok(v) => FieldValue::Number(v),
            Err(_) => FieldValue::Text(unquote(raw).to_string()),
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }
}

/// Strip one level of enclosing quotes and the whitespace inside them.
pub(crate) fn unquote(v: &str) -> &str {
    let v = v.trim();
    if v.len() >= 2 && (v.starts_with('\'') || v.starts_with('"')) {
        let mut chars = v.chars();
        chars.next();
        chars.next_back();
        chars.as_str().trim()
    } else {
        v
    }
}

/// Per-file extraction state.
#[derive(Debug, Default)]
pub struct ParseContext {
    year_hint: Option<i32>,
    date_order: Option<DateOrder>,
    transcript: Transcript,
}

impl ParseContext {
    #[must_use]
    pub fn new(year_hint: Option<i32>, date_order: Option<DateOrder>) -> Self {
        Self {
            year_hint,
            date_order,
            transcript: Transcript::default(),
        }
    }

    #[must_use]
    pub fn year_hint(&self) -> Option<i32> {
        self.year_hint
    }

    #[must_use]
    pub fn date_order(&self) -> Option<DateOrder> {
        self.date_order
    }

    pub fn note(&mut self, note: Note) {
        self.transcript.push(note);
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    /// Record a year read unambiguously from a date. The first such year becomes the
    /// hint for later fields; a different year is noted as a clash.
    pub(crate) fn observe_year(&mut self, year: i32, text: &str) {
        match self.year_hint {
            Some(hint) if hint != year => self.note(Note::YearClash {
                hint,
                year,
                text: text.to_string(),
            }),
            Some(_) => {}
            None => self.year_hint = Some(year),
        }
    }
}
