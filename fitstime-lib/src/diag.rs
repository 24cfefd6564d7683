//! Diagnostic notes collected while extracting and resolving a single header.
use std::fmt::Display;

use tracing::{debug, warn};

use crate::aggregate::Category;
use crate::extract::DateOrder;

/// A single diagnostic observation. None of these are errors; they explain how the
/// resolved values were arrived at.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
pub enum Note {
    /// A date could be read either way round and the order was guessed.
    AmbiguousOrder { text: String, order: DateOrder },
    /// A date's unambiguous year differs from the year hint.
    YearClash { hint: i32, year: i32, text: String },
    /// A numeric time too large to be a time of day.
    UnparsedTimestamp { value: f64 },
    /// The two most confident candidates for a category differ significantly.
    Disagreement {
        category: Category,
        chosen: String,
        other: String,
        value: String,
    },
    /// No candidate at all for a category.
    Missing(Category),
    /// No candidate for a category, a default was used.
    Assumed { category: Category, value: String },
    /// No exposure time, so half-exposure offsets are zero.
    NoExposure,
    /// Coordinates were precessed to J2000.
    Precessed { equinox: f64 },
    /// A heliocentric or half-exposure offset is too small to tell apart from noise.
    SmallOffsets,
    /// How the derived heliocentric time was computed.
    Derived {
        provenance: String,
        helio_days: f64,
        exposure_days: f64,
    },
    /// Neither a date and time nor any JD field.
    MissingTemporalData,
    /// The requested output field is not present.
    BaseFieldUnavailable(String),
}

impl Note {
    /// True for notes suggesting the header is inconsistent or was misread.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Note::AmbiguousOrder { .. }
                | Note::YearClash { .. }
                | Note::UnparsedTimestamp { .. }
                | Note::Disagreement { .. }
                | Note::MissingTemporalData
                | Note::BaseFieldUnavailable(_)
        )
    }
}

impl Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Note::AmbiguousOrder { text, order } => {
                write!(f, "Warning - guessing at {order} order for '{text}'")
            }
            Note::YearClash { hint, year, text } => write!(
                f,
                "Best guess at year is {hint}, clashes with {year} from '{text}'"
            ),
            Note::UnparsedTimestamp { value } => {
                write!(f, "Warning - UNIX timestamp in '{value}' not parsed")
            }
            Note::Disagreement {
                chosen,
                other,
                value,
                ..
            } => write!(f, "{chosen} and {other} disagree, using {chosen}={value}"),
            Note::Missing(category) => match category {
                Category::Date | Category::Time => {
                    write!(f, "No detected {category} field in header")
                }
                Category::Jd => write!(f, "No JD fields found"),
                _ => write!(f, "No {category} field found"),
            },
            Note::Assumed { category, value } => {
                write!(f, "No {category} field, assume {value} for HJD_Calc")
            }
            Note::NoExposure => write!(
                f,
                "No exposure time information, can't verify or calculate time offsets"
            ),
            Note::Precessed { equinox } => {
                write!(f, "Coordinates precessed from equinox {equinox} to J2000")
            }
            Note::SmallOffsets => write!(
                f,
                "Heliocentric or exptime/2 offset is less than 0.0001 days, can't reliably compare JD offsets"
            ),
            Note::Derived {
                provenance,
                helio_days,
                exposure_days,
            } => write!(
                f,
                "Calculated HJD_Calc from {provenance}; Hel.Corr = {helio_days:8.6} ({:6.2} sec)  Exptime/2 = {exposure_days:8.6} ({:6.2} sec)",
                helio_days * 86400.0,
                exposure_days * 86400.0
            ),
            Note::MissingTemporalData => write!(
                f,
                "No date and time, or any form of JD field. No idea how to find the time for this image"
            ),
            Note::BaseFieldUnavailable(field) => {
                write!(f, "Requested field {field} is not available")
            }
        }
    }
}

/// Ordered collection of [Note]s for one header.
///
/// Every note pushed is also emitted as a tracing event, at `warn` for
/// [Note::is_warning] notes and `debug` otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct Transcript {
    notes: Vec<Note>,
}

impl Transcript {
    pub fn push(&mut self, note: Note) {
        if note.is_warning() {
            warn!("{note}");
        } else {
            debug!("{note}");
        }
        self.notes.push(note);
    }

    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    /// Append notes from `other` without logging them again.
    pub fn extend(&mut self, other: Transcript) {
        self.notes.extend(other.notes);
    }

    pub fn any<F: Fn(&Note) -> bool>(&self, pred: F) -> bool {
        self.notes.iter().any(pred)
    }
}

impl Display for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for note in &self.notes {
            writeln!(f, "{note}")?;
        }
        Ok(())
    }
}
