//! Probing the fixed catalogue of header fields for every candidate value.
//!
//! Each category collects [Candidate]s in lookup order. Fields that are absent or that
//! fail to parse contribute nothing; a failure is logged at `debug` and never
//! propagates.
use std::fmt::Display;

use tracing::{debug, trace};

use crate::astro::{Astronomy, MJD_OFFSET};
use crate::extract::{
    parse_date, parse_time, single_number, time_from_number, AngleMode, CalendarDate,
    Certainty, FieldValue, Hms, ParseContext, ParseError, ParsedDate,
};
use crate::fits::Header;

/// Upper bound of the confidence scale. Only derived values reach it.
pub const MAX_CONFIDENCE: f64 = 200.0;

/// Semantic category a header field contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Category {
    Date,
    Time,
    Jd,
    Hjd,
    Ra,
    Dec,
    Equinox,
    Exposure,
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Date => "date",
            Category::Time => "time",
            Category::Jd => "JD",
            Category::Hjd => "HJD",
            Category::Ra => "RA",
            Category::Dec => "DEC",
            Category::Equinox => "equinox",
            Category::Exposure => "exposure time",
        };
        write!(f, "{s}")
    }
}

/// A value read from a header field, with the confidence it deserves.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Candidate<T> {
    pub value: T,
    /// Header field the value came from, or a synthetic name for derived values.
    pub field: String,
    /// Always within `[0, MAX_CONFIDENCE]`.
    pub confidence: f64,
}

impl<T> Candidate<T> {
    pub fn new(value: T, field: &str, confidence: f64) -> Self {
        Self {
            value,
            field: field.to_string(),
            confidence: confidence.clamp(0.0, MAX_CONFIDENCE),
        }
    }
}

/// The most confident candidate, the earliest one on a tie.
#[must_use]
pub fn best<T>(candidates: &[Candidate<T>]) -> Option<&Candidate<T>> {
    candidates.iter().fold(None, |best, c| match best {
        Some(b) if b.confidence >= c.confidence => Some(b),
        _ => Some(c),
    })
}

/// Candidates by decreasing confidence; equal confidences keep lookup order.
#[must_use]
pub fn ranked<T>(candidates: &[Candidate<T>]) -> Vec<&Candidate<T>> {
    let mut ranked: Vec<_> = candidates.iter().collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked
}

/// Every candidate found in one header, per category, in lookup order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Categories {
    pub dates: Vec<Candidate<CalendarDate>>,
    pub times: Vec<Candidate<Hms>>,
    /// Full Julian Days, not heliocentric.
    pub jds: Vec<Candidate<f64>>,
    pub hjds: Vec<Candidate<f64>>,
    /// Hours
    pub ras: Vec<Candidate<f64>>,
    /// Degrees
    pub decs: Vec<Candidate<f64>>,
    /// Years
    pub equinoxes: Vec<Candidate<f64>>,
    /// Seconds
    pub exptimes: Vec<Candidate<f64>>,
}

impl Categories {
    /// True if there is nothing to derive a time from.
    #[must_use]
    pub fn is_temporally_empty(&self) -> bool {
        self.dates.is_empty() && self.times.is_empty() && self.jds.is_empty() && self.hjds.is_empty()
    }
}

fn dropped(field: &str, err: &ParseError) {
    debug!(field, "dropping candidate: {err}");
}

/// Split `DATE-OBS` style values into their date and time parts at the `T`.
fn split_timestamp(text: &str) -> (&str, Option<&str>) {
    match text.split_once('T') {
        Some((date, time))
            if !time.contains('T') && date.ends_with(|c: char| c.is_ascii_digit()) =>
        {
            (date, Some(time))
        }
        _ => (text, None),
    }
}

struct Gatherer<'a> {
    header: &'a Header,
    ctx: &'a mut ParseContext,
    out: Categories,
}

impl Gatherer<'_> {
    fn date(&mut self, field: &str, text: &str, base: f64, fraction_base: Option<f64>) {
        match parse_date(text, self.ctx) {
            Ok(parsed) => self.push_date(field, parsed, base, fraction_base),
            Err(err) => dropped(field, &err),
        }
    }

    /// Add a date candidate, and a time candidate for any fractional day.
    fn push_date(&mut self, field: &str, parsed: ParsedDate, base: f64, fraction_base: Option<f64>) {
        let factor = parsed.certainty.factor();
        trace!(field, date = %parsed.date, "date candidate");
        self.out
            .dates
            .push(Candidate::new(parsed.date, field, base * factor));

        let fraction = parsed.date.day_fraction();
        if let Some(fraction_base) = fraction_base.filter(|_| fraction > 1e-9) {
            self.out.times.push(Candidate::new(
                Hms::from_decimal(fraction * 24.0),
                field,
                fraction_base * factor,
            ));
        }
    }

    fn time_value(&mut self, field: &str, value: FieldValue, base: f64) {
        let parsed = match value {
            FieldValue::Text(text) => {
                parse_time(&text, AngleMode::Hours).map(|hms| (hms, Certainty::Certain))
            }
            FieldValue::Number(v) => time_from_number(v, self.ctx),
        };
        match parsed {
            Ok((hms, certainty)) => {
                trace!(field, time = %hms, "time candidate");
                self.out
                    .times
                    .push(Candidate::new(hms, field, base * certainty.factor()));
            }
            Err(err) => dropped(field, &err),
        }
    }

    fn time(&mut self, field: &str, base: f64) {
        if let Some(value) = self.header.field(field) {
            self.time_value(field, value, base);
        }
    }

    /// A number, or the single number in a text value. Zero counts as absent.
    fn amount(&self, field: &str) -> Option<f64> {
        let value = match self.header.field(field)? {
            FieldValue::Number(v) => v,
            FieldValue::Text(text) => single_number(&text, true)?,
        };
        (value != 0.0).then_some(value)
    }

    fn ra(&mut self, field: &str) {
        match self.header.field(field) {
            Some(FieldValue::Text(text)) => match parse_time(&text, AngleMode::Hours) {
                Ok(hms) => self
                    .out
                    .ras
                    .push(Candidate::new(hms.to_decimal(), field, 100.0)),
                Err(err) => dropped(field, &err),
            },
            Some(FieldValue::Number(v)) => {
                let degrees = self
                    .header
                    .comment(field)
                    .is_some_and(|c| c.contains("deg"));
                if v >= 24.0 || degrees {
                    self.out.ras.push(Candidate::new(v / 15.0, field, 100.0));
                } else {
                    self.out.ras.push(Candidate::new(v, field, 50.0));
                }
            }
            None => {}
        }
    }

    fn dec(&mut self, field: &str) {
        match self.header.field(field) {
            Some(FieldValue::Text(text)) => match parse_time(&text, AngleMode::SignedDegrees) {
                Ok(dms) => self
                    .out
                    .decs
                    .push(Candidate::new(dms.to_decimal(), field, 100.0)),
                Err(err) => dropped(field, &err),
            },
            Some(FieldValue::Number(v)) => self.out.decs.push(Candidate::new(v, field, 100.0)),
            None => {}
        }
    }

    fn epoch(&mut self) {
        let year = match self.header.field("EPOCH") {
            Some(FieldValue::Text(text)) => match parse_date(&text, self.ctx) {
                Ok(parsed) => {
                    self.push_date("EPOCH", parsed, 50.0, Some(100.0));
                    None
                }
                Err(_) => single_number(&text, true),
            },
            Some(FieldValue::Number(v)) => Some(v),
            None => None,
        };
        // Anything but a standard equinox is most likely a JD with an unknown offset
        if let Some(year) = year {
            if (year - 1950.0).abs() < 1e-5 || (year - 2000.0).abs() < 1e-5 {
                self.out
                    .equinoxes
                    .push(Candidate::new(year, "EPOCH", 100.0));
            }
        }
    }

    fn gather(mut self) -> Categories {
        let h = self.header;

        let (obs_date, obs_time) = match h.text("DATE-OBS") {
            Some(text) => {
                let (date, time) = split_timestamp(&text);
                (Some(date.to_string()), time.map(str::to_string))
            }
            None => (None, None),
        };
        if let Some(date) = &obs_date {
            let fraction = obs_time.is_none().then_some(100.0);
            self.date("DATE-OBS", date, 100.0, fraction);
        }
        for field in ["UTDATE", "UT-DATE"] {
            if let Some(text) = h.text(field) {
                self.date(field, &text, 120.0, Some(100.0));
            }
        }
        self.epoch();

        let (file_date, file_time) = match h.text("DATE") {
            Some(text) => {
                let (date, time) = split_timestamp(&text);
                (Some(date.to_string()), time.map(str::to_string))
            }
            None => (None, None),
        };
        if let Some(date) = &file_date {
            let fraction = file_time.is_none().then_some(20.0);
            self.date("DATE", date, 20.0, fraction);
        }

        self.time("TIME-OBS", 100.0);
        if let Some(time) = obs_time {
            self.time_value("DATE-OBS", FieldValue::Text(time), 100.0);
        }
        self.time("UTC-OBS", 100.0);
        for field in ["TM_START", "TM-START", "UT-START", "UT-TIME"] {
            self.time(field, 150.0);
        }
        self.time("UTSHUT", 50.0);
        self.time("TIME", 20.0);
        if let Some(time) = file_time {
            self.time_value("DATE", FieldValue::Text(time), 20.0);
        }
        self.time("UT", 50.0);

        for (field, offset, base) in [
            ("JD", 0.0, 100.0),
            ("MJD-OBS", MJD_OFFSET, 90.0),
            ("MJD", MJD_OFFSET, 80.0),
            ("JDSTART", 0.0, 100.0),
        ] {
            if let Some(v) = h.number(field).filter(|v| *v != 0.0) {
                self.out.jds.push(Candidate::new(v + offset, field, base));
            }
        }
        if let Some(v) = h.number("HJD").filter(|v| *v != 0.0) {
            self.out.hjds.push(Candidate::new(v, "HJD", 100.0));
        }

        for field in ["RA", "RA_OBJ", "RA_OBS"] {
            self.ra(field);
        }
        for field in ["DEC", "DEC_OBJ", "DEC_OBS"] {
            self.dec(field);
        }

        if let Some(v) = self.amount("EQUINOX") {
            self.out.equinoxes.push(Candidate::new(v, "EQUINOX", 100.0));
        }
        for (field, base) in [("EXPTIME", 100.0), ("EXPOSURE", 100.0), ("ITIME", 90.0)] {
            if let Some(v) = self.amount(field) {
                self.out.exptimes.push(Candidate::new(v, field, base));
            }
        }

        self.out
    }
}

/// Collect every candidate value from `header`.
///
/// Date parsing uses and updates the year hint in `ctx`, and any notes raised while
/// parsing land in its transcript.
pub fn aggregate(header: &Header, ctx: &mut ParseContext) -> Categories {
    Gatherer {
        header,
        ctx,
        out: Categories::default(),
    }
    .gather()
}

/// Guess the observation year from any Julian Day style fields.
///
/// Truncated values (below 2,000,000) are assumed to be offset by 2,400,000. The
/// lower median is used so a single wild value cannot skew the result.
pub fn year_hint(header: &Header, astro: &impl Astronomy) -> Option<i32> {
    let mut jds: Vec<f64> = ["JD", "MJD", "MJD-OBS", "HJD", "LJD"]
        .iter()
        .filter_map(|field| header.number(field))
        .map(|v| if v < 2_000_000.0 { v + 2_400_000.0 } else { v })
        .collect();
    if jds.is_empty() {
        return None;
    }
    jds.sort_by(f64::total_cmp);
    let jd = jds[(jds.len() - 1) / 2];
    let year = astro.calendar_date(jd).year;
    debug!(jd, year, "year hint from JD fields");
    Some(year)
}
