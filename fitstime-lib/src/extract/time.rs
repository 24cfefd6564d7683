use std::fmt::Display;

use super::{unsigned_tokens, Certainty, ParseContext, ParseError};
use crate::diag::Note;

const SECONDS_PER_DAY: f64 = 86400.0;

/// Range accepted for the leading component of a sexagesimal triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleMode {
    /// Time of day or right ascension, `[0, 24)`.
    #[default]
    Hours,
    /// Declination, `[-90, 90]`. A leading `-` negates all three components.
    SignedDegrees,
    /// Any angle, `[0, 360)`.
    UnsignedDegrees,
}

/// A sexagesimal value. For negative values every component carries the sign.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Hms {
    pub hours: f64,
    pub minutes: f64,
    pub seconds: f64,
}

impl Hms {
    #[must_use]
    pub fn new(hours: f64, minutes: f64, seconds: f64) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    /// Split a decimal value into components, rounding to the microsecond.
    #[must_use]
    pub fn from_decimal(value: f64) -> Self {
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        let total = (value.abs() * 3600.0 * 1e6).round() / 1e6;
        let hours = (total / 3600.0).floor();
        let minutes = ((total - hours * 3600.0) / 60.0).floor();
        let seconds = total - hours * 3600.0 - minutes * 60.0;
        Self::new(sign * hours, sign * minutes, sign * seconds)
    }

    #[must_use]
    pub fn to_decimal(&self) -> f64 {
        self.hours + self.minutes / 60.0 + self.seconds / 3600.0
    }

    #[must_use]
    pub fn seconds_of_day(&self) -> f64 {
        self.to_decimal() * 3600.0
    }
}

impl Display for Hms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let negative = self.hours < 0.0 || self.minutes < 0.0 || self.seconds < 0.0;
        write!(
            f,
            "{}{:02}:{:02}:{:05.2}",
            if negative { "-" } else { "" },
            self.hours.abs(),
            self.minutes.abs(),
            self.seconds.abs()
        )
    }
}

/// Parse three numbers with any separators as a sexagesimal triple.
///
/// # Errors
/// If the text is shorter than 6 characters, does not contain exactly 3 numbers, or
/// a component is out of range for `mode`. Minutes must be in `[0, 59]`, seconds in
/// `[0, 60]` to allow for leap seconds.
pub fn parse_time(text: &str, mode: AngleMode) -> Result<Hms, ParseError> {
    if text.chars().count() < 6 {
        return Err(ParseError::TooShort(text.to_string()));
    }
    let sign = if mode == AngleMode::SignedDegrees && text.starts_with('-') {
        -1.0
    } else {
        1.0
    };

    let nums = unsigned_tokens(text);
    let &[hours, minutes, seconds] = nums.as_slice() else {
        return Err(ParseError::TokenCount {
            text: text.to_string(),
            expected: 3,
            found: nums.len(),
        });
    };

    let leading_ok = match mode {
        AngleMode::Hours => (0.0..24.0).contains(&hours),
        AngleMode::SignedDegrees => (0.0..=90.0).contains(&hours),
        AngleMode::UnsignedDegrees => (0.0..360.0).contains(&hours),
    };
    let range = |what| ParseError::OutOfRange {
        what,
        text: text.to_string(),
    };
    if !leading_ok {
        return Err(range(match mode {
            AngleMode::Hours => "hour",
            _ => "degree",
        }));
    }
    if !(0.0..=59.0).contains(&minutes) {
        return Err(range("minute"));
    }
    if !(0.0..=60.0).contains(&seconds) {
        return Err(range("second"));
    }

    Ok(Hms::new(sign * hours, sign * minutes, sign * seconds))
}

/// Interpret a bare number as a time of day.
///
/// Values above 24 are seconds since midnight. Values up to 24 are decimal hours,
/// certain only when they have a fractional part since small integers could also be
/// seconds. Values above a day are most likely UNIX timestamps; they are rejected and
/// noted in the context.
///
/// # Errors
/// [ParseError::Timestamp] above one day, [ParseError::InvalidNumber] for negative or
/// non-finite values.
pub fn time_from_number(value: f64, ctx: &mut ParseContext) -> Result<(Hms, Certainty), ParseError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ParseError::InvalidNumber(value));
    }
    if value > SECONDS_PER_DAY {
        ctx.note(Note::UnparsedTimestamp { value });
        return Err(ParseError::Timestamp(value));
    }
    if value > 24.0 {
        return Ok((Hms::from_decimal(value / 3600.0), Certainty::Certain));
    }
    let certainty = if value.fract() != 0.0 {
        Certainty::Certain
    } else {
        Certainty::Guessed
    };
    Ok((Hms::from_decimal(value), certainty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("06:39:12.152", AngleMode::Hours, Hms::new(6.0, 39.0, 12.152); "time of day")]
    #[test_case("23:59:60", AngleMode::Hours, Hms::new(23.0, 59.0, 60.0); "leap second")]
    #[test_case("00 00 00", AngleMode::Hours, Hms::new(0.0, 0.0, 0.0); "midnight")]
    #[test_case("-05:30:00", AngleMode::SignedDegrees, Hms::new(-5.0, -30.0, -0.0); "negative declination")]
    #[test_case("-00:30:10", AngleMode::SignedDegrees, Hms::new(-0.0, -30.0, -10.0); "small negative declination")]
    #[test_case("+45:00:00", AngleMode::SignedDegrees, Hms::new(45.0, 0.0, 0.0); "explicit plus")]
    #[test_case("-05:30:00", AngleMode::Hours, Hms::new(5.0, 30.0, 0.0); "sign ignored for hours")]
    #[test_case("270:10:00", AngleMode::UnsignedDegrees, Hms::new(270.0, 10.0, 0.0); "unsigned degrees")]
    fn valid(text: &str, mode: AngleMode, expected: Hms) {
        assert_eq!(parse_time(text, mode).unwrap(), expected);
    }

    #[test]
    fn negative_declination_has_all_components_negative() {
        let got = parse_time("-05:30:00", AngleMode::SignedDegrees).unwrap();
        assert!(got.hours < 0.0);
        assert!(got.minutes < 0.0);
        assert!(got.seconds.is_sign_negative());
        assert!((got.to_decimal() + 5.5).abs() < 1e-12);
    }

    #[test_case("25:00:00", AngleMode::Hours; "hour too large")]
    #[test_case("24:00:00", AngleMode::Hours; "hour 24")]
    #[test_case("12:60:00", AngleMode::Hours; "minute 60")]
    #[test_case("12:00:61", AngleMode::Hours; "second 61")]
    #[test_case("91:00:00", AngleMode::SignedDegrees; "declination too large")]
    #[test_case("360:00:00", AngleMode::UnsignedDegrees; "full circle")]
    #[test_case("12:00", AngleMode::Hours; "too short")]
    #[test_case("12:00:00:00", AngleMode::Hours; "four numbers")]
    #[test_case("12h 30m", AngleMode::Hours; "two numbers")]
    fn invalid(text: &str, mode: AngleMode) {
        assert!(parse_time(text, mode).is_err(), "{text} should not parse");
    }

    #[test]
    fn number_as_seconds() {
        let mut ctx = ParseContext::default();
        let (hms, certainty) = time_from_number(3723.5, &mut ctx).unwrap();
        assert_eq!(hms, Hms::new(1.0, 2.0, 3.5));
        assert_eq!(certainty, Certainty::Certain);
    }

    #[test]
    fn number_as_hours() {
        let mut ctx = ParseContext::default();
        let (hms, certainty) = time_from_number(12.5, &mut ctx).unwrap();
        assert_eq!(hms, Hms::new(12.0, 30.0, 0.0));
        assert_eq!(certainty, Certainty::Certain);

        let (hms, certainty) = time_from_number(12.0, &mut ctx).unwrap();
        assert_eq!(hms, Hms::new(12.0, 0.0, 0.0));
        assert_eq!(certainty, Certainty::Guessed);

        let (_, certainty) = time_from_number(0.0, &mut ctx).unwrap();
        assert_eq!(certainty, Certainty::Guessed);
        assert!(ctx.transcript().is_empty());
    }

    #[test]
    fn number_as_timestamp_is_noted() {
        let mut ctx = ParseContext::default();
        let err = time_from_number(1_118_000_000.0, &mut ctx).unwrap_err();
        assert_eq!(err, ParseError::Timestamp(1_118_000_000.0));
        assert!(matches!(
            ctx.transcript().notes(),
            [Note::UnparsedTimestamp { .. }]
        ));
    }

    #[test_case(-1.0)]
    #[test_case(f64::NAN)]
    #[test_case(f64::INFINITY)]
    fn number_invalid(value: f64) {
        let mut ctx = ParseContext::default();
        assert!(matches!(
            time_from_number(value, &mut ctx),
            Err(ParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn decimal_round_trip() {
        let hms = Hms::from_decimal(10.341_666_666_666_667);
        assert_eq!(hms, Hms::new(10.0, 20.0, 30.0));
        assert_eq!(hms.to_string(), "10:20:30.00");

        let hms = Hms::from_decimal(-20.252_777_777_777_78);
        assert_eq!(hms.hours, -20.0);
        assert_eq!(hms.minutes, -15.0);
        assert!((hms.seconds + 10.0).abs() < 1e-6);
    }
}
