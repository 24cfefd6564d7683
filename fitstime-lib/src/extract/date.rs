//! Date parsing for headers written by arbitrary software.
//!
//! The separator and the field order are both unknown. The month is always the middle
//! value; the year and day of month are told apart by an ordered list of rules, see
//! [RULES].
use std::fmt::Display;
use std::str::FromStr;

use super::{unsigned_tokens, Certainty, ParseContext, ParseError};
use crate::diag::Note;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
/// Longest possible length of each month; February always allows 29.
const MONTH_DAYS: [f64; 12] = [
    31.0, 29.0, 31.0, 30.0, 31.0, 30.0, 31.0, 31.0, 30.0, 31.0, 30.0, 31.0,
];

/// A calendar date. `day` may carry a fraction of a day.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: f64,
}

impl CalendarDate {
    #[must_use]
    pub fn new(year: i32, month: u32, day: f64) -> Self {
        Self { year, month, day }
    }

    /// Fractional part of the day number.
    #[must_use]
    pub fn day_fraction(&self) -> f64 {
        self.day - self.day.trunc()
    }
}

impl Display for CalendarDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.year, self.month, self.day.trunc())
    }
}

/// Field order used when a date cannot be disambiguated from its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DateOrder {
    Ymd,
    Dmy,
}

impl Display for DateOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateOrder::Ymd => write!(f, "YMD"),
            DateOrder::Dmy => write!(f, "DMY"),
        }
    }
}

impl FromStr for DateOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "YMD" => Ok(DateOrder::Ymd),
            "DMY" => Ok(DateOrder::Dmy),
            _ => Err(format!("invalid date order {s:?}; expected ymd or dmy")),
        }
    }
}

/// Result of [parse_date].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedDate {
    pub date: CalendarDate,
    pub certainty: Certainty,
}

/// The three values of a date, month in the middle.
#[derive(Debug, Clone, PartialEq)]
struct DateTokens<'a> {
    text: &'a str,
    first: f64,
    month: u32,
    last: f64,
    month_name: bool,
}

/// What decided which token was the year.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Basis {
    Year,
    Hint,
    Override(DateOrder),
    Guess(DateOrder),
}

#[derive(Debug, Clone, PartialEq)]
struct Matched {
    date: CalendarDate,
    basis: Basis,
}

/// A rule returns `None` when it does not apply, otherwise the date or the reason the
/// applicable reading is invalid.
type Rule = fn(&DateTokens, &ParseContext) -> Option<Result<Matched, ParseError>>;

/// Disambiguation rules, in priority order. The last rule always applies.
const RULES: [Rule; 7] = [
    four_digit_year_first,
    four_digit_year_last,
    two_digit_year_first,
    two_digit_year_last,
    year_hint,
    explicit_order,
    larger_is_day,
];

impl<'a> DateTokens<'a> {
    fn scan(text: &'a str) -> Result<Self, ParseError> {
        let mut nums = unsigned_tokens(text);
        let month_name = nums.len() == 2;
        if month_name {
            let upper = text.to_uppercase();
            let Some(idx) = MONTHS.iter().rposition(|m| upper.contains(m)) else {
                return Err(ParseError::MissingMonth(text.to_string()));
            };
            nums.insert(1, (idx + 1) as f64);
        }
        let &[first, month, last] = nums.as_slice() else {
            return Err(ParseError::TokenCount {
                text: text.to_string(),
                expected: 3,
                found: nums.len(),
            });
        };
        if !(1.0..13.0).contains(&month) {
            return Err(out_of_range("month", text));
        }

        Ok(DateTokens {
            text,
            first,
            month: month as u32,
            last,
            month_name,
        })
    }

    fn day(&self, day: f64) -> Result<f64, ParseError> {
        if day >= 1.0 && day <= MONTH_DAYS[self.month as usize - 1] {
            Ok(day)
        } else {
            Err(out_of_range("day", self.text))
        }
    }

    fn four_digit(&self, year: f64, day: f64) -> Result<Matched, ParseError> {
        if !(year > 1980.0 && year < 2050.0) {
            return Err(out_of_range("year", self.text));
        }
        Ok(Matched {
            date: CalendarDate::new(year as i32, self.month, self.day(day)?),
            basis: Basis::Year,
        })
    }

    fn two_digit(&self, year: f64, day: f64) -> Result<Matched, ParseError> {
        // 100 is what y2k-broken software writes for 2000
        let year = 1900 + year as i32;
        Ok(Matched {
            date: CalendarDate::new(year, self.month, self.day(day)?),
            basis: Basis::Year,
        })
    }

    fn ordered(&self, order: DateOrder) -> Result<CalendarDate, ParseError> {
        let (year, day) = match order {
            DateOrder::Ymd => (self.first, self.last),
            DateOrder::Dmy => (self.last, self.first),
        };
        Ok(CalendarDate::new(
            2000 + year as i32,
            self.month,
            self.day(day)?,
        ))
    }
}

fn out_of_range(what: &'static str, text: &str) -> ParseError {
    ParseError::OutOfRange {
        what,
        text: text.to_string(),
    }
}

fn four_digit_year_first(t: &DateTokens, _: &ParseContext) -> Option<Result<Matched, ParseError>> {
    (t.first > 100.0).then(|| t.four_digit(t.first, t.last))
}

fn four_digit_year_last(t: &DateTokens, _: &ParseContext) -> Option<Result<Matched, ParseError>> {
    (t.last > 100.0).then(|| t.four_digit(t.last, t.first))
}

fn two_digit_year_first(t: &DateTokens, _: &ParseContext) -> Option<Result<Matched, ParseError>> {
    (t.first > 50.0 && t.first <= 100.0).then(|| t.two_digit(t.first, t.last))
}

fn two_digit_year_last(t: &DateTokens, _: &ParseContext) -> Option<Result<Matched, ParseError>> {
    (t.last > 50.0 && t.last <= 100.0).then(|| t.two_digit(t.last, t.first))
}

fn year_hint(t: &DateTokens, ctx: &ParseContext) -> Option<Result<Matched, ParseError>> {
    let hint = ctx.year_hint()?;
    let is_hint = |v: f64| v == f64::from(hint) || v == f64::from(hint % 100);
    let day = if is_hint(t.first) {
        t.last
    } else if is_hint(t.last) {
        t.first
    } else {
        return None;
    };
    Some(t.day(day).map(|day| Matched {
        date: CalendarDate::new(hint, t.month, day),
        basis: Basis::Hint,
    }))
}

fn explicit_order(t: &DateTokens, ctx: &ParseContext) -> Option<Result<Matched, ParseError>> {
    let order = ctx.date_order()?;
    Some(t.ordered(order).map(|date| Matched {
        date,
        basis: Basis::Override(order),
    }))
}

fn larger_is_day(t: &DateTokens, _: &ParseContext) -> Option<Result<Matched, ParseError>> {
    let order = if t.last > t.first && !t.month_name {
        DateOrder::Ymd
    } else {
        DateOrder::Dmy
    };
    Some(t.ordered(order).map(|date| Matched {
        date,
        basis: Basis::Guess(order),
    }))
}

/// Parse `text` as a date with unknown separators and unknown field order.
///
/// Accepts three numbers, or two numbers and an English month abbreviation. The
/// broken American month/day/year order is not supported. Years after 2000 written
/// with two digits are ambiguous when both candidates are valid days; the context's
/// year hint and date order are then used, and failing those the larger value is
/// taken as the day and an [Note::AmbiguousOrder] is recorded.
///
/// # Errors
/// [ParseError] if the text is not a plausible date.
pub fn parse_date(text: &str, ctx: &mut ParseContext) -> Result<ParsedDate, ParseError> {
    let tokens = DateTokens::scan(text)?;
    let matched = RULES
        .iter()
        .find_map(|rule| rule(&tokens, ctx))
        .unwrap_or_else(|| Err(out_of_range("date", text)))?;

    let certainty = match matched.basis {
        Basis::Year => {
            ctx.observe_year(matched.date.year, text);
            Certainty::Certain
        }
        Basis::Hint => Certainty::Certain,
        Basis::Override(_) => Certainty::Assisted,
        Basis::Guess(order) => {
            ctx.note(Note::AmbiguousOrder {
                text: text.to_string(),
                order,
            });
            Certainty::Guessed
        }
    };

    Ok(ParsedDate {
        date: matched.date,
        certainty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn parse(text: &str, hint: Option<i32>, order: Option<DateOrder>) -> (ParsedDate, ParseContext) {
        let mut ctx = ParseContext::new(hint, order);
        let date = parse_date(text, &mut ctx).unwrap();
        (date, ctx)
    }

    #[test_case(None; "no hint")]
    #[test_case(Some(1999); "unrelated hint")]
    #[test_case(Some(2003); "matching hint")]
    fn four_digit_year_is_certain(hint: Option<i32>) {
        let (got, _) = parse("2003-11-12", hint, Some(DateOrder::Dmy));
        assert_eq!(got.date, CalendarDate::new(2003, 11, 12.0));
        assert_eq!(got.certainty, Certainty::Certain);
    }

    #[test]
    fn four_digit_year_last() {
        let (got, ctx) = parse("12/11/2003", None, None);
        assert_eq!(got.date, CalendarDate::new(2003, 11, 12.0));
        assert_eq!(got.certainty, Certainty::Certain);
        assert_eq!(ctx.year_hint(), Some(2003));
    }

    #[test]
    fn two_digit_year_before_2000() {
        let (got, _) = parse("98-02-03", None, None);
        assert_eq!(got.date, CalendarDate::new(1998, 2, 3.0));
        assert_eq!(got.certainty, Certainty::Certain);

        let (got, _) = parse("03/02/98", None, None);
        assert_eq!(got.date, CalendarDate::new(1998, 2, 3.0));

        let (got, _) = parse("100-01-05", None, None);
        assert_eq!(got.date, CalendarDate::new(2000, 1, 5.0));
    }

    #[test]
    fn ambiguous_without_hint_is_guessed() {
        let (got, ctx) = parse("03-11-12", None, None);
        assert_eq!(got.date, CalendarDate::new(2003, 11, 12.0));
        assert_eq!(got.certainty, Certainty::Guessed);
        assert_eq!(got.certainty.factor(), 0.0);
        assert!(matches!(
            ctx.transcript().notes(),
            [Note::AmbiguousOrder {
                order: DateOrder::Ymd,
                ..
            }]
        ));
    }

    #[test]
    fn ambiguous_with_hint_is_certain() {
        let (got, ctx) = parse("03-11-12", Some(2003), None);
        assert_eq!(got.date, CalendarDate::new(2003, 11, 12.0));
        assert_eq!(got.certainty, Certainty::Certain);
        assert!(ctx.transcript().is_empty());

        let (got, _) = parse("12-11-03", Some(2003), None);
        assert_eq!(got.date, CalendarDate::new(2003, 11, 12.0));
        assert_eq!(got.certainty, Certainty::Certain);
    }

    #[test]
    fn ambiguous_with_override_is_assisted() {
        let (got, ctx) = parse("12-11-03", None, Some(DateOrder::Ymd));
        assert_eq!(got.date, CalendarDate::new(2012, 11, 3.0));
        assert_eq!(got.certainty, Certainty::Assisted);
        assert_eq!(got.certainty.factor(), 0.5);
        assert!(ctx.transcript().is_empty());

        let (got, _) = parse("03-11-12", None, Some(DateOrder::Dmy));
        assert_eq!(got.date, CalendarDate::new(2012, 11, 3.0));
    }

    #[test]
    fn month_name() {
        let (got, _) = parse("12 Mar 2003", None, None);
        assert_eq!(got.date, CalendarDate::new(2003, 3, 12.0));

        // With a month name the guess is day first
        let (got, _) = parse("04 NOV 07", None, None);
        assert_eq!(got.date, CalendarDate::new(2007, 11, 4.0));
        assert_eq!(got.certainty, Certainty::Guessed);
    }

    #[test]
    fn fractional_day() {
        let (got, _) = parse("2003-11-12.25", None, None);
        assert_eq!(got.date.day, 12.25);
        assert_eq!(got.date.day_fraction(), 0.25);
    }

    #[test_case("2003-13-01"; "month too large")]
    #[test_case("2003-00-01"; "month zero")]
    #[test_case("2003-02-30"; "day past month end")]
    #[test_case("1975-02-03"; "year too early")]
    #[test_case("2050-02-03"; "year too late")]
    #[test_case("2003-02"; "two numbers no month")]
    #[test_case("2003-02-03-04"; "four numbers")]
    #[test_case("T"; "no numbers")]
    fn invalid(text: &str) {
        let mut ctx = ParseContext::default();
        assert!(parse_date(text, &mut ctx).is_err(), "{text} should not parse");
    }

    #[test]
    fn year_clash_noted() {
        let mut ctx = ParseContext::new(Some(2004), None);
        parse_date("2003-11-12", &mut ctx).unwrap();
        assert!(matches!(
            ctx.transcript().notes(),
            [Note::YearClash {
                hint: 2004,
                year: 2003,
                ..
            }]
        ));
    }

    #[test]
    fn rules_apply_independently() {
        let ctx = ParseContext::new(Some(2007), None);
        let t = DateTokens::scan("07-06-05").unwrap();
        assert!(four_digit_year_first(&t, &ctx).is_none());
        assert!(two_digit_year_last(&t, &ctx).is_none());
        let hinted = year_hint(&t, &ctx).unwrap().unwrap();
        assert_eq!(hinted.date, CalendarDate::new(2007, 6, 5.0));
        assert!(explicit_order(&t, &ctx).is_none());
        let guessed = larger_is_day(&t, &ctx).unwrap().unwrap();
        assert_eq!(guessed.basis, Basis::Guess(DateOrder::Dmy));
        assert_eq!(guessed.date, CalendarDate::new(2005, 6, 7.0));
    }
}
