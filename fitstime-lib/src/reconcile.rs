//! Cross checking Julian Day fields against each other.
//!
//! Different software writes the start, mid or end of an exposure, with or without
//! the heliocentric correction, and sometimes off by half a day. Comparing every pair
//! of JD fields under every combination of those offsets shows which convention each
//! field follows. The report is informational only.
use std::collections::BTreeMap;
use std::fmt::Display;

use tracing::warn;

use crate::aggregate::Categories;

/// Largest residual, in days, accepted as a match.
const MATCH_TOLERANCE: f64 = 2e-4;
/// Fields further apart than this, in days, are not compared.
const CLASH_DAYS: f64 = 1.0;

/// `a` equals `b` plus the offsets described by `label`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OffsetMatch {
    pub a: String,
    pub b: String,
    /// Offsets added to `b`, e.g. `+Hel.Corr. -Exptime/2 +0.5`. Empty for a direct
    /// match.
    pub label: String,
    /// `a - (b + offsets)` in seconds.
    pub residual_seconds: f64,
}

/// Two fields more than a day apart.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Clash {
    pub a: String,
    pub a_value: f64,
    pub b: String,
    pub b_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReconcileReport {
    /// Every JD valued field, sorted by name.
    pub values: BTreeMap<String, f64>,
    pub matches: Vec<OffsetMatch>,
    pub clashes: Vec<Clash>,
}

impl Display for ReconcileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (field, value) in &self.values {
            writeln!(f, "{field} = {value}")?;
            for m in self.matches.iter().filter(|m| &m.a == field) {
                let label = if m.label.is_empty() {
                    String::new()
                } else {
                    format!(" {}", m.label)
                };
                writeln!(
                    f,
                    "{:width$} = {}{label}   ({:.2} sec error)",
                    "",
                    m.b,
                    m.residual_seconds,
                    width = field.len()
                )?;
            }
        }
        for c in &self.clashes {
            writeln!(
                f,
                "Warning: {}={:9.5} and {}={:9.5} differ by more than one day!",
                c.a, c.a_value, c.b, c.b_value
            )?;
        }
        Ok(())
    }
}

/// Offset terms and their labels: minus, none and plus.
fn steps(amount: f64, name: &str) -> [(f64, String); 3] {
    [
        (-amount, format!("-{name}")),
        (0.0, String::new()),
        (amount, format!("+{name}")),
    ]
}

/// Compare every pair of Julian Day fields in `categories`.
///
/// `exposure_days` is half the exposure time; when it is unknown exposure offsets are
/// not tried.
#[must_use]
pub fn reconcile(
    categories: &Categories,
    helio_days: f64,
    exposure_days: Option<f64>,
) -> ReconcileReport {
    let values: BTreeMap<String, f64> = categories
        .jds
        .iter()
        .chain(&categories.hjds)
        .map(|c| (c.field.clone(), c.value))
        .collect();

    let helio = steps(helio_days, "Hel.Corr.");
    let exposure = match exposure_days {
        Some(days) => steps(days, "Exptime/2").to_vec(),
        None => vec![(0.0, String::new())],
    };
    let half_day = steps(0.5, "0.5");

    let mut report = ReconcileReport::default();
    let fields: Vec<(&String, &f64)> = values.iter().collect();
    for (i, (a, a_value)) in fields.iter().enumerate() {
        for (b, b_value) in &fields[i + 1..] {
            if (**a_value - **b_value).abs() > CLASH_DAYS {
                warn!("{a}={a_value:9.5} and {b}={b_value:9.5} differ by more than one day");
                report.clashes.push(Clash {
                    a: a.to_string(),
                    a_value: **a_value,
                    b: b.to_string(),
                    b_value: **b_value,
                });
                continue;
            }
            for (h, h_label) in &helio {
                for (e, e_label) in &exposure {
                    for (m, m_label) in &half_day {
                        let residual = **a_value - (**b_value + h + e + m);
                        if residual.abs() < MATCH_TOLERANCE {
                            let label = [h_label, e_label, m_label]
                                .iter()
                                .filter(|l| !l.is_empty())
                                .map(|l| l.as_str())
                                .collect::<Vec<_>>()
                                .join(" ");
                            report.matches.push(OffsetMatch {
                                a: a.to_string(),
                                b: b.to_string(),
                                label,
                                residual_seconds: residual * 86400.0,
                            });
                        }
                    }
                }
            }
        }
    }
    report.values = values;
    report
}
