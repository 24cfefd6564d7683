//! Choosing one value per category and deriving the observation time.
use std::fmt::Display;
use std::str::FromStr;

use tracing::debug;
use typed_builder::TypedBuilder;

use crate::aggregate::{best, ranked, Candidate, Categories, Category};
use crate::astro::{julian_epoch, Astronomy, J2000};
use crate::diag::{Note, Transcript};
use crate::extract::{CalendarDate, DateOrder, Hms};
use crate::reconcile::{reconcile, ReconcileReport};

/// Field name of the derived heliocentric time.
pub const HJD_CALC: &str = "HJD_Calc";

const DEFAULT_RA_HOURS: f64 = 18.0;
const DEFAULT_DEC_DEGREES: f64 = -28.0;
const DEFAULT_EQUINOX: f64 = 2000.0;

/// Date candidates further apart than this, in days, disagree.
const DATE_THRESHOLD: f64 = 0.01;
/// Time candidates further apart than this, in seconds, disagree.
const TIME_THRESHOLD: f64 = 10.0;
/// RA (hours) or Dec (degrees) candidates further apart than this disagree.
const POSITION_THRESHOLD: f64 = 0.01;
/// Offsets smaller than this, in days, cannot be told apart when reconciling.
const SMALL_OFFSET: f64 = 1e-4;

/// Field whose value is used as the basis of the output time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BaseField {
    /// Derived from the best date and time, corrected to the heliocentric mid-exposure.
    #[default]
    HjdCalc,
    Hjd,
    Jd,
    Mjd,
    MjdObs,
}

impl BaseField {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            BaseField::HjdCalc => HJD_CALC,
            BaseField::Hjd => "HJD",
            BaseField::Jd => "JD",
            BaseField::Mjd => "MJD",
            BaseField::MjdObs => "MJD-OBS",
        }
    }
}

impl Display for BaseField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BaseField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HJD_CALC" => Ok(BaseField::HjdCalc),
            "HJD" => Ok(BaseField::Hjd),
            "JD" => Ok(BaseField::Jd),
            "MJD" => Ok(BaseField::Mjd),
            "MJD-OBS" => Ok(BaseField::MjdObs),
            _ => Err(format!(
                "invalid field {s:?}; expected one of HJD_Calc, HJD, JD, MJD, MJD-OBS"
            )),
        }
    }
}

/// How to compute the output time.
///
/// The output is `base + helio * hjd_correction + exposure * half_exposure + extra_days`,
/// with all terms in days.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ResolveOptions {
    #[builder(default)]
    pub base: BaseField,
    /// Multiplier for the heliocentric correction, -1, 0 or 1.
    #[builder(default)]
    pub helio: i8,
    /// Multiplier for half the exposure time, -1, 0 or 1.
    #[builder(default)]
    pub exposure: i8,
    #[builder(default)]
    pub extra_days: f64,
    /// Field order for dates that cannot be disambiguated otherwise.
    #[builder(default, setter(strip_option))]
    pub date_order: Option<DateOrder>,
    /// Produce a reconciliation report.
    #[builder(default)]
    pub diagnostics: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Why no time could be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NoData {
    MissingTemporalData,
    BaseFieldUnavailable(BaseField),
}

impl Display for NoData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoData::MissingTemporalData => write!(f, "no date, time or JD fields"),
            NoData::BaseFieldUnavailable(field) => write!(f, "{field} not available"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Outcome {
    /// Julian Day
    Time(f64),
    NoData(NoData),
}

impl Outcome {
    #[must_use]
    pub fn time(&self) -> Option<f64> {
        match self {
            Outcome::Time(jd) => Some(*jd),
            Outcome::NoData(_) => None,
        }
    }
}

/// The chosen value for each category and the offsets derived from them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ResolvedSet {
    pub date: Option<Candidate<CalendarDate>>,
    pub time: Option<Candidate<Hms>>,
    /// Best of the plain and heliocentric Julian Days from the header.
    pub jd: Option<Candidate<f64>>,
    /// Hours, J2000. Field `guess` when defaulted.
    pub ra: Candidate<f64>,
    /// Degrees, J2000. Field `guess` when defaulted.
    pub dec: Candidate<f64>,
    pub equinox: Candidate<f64>,
    /// Seconds
    pub exposure: Option<Candidate<f64>>,
    /// Heliocentric correction in days.
    pub helio_days: f64,
    /// Half the exposure time in days.
    pub exposure_days: f64,
    /// The derived heliocentric mid-exposure time, also first in `categories.hjds`.
    pub derived: Option<Candidate<f64>>,
    /// Fields the derived time was computed from.
    pub provenance: Option<String>,
    pub categories: Categories,
}

impl ResolvedSet {
    /// Value of a Julian Day field by name, including [HJD_CALC].
    #[must_use]
    pub fn julian_day(&self, field: &str) -> Option<f64> {
        self.categories
            .jds
            .iter()
            .chain(&self.categories.hjds)
            .find(|c| c.field == field)
            .map(|c| c.value)
    }
}

/// Everything known about the time of one header.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Resolution {
    pub outcome: Outcome,
    pub resolved: ResolvedSet,
    pub transcript: Transcript,
    /// Present when diagnostics were requested and a time could be derived.
    pub report: Option<ReconcileReport>,
}

/// Julian Day at 0h of a date, ignoring any fractional day.
fn midnight<A: Astronomy + ?Sized>(astro: &A, date: &CalendarDate) -> f64 {
    let day = CalendarDate::new(date.year, date.month, date.day.trunc());
    astro.julian_day(&day, &Hms::new(0.0, 0.0, 0.0))
}

pub struct Resolver<'a, A: Astronomy + ?Sized> {
    astro: &'a A,
    options: &'a ResolveOptions,
}

impl<'a, A: Astronomy + ?Sized> Resolver<'a, A> {
    pub fn new(astro: &'a A, options: &'a ResolveOptions) -> Self {
        Self { astro, options }
    }

    /// Note a disagreement between the two most confident candidates if `distance`
    /// between them exceeds `threshold`.
    fn compare<T, D, F>(
        &self,
        category: Category,
        list: &[Candidate<T>],
        threshold: f64,
        distance: D,
        render: F,
        transcript: &mut Transcript,
    ) where
        D: Fn(&T, &T) -> f64,
        F: Fn(&T) -> String,
    {
        let ranked = ranked(list);
        if let [first, second, ..] = ranked.as_slice() {
            if distance(&first.value, &second.value).abs() > threshold {
                transcript.push(Note::Disagreement {
                    category,
                    chosen: first.field.clone(),
                    other: second.field.clone(),
                    value: render(&first.value),
                });
            }
        }
    }

    fn position(
        &self,
        category: Category,
        list: &[Candidate<f64>],
        default: f64,
        default_text: &str,
        transcript: &mut Transcript,
    ) -> Candidate<f64> {
        self.compare(
            category,
            list,
            POSITION_THRESHOLD,
            |a, b| a - b,
            |v| Hms::from_decimal(*v).to_string(),
            transcript,
        );
        match best(list) {
            Some(c) => c.clone(),
            None => {
                transcript.push(Note::Assumed {
                    category,
                    value: default_text.to_string(),
                });
                Candidate::new(default, "guess", 0.0)
            }
        }
    }

    /// Pick the best value per category, derive the heliocentric mid-exposure time
    /// and compute the requested output.
    ///
    /// Never fails; a header without any usable time yields [Outcome::NoData].
    pub fn resolve(&self, mut categories: Categories, mut transcript: Transcript) -> Resolution {
        let astro = self.astro;

        self.compare(
            Category::Date,
            &categories.dates,
            DATE_THRESHOLD,
            |a, b| midnight(astro, a) - midnight(astro, b),
            ToString::to_string,
            &mut transcript,
        );
        let date = best(&categories.dates).cloned();
        if date.is_none() {
            transcript.push(Note::Missing(Category::Date));
        }

        self.compare(
            Category::Time,
            &categories.times,
            TIME_THRESHOLD,
            |a, b| a.seconds_of_day() - b.seconds_of_day(),
            ToString::to_string,
            &mut transcript,
        );
        let time = best(&categories.times).cloned();
        if time.is_none() {
            transcript.push(Note::Missing(Category::Time));
        }

        let all_jds: Vec<Candidate<f64>> = categories
            .jds
            .iter()
            .chain(&categories.hjds)
            .cloned()
            .collect();
        let jd = best(&all_jds).cloned();
        if jd.is_none() {
            transcript.push(Note::Missing(Category::Jd));
        }

        let mut ra = self.position(
            Category::Ra,
            &categories.ras,
            DEFAULT_RA_HOURS,
            "18h",
            &mut transcript,
        );
        let mut dec = self.position(
            Category::Dec,
            &categories.decs,
            DEFAULT_DEC_DEGREES,
            "-28d",
            &mut transcript,
        );

        let equinox = match best(&categories.equinoxes) {
            Some(c) => c.clone(),
            None => {
                transcript.push(Note::Assumed {
                    category: Category::Equinox,
                    value: "2000".to_string(),
                });
                Candidate::new(DEFAULT_EQUINOX, "guess", 0.0)
            }
        };
        if (equinox.value - DEFAULT_EQUINOX).abs() > 1e-5 {
            let (ra_deg, dec_deg) =
                astro.precess(julian_epoch(equinox.value), J2000, ra.value * 15.0, dec.value);
            ra.value = ra_deg / 15.0;
            dec.value = dec_deg;
            transcript.push(Note::Precessed {
                equinox: equinox.value,
            });
        }

        let exposure = best(&categories.exptimes).cloned();
        let exposure_days = match &exposure {
            Some(c) => c.value / 2.0 / 86400.0,
            None => {
                transcript.push(Note::NoExposure);
                0.0
            }
        };

        let mut derived = None;
        let mut provenance = None;
        let helio_days = match (&date, &time, &jd) {
            (Some(date), Some(time), _) => {
                let day = CalendarDate::new(date.value.year, date.value.month, date.value.day.trunc());
                let cjd = astro.julian_day(&day, &time.value);
                let hjd = astro.heliocentric(cjd, ra.value * 15.0, dec.value);
                let candidate = Candidate::new(hjd + exposure_days, HJD_CALC, 200.0);
                categories.hjds.insert(0, candidate.clone());
                derived = Some(candidate);
                provenance = Some(format!(
                    "({} & {} + Hel.Corr. + Exptime/2)",
                    date.field, time.field
                ));
                Some(hjd - cjd)
            }
            (_, _, Some(jd)) => {
                Some(astro.heliocentric(jd.value, ra.value * 15.0, dec.value) - jd.value)
            }
            _ => None,
        };
        let Some(helio_days) = helio_days else {
            transcript.push(Note::MissingTemporalData);
            let resolved = ResolvedSet {
                date,
                time,
                jd,
                ra,
                dec,
                equinox,
                exposure,
                helio_days: 0.0,
                exposure_days,
                derived,
                provenance,
                categories,
            };
            return Resolution {
                outcome: Outcome::NoData(NoData::MissingTemporalData),
                resolved,
                transcript,
                report: None,
            };
        };

        if helio_days.abs() < SMALL_OFFSET || exposure_days < SMALL_OFFSET {
            transcript.push(Note::SmallOffsets);
        }
        if let Some(provenance) = &provenance {
            transcript.push(Note::Derived {
                provenance: provenance.clone(),
                helio_days,
                exposure_days,
            });
        }

        let resolved = ResolvedSet {
            date,
            time,
            jd,
            ra,
            dec,
            equinox,
            exposure,
            helio_days,
            exposure_days,
            derived,
            provenance,
            categories,
        };

        let report = self.options.diagnostics.then(|| {
            reconcile(
                &resolved.categories,
                helio_days,
                resolved.exposure.is_some().then_some(exposure_days),
            )
        });

        let outcome = match resolved.julian_day(self.options.base.name()) {
            Some(base) => {
                let o = self.options;
                let jd = base
                    + f64::from(o.helio) * helio_days
                    + f64::from(o.exposure) * exposure_days
                    + o.extra_days;
                debug!(base = %o.base, jd, "resolved time");
                Outcome::Time(jd)
            }
            None => {
                transcript.push(Note::BaseFieldUnavailable(
                    self.options.base.name().to_string(),
                ));
                Outcome::NoData(NoData::BaseFieldUnavailable(self.options.base))
            }
        };

        Resolution {
            outcome,
            resolved,
            transcript,
            report,
        }
    }
}
