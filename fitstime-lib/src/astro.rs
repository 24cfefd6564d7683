//! Julian Day arithmetic, precession and the heliocentric correction.
//!
//! The resolver only depends on the [Astronomy] trait; [Almanac] is a low precision
//! implementation good to a few seconds, which is ample for time stamping images.
use hifitime::Epoch;

use crate::extract::{CalendarDate, Hms};

/// Julian Day of the J2000.0 reference equinox as used for precession.
pub const J2000: f64 = 2_451_544.5;
/// Offset between Modified and full Julian Day.
pub const MJD_OFFSET: f64 = 2_400_000.5;

pub trait Astronomy {
    /// Julian Day for a calendar date and time of day (UT).
    fn julian_day(&self, date: &CalendarDate, time: &Hms) -> f64;

    /// Calendar date for a Julian Day, with the time of day as a fraction of the day.
    fn calendar_date(&self, jd: f64) -> CalendarDate;

    /// Precess equatorial coordinates in degrees from the equinox at `from_jd` to the
    /// equinox at `to_jd`. Returns `(ra, dec)` in degrees.
    fn precess(&self, from_jd: f64, to_jd: f64, ra_deg: f64, dec_deg: f64) -> (f64, f64);

    /// Heliocentric Julian Day for an observation at `jd` of a target at J2000
    /// coordinates `ra_deg`, `dec_deg`.
    fn heliocentric(&self, jd: f64, ra_deg: f64, dec_deg: f64) -> f64;
}

/// Julian Day of a Julian epoch year such as an `EQUINOX` value.
#[must_use]
pub fn julian_epoch(year: f64) -> f64 {
    J2000 + (year - 2000.0) * 365.25
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Almanac;

fn sin(deg: f64) -> f64 {
    deg.to_radians().sin()
}

fn cos(deg: f64) -> f64 {
    deg.to_radians().cos()
}

/// Julian centuries since 1900.0.
fn centuries(jd: f64) -> f64 {
    (jd - 2_415_020.0) / 36525.0
}

/// Precession angles `(zeta, z, theta)` in degrees between J2000 and `jd`.
fn angles(jd: f64) -> (f64, f64, f64) {
    let t = centuries(jd) - 1.0;
    let (t2, t3) = (t * t, t * t * t);
    (
        0.640_616_1 * t + 0.000_083_9 * t2 + 0.000_005_0 * t3,
        0.640_616_1 * t + 0.000_304_1 * t2 + 0.000_005_1 * t3,
        0.556_753_0 * t - 0.000_118_5 * t2 - 0.000_011_6 * t3,
    )
}

/// Precession of less than about an arcsecond is skipped.
fn negligible(jd: f64) -> bool {
    (jd - J2000).abs() / 365.25 <= 0.04
}

impl Astronomy for Almanac {
    /// Gregorian calendar Julian Day.
    ///
    /// Accepts a fractional day and a second of 60, both of which carry straight into
    /// the result rather than going through a `hifitime` Gregorian epoch.
    fn julian_day(&self, date: &CalendarDate, time: &Hms) -> f64 {
        let (mut year, mut month) = (f64::from(date.year), f64::from(date.month));
        if month <= 2.0 {
            year -= 1.0;
            month += 12.0;
        }
        let a = (year / 100.0).floor();
        let b = 2.0 - a + (a / 4.0).floor();
        (365.25 * year).floor()
            + (30.6001 * (month + 1.0)).floor()
            + date.day
            + time.to_decimal() / 24.0
            + 1_720_994.5
            + b
    }

    fn calendar_date(&self, jd: f64) -> CalendarDate {
        let (year, month, day, hour, minute, second, nanos) =
            Epoch::from_jde_utc(jd).to_gregorian_utc();
        let seconds = f64::from(hour) * 3600.0
            + f64::from(minute) * 60.0
            + f64::from(second)
            + f64::from(nanos) * 1e-9;
        CalendarDate::new(year, u32::from(month), f64::from(day) + seconds / 86400.0)
    }

    fn precess(&self, from_jd: f64, to_jd: f64, ra_deg: f64, dec_deg: f64) -> (f64, f64) {
        let (ra2000, dec2000) = if negligible(from_jd) {
            (ra_deg, dec_deg)
        } else {
            let (zeta, z, theta) = angles(from_jd);
            let a = sin(ra_deg - z) * cos(dec_deg);
            let b = cos(ra_deg - z) * cos(theta) * cos(dec_deg) + sin(theta) * sin(dec_deg);
            let c = -cos(ra_deg - z) * sin(theta) * cos(dec_deg) + cos(theta) * sin(dec_deg);
            (
                (a.atan2(b).to_degrees() - zeta).rem_euclid(360.0),
                c.asin().to_degrees(),
            )
        };

        if negligible(to_jd) {
            return (ra2000, dec2000);
        }
        let (zeta, z, theta) = angles(to_jd);
        let a = sin(ra2000 + zeta) * cos(dec2000);
        let b = cos(ra2000 + zeta) * cos(theta) * cos(dec2000) - sin(theta) * sin(dec2000);
        let c = cos(ra2000 + zeta) * sin(theta) * cos(dec2000) + cos(theta) * sin(dec2000);
        (
            (a.atan2(b).to_degrees() + z).rem_euclid(360.0),
            c.asin().to_degrees(),
        )
    }

    fn heliocentric(&self, jd: f64, ra_deg: f64, dec_deg: f64) -> f64 {
        let (ra, dec) = self.precess(J2000, jd, ra_deg, dec_deg);
        let (cdec, sdec) = (cos(dec), sin(dec));
        let (cra, sra) = (cos(ra), sin(ra));

        // low precision solar position
        let n = jd - 2_451_545.0;
        let e = 23.439 - 0.000_000_4 * n;
        let g = 357.528 + 0.985_600_3 * n;
        let mean_l = 280.461 + 0.985_647_4 * n;
        let l = mean_l + 1.915 * sin(g) + 0.02 * sin(2.0 * g);
        let r = 1.000_14 - 0.016_71 * cos(g) - 0.000_14 * cos(2.0 * g);
        let x = r * cos(l);
        let y = r * cos(e) * sin(l);

        let delta = 0.005_775_5 * (cdec * cra * x + (cdec * sra + e.to_radians().tan() * sdec) * y);
        jd - delta
    }
}
