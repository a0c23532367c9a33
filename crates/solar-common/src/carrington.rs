//! Carrington rotations.
//!
//! A rotation starts when the central meridian of the disk, as seen from
//! Earth, crosses Carrington longitude zero. The fractional rotation count
//! therefore comes from the Sun's central meridian longitude `L0` (Meeus,
//! *Astronomical Algorithms*, ch. 29), not from a linear mean period: the
//! Earth's eccentric orbit moves rotation starts by up to a few hours
//! either side of the mean.

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::error::{SolarError, SolarResult};

/// Julian day of the Unix epoch.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Start of rotation 1 (1853 Nov 9), Julian ephemeris day.
const FIRST_ROTATION_JDE: f64 = 2_398_167.4;

/// Mean synodic rotation period in days.
const MEAN_SYNODIC_PERIOD: f64 = 27.2753;

/// TT − TAI, seconds.
const TT_MINUS_TAI: f64 = 32.184;

/// TAI − UTC from the first day of each listed month onwards.
const LEAP_SECONDS: [(i32, u32, f64); 28] = [
    (1972, 1, 10.0),
    (1972, 7, 11.0),
    (1973, 1, 12.0),
    (1974, 1, 13.0),
    (1975, 1, 14.0),
    (1976, 1, 15.0),
    (1977, 1, 16.0),
    (1978, 1, 17.0),
    (1979, 1, 18.0),
    (1980, 1, 19.0),
    (1981, 7, 20.0),
    (1982, 7, 21.0),
    (1983, 7, 22.0),
    (1985, 7, 23.0),
    (1988, 1, 24.0),
    (1990, 1, 25.0),
    (1991, 1, 26.0),
    (1992, 7, 27.0),
    (1993, 7, 28.0),
    (1994, 7, 29.0),
    (1996, 1, 30.0),
    (1997, 7, 31.0),
    (1999, 1, 32.0),
    (2006, 1, 33.0),
    (2009, 1, 34.0),
    (2012, 7, 35.0),
    (2015, 7, 36.0),
    (2017, 1, 37.0),
];

/// Refinement stops once the count is within this many rotations (~2 ms).
const REFINE_TOLERANCE: f64 = 1e-9;

const MAX_REFINEMENTS: usize = 16;

/// Backward step used to land at or before the requested count.
const SETTLE_STEP_MS: i64 = 1;

/// TT − UTC at `t`, seconds. Before 1972 the first tabulated offset is used.
fn tt_minus_utc(t: &DateTime<Utc>) -> f64 {
    let month = (t.year(), t.month());
    let tai_minus_utc = LEAP_SECONDS
        .iter()
        .rev()
        .find(|(year, start, _)| month >= (*year, *start))
        .map(|(_, _, offset)| *offset)
        .unwrap_or(LEAP_SECONDS[0].2);
    tai_minus_utc + TT_MINUS_TAI
}

fn julian_day(t: &DateTime<Utc>) -> f64 {
    let seconds = t.timestamp() as f64 + t.timestamp_subsec_nanos() as f64 * 1e-9;
    seconds / 86_400.0 + UNIX_EPOCH_JD
}

/// Julian ephemeris day (TT) of a UTC instant.
fn julian_ephemeris_day(t: &DateTime<Utc>) -> f64 {
    julian_day(t) + tt_minus_utc(t) / 86_400.0
}

fn from_julian_day(jd: f64) -> Option<DateTime<Utc>> {
    let seconds = (jd - UNIX_EPOCH_JD) * 86_400.0;
    if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    let (whole, nanos) = if nanos >= 1_000_000_000 {
        (whole + 1.0, 0)
    } else {
        (whole, nanos)
    };
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Apparent geocentric longitude of the Sun in degrees, corrected for
/// aberration but not nutation (Meeus, ch. 25, low accuracy).
fn solar_longitude(jde: f64) -> f64 {
    let t = (jde - 2_451_545.0) / 36_525.0;
    let mean_longitude = 280.466_46 + 36_000.769_83 * t + 0.000_303_2 * t * t;
    let mean_anomaly = 357.529_11 + 35_999.050_29 * t - 0.000_153_7 * t * t;
    let eccentricity = 0.016_708_634 - 0.000_042_037 * t - 0.000_000_126_7 * t * t;

    let m = mean_anomaly.to_radians();
    let center = (1.914_602 - 0.004_817 * t - 0.000_014 * t * t) * m.sin()
        + (0.019_993 - 0.000_101 * t) * (2.0 * m).sin()
        + 0.000_289 * (3.0 * m).sin();

    let true_longitude = mean_longitude + center;
    let true_anomaly = (mean_anomaly + center).to_radians();
    let distance_au = 1.000_001_018 * (1.0 - eccentricity * eccentricity)
        / (1.0 + eccentricity * true_anomaly.cos());

    true_longitude - 0.005_691_6 / distance_au
}

/// Carrington longitude of the central meridian, degrees in `[0, 360)`.
fn central_meridian_longitude(jde: f64) -> f64 {
    let theta = (jde - 2_398_220.0) * 360.0 / 25.38;
    let inclination = 7.25_f64.to_radians();
    let node = 73.6667 + 1.395_833_3 * (jde - 2_396_758.0) / 36_525.0;

    let arg = (solar_longitude(jde) - node).to_radians();
    let eta = (-arg.sin() * inclination.cos())
        .atan2(-arg.cos())
        .to_degrees();

    (eta - theta).rem_euclid(360.0)
}

/// Carrington longitude of the disk centre seen from Earth at `t`, degrees.
pub fn carrington_longitude(t: &DateTime<Utc>) -> f64 {
    central_meridian_longitude(julian_ephemeris_day(t))
}

/// Continuous Carrington rotation count at `t`.
///
/// The integer part is the rotation in progress and the fraction is
/// `1 − L0/360`. A mean-period estimate only picks the integer part.
pub fn carrington_rotation_number(t: &DateTime<Utc>) -> f64 {
    let jde = julian_ephemeris_day(t);
    let estimate = (jde - FIRST_ROTATION_JDE) / MEAN_SYNODIC_PERIOD + 1.0;
    let fraction = (1.0 - central_meridian_longitude(jde) / 360.0).rem_euclid(1.0);

    let mut whole = estimate.floor();
    let drift = fraction - (estimate - whole);
    if drift > 0.5 {
        whole -= 1.0;
    } else if drift < -0.5 {
        whole += 1.0;
    }
    whole + fraction
}

/// Time at which the (possibly fractional) rotation count `rotation` is reached.
///
/// Starts from the mean-period estimate and corrects it against
/// [`carrington_rotation_number`] until the two agree to a few
/// milliseconds. The returned instant never has a count above `rotation`,
/// so `carrington_rotation_number(carrington_rotation_time(n)?) <= n`.
pub fn carrington_rotation_time(rotation: f64) -> SolarResult<DateTime<Utc>> {
    let invalid = || SolarError::InvalidRotation(rotation.to_string());
    if !rotation.is_finite() || rotation < 0.0 {
        return Err(invalid());
    }

    let jde = FIRST_ROTATION_JDE + (rotation - 1.0) * MEAN_SYNODIC_PERIOD;
    let guess = from_julian_day(jde).ok_or_else(invalid)?;
    let mut t = shift(guess, -tt_minus_utc(&guess) * 1e9).ok_or_else(invalid)?;

    for _ in 0..MAX_REFINEMENTS {
        let delta = rotation - carrington_rotation_number(&t);
        if delta.abs() < REFINE_TOLERANCE {
            break;
        }
        t = shift(t, delta * MEAN_SYNODIC_PERIOD * 86_400e9).ok_or_else(invalid)?;
    }

    for _ in 0..MAX_REFINEMENTS {
        if carrington_rotation_number(&t) <= rotation {
            break;
        }
        t = t
            .checked_sub_signed(Duration::milliseconds(SETTLE_STEP_MS))
            .ok_or_else(invalid)?;
    }
    Ok(t)
}

fn shift(t: DateTime<Utc>, nanos: f64) -> Option<DateTime<Utc>> {
    if !nanos.is_finite() || nanos.abs() > i64::MAX as f64 {
        return None;
    }
    t.checked_add_signed(Duration::nanoseconds(nanos.round() as i64))
}

/// Rotation whose synoptic map covers `t`: the rotation count rounded up.
///
/// An instant exactly at a rotation start belongs to that rotation, so
/// `synoptic_rotation(&carrington_rotation_time(n as f64)?)` is `n`.
pub fn synoptic_rotation(t: &DateTime<Utc>) -> SolarResult<u32> {
    let count = carrington_rotation_number(t);
    let rotation = count.ceil();
    if rotation < 1.0 || rotation > u32::MAX as f64 {
        return Err(SolarError::InvalidRotation(count.to_string()));
    }
    Ok(rotation as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_leap_second_offsets() {
        assert_eq!(tt_minus_utc(&utc(1960, 1, 1, 0, 0, 0)), 42.184);
        assert_eq!(tt_minus_utc(&utc(2015, 6, 30, 23, 0, 0)), 67.184);
        assert_eq!(tt_minus_utc(&utc(2015, 7, 1, 0, 0, 0)), 68.184);
        assert_eq!(tt_minus_utc(&utc(2024, 6, 29, 0, 0, 0)), 69.184);
    }

    #[test]
    fn test_central_meridian_longitude_meeus_example() {
        // Meeus example 29.a: 1992 October 13.0 TD, L0 = 238.63 degrees.
        let l0 = central_meridian_longitude(2_448_908.5);
        assert!((l0 - 238.63).abs() < 0.02, "L0 = {l0}");
    }

    #[test]
    fn test_rotation_1699_start_meeus_example() {
        // Meeus example 29.b: rotation 1699 starts at JDE 2444480.7230.
        let t = carrington_rotation_time(1699.0).unwrap();
        let jde = julian_ephemeris_day(&t);
        assert!((jde - 2_444_480.723).abs() * 1440.0 < 3.0, "JDE = {jde}");
    }

    #[test]
    fn test_published_rotation_start_dates() {
        for (rotation, (y, m, d)) in [
            (2000.0, (2003, 2, 20)),
            (2100.0, (2010, 8, 9)),
            (2157.0, (2014, 11, 11)),
            (2286.0, (2024, 6, 29)),
        ] {
            let t = carrington_rotation_time(rotation).unwrap();
            assert_eq!(t.date_naive(), chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap());
        }
    }

    #[test]
    fn test_longitude_is_zero_at_rotation_start() {
        let t = carrington_rotation_time(2286.0).unwrap();
        let l0 = carrington_longitude(&t);
        let offset = l0.min(360.0 - l0);
        assert!(offset < 1e-4, "L0 = {l0}");
    }

    #[test]
    fn test_rotation_number_is_monotonic() {
        let a = utc(2015, 3, 11, 0, 0, 0);
        let b = a + Duration::hours(1);
        assert!(carrington_rotation_number(&b) > carrington_rotation_number(&a));
        assert_eq!(carrington_rotation_number(&a).floor(), 2161.0);
    }

    #[test]
    fn test_time_inverts_number() {
        for rotation in [1699.25, 2157.5, 2285.1, 2300.9] {
            let t = carrington_rotation_time(rotation).unwrap();
            assert!((carrington_rotation_number(&t) - rotation).abs() < 1e-8);
        }
    }

    #[test]
    fn test_synoptic_rotation_rounds_up() {
        let t = carrington_rotation_time(2285.1).unwrap();
        assert_eq!(synoptic_rotation(&t).unwrap(), 2286);

        let t = carrington_rotation_time(2285.999).unwrap();
        assert_eq!(synoptic_rotation(&t).unwrap(), 2286);
    }

    #[test]
    fn test_synoptic_rotation_inverse_round_trip() {
        for n in [2000u32, 2157, 2286, 2301] {
            let t = carrington_rotation_time(n as f64).unwrap();
            assert_eq!(synoptic_rotation(&t).unwrap(), n);
        }
    }

    #[test]
    fn test_seconds_after_start_belong_to_next_map() {
        let start = carrington_rotation_time(2286.0).unwrap();
        assert_eq!(synoptic_rotation(&(start + Duration::seconds(1))).unwrap(), 2287);
        assert_eq!(synoptic_rotation(&(start - Duration::seconds(1))).unwrap(), 2286);
    }

    #[test]
    fn test_start_follows_true_longitude_not_mean_period() {
        // The mean-period start of 2157 is near 09:37 UTC; the disk centre
        // crossed longitude zero around 07:09, so 08:00 is already in 2158.
        let start = carrington_rotation_time(2157.0).unwrap();
        assert_eq!(start.hour(), 7);
        assert_eq!(synoptic_rotation(&utc(2014, 11, 11, 8, 0, 0)).unwrap(), 2158);
        assert_eq!(synoptic_rotation(&utc(2014, 11, 11, 6, 30, 0)).unwrap(), 2157);
    }

    #[test]
    fn test_invalid_rotation() {
        assert!(carrington_rotation_time(f64::NAN).is_err());
        assert!(carrington_rotation_time(-3.0).is_err());
    }
}
