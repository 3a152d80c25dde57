//! Target records and the pure astronomy functions the core calls into.
//!
//! Site-survey astronomy (precession, rise/set, beamsize) is out of scope
//! per spec §1 — this module defines the narrow pure-function surface the
//! rest of the core calls, so a real ephemeris/astrometry library can be
//! substituted without touching the control-plane logic.

use chrono::{DateTime, Utc};

/// A catalog target: fixed or moving.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    pub target_id: i64,
    pub ra2000_rads: f64,
    pub dec2000_rads: f64,
    pub pm_ra: f64,
    pub pm_dec: f64,
    /// Parallax in arcseconds; `<= 0.0` means unknown/unmeasured.
    pub parallax: f64,
    pub is_moving: bool,
    pub ephemeris_file: Option<String>,
    /// Sky bandwidth already surveyed for this target across prior
    /// activities, used by the selector's remaining-bandwidth constraint
    /// (spec §4.9).
    pub observed_bandwidth_mhz: f64,
}

/// Distance to `target` in light-years, from its parallax in arcseconds.
/// Returns `None` when the parallax is unmeasured (`<= 0.0`), in which
/// case the selector's light-year limit does not apply to it.
pub fn distance_light_years(target: &Target) -> Option<f64> {
    if target.parallax <= 0.0 {
        return None;
    }
    const LY_PER_PARSEC: f64 = 3.261_56;
    Some((1.0 / target.parallax) * LY_PER_PARSEC)
}

/// Positions of bodies the selector must keep clear of (spec §4.9): the
/// Sun and Moon. An external collaborator per spec §1 — the actual
/// ephemeris math lives outside the core; this is the seam it plugs into.
pub trait AvoidanceBodies: Send + Sync {
    fn sun(&self, at: DateTime<Utc>) -> ApparentPosition;
    fn moon(&self, at: DateTime<Utc>) -> ApparentPosition;
}

/// Stand-in used until a real ephemeris is wired in: places both bodies
/// permanently below the horizon so avoidance never excludes a target.
#[derive(Default)]
pub struct NoAvoidanceBodies;

impl AvoidanceBodies for NoAvoidanceBodies {
    fn sun(&self, _at: DateTime<Utc>) -> ApparentPosition {
        ApparentPosition { ra_rads: 0.0, dec_rads: -std::f64::consts::FRAC_PI_2 }
    }

    fn moon(&self, _at: DateTime<Utc>) -> ApparentPosition {
        ApparentPosition { ra_rads: 0.0, dec_rads: -std::f64::consts::FRAC_PI_2 }
    }
}

/// Apparent sky position at a given time, after precession/ephemeris
/// resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApparentPosition {
    pub ra_rads: f64,
    pub dec_rads: f64,
}

/// Resolves a target's apparent position at `at`.
///
/// Fixed targets are precessed by proper motion to the current epoch;
/// moving targets are resolved by interpolation against their ephemeris
/// file. The actual precession/ephemeris math is an external
/// collaborator (spec §1); this function is the seam it plugs into.
pub trait PositionResolver: Send + Sync {
    /// Resolves `target`'s apparent position at time `at`.
    fn resolve(&self, target: &Target, at: DateTime<Utc>) -> Option<ApparentPosition>;
}

/// A resolver that applies linear proper-motion precession for fixed
/// targets and refuses to resolve moving targets (a stand-in for the
/// external ephemeris library named in spec §1).
#[derive(Default)]
pub struct LinearPrecessionResolver;

/// Julian years per second, used to scale proper motion (rad/yr) to the
/// elapsed time between the J2000 epoch and `at`.
const SECONDS_PER_JULIAN_YEAR: f64 = 365.25 * 86400.0;

impl PositionResolver for LinearPrecessionResolver {
    fn resolve(&self, target: &Target, at: DateTime<Utc>) -> Option<ApparentPosition> {
        if target.is_moving {
            // Ephemeris interpolation belongs to the external astrometry
            // library; this stand-in cannot resolve moving targets.
            return None;
        }
        let j2000 = DateTime::parse_from_rfc3339("2000-01-01T12:00:00Z")
            .expect("valid constant timestamp")
            .with_timezone(&Utc);
        let elapsed_years = (at - j2000).num_seconds() as f64 / SECONDS_PER_JULIAN_YEAR;
        Some(ApparentPosition {
            ra_rads: target.ra2000_rads + target.pm_ra * elapsed_years,
            dec_rads: target.dec2000_rads + target.pm_dec * elapsed_years,
        })
    }
}

/// Site geographic location, used for horizon/visibility calculations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SiteLocation {
    pub longitude_rads: f64,
    pub latitude_rads: f64,
    pub horizon_rads: f64,
}

/// Pure function: hour angle at which `position` crosses the site horizon,
/// or `None` if the target never rises or never sets at this declination
/// and latitude (circumpolar or always-below-horizon).
///
/// `cos(H) = (sin(horizon) - sin(lat)*sin(dec)) / (cos(lat)*cos(dec))`
pub fn horizon_hour_angle(site: &SiteLocation, position: &ApparentPosition) -> Option<f64> {
    let num = site.horizon_rads.sin() - site.latitude_rads.sin() * position.dec_rads.sin();
    let den = site.latitude_rads.cos() * position.dec_rads.cos();
    if den.abs() < f64::EPSILON {
        return None;
    }
    let cos_h = num / den;
    if !(-1.0..=1.0).contains(&cos_h) {
        return None;
    }
    Some(cos_h.acos())
}

/// Remaining above-horizon time, in seconds, for a target currently at
/// `current_hour_angle_rads` east/west of the meridian.
///
/// Returns `None` if the target never rises (perpetually below horizon).
/// Returns `f64::INFINITY` for circumpolar targets.
pub fn remaining_uptime_secs(
    site: &SiteLocation,
    position: &ApparentPosition,
    current_hour_angle_rads: f64,
) -> Option<f64> {
    let num = site.horizon_rads.sin() - site.latitude_rads.sin() * position.dec_rads.sin();
    let den = site.latitude_rads.cos() * position.dec_rads.cos();
    if den.abs() < f64::EPSILON {
        return if num <= 0.0 { Some(f64::INFINITY) } else { None };
    }
    let cos_h = num / den;
    if cos_h <= -1.0 {
        return Some(f64::INFINITY); // circumpolar
    }
    if cos_h >= 1.0 {
        return None; // never rises
    }
    let set_hour_angle = cos_h.acos();
    let remaining_rads = set_hour_angle - current_hour_angle_rads;
    const SIDEREAL_RADS_PER_SEC: f64 = std::f64::consts::TAU / 86164.0905;
    Some((remaining_rads / SIDEREAL_RADS_PER_SEC).max(0.0))
}

/// A target is *available* iff visible above the site horizon and its
/// remaining above-horizon time is at least `setup + data_collection`
/// (spec §3).
pub fn is_available(
    site: &SiteLocation,
    position: &ApparentPosition,
    current_hour_angle_rads: f64,
    required_uptime_secs: f64,
) -> bool {
    match remaining_uptime_secs(site, position, current_hour_angle_rads) {
        Some(remaining) => remaining >= required_uptime_secs,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ata() -> SiteLocation {
        SiteLocation {
            longitude_rads: -2.043_f64,
            latitude_rads: 0.690_f64, // ~ 39.5 deg, roughly the ATA's latitude
            horizon_rads: 0.1745, // 10 degrees
        }
    }

    #[test]
    fn fixed_target_unchanged_at_j2000() {
        let resolver = LinearPrecessionResolver;
        let target = Target {
            target_id: 1,
            ra2000_rads: 1.0,
            dec2000_rads: 0.5,
            pm_ra: 0.0,
            pm_dec: 0.0,
            parallax: 0.0,
            is_moving: false,
            ephemeris_file: None,
            observed_bandwidth_mhz: 0.0,
        };
        let j2000 = DateTime::parse_from_rfc3339("2000-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let pos = resolver.resolve(&target, j2000).unwrap();
        assert!((pos.ra_rads - 1.0).abs() < 1e-9);
        assert!((pos.dec_rads - 0.5).abs() < 1e-9);
    }

    #[test]
    fn moving_target_is_unresolved_by_stand_in() {
        let resolver = LinearPrecessionResolver;
        let target = Target {
            target_id: 2,
            ra2000_rads: 0.0,
            dec2000_rads: 0.0,
            pm_ra: 0.0,
            pm_dec: 0.0,
            parallax: 0.0,
            is_moving: true,
            ephemeris_file: Some("foo.eph".to_string()),
            observed_bandwidth_mhz: 0.0,
        };
        assert!(resolver.resolve(&target, Utc::now()).is_none());
    }

    #[test]
    fn circumpolar_target_is_always_up() {
        let site = ata();
        let pos = ApparentPosition {
            ra_rads: 0.0,
            dec_rads: 1.55, // near celestial pole given the site's latitude
        };
        let remaining = remaining_uptime_secs(&site, &pos, 0.0).unwrap();
        assert!(remaining.is_infinite());
    }

    #[test]
    fn never_rises_target_is_unavailable() {
        let site = ata();
        let pos = ApparentPosition {
            ra_rads: 0.0,
            dec_rads: -1.55, // near the opposite pole
        };
        assert!(remaining_uptime_secs(&site, &pos, 0.0).is_none());
        assert!(!is_available(&site, &pos, 0.0, 60.0));
    }

    #[test]
    fn available_requires_enough_remaining_uptime() {
        let site = ata();
        let pos = ApparentPosition {
            ra_rads: 0.0,
            dec_rads: 0.6,
        };
        let remaining = remaining_uptime_secs(&site, &pos, 0.0).unwrap();
        assert!(is_available(&site, &pos, 0.0, remaining - 1.0));
        assert!(!is_available(&site, &pos, 0.0, remaining + 100.0));
    }

    #[test]
    fn distance_is_unknown_without_a_measured_parallax() {
        let target = Target {
            target_id: 3,
            ra2000_rads: 0.0,
            dec2000_rads: 0.0,
            pm_ra: 0.0,
            pm_dec: 0.0,
            parallax: 0.0,
            is_moving: false,
            ephemeris_file: None,
            observed_bandwidth_mhz: 0.0,
        };
        assert_eq!(distance_light_years(&target), None);
    }

    #[test]
    fn one_arcsecond_parallax_is_one_parsec_away() {
        let target = Target {
            target_id: 4,
            ra2000_rads: 0.0,
            dec2000_rads: 0.0,
            pm_ra: 0.0,
            pm_dec: 0.0,
            parallax: 1.0,
            is_moving: false,
            ephemeris_file: None,
            observed_bandwidth_mhz: 0.0,
        };
        assert!((distance_light_years(&target).unwrap() - 3.261_56).abs() < 1e-6);
    }
}
