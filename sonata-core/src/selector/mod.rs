//! `OrderedTargetSelector`: picks the best available target for an
//! activity from the catalog (spec §4.9, C10).

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::model::target::{
    distance_light_years, is_available, ApparentPosition, AvoidanceBodies, LinearPrecessionResolver,
    NoAvoidanceBodies, PositionResolver, SiteLocation, Target,
};

/// Errors raised while selecting a target.
#[derive(Debug, Error, PartialEq)]
pub enum SelectorError {
    #[error("no catalog target satisfies the selector's constraints")]
    NoTargetAvailable,
}

/// One multiplicative term of the selector's merit score (spec §4.9,
/// "merit factors combine multiplicatively").
pub trait MeritFactor: Send + Sync {
    fn factor(&self, site: &SiteLocation, position: &ApparentPosition, prefer_rising: bool) -> f64;
}

/// Favors targets closer to the site's zenith, within the avoidance band
/// the constraints already exclude; never reaches zero so it only scales
/// the ranking, not the pass/fail decision.
struct ZenithProximityFactor;

impl MeritFactor for ZenithProximityFactor {
    fn factor(&self, site: &SiteLocation, position: &ApparentPosition, _prefer_rising: bool) -> f64 {
        let zenith_distance = (position.dec_rads - site.latitude_rads).abs();
        1.0 / (1.0 + zenith_distance)
    }
}

/// Small multiplicative bonus for targets east of the meridian when the
/// strategy is in "auto-rise" mode (spec §4.7).
struct RisingBonusFactor;

impl MeritFactor for RisingBonusFactor {
    fn factor(&self, _site: &SiteLocation, _position: &ApparentPosition, prefer_rising: bool) -> f64 {
        if prefer_rising {
            1.05
        } else {
            1.0
        }
    }
}

/// Visibility, merit, and separation constraints the selector applies
/// before ranking candidates (spec §4.9).
#[derive(Clone, Debug)]
pub struct SelectorConstraints {
    pub site: SiteLocation,
    /// Minimum remaining above-horizon time a target must have, in seconds.
    pub required_uptime_secs: f64,
    /// Minimum angular separation from every already-selected target, in
    /// radians, so two beams never get pointed at the same source.
    pub min_separation_rads: f64,
    /// Targets within this many radians of the site's zenith are excluded
    /// (alt-az tracking keyhole).
    pub zenith_avoidance_rads: f64,
    /// Targets within this many radians of the Sun are excluded.
    pub sun_avoidance_rads: f64,
    /// Targets within this many radians of the Moon are excluded.
    pub moon_avoidance_rads: f64,
    /// Declination of the geostationary satellite belt as seen from this
    /// site, fixed for a given latitude.
    pub geosat_dec_rads: f64,
    /// Targets within this many radians of the geostationary belt's
    /// declination are excluded.
    pub geosat_avoidance_rads: f64,
    pub dec_limit_lower_rads: f64,
    pub dec_limit_upper_rads: f64,
    /// Targets farther than this are excluded as outside the survey's
    /// science case.
    pub max_distance_light_years: f64,
    /// Smallest single detector's bandwidth, in MHz.
    pub smallest_dx_bandwidth_mhz: f64,
    /// Fraction (0.0-1.0) of `total_bandwidth_mhz` that must remain
    /// unobserved for a target to still be worth visiting.
    pub min_dx_percent: f64,
    pub total_bandwidth_mhz: f64,
    /// Times a target may be skipped by the constraints below before it is
    /// forced through regardless (spec §4.9, fairness/rotation guard).
    pub wait_target_complete: u32,
}

impl Default for SelectorConstraints {
    fn default() -> Self {
        Self {
            site: SiteLocation {
                longitude_rads: -2.043,
                latitude_rads: 0.690,
                horizon_rads: 0.1745,
            },
            required_uptime_secs: 600.0,
            min_separation_rads: 0.01,
            zenith_avoidance_rads: 0.0349, // ~2 degrees
            sun_avoidance_rads: 0.262,     // ~15 degrees
            moon_avoidance_rads: 0.0873,   // ~5 degrees
            geosat_dec_rads: -0.15,
            geosat_avoidance_rads: 0.0524, // ~3 degrees
            dec_limit_lower_rads: -0.35,
            dec_limit_upper_rads: 1.55,
            max_distance_light_years: 1_000.0,
            smallest_dx_bandwidth_mhz: 1.0,
            min_dx_percent: 0.1,
            total_bandwidth_mhz: 100.0,
            wait_target_complete: 3,
        }
    }
}

/// Why a candidate, otherwise above the horizon, was excluded from
/// ranking — tracked so `wait_target_complete` can force a repeatedly
/// skipped target through.
enum Rejection {
    Avoidance,
    DecLimit,
    Distance,
    Bandwidth,
    Separation,
}

/// Ranks catalog targets by observing merit and returns the best one that
/// satisfies visibility, avoidance, and separation constraints.
pub struct OrderedTargetSelector {
    constraints: SelectorConstraints,
    resolver: Box<dyn PositionResolver>,
    avoidance: Box<dyn AvoidanceBodies>,
    merit_factors: Vec<Box<dyn MeritFactor>>,
    skip_counts: Mutex<HashMap<i64, u32>>,
}

impl OrderedTargetSelector {
    pub fn new(constraints: SelectorConstraints) -> Self {
        Self {
            constraints,
            resolver: Box::new(LinearPrecessionResolver),
            avoidance: Box::new(NoAvoidanceBodies),
            merit_factors: vec![Box::new(ZenithProximityFactor), Box::new(RisingBonusFactor)],
            skip_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the position resolver, for tests or alternate ephemeris
    /// backends.
    pub fn with_resolver(mut self, resolver: Box<dyn PositionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the Sun/Moon position source, for tests or a real
    /// ephemeris backend.
    pub fn with_avoidance(mut self, avoidance: Box<dyn AvoidanceBodies>) -> Self {
        self.avoidance = avoidance;
        self
    }

    /// Replaces the multiplicative merit-factor list (spec §4.9).
    pub fn with_merit_factors(mut self, factors: Vec<Box<dyn MeritFactor>>) -> Self {
        self.merit_factors = factors;
        self
    }

    /// Selects the best target in `catalog`. When `prefer_rising` is set
    /// (the "auto-rise" mode of spec §4.7), ties are broken toward targets
    /// closer to their rise time rather than merit alone.
    pub fn select(&self, catalog: &[Target], prefer_rising: bool) -> Result<Target, SelectorError> {
        self.select_separated(catalog, &[], prefer_rising)
    }

    /// Picks the best target from `catalog` that is separated by at least
    /// `min_separation_rads` from every position in `already_selected`.
    pub fn select_separated(
        &self,
        catalog: &[Target],
        already_selected: &[ApparentPosition],
        prefer_rising: bool,
    ) -> Result<Target, SelectorError> {
        let now = chrono::Utc::now();
        let sun = self.avoidance.sun(now);
        let moon = self.avoidance.moon(now);

        let mut ranked: Vec<(Target, f64)> = Vec::new();
        let mut rejected: Vec<(Target, Rejection)> = Vec::new();

        for target in catalog {
            let Some(position) = self.resolver.resolve(target, now) else {
                continue;
            };
            if !is_available(&self.constraints.site, &position, 0.0, self.constraints.required_uptime_secs) {
                continue;
            }

            if let Some(rejection) = self.reject(&position, target, already_selected, &sun, &moon) {
                rejected.push((target.clone(), rejection));
                continue;
            }

            let merit = self.merit(&position, prefer_rising);
            ranked.push((target.clone(), merit));
        }

        if let Some(forced) = self.force_repeatedly_skipped(&rejected) {
            self.reset_skip(forced.target_id);
            return Ok(forced);
        }
        for (target, _) in &rejected {
            self.bump_skip(target.target_id);
        }

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let chosen = ranked.into_iter().next().map(|(t, _)| t).ok_or(SelectorError::NoTargetAvailable)?;
        self.reset_skip(chosen.target_id);
        Ok(chosen)
    }

    /// Returns `Some(reason)` if `position` fails any constraint short of
    /// hard visibility, `None` if the candidate is fully eligible.
    fn reject(
        &self,
        position: &ApparentPosition,
        target: &Target,
        already_selected: &[ApparentPosition],
        sun: &ApparentPosition,
        moon: &ApparentPosition,
    ) -> Option<Rejection> {
        let c = &self.constraints;

        if (position.dec_rads - c.site.latitude_rads).abs() < c.zenith_avoidance_rads {
            return Some(Rejection::Avoidance);
        }
        if angular_separation(position, sun) < c.sun_avoidance_rads {
            return Some(Rejection::Avoidance);
        }
        if angular_separation(position, moon) < c.moon_avoidance_rads {
            return Some(Rejection::Avoidance);
        }
        if (position.dec_rads - c.geosat_dec_rads).abs() < c.geosat_avoidance_rads {
            return Some(Rejection::Avoidance);
        }

        if position.dec_rads < c.dec_limit_lower_rads || position.dec_rads > c.dec_limit_upper_rads {
            return Some(Rejection::DecLimit);
        }

        if let Some(distance_ly) = distance_light_years(target) {
            if distance_ly > c.max_distance_light_years {
                return Some(Rejection::Distance);
            }
        }

        let remaining_bandwidth_mhz = (c.total_bandwidth_mhz - target.observed_bandwidth_mhz).max(0.0);
        if remaining_bandwidth_mhz < c.smallest_dx_bandwidth_mhz || remaining_bandwidth_mhz < c.min_dx_percent * c.total_bandwidth_mhz {
            return Some(Rejection::Bandwidth);
        }

        if already_selected.iter().any(|other| angular_separation(position, other) < c.min_separation_rads) {
            return Some(Rejection::Separation);
        }

        None
    }

    /// If any rejected candidate has been skipped `wait_target_complete`
    /// times already, force it through regardless of why it was rejected.
    fn force_repeatedly_skipped(&self, rejected: &[(Target, Rejection)]) -> Option<Target> {
        let counts = self.skip_counts.lock();
        rejected
            .iter()
            .find(|(target, _)| counts.get(&target.target_id).copied().unwrap_or(0) + 1 >= self.constraints.wait_target_complete)
            .map(|(target, _)| target.clone())
    }

    fn bump_skip(&self, target_id: i64) {
        *self.skip_counts.lock().entry(target_id).or_insert(0) += 1;
    }

    fn reset_skip(&self, target_id: i64) {
        self.skip_counts.lock().remove(&target_id);
    }

    /// Resolves `target`'s current apparent position and checks only the
    /// availability constraint (rise/set at the site, above the required
    /// uptime), without applying the fuller avoidance/separation/bandwidth
    /// constraints `select` enforces during automatic selection. This is
    /// the check a strategy runs against an operator-pinned target ID
    /// (spec §4.5, "target validation").
    pub fn validate_available(&self, target: &Target) -> bool {
        let now = chrono::Utc::now();
        match self.resolver.resolve(target, now) {
            Some(position) => is_available(&self.constraints.site, &position, 0.0, self.constraints.required_uptime_secs),
            None => false,
        }
    }

    /// Combines this selector's merit factors multiplicatively (spec §4.9).
    fn merit(&self, position: &ApparentPosition, prefer_rising: bool) -> f64 {
        self.merit_factors
            .iter()
            .map(|factor| factor.factor(&self.constraints.site, position, prefer_rising))
            .product()
    }
}

/// Great-circle angular separation between two sky positions, in radians.
fn angular_separation(a: &ApparentPosition, b: &ApparentPosition) -> f64 {
    let cos_sep = a.dec_rads.sin() * b.dec_rads.sin()
        + a.dec_rads.cos() * b.dec_rads.cos() * (a.ra_rads - b.ra_rads).cos();
    cos_sep.clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn target(id: i64, dec: f64) -> Target {
        Target {
            target_id: id,
            ra2000_rads: 0.0,
            dec2000_rads: dec,
            pm_ra: 0.0,
            pm_dec: 0.0,
            parallax: 0.0,
            is_moving: false,
            ephemeris_file: None,
            observed_bandwidth_mhz: 0.0,
        }
    }

    #[test]
    fn selects_the_target_closest_to_zenith() {
        let selector = OrderedTargetSelector::new(SelectorConstraints::default());
        let catalog = vec![target(1, 0.2), target(2, 0.65), target(3, -0.9)];
        let chosen = selector.select(&catalog, false).unwrap();
        assert_eq!(chosen.target_id, 2);
    }

    #[test]
    fn never_rising_targets_are_excluded() {
        let selector = OrderedTargetSelector::new(SelectorConstraints::default());
        let catalog = vec![target(1, -1.55)];
        let err = selector.select(&catalog, false).unwrap_err();
        assert_eq!(err, SelectorError::NoTargetAvailable);
    }

    #[test]
    fn separation_constraint_excludes_nearby_targets() {
        let constraints = SelectorConstraints {
            min_separation_rads: 0.5,
            wait_target_complete: 100,
            ..SelectorConstraints::default()
        };
        let selector = OrderedTargetSelector::new(constraints);
        let catalog = vec![target(1, 0.65), target(2, 0.651)];
        let already = vec![ApparentPosition { ra_rads: 0.0, dec_rads: 0.65 }];
        let chosen = selector.select_separated(&catalog, &already, false);
        assert_eq!(chosen, Err(SelectorError::NoTargetAvailable));
    }

    #[test]
    fn empty_catalog_yields_no_target_available() {
        let selector = OrderedTargetSelector::new(SelectorConstraints::default());
        assert_eq!(selector.select(&[], false), Err(SelectorError::NoTargetAvailable));
    }

    #[test]
    fn exact_zenith_target_is_excluded_by_keyhole_avoidance() {
        let selector = OrderedTargetSelector::new(SelectorConstraints {
            wait_target_complete: 100,
            ..SelectorConstraints::default()
        });
        let catalog = vec![target(1, 0.690)];
        assert_eq!(selector.select(&catalog, false), Err(SelectorError::NoTargetAvailable));
    }

    #[test]
    fn target_outside_declination_limits_is_excluded() {
        let selector = OrderedTargetSelector::new(SelectorConstraints {
            wait_target_complete: 100,
            ..SelectorConstraints::default()
        });
        let catalog = vec![target(1, 1.56)]; // above dec_limit_upper_rads
        assert_eq!(selector.select(&catalog, false), Err(SelectorError::NoTargetAvailable));
    }

    #[test]
    fn target_beyond_the_light_year_limit_is_excluded() {
        let selector = OrderedTargetSelector::new(SelectorConstraints {
            max_distance_light_years: 10.0,
            wait_target_complete: 100,
            ..SelectorConstraints::default()
        });
        let mut far = target(1, 0.2);
        far.parallax = 0.01; // ~326 ly
        assert_eq!(selector.select(&[far], false), Err(SelectorError::NoTargetAvailable));
    }

    #[test]
    fn target_with_insufficient_remaining_bandwidth_is_excluded() {
        let selector = OrderedTargetSelector::new(SelectorConstraints {
            total_bandwidth_mhz: 100.0,
            min_dx_percent: 0.5,
            wait_target_complete: 100,
            ..SelectorConstraints::default()
        });
        let mut surveyed = target(1, 0.2);
        surveyed.observed_bandwidth_mhz = 80.0; // only 20 MHz left, below 50% floor
        assert_eq!(selector.select(&[surveyed], false), Err(SelectorError::NoTargetAvailable));
    }

    #[test]
    fn sun_avoidance_excludes_a_target_on_top_of_the_sun() {
        struct FixedSun;
        impl AvoidanceBodies for FixedSun {
            fn sun(&self, _at: DateTime<Utc>) -> ApparentPosition {
                ApparentPosition { ra_rads: 0.0, dec_rads: 0.2 }
            }
            fn moon(&self, _at: DateTime<Utc>) -> ApparentPosition {
                ApparentPosition { ra_rads: 3.0, dec_rads: -1.5 }
            }
        }
        let selector = OrderedTargetSelector::new(SelectorConstraints {
            wait_target_complete: 100,
            ..SelectorConstraints::default()
        })
        .with_avoidance(Box::new(FixedSun));
        let catalog = vec![target(1, 0.2)];
        assert_eq!(selector.select(&catalog, false), Err(SelectorError::NoTargetAvailable));
    }

    #[test]
    fn a_target_skipped_wait_target_complete_times_is_forced_through() {
        // dec 1.56 is outside the default upper dec limit, so this target
        // is rejected every call until its skip count reaches the
        // threshold (spec §4.9).
        let selector = OrderedTargetSelector::new(SelectorConstraints {
            wait_target_complete: 3,
            ..SelectorConstraints::default()
        });
        let catalog = vec![target(9, 1.56)];
        assert_eq!(selector.select(&catalog, false), Err(SelectorError::NoTargetAvailable));
        assert_eq!(selector.select(&catalog, false), Err(SelectorError::NoTargetAvailable));
        let chosen = selector.select(&catalog, false).unwrap();
        assert_eq!(chosen.target_id, 9);
    }

    #[test]
    fn validate_available_ignores_avoidance_and_separation() {
        // dec 0.690 is excluded from ranking by zenith-keyhole avoidance,
        // but bare availability validation only cares about rise/set.
        let selector = OrderedTargetSelector::new(SelectorConstraints::default());
        assert!(selector.validate_available(&target(1, 0.690)));
        assert!(!selector.validate_available(&target(2, -1.55)));
    }
}
