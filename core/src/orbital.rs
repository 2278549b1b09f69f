//! Zone registry and orbital mechanics.
//!
//! Transfers use a simplified two-body model around the Sun: delta-v from
//! the closed-form Hohmann transfer, duration from half the transfer
//! ellipse circumference (Ramanujan) over a calibrated cargo speed.

use crate::{
    composite::{divisor_factor, CompositeCategory},
    config::{GameData, ZoneConfig},
    error::TrajectoryError,
    skills::SkillSet,
    types::{Days, ZoneId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Sun's standard gravitational parameter, m³/s².
pub const SUN_MU: f64 = 1.327_124_400_18e20;
/// One astronomical unit, metres.
pub const AU_M: f64 = 1.495_978_707e11;
/// One astronomical unit, kilometres.
pub const AU_KM: f64 = AU_M / 1000.0;

/// Delta-v and duration of a transfer between two zones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferEstimate {
    pub delta_v_km_s: f64,
    pub duration_days: Days,
}

/// Two-leg transfer that swings past an intermediate zone instead of
/// braking into and leaving its orbit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GravityAssistEstimate {
    pub delta_v_km_s: f64,
    pub duration_days: Days,
    /// Burns at the flyby zone that the swing-by replaces.
    pub flyby_savings_km_s: f64,
    /// Single Hohmann transfer between the endpoints, for comparison.
    pub direct_delta_v_km_s: f64,
}

/// Most requests accepted by one `batch_estimates` call.
pub const MAX_TRAJECTORY_BATCH: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRequest {
    pub from_zone: ZoneId,
    pub to_zone: ZoneId,
    #[serde(default)]
    pub via_zone: Option<ZoneId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrajectoryEstimate {
    Direct(TransferEstimate),
    GravityAssist(GravityAssistEstimate),
}

/// Read-only view over the zone list.
#[derive(Debug, Clone)]
pub struct ZoneRegistry {
    zones: Vec<ZoneConfig>,
    cargo_speed_km_day: f64,
}

impl ZoneRegistry {
    pub fn new(data: &GameData) -> Self {
        Self {
            zones: data.zones.clone(),
            cargo_speed_km_day: data.tuning.cargo_speed_km_day,
        }
    }

    /// Absent on miss; callers decide what an unknown zone means.
    pub fn get(&self, id: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn zones(&self) -> &[ZoneConfig] {
        &self.zones
    }

    /// Hohmann delta-v between the two zones, divided by the
    /// delta-v reduction factor. `None` if either zone is unknown.
    pub fn delta_v(&self, from: &str, to: &str, skills: &SkillSet) -> Option<f64> {
        let (a, b) = (self.get(from)?, self.get(to)?);
        if a.id == b.id {
            return Some(0.0);
        }
        let raw = hohmann_delta_v_km_s(a.radius_au, b.radius_au);
        Some(raw / divisor_factor(CompositeCategory::DeltaVReduction, skills))
    }

    /// Transfer time in days, divided by the transfer speed factor.
    pub fn transfer_duration(&self, from: &str, to: &str, skills: &SkillSet) -> Option<Days> {
        let (a, b) = (self.get(from)?, self.get(to)?);
        if a.id == b.id {
            return Some(0.0);
        }
        let arc_km = transfer_arc_au(a.radius_au, b.radius_au) * AU_KM;
        let days = arc_km / self.cargo_speed_km_day;
        Some(days / divisor_factor(CompositeCategory::TransferSpeed, skills))
    }

    pub fn transfer_estimate(&self, from: &str, to: &str, skills: &SkillSet) -> Option<TransferEstimate> {
        Some(TransferEstimate {
            delta_v_km_s: self.delta_v(from, to, skills)?,
            duration_days: self.transfer_duration(from, to, skills)?,
        })
    }

    fn require(&self, id: &str) -> Result<&ZoneConfig, TrajectoryError> {
        self.get(id).ok_or_else(|| TrajectoryError::UnknownZone(id.to_string()))
    }

    /// `from` → `via` → `to`, with the arrival burn at `via` and the
    /// departure burn from it replaced by the flyby.
    pub fn gravity_assist_estimate(
        &self,
        from: &str,
        via: &str,
        to: &str,
        skills: &SkillSet,
    ) -> Result<GravityAssistEstimate, TrajectoryError> {
        let (a, v, b) = (self.require(from)?, self.require(via)?, self.require(to)?);
        if v.id == a.id || v.id == b.id {
            return Err(TrajectoryError::InvalidFlyby(v.id.clone()));
        }
        let reduction = divisor_factor(CompositeCategory::DeltaVReduction, skills);
        let (leg1_depart, leg1_arrive) = hohmann_burns_km_s(a.radius_au, v.radius_au);
        let (leg2_depart, leg2_arrive) = hohmann_burns_km_s(v.radius_au, b.radius_au);
        let direct = if a.id == b.id { 0.0 } else { hohmann_delta_v_km_s(a.radius_au, b.radius_au) };
        let duration = self.transfer_duration(from, via, skills).unwrap_or(0.0)
            + self.transfer_duration(via, to, skills).unwrap_or(0.0);
        Ok(GravityAssistEstimate {
            delta_v_km_s: (leg1_depart + leg2_arrive) / reduction,
            duration_days: duration,
            flyby_savings_km_s: (leg1_arrive + leg2_depart) / reduction,
            direct_delta_v_km_s: direct / reduction,
        })
    }

    pub fn trajectory_estimate(
        &self,
        request: &TrajectoryRequest,
        skills: &SkillSet,
    ) -> Result<TrajectoryEstimate, TrajectoryError> {
        match &request.via_zone {
            Some(via) => self
                .gravity_assist_estimate(&request.from_zone, via, &request.to_zone, skills)
                .map(TrajectoryEstimate::GravityAssist),
            None => {
                self.require(&request.from_zone)?;
                self.require(&request.to_zone)?;
                self.transfer_estimate(&request.from_zone, &request.to_zone, skills)
                    .map(TrajectoryEstimate::Direct)
                    .ok_or_else(|| TrajectoryError::UnknownZone(request.to_zone.clone()))
            }
        }
    }

    /// Estimates for up to `MAX_TRAJECTORY_BATCH` requests. One bad request
    /// fails only its own slot.
    pub fn batch_estimates(
        &self,
        requests: &[TrajectoryRequest],
        skills: &SkillSet,
    ) -> Result<Vec<Result<TrajectoryEstimate, TrajectoryError>>, TrajectoryError> {
        if requests.len() > MAX_TRAJECTORY_BATCH {
            return Err(TrajectoryError::BatchTooLarge {
                requested: requests.len(),
                limit: MAX_TRAJECTORY_BATCH,
            });
        }
        Ok(requests.iter().map(|r| self.trajectory_estimate(r, skills)).collect())
    }
}

/// Total delta-v (both burns) of a Hohmann transfer between two circular
/// orbits, in km/s.
pub fn hohmann_delta_v_km_s(r1_au: f64, r2_au: f64) -> f64 {
    let (depart, arrive) = hohmann_burns_km_s(r1_au, r2_au);
    depart + arrive
}

/// Departure and arrival burn magnitudes of a Hohmann transfer, km/s.
pub fn hohmann_burns_km_s(r1_au: f64, r2_au: f64) -> (f64, f64) {
    let r1 = r1_au * AU_M;
    let r2 = r2_au * AU_M;
    if !(r1 > 0.0 && r2 > 0.0) {
        return (0.0, 0.0);
    }
    let sum = r1 + r2;
    let dv1 = (SUN_MU / r1).sqrt() * ((2.0 * r2 / sum).sqrt() - 1.0);
    let dv2 = (SUN_MU / r2).sqrt() * (1.0 - (2.0 * r1 / sum).sqrt());
    (dv1.abs() / 1000.0, dv2.abs() / 1000.0)
}

/// Ramanujan's approximation of an ellipse circumference.
pub fn ellipse_circumference(a: f64, b: f64) -> f64 {
    PI * (3.0 * (a + b) - ((3.0 * a + b) * (a + 3.0 * b)).sqrt())
}

/// Length of the half-ellipse travelled on a Hohmann transfer, in AU.
pub fn transfer_arc_au(r1_au: f64, r2_au: f64) -> f64 {
    let a = (r1_au + r2_au) / 2.0;
    let b = (r1_au * r2_au).sqrt();
    ellipse_circumference(a, b) / 2.0
}

/// Engine-owned memo of transfer estimates per zone pair.
///
/// Entries are only valid for the skill factors they were computed with.
/// The research step calls `invalidate` whenever it recomputes skills;
/// `get` also drops everything if handed a different fingerprint.
#[derive(Debug, Default, Clone)]
pub struct TransferMetricsCache {
    fingerprint: Option<(u64, u64)>,
    entries: BTreeMap<(ZoneId, ZoneId), TransferEstimate>,
}

impl TransferMetricsCache {
    pub fn invalidate(&mut self) {
        self.fingerprint = None;
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(
        &mut self,
        registry: &ZoneRegistry,
        from: &str,
        to: &str,
        skills: &SkillSet,
    ) -> Option<TransferEstimate> {
        let fingerprint = (
            divisor_factor(CompositeCategory::DeltaVReduction, skills).to_bits(),
            divisor_factor(CompositeCategory::TransferSpeed, skills).to_bits(),
        );
        if self.fingerprint != Some(fingerprint) {
            self.entries.clear();
            self.fingerprint = Some(fingerprint);
        }
        let key = (from.to_string(), to.to_string());
        if let Some(hit) = self.entries.get(&key) {
            return Some(*hit);
        }
        let estimate = registry.transfer_estimate(from, to, skills)?;
        self.entries.insert(key, estimate);
        Some(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earth_to_mars_matches_textbook() {
        let dv = hohmann_delta_v_km_s(1.0, 1.524);
        assert!((dv - 5.59).abs() < 0.05, "dv = {dv}");
    }

    #[test]
    fn earth_to_mars_takes_about_259_days() {
        let data = GameData::default_test();
        let registry = ZoneRegistry::new(&data);
        let days = registry
            .transfer_duration("earth", "mars", &SkillSet::default())
            .expect("known zones");
        // Baseline transfer-speed factor is exactly 1.0.
        assert!((days - 259.0).abs() < 5.0, "days = {days}");
    }

    #[test]
    fn same_zone_is_free() {
        let data = GameData::default_test();
        let registry = ZoneRegistry::new(&data);
        let skills = SkillSet::default();
        assert_eq!(registry.delta_v("mars", "mars", &skills), Some(0.0));
        assert_eq!(registry.transfer_duration("mars", "mars", &skills), Some(0.0));
    }

    #[test]
    fn unknown_zone_is_absent() {
        let data = GameData::default_test();
        let registry = ZoneRegistry::new(&data);
        assert!(registry.get("pluto").is_none());
        assert!(registry.delta_v("earth", "pluto", &SkillSet::default()).is_none());
    }

    #[test]
    fn circle_circumference_is_exact() {
        assert!((ellipse_circumference(1.0, 1.0) - 2.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn cache_invalidates_on_new_fingerprint() {
        let data = GameData::default_test();
        let registry = ZoneRegistry::new(&data);
        let mut cache = TransferMetricsCache::default();
        let base = SkillSet::default();
        let slow = cache.get(&registry, "earth", "mars", &base).unwrap();
        assert_eq!(cache.len(), 1);

        let mut fast = SkillSet::default();
        fast.set(crate::skills::SkillId::Propulsion, 16.0);
        let quick = cache.get(&registry, "earth", "mars", &fast).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(quick.duration_days < slow.duration_days);

        cache.invalidate();
        assert!(cache.is_empty());
    }

    // ── Gravity assists and batches ───────────────────────────────

    fn request(from: &str, to: &str, via: Option<&str>) -> TrajectoryRequest {
        TrajectoryRequest {
            from_zone: from.to_string(),
            to_zone: to.to_string(),
            via_zone: via.map(str::to_string),
        }
    }

    #[test]
    fn flyby_replaces_the_burns_at_the_via_zone() {
        let data = GameData::default_test();
        let registry = ZoneRegistry::new(&data);
        let skills = SkillSet::default();
        let assist = registry
            .gravity_assist_estimate("earth", "mars", "asteroid_belt", &skills)
            .expect("known zones");

        let two_legs = registry.delta_v("earth", "mars", &skills).unwrap()
            + registry.delta_v("mars", "asteroid_belt", &skills).unwrap();
        assert!(assist.flyby_savings_km_s > 0.0);
        assert!((assist.delta_v_km_s + assist.flyby_savings_km_s - two_legs).abs() < 1e-9);

        let days = registry.transfer_duration("earth", "mars", &skills).unwrap()
            + registry.transfer_duration("mars", "asteroid_belt", &skills).unwrap();
        assert!((assist.duration_days - days).abs() < 1e-9);
        assert_eq!(
            assist.direct_delta_v_km_s,
            registry.delta_v("earth", "asteroid_belt", &skills).unwrap()
        );
    }

    #[test]
    fn flyby_through_an_endpoint_is_rejected() {
        let data = GameData::default_test();
        let registry = ZoneRegistry::new(&data);
        let skills = SkillSet::default();
        assert_eq!(
            registry.gravity_assist_estimate("earth", "earth", "mars", &skills),
            Err(TrajectoryError::InvalidFlyby("earth".into()))
        );
        assert_eq!(
            registry.gravity_assist_estimate("earth", "venus", "pluto", &skills),
            Err(TrajectoryError::UnknownZone("pluto".into()))
        );
    }

    #[test]
    fn batch_reports_errors_per_request() {
        let data = GameData::default_test();
        let registry = ZoneRegistry::new(&data);
        let skills = SkillSet::default();
        let results = registry
            .batch_estimates(
                &[
                    request("earth", "mars", None),
                    request("earth", "pluto", None),
                    request("earth", "asteroid_belt", Some("mars")),
                ],
                &skills,
            )
            .expect("within limit");

        assert!(matches!(results[0], Ok(TrajectoryEstimate::Direct(_))));
        assert_eq!(results[1], Err(TrajectoryError::UnknownZone("pluto".into())));
        assert!(matches!(results[2], Ok(TrajectoryEstimate::GravityAssist(_))));
    }

    #[test]
    fn oversized_batch_is_rejected_whole() {
        let data = GameData::default_test();
        let registry = ZoneRegistry::new(&data);
        let requests = vec![request("earth", "mars", None); MAX_TRAJECTORY_BATCH + 1];
        assert_eq!(
            registry.batch_estimates(&requests, &SkillSet::default()),
            Err(TrajectoryError::BatchTooLarge {
                requested: MAX_TRAJECTORY_BATCH + 1,
                limit: MAX_TRAJECTORY_BATCH
            })
        );
    }
}
