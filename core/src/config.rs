//! Static game data: zones, buildings, research, probe types and balance
//! tuning. Loaded once before the engine starts and read-only afterwards.

use crate::{
    clock::clamp_speed,
    error::{SimError, SimResult},
    skills::SkillId,
    state::Activity,
    types::{Kg, ProbeTypeId, StructureId, TreeId, Watts, ZoneId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub id: ZoneId,
    pub name: String,
    pub radius_au: f64,
    /// Fraction of the zone's mass that is extractable metal.
    pub metal_fraction: f64,
    pub total_mass_kg: Kg,
    #[serde(default = "one")]
    pub mining_multiplier: f64,
    #[serde(default = "one")]
    pub energy_multiplier: f64,
    /// The Dyson construction zone: construction only, never mined.
    #[serde(default)]
    pub is_dyson_zone: bool,
}

impl ZoneConfig {
    pub fn metal_mass_kg(&self) -> Kg {
        self.total_mass_kg * self.metal_fraction
    }

    pub fn allows_mining(&self) -> bool {
        !self.is_dyson_zone && self.metal_fraction > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingConfig {
    pub id: StructureId,
    pub name: String,
    #[serde(default)]
    pub tier: u32,
    pub cost_metal_kg: Kg,
    #[serde(default)]
    pub energy_production_w: Watts,
    #[serde(default)]
    pub energy_consumption_w: Watts,
    #[serde(default)]
    pub mining_rate_kg_day: f64,
    #[serde(default)]
    pub compute_flops: f64,
    /// Outbound throughput; anything above zero makes this a mass driver.
    #[serde(default)]
    pub mass_driver_capacity_kg_day: f64,
    /// Per-zone efficiency overrides; zones not listed run at 1.0.
    #[serde(default)]
    pub zone_efficiency: BTreeMap<ZoneId, f64>,
    /// Zones the structure may be built in. `None` means everywhere.
    #[serde(default)]
    pub allowed_zones: Option<Vec<ZoneId>>,
}

impl BuildingConfig {
    pub fn is_mass_driver(&self) -> bool {
        self.mass_driver_capacity_kg_day > 0.0
    }

    pub fn efficiency_in(&self, zone: &str) -> f64 {
        self.zone_efficiency.get(zone).copied().unwrap_or(1.0)
    }

    pub fn allowed_in(&self, zone: &str) -> bool {
        match &self.allowed_zones {
            Some(zones) => zones.iter().any(|z| z == zone),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTierConfig {
    pub id: String,
    pub name: String,
    pub tranches: u32,
    pub bonus_per_tranche: f64,
    /// Intelligence needed per tranche, in FLOP-days.
    pub tranche_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTreeConfig {
    pub id: TreeId,
    pub name: String,
    pub skill: SkillId,
    pub tiers: Vec<ResearchTierConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeTypeConfig {
    pub id: ProbeTypeId,
    pub name: String,
    pub mass_kg: Kg,
}

/// Balance constants. Every field has a default so `tuning.json` only
/// needs to list overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub base_mining_rate_kg_day: f64,
    pub base_building_rate_kg_day: f64,
    pub base_recycle_rate_kg_day: f64,
    pub base_energy_supply_w: Watts,
    pub probe_energy_generation_w: Watts,
    pub probe_harvest_draw_w: Watts,
    pub probe_recycle_draw_w: Watts,
    pub base_intelligence_flops: f64,
    pub dyson_watts_per_kg: f64,
    pub dyson_flops_per_watt: f64,
    pub dyson_base_target_mass_kg: Kg,
    /// Kilograms of metal consumed per kilogram of Dyson mass.
    pub dyson_metal_per_mass: f64,
    pub cargo_speed_km_day: f64,
    pub metal_batch_kg: Kg,
    pub probe_batch: f64,
    pub mass_driver_duration_factor: f64,
    pub dyson_zone_metal_duration_factor: f64,
    pub baseline_salvage_fraction: f64,
    pub default_probe_type: ProbeTypeId,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            base_mining_rate_kg_day: 100.0,
            base_building_rate_kg_day: 20.0,
            base_recycle_rate_kg_day: 50.0,
            base_energy_supply_w: 1.0e6,
            probe_energy_generation_w: 1.0e4,
            probe_harvest_draw_w: 1.0e5,
            probe_recycle_draw_w: 5.0e4,
            base_intelligence_flops: 1.0e15,
            dyson_watts_per_kg: 5.0e3,
            dyson_flops_per_watt: 1.0e9,
            dyson_base_target_mass_kg: 2.0e19,
            dyson_metal_per_mass: 2.0,
            cargo_speed_km_day: 2.26e6,
            metal_batch_kg: 100.0,
            probe_batch: 1.0,
            mass_driver_duration_factor: 0.5,
            dyson_zone_metal_duration_factor: 3.0,
            baseline_salvage_fraction: 0.75,
            default_probe_type: "probe".into(),
        }
    }
}

impl Tuning {
    /// Watts drawn by one probe on the given activity.
    pub fn activity_draw_w(&self, activity: Activity) -> Watts {
        match activity {
            Activity::Harvest => self.probe_harvest_draw_w,
            Activity::RecycleSlag => self.probe_recycle_draw_w,
            Activity::Replicate | Activity::Construct => 0.0,
        }
    }
}

fn one() -> f64 {
    1.0
}

/// Parameters of a new game, carried by the `start` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewGameConfig {
    pub starting_zone: ZoneId,
    pub initial_metal_kg: Kg,
    pub initial_probes: u64,
    pub probe_type: Option<ProbeTypeId>,
    pub time_speed: f64,
    /// Initial structures in the starting zone.
    pub initial_structures: BTreeMap<StructureId, u64>,
}

impl Default for NewGameConfig {
    fn default() -> Self {
        Self {
            starting_zone: "earth".into(),
            initial_metal_kg: 1000.0,
            initial_probes: 1,
            probe_type: None,
            time_speed: 1.0,
            initial_structures: BTreeMap::new(),
        }
    }
}

impl NewGameConfig {
    pub fn speed(&self) -> f64 {
        clamp_speed(self.time_speed)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ZonesFile {
    zones: Vec<ZoneConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct BuildingsFile {
    buildings: Vec<BuildingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResearchFile {
    trees: Vec<ResearchTreeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProbesFile {
    probe_types: Vec<ProbeTypeConfig>,
}

/// Everything the data loader must supply before the engine can start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    /// Ordered as in the source file.
    pub zones: Vec<ZoneConfig>,
    pub buildings: BTreeMap<StructureId, BuildingConfig>,
    pub research: Vec<ResearchTreeConfig>,
    pub probe_types: BTreeMap<ProbeTypeId, ProbeTypeConfig>,
    pub tuning: Tuning,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}

impl GameData {
    /// Load from the data/ directory.
    /// In tests, use GameData::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let zones: ZonesFile = read_json(&format!("{data_dir}/zones.json"))?;
        let buildings: BuildingsFile = read_json(&format!("{data_dir}/buildings.json"))?;
        let research: ResearchFile = read_json(&format!("{data_dir}/research.json"))?;
        let probes: ProbesFile = read_json(&format!("{data_dir}/probes.json"))?;
        let tuning: Tuning = read_json(&format!("{data_dir}/tuning.json"))?;

        let data = Self {
            zones: zones.zones,
            buildings: buildings
                .buildings
                .into_iter()
                .map(|b| (b.id.clone(), b))
                .collect(),
            research: research.trees,
            probe_types: probes
                .probe_types
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            tuning,
        };
        data.validate()?;
        log::info!(
            "game data loaded from {data_dir}: {} zones, {} buildings, {} research trees",
            data.zones.len(),
            data.buildings.len(),
            data.research.len()
        );
        Ok(data)
    }

    /// Reject data the engine cannot run against.
    pub fn validate(&self) -> SimResult<()> {
        let fail = |msg: String| Err(SimError::Initialization(msg));

        if self.zones.is_empty() {
            return fail("no zones defined".into());
        }
        let mut seen = BTreeSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.id.as_str()) {
                return fail(format!("duplicate zone id '{}'", zone.id));
            }
            if !(zone.radius_au.is_finite() && zone.radius_au > 0.0) {
                return fail(format!("zone '{}' has invalid radius {}", zone.id, zone.radius_au));
            }
            if !(0.0..=1.0).contains(&zone.metal_fraction) {
                return fail(format!(
                    "zone '{}' has metal fraction {} outside [0, 1]",
                    zone.id, zone.metal_fraction
                ));
            }
            if !(zone.total_mass_kg.is_finite() && zone.total_mass_kg >= 0.0) {
                return fail(format!("zone '{}' has invalid mass", zone.id));
            }
        }
        if self.zones.iter().filter(|z| z.is_dyson_zone).count() > 1 {
            return fail("more than one Dyson zone defined".into());
        }
        for building in self.buildings.values() {
            if !(building.cost_metal_kg.is_finite() && building.cost_metal_kg >= 0.0) {
                return fail(format!("building '{}' has invalid cost", building.id));
            }
        }
        for tree in &self.research {
            if tree.skill == SkillId::Compute {
                return fail(format!(
                    "research tree '{}' targets the derived compute skill",
                    tree.id
                ));
            }
            for tier in &tree.tiers {
                if tier.tranches == 0 || !(tier.tranche_cost > 0.0) {
                    return fail(format!(
                        "research tier '{}/{}' needs at least one tranche and a positive cost",
                        tree.id, tier.id
                    ));
                }
            }
        }
        if self.probe_types.is_empty() {
            return fail("no probe types defined".into());
        }
        if self.probe_types.values().any(|p| !(p.mass_kg > 0.0)) {
            return fail("probe types need a positive mass".into());
        }
        if !self.probe_types.contains_key(&self.tuning.default_probe_type) {
            return fail(format!(
                "default probe type '{}' is not in the catalogue",
                self.tuning.default_probe_type
            ));
        }
        if !(self.tuning.cargo_speed_km_day > 0.0) {
            return fail("cargo speed must be positive".into());
        }
        Ok(())
    }

    pub fn zone(&self, id: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn dyson_zone(&self) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.is_dyson_zone)
    }

    pub fn building(&self, id: &str) -> Option<&BuildingConfig> {
        self.buildings.get(id)
    }

    pub fn research_tree(&self, id: &str) -> Option<&ResearchTreeConfig> {
        self.research.iter().find(|t| t.id == id)
    }

    pub fn probe_type(&self, id: &str) -> Option<&ProbeTypeConfig> {
        self.probe_types.get(id)
    }

    pub fn default_probe(&self) -> Option<&ProbeTypeConfig> {
        self.probe_types.get(&self.tuning.default_probe_type)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        let zone = |id: &str, name: &str, radius_au: f64, metal_fraction: f64, mass: f64| ZoneConfig {
            id: id.into(),
            name: name.into(),
            radius_au,
            metal_fraction,
            total_mass_kg: mass,
            mining_multiplier: 1.0,
            energy_multiplier: 1.0 / (radius_au * radius_au),
            is_dyson_zone: false,
        };
        let mut earth = zone("earth", "Earth Orbit", 1.0, 0.32, 1.0e20);
        earth.energy_multiplier = 1.0;
        let mut dyson = zone("dyson_sphere", "Dyson Sphere", 0.29, 0.0, 0.0);
        dyson.is_dyson_zone = true;
        let zones = vec![
            zone("mercury", "Mercury", 0.39, 0.70, 3.3e20),
            zone("venus", "Venus", 0.72, 0.30, 4.9e20),
            earth,
            zone("mars", "Mars", 1.52, 0.25, 6.4e20),
            zone("asteroid_belt", "Asteroid Belt", 2.7, 0.40, 3.0e21),
            dyson,
        ];

        let building = |id: &str, cost: f64| BuildingConfig {
            id: id.into(),
            name: id.replace('_', " "),
            tier: 1,
            cost_metal_kg: cost,
            energy_production_w: 0.0,
            energy_consumption_w: 0.0,
            mining_rate_kg_day: 0.0,
            compute_flops: 0.0,
            mass_driver_capacity_kg_day: 0.0,
            zone_efficiency: BTreeMap::new(),
            allowed_zones: None,
        };
        let mut solar = building("solar_array", 200.0);
        solar.energy_production_w = 5.0e5;
        solar.zone_efficiency.insert("mercury".into(), 6.5);
        solar.zone_efficiency.insert("mars".into(), 0.43);
        let mut miner = building("mining_station", 500.0);
        miner.mining_rate_kg_day = 400.0;
        miner.energy_consumption_w = 2.0e5;
        miner.allowed_zones = Some(vec![
            "mercury".into(),
            "venus".into(),
            "earth".into(),
            "mars".into(),
            "asteroid_belt".into(),
        ]);
        let mut driver = building("mass_driver", 800.0);
        driver.mass_driver_capacity_kg_day = 1000.0;
        driver.energy_consumption_w = 1.0e5;
        let mut data_center = building("data_center", 1000.0);
        data_center.tier = 2;
        data_center.compute_flops = 5.0e14;
        data_center.energy_consumption_w = 3.0e5;

        let buildings = [solar, miner, driver, data_center]
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();

        let tier = |id: &str, tranches: u32, bonus: f64, cost: f64| ResearchTierConfig {
            id: id.into(),
            name: id.replace('_', " "),
            tranches,
            bonus_per_tranche: bonus,
            tranche_cost: cost,
        };
        let tree = |id: &str, skill: SkillId| ResearchTreeConfig {
            id: id.into(),
            name: id.replace('_', " "),
            skill,
            tiers: vec![
                tier(&format!("{id}_1"), 10, 0.02, 1.0e15),
                tier(&format!("{id}_2"), 10, 0.04, 1.0e16),
            ],
        };
        let research = vec![
            tree("propulsion", SkillId::Propulsion),
            tree("locomotion", SkillId::Locomotion),
            tree("robotics", SkillId::Dexterity),
            tree("materials", SkillId::Materials),
            tree("production", SkillId::Production),
            tree("recycling", SkillId::Recycling),
            tree("dyson_construction", SkillId::DysonConstruction),
            tree("solar_pv", SkillId::SolarPv),
            tree("thermal", SkillId::Thermal),
            tree("cpu", SkillId::Cpu),
            tree("gpu", SkillId::Gpu),
            tree("interconnect", SkillId::Interconnect),
            tree("io_bandwidth", SkillId::IoBandwidth),
        ];

        let mut probe_types = BTreeMap::new();
        probe_types.insert(
            "probe".to_string(),
            ProbeTypeConfig { id: "probe".into(), name: "Von Neumann Probe".into(), mass_kg: 100.0 },
        );

        Self {
            zones,
            buildings,
            research,
            probe_types,
            tuning: Tuning::default(),
        }
    }
}
