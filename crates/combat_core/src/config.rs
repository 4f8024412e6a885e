//! Combat configuration.
//!
//! Pure data, loaded once from RON and never edited while a world runs.
//! Durations are in ticks; rates marked "per second" are converted with
//! [`TICK_RATE`]. Fixed-point fields are written as plain decimals.
//!
//! # Example RON
//!
//! ```ron
//! CombatConfig(
//!     seed: 7,
//!     fortify: (
//!         timing: (duration: 400, cooldown: 900),
//!         armor_bonus: 25.0,
//!         damage_multiplier: 1.5,
//!     ),
//!     garrison: (capacity: 6),
//! )
//! ```
//!
//! Omitted sections keep their defaults.

use serde::{Deserialize, Serialize};

use crate::ability::{AbilityKind, AbilityTiming};
use crate::environment::EnvironmentConfig;
use crate::error::{CombatError, Result};
use crate::formation::FormationConfig;
use crate::garrison::GarrisonConfig;
use crate::math::{decimal_serde, ratio, Fixed};
use crate::retreat::RetreatConfig;
use crate::terrain::TerrainConfig;
use crate::upgrade::UpgradeConfig;
use crate::world::TICK_RATE;

/// Fortify tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FortifyConfig {
    /// Ability timing.
    pub timing: AbilityTiming,
    /// Armor added while fortified.
    #[serde(with = "decimal_serde")]
    pub armor_bonus: Fixed,
    /// Outgoing damage multiplier while fortified.
    #[serde(with = "decimal_serde")]
    pub damage_multiplier: Fixed,
}

impl Default for FortifyConfig {
    fn default() -> Self {
        Self {
            timing: AbilityTiming::new(400, 900),
            armor_bonus: Fixed::from_num(25),
            damage_multiplier: ratio(3, 2),
        }
    }
}

/// Rage tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RageConfig {
    /// Ability timing.
    pub timing: AbilityTiming,
    /// Damage multiplier applied to every faction unit.
    #[serde(with = "decimal_serde")]
    pub damage_multiplier: Fixed,
    /// Trigger automatically when a unit falls low.
    pub auto_trigger: bool,
    /// Health ratio at or below which the auto trigger fires.
    #[serde(with = "decimal_serde")]
    pub health_threshold: Fixed,
}

impl Default for RageConfig {
    fn default() -> Self {
        Self {
            timing: AbilityTiming::new(300, 2400),
            damage_multiplier: Fixed::from_num(2),
            auto_trigger: true,
            health_threshold: ratio(1, 2),
        }
    }
}

/// Area ability tuning (artillery, scan, EMP).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaAbilityConfig {
    /// Ability timing; area abilities are instantaneous.
    pub timing: AbilityTiming,
    /// Effect radius.
    #[serde(with = "decimal_serde")]
    pub radius: Fixed,
    /// Damage per target (artillery only).
    #[serde(default, with = "decimal_serde")]
    pub damage: Fixed,
    /// Ticks targets stay disabled (EMP only).
    #[serde(default)]
    pub disable_ticks: u64,
}

impl AreaAbilityConfig {
    fn stock(cooldown: u64, radius: i32) -> Self {
        Self {
            timing: AbilityTiming::new(0, cooldown),
            radius: Fixed::from_num(radius),
            damage: Fixed::ZERO,
            disable_ticks: 0,
        }
    }
}

/// Repair pulse tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Heal radius around the structure.
    #[serde(with = "decimal_serde")]
    pub radius: Fixed,
    /// Health restored per pulse.
    #[serde(with = "decimal_serde")]
    pub amount: Fixed,
    /// Ticks between pulses.
    pub interval: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            radius: Fixed::from_num(15),
            amount: Fixed::from_num(10),
            interval: u64::from(TICK_RATE),
        }
    }
}

/// Shield tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Shield capacity.
    #[serde(with = "decimal_serde")]
    pub max: Fixed,
    /// Regeneration per second.
    #[serde(with = "decimal_serde")]
    pub regen_per_second: Fixed,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            max: Fixed::from_num(200),
            regen_per_second: Fixed::from_num(5),
        }
    }
}

impl ShieldConfig {
    /// Regeneration per tick.
    #[must_use]
    pub fn regen_per_tick(&self) -> Fixed {
        self.regen_per_second / Fixed::from_num(TICK_RATE)
    }
}

/// Complete combat configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Seed for every RNG stream in the world.
    pub seed: u64,
    /// Fortify.
    pub fortify: FortifyConfig,
    /// Rage.
    pub rage: RageConfig,
    /// Artillery strike.
    pub artillery: AreaAbilityConfig,
    /// Satellite scan.
    pub satellite_scan: AreaAbilityConfig,
    /// EMP blast.
    pub emp: AreaAbilityConfig,
    /// Tactical retreat.
    pub retreat: RetreatConfig,
    /// Weapon upgrades.
    pub weapon_upgrade: UpgradeConfig,
    /// Garrison occupancy.
    pub garrison: GarrisonConfig,
    /// Repair pulses.
    pub repair: RepairConfig,
    /// Shields.
    pub shield: ShieldConfig,
    /// Formation, proximity and morale.
    pub formation: FormationConfig,
    /// Terrain.
    pub terrain: TerrainConfig,
    /// Environmental attrition.
    pub environment: EnvironmentConfig,
    /// `(a, b)`: `a` may not activate while `b` is active on the same owner.
    pub exclusions: Vec<(AbilityKind, AbilityKind)>,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            fortify: FortifyConfig::default(),
            rage: RageConfig::default(),
            artillery: AreaAbilityConfig {
                damage: Fixed::from_num(100),
                ..AreaAbilityConfig::stock(1200, 10)
            },
            satellite_scan: AreaAbilityConfig::stock(3600, 30),
            emp: AreaAbilityConfig {
                disable_ticks: 200,
                ..AreaAbilityConfig::stock(2400, 12)
            },
            retreat: RetreatConfig::default(),
            weapon_upgrade: UpgradeConfig::default(),
            garrison: GarrisonConfig::default(),
            repair: RepairConfig::default(),
            shield: ShieldConfig::default(),
            formation: FormationConfig::default(),
            terrain: TerrainConfig::default(),
            environment: EnvironmentConfig::default(),
            exclusions: vec![
                (AbilityKind::WeaponUpgrade, AbilityKind::Fortify),
                (AbilityKind::Fortify, AbilityKind::WeaponUpgrade),
                (AbilityKind::WeaponUpgrade, AbilityKind::TacticalRetreat),
            ],
        }
    }
}

impl CombatConfig {
    /// Parse and validate a RON document.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self =
            ron::from_str(text).map_err(|e| CombatError::ConfigParse(e.to_string()))?;
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(CombatError::InvalidConfig(errors.join("; ")));
        }
        Ok(config)
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| CombatError::Encode(e.to_string()))
    }

    /// Timing for an ability kind.
    #[must_use]
    pub fn timing(&self, kind: AbilityKind) -> AbilityTiming {
        match kind {
            AbilityKind::Fortify => self.fortify.timing,
            AbilityKind::Rage => self.rage.timing,
            AbilityKind::ArtilleryStrike => self.artillery.timing,
            AbilityKind::SatelliteScan => self.satellite_scan.timing,
            AbilityKind::EmpBlast => self.emp.timing,
            AbilityKind::TacticalRetreat => self.retreat.timing(),
            AbilityKind::WeaponUpgrade => self.weapon_upgrade.timing(),
        }
    }

    /// Check every value the engine relies on.
    ///
    /// Returns a list of validation errors.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let mut unit_interval = |name: &str, value: Fixed| {
            if value < Fixed::ZERO || value > Fixed::ONE {
                errors.push(format!("{name} must be within [0, 1], got {value}"));
            }
        };
        unit_interval("rage.health_threshold", self.rage.health_threshold);
        unit_interval("retreat.health_threshold", self.retreat.health_threshold);
        unit_interval("formation.morale_high", self.formation.morale_high);
        unit_interval("formation.morale_low", self.formation.morale_low);
        for (name, value) in self.environment.resistance.fields() {
            unit_interval(&format!("environment.resistance.{name}"), value);
        }

        let mut positive = |name: &str, value: Fixed| {
            if value <= Fixed::ZERO {
                errors.push(format!("{name} must be positive, got {value}"));
            }
        };
        positive("artillery.radius", self.artillery.radius);
        positive("satellite_scan.radius", self.satellite_scan.radius);
        positive("emp.radius", self.emp.radius);
        positive("garrison.exit_radius", self.garrison.exit_radius);
        positive("repair.radius", self.repair.radius);
        positive("environment.max_fatigue", self.environment.max_fatigue);
        positive("environment.max_moisture", self.environment.max_moisture);
        positive(
            "environment.max_cold + max_heat",
            self.environment.max_cold + self.environment.max_heat,
        );

        let mut non_negative = |name: &str, value: Fixed| {
            if value < Fixed::ZERO {
                errors.push(format!("{name} must not be negative, got {value}"));
            }
        };
        non_negative("fortify.damage_multiplier", self.fortify.damage_multiplier);
        non_negative("rage.damage_multiplier", self.rage.damage_multiplier);
        non_negative("artillery.damage", self.artillery.damage);
        non_negative("retreat.speed_multiplier", self.retreat.speed_multiplier);
        non_negative("garrison.armor_per_member", self.garrison.armor_per_member);
        non_negative("repair.amount", self.repair.amount);
        non_negative("shield.max", self.shield.max);
        non_negative("shield.regen_per_second", self.shield.regen_per_second);

        if self.garrison.capacity == 0 {
            errors.push("garrison.capacity must be at least 1".to_string());
        }
        if self.repair.interval == 0 {
            errors.push("repair.interval must be at least 1 tick".to_string());
        }
        if self.formation.morale_low > self.formation.morale_high {
            errors.push("formation.morale_low exceeds formation.morale_high".to_string());
        }

        for (kind, area) in [
            (AbilityKind::ArtilleryStrike, &self.artillery),
            (AbilityKind::SatelliteScan, &self.satellite_scan),
            (AbilityKind::EmpBlast, &self.emp),
        ] {
            if area.timing.duration != 0 {
                errors.push(format!("{kind:?} is instantaneous; duration must be 0"));
            }
        }

        for (blocked, blocker) in &self.exclusions {
            if blocked == blocker {
                errors.push(format!("{blocked:?} cannot exclude itself"));
            }
            if blocked.is_faction_wide() != blocker.is_faction_wide() {
                errors.push(format!(
                    "{blocked:?} and {blocker:?} belong to different owners and cannot exclude each other"
                ));
            }
        }

        errors
    }
}
