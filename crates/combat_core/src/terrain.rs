//! Terrain movement factors, combat factors and adaptation.

use serde::{Deserialize, Serialize};

use crate::math::{decimal_serde, fixed_serde, ratio, Fixed};

/// Ground category under a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerrainCategory {
    /// Open ground.
    #[default]
    Normal,
    /// Mud.
    Mud,
    /// Snow.
    Snow,
    /// Sand.
    Sand,
    /// Shallow water.
    Water,
    /// Forest.
    Forest,
    /// Urban terrain.
    Urban,
}

/// Terrain information sampled at a unit's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TerrainSample {
    /// Ground category.
    pub category: TerrainCategory,
    /// Height of the ground.
    #[serde(with = "fixed_serde")]
    pub elevation: Fixed,
    /// Unit is behind cover.
    pub in_cover: bool,
    /// Unit stands in prepared fortifications.
    pub fortified: bool,
}

/// Terrain tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Speed factor in mud.
    #[serde(with = "decimal_serde")]
    pub mud: Fixed,
    /// Speed factor in snow.
    #[serde(with = "decimal_serde")]
    pub snow: Fixed,
    /// Speed factor in sand.
    #[serde(with = "decimal_serde")]
    pub sand: Fixed,
    /// Speed factor in water.
    #[serde(with = "decimal_serde")]
    pub water: Fixed,
    /// Damage multiplier when attacking from above.
    #[serde(with = "decimal_serde")]
    pub height_advantage: Fixed,
    /// Elevation difference needed for the height advantage.
    #[serde(with = "decimal_serde")]
    pub height_threshold: Fixed,
    /// Damage multiplier when attacking from cover.
    #[serde(with = "decimal_serde")]
    pub cover: Fixed,
    /// Damage multiplier when attacking from fortifications.
    #[serde(with = "decimal_serde")]
    pub fortified: Fixed,
    /// Adaptation gained per second on unchanged terrain.
    #[serde(with = "decimal_serde")]
    pub adaptation_rate: Fixed,
    /// Adaptation ceiling.
    #[serde(with = "decimal_serde")]
    pub max_adaptation: Fixed,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            mud: ratio(7, 10),
            snow: ratio(4, 5),
            sand: ratio(3, 4),
            water: ratio(1, 2),
            height_advantage: ratio(6, 5),
            height_threshold: Fixed::ONE,
            cover: ratio(23, 20),
            fortified: ratio(13, 10),
            adaptation_rate: ratio(1, 2),
            max_adaptation: ratio(3, 2),
        }
    }
}

impl TerrainConfig {
    /// Raw movement factor for a category.
    #[must_use]
    pub fn movement_factor(&self, category: TerrainCategory) -> Fixed {
        match category {
            TerrainCategory::Mud => self.mud,
            TerrainCategory::Snow => self.snow,
            TerrainCategory::Sand => self.sand,
            TerrainCategory::Water => self.water,
            TerrainCategory::Normal | TerrainCategory::Forest | TerrainCategory::Urban => {
                Fixed::ONE
            }
        }
    }

    /// Damage multiplier for one attack given both elevations.
    #[must_use]
    pub fn height_multiplier(&self, attacker: Fixed, defender: Fixed) -> Fixed {
        if attacker.saturating_sub(defender) > self.height_threshold {
            self.height_advantage
        } else {
            Fixed::ONE
        }
    }

    /// Outgoing damage multiplier for one attack: height advantage over
    /// the target, times the attacker's cover and fortification bonuses.
    #[must_use]
    pub fn combat_multiplier(&self, attacker: &TerrainSample, defender: &TerrainSample) -> Fixed {
        let mut multiplier = self.height_multiplier(attacker.elevation, defender.elevation);
        if attacker.in_cover {
            multiplier = multiplier.saturating_mul(self.cover);
        }
        if attacker.fortified {
            multiplier = multiplier.saturating_mul(self.fortified);
        }
        multiplier
    }
}

/// Per-unit familiarity with the ground it stands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainAdaptation {
    category: TerrainCategory,
    #[serde(with = "fixed_serde")]
    level: Fixed,
}

impl Default for TerrainAdaptation {
    fn default() -> Self {
        Self {
            category: TerrainCategory::Normal,
            level: Fixed::ONE,
        }
    }
}

impl TerrainAdaptation {
    /// Current adaptation level in `[1, max]`.
    #[must_use]
    pub const fn level(&self) -> Fixed {
        self.level
    }

    /// Category the level was built on.
    #[must_use]
    pub const fn category(&self) -> TerrainCategory {
        self.category
    }

    /// Ramp the level on unchanged ground, reset it on a change.
    pub fn update(&mut self, category: TerrainCategory, seconds: Fixed, config: &TerrainConfig) {
        if category == self.category {
            self.level = self
                .level
                .saturating_add(config.adaptation_rate.saturating_mul(seconds))
                .min(config.max_adaptation);
        } else {
            self.category = category;
            self.level = Fixed::ONE;
        }
    }

    /// Speed factor after adaptation: the ground's movement factor times
    /// the adaptation level.
    #[must_use]
    pub fn speed_factor(&self, config: &TerrainConfig) -> Fixed {
        config
            .movement_factor(self.category)
            .saturating_mul(self.level)
    }
}
