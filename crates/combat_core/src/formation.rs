//! Formation, proximity and morale modifiers.
//!
//! Pure lookups: the world feeds in formation choice, neighbour counts
//! and health averages, and writes the results onto the unit's stack
//! under the `formation.*` sources.

use serde::{Deserialize, Serialize};

use crate::math::{decimal_serde, ratio, Fixed};

/// Formation a unit group is holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormationKind {
    /// No formation.
    #[default]
    Loose,
    /// Wide firing line.
    Line,
    /// Spearhead.
    Wedge,
    /// Marching column.
    Column,
    /// Defensive square.
    Box,
}

/// Formation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    /// Line damage multiplier.
    #[serde(with = "decimal_serde")]
    pub line_damage: Fixed,
    /// Share of the line damage bonus a wedge receives.
    #[serde(with = "decimal_serde")]
    pub wedge_damage_share: Fixed,
    /// Wedge speed multiplier.
    #[serde(with = "decimal_serde")]
    pub wedge_speed: Fixed,
    /// Column armor multiplier.
    #[serde(with = "decimal_serde")]
    pub column_armor: Fixed,
    /// Box armor multiplier.
    #[serde(with = "decimal_serde")]
    pub box_armor: Fixed,
    /// Box speed multiplier.
    #[serde(with = "decimal_serde")]
    pub box_speed: Fixed,
    /// Radius in which allies count toward the proximity bonus.
    #[serde(with = "decimal_serde")]
    pub proximity_radius: Fixed,
    /// Damage bonus per nearby ally.
    #[serde(with = "decimal_serde")]
    pub bonus_per_ally: Fixed,
    /// Cap on the proximity bonus.
    #[serde(with = "decimal_serde")]
    pub max_proximity_bonus: Fixed,
    /// Radius for morale health averages.
    #[serde(with = "decimal_serde")]
    pub morale_radius: Fixed,
    /// Multiplier applied for each favourable morale check.
    #[serde(with = "decimal_serde")]
    pub morale_bonus: Fixed,
    /// Multiplier applied for each unfavourable morale check.
    #[serde(with = "decimal_serde")]
    pub morale_penalty: Fixed,
    /// Allied average health above which morale rises.
    #[serde(with = "decimal_serde")]
    pub morale_high: Fixed,
    /// Allied average health below which morale falls.
    #[serde(with = "decimal_serde")]
    pub morale_low: Fixed,
    /// Ratio between allied and enemy health that counts as winning.
    #[serde(with = "decimal_serde")]
    pub morale_advantage: Fixed,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            line_damage: ratio(6, 5),
            wedge_damage_share: ratio(1, 2),
            wedge_speed: ratio(5, 4),
            column_armor: ratio(23, 20),
            box_armor: ratio(13, 10),
            box_speed: ratio(9, 10),
            proximity_radius: Fixed::from_num(5),
            bonus_per_ally: ratio(1, 10),
            max_proximity_bonus: ratio(1, 2),
            morale_radius: Fixed::from_num(10),
            morale_bonus: ratio(6, 5),
            morale_penalty: ratio(4, 5),
            morale_high: ratio(7, 10),
            morale_low: ratio(3, 10),
            morale_advantage: ratio(3, 2),
        }
    }
}

/// Stat multipliers granted by a formation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormationBonus {
    /// Damage multiplier.
    pub damage: Fixed,
    /// Armor multiplier.
    pub armor: Fixed,
    /// Speed multiplier.
    pub speed: Fixed,
}

impl FormationBonus {
    /// No change to any stat.
    pub const NEUTRAL: Self = Self {
        damage: Fixed::ONE,
        armor: Fixed::ONE,
        speed: Fixed::ONE,
    };
}

impl FormationKind {
    /// Look up the multipliers for this formation.
    #[must_use]
    pub fn bonus(self, config: &FormationConfig) -> FormationBonus {
        match self {
            FormationKind::Loose => FormationBonus::NEUTRAL,
            FormationKind::Line => FormationBonus {
                damage: config.line_damage,
                ..FormationBonus::NEUTRAL
            },
            FormationKind::Wedge => FormationBonus {
                damage: Fixed::ONE + (config.line_damage - Fixed::ONE) * config.wedge_damage_share,
                speed: config.wedge_speed,
                ..FormationBonus::NEUTRAL
            },
            FormationKind::Column => FormationBonus {
                armor: config.column_armor,
                ..FormationBonus::NEUTRAL
            },
            FormationKind::Box => FormationBonus {
                armor: config.box_armor,
                speed: config.box_speed,
                ..FormationBonus::NEUTRAL
            },
        }
    }
}

/// Damage multiplier from `allies` nearby units: `1 + min(allies * per_ally, cap)`.
#[must_use]
pub fn proximity_multiplier(allies: usize, config: &FormationConfig) -> Fixed {
    let count = Fixed::saturating_from_num(allies);
    let bonus = count
        .saturating_mul(config.bonus_per_ally)
        .min(config.max_proximity_bonus);
    Fixed::ONE + bonus
}

/// Morale multiplier from average health ratios.
///
/// Two independent checks, each contributing the bonus or the penalty:
/// the allied average against the absolute thresholds, then the allied
/// average against the enemy average. The relative check only runs when
/// enemies are present.
#[must_use]
pub fn morale_multiplier(
    allied_health: Fixed,
    enemy_health: Option<Fixed>,
    config: &FormationConfig,
) -> Fixed {
    let mut multiplier = Fixed::ONE;

    if allied_health > config.morale_high {
        multiplier *= config.morale_bonus;
    } else if allied_health < config.morale_low {
        multiplier *= config.morale_penalty;
    }

    if let Some(enemy) = enemy_health {
        if allied_health > enemy * config.morale_advantage {
            multiplier *= config.morale_bonus;
        } else if allied_health * config.morale_advantage < enemy {
            multiplier *= config.morale_penalty;
        }
    }

    multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formation_table() {
        let config = FormationConfig::default();
        assert_eq!(FormationKind::Line.bonus(&config).damage, ratio(6, 5));
        let wedge_damage = FormationKind::Wedge.bonus(&config).damage;
        assert!((wedge_damage - ratio(11, 10)).abs() < ratio(1, 1_000_000));
        assert_eq!(FormationKind::Wedge.bonus(&config).speed, ratio(5, 4));
        assert_eq!(FormationKind::Column.bonus(&config).armor, ratio(23, 20));
        let boxed = FormationKind::Box.bonus(&config);
        assert_eq!(boxed.armor, ratio(13, 10));
        assert_eq!(boxed.speed, ratio(9, 10));
        assert_eq!(FormationKind::Loose.bonus(&config), FormationBonus::NEUTRAL);
    }

    #[test]
    fn test_proximity_bonus_caps() {
        let config = FormationConfig::default();
        assert_eq!(proximity_multiplier(0, &config), Fixed::ONE);
        assert_eq!(proximity_multiplier(2, &config), Fixed::ONE + ratio(1, 10) * Fixed::from_num(2));
        assert_eq!(proximity_multiplier(12, &config), ratio(3, 2));
    }

    #[test]
    fn test_morale_absolute_and_relative() {
        let config = FormationConfig::default();
        assert_eq!(
            morale_multiplier(ratio(9, 10), Some(ratio(1, 2)), &config),
            ratio(6, 5) * ratio(6, 5)
        );
        assert_eq!(
            morale_multiplier(ratio(1, 5), Some(ratio(9, 10)), &config),
            ratio(4, 5) * ratio(4, 5)
        );
        assert_eq!(morale_multiplier(ratio(1, 2), Some(ratio(1, 2)), &config), Fixed::ONE);
    }

    #[test]
    fn test_morale_without_enemies_uses_absolute_only() {
        let config = FormationConfig::default();
        assert_eq!(morale_multiplier(ratio(9, 10), None, &config), ratio(6, 5));
        assert_eq!(morale_multiplier(ratio(1, 2), None, &config), Fixed::ONE);
    }
}
