//! Weapon upgrades.
//!
//! An upgrade runs as the `WeaponUpgrade` ability: weapons are offline
//! for the active window, and when it expires the chosen variant's
//! modifiers are installed permanently under [`UPGRADE_SOURCE`],
//! replacing any earlier variant.

use serde::{Deserialize, Serialize};

use crate::ability::AbilityTiming;
use crate::error::{CombatError, Result};
use crate::math::{decimal_serde, ratio, Fixed};
use crate::modifiers::{ModifierScope, ModifierSpec, ModifierStack, SourceId};

/// Modifier source for installed upgrades.
pub const UPGRADE_SOURCE: &str = "weapon_upgrade";

/// Weapon variants a structure can be refitted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponVariant {
    /// Faster, harder-hitting ground weapon.
    LaserCannon,
    /// Anti-air launcher with extra reach.
    MissileLauncher,
}

impl WeaponVariant {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            WeaponVariant::LaserCannon => "LaserCannon",
            WeaponVariant::MissileLauncher => "MissileLauncher",
        }
    }
}

/// Upgrade tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Ticks the refit takes.
    pub duration: u64,
    /// Ticks before another refit may start.
    pub cooldown: u64,
    /// Laser cannon damage multiplier.
    #[serde(with = "decimal_serde")]
    pub laser_damage: Fixed,
    /// Laser cannon attack interval multiplier.
    #[serde(with = "decimal_serde")]
    pub laser_attack_interval: Fixed,
    /// Missile launcher air damage multiplier.
    #[serde(with = "decimal_serde")]
    pub missile_air_damage: Fixed,
    /// Missile launcher range multiplier.
    #[serde(with = "decimal_serde")]
    pub missile_range: Fixed,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            duration: 200,
            cooldown: 0,
            laser_damage: ratio(3, 2),
            laser_attack_interval: ratio(4, 5),
            missile_air_damage: Fixed::from_num(2),
            missile_range: ratio(5, 4),
        }
    }
}

impl UpgradeConfig {
    /// Ability timing for a refit.
    #[must_use]
    pub const fn timing(&self) -> AbilityTiming {
        AbilityTiming::new(self.duration, self.cooldown)
    }

    /// Permanent modifiers a variant installs.
    #[must_use]
    pub fn modifiers(&self, variant: WeaponVariant) -> Vec<ModifierSpec> {
        match variant {
            WeaponVariant::LaserCannon => vec![
                ModifierSpec::multiplicative(ModifierScope::Damage, self.laser_damage),
                ModifierSpec::multiplicative(
                    ModifierScope::AttackInterval,
                    self.laser_attack_interval,
                ),
            ],
            WeaponVariant::MissileLauncher => vec![
                ModifierSpec::multiplicative(ModifierScope::AirDamage, self.missile_air_damage),
                ModifierSpec::multiplicative(ModifierScope::AttackRange, self.missile_range),
            ],
        }
    }
}

/// Installed and in-progress weapon variants of one structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeaponLoadout {
    installed: Option<WeaponVariant>,
    pending: Option<WeaponVariant>,
}

impl WeaponLoadout {
    /// Variant currently installed.
    #[must_use]
    pub const fn installed(&self) -> Option<WeaponVariant> {
        self.installed
    }

    /// Variant being fitted.
    #[must_use]
    pub const fn pending(&self) -> Option<WeaponVariant> {
        self.pending
    }

    /// Check that `variant` may be started. Does not mutate.
    pub fn check(&self, variant: WeaponVariant) -> Result<()> {
        if self.installed == Some(variant) || self.pending == Some(variant) {
            return Err(CombatError::UpgradeAlreadyInstalled(variant.name()));
        }
        Ok(())
    }

    /// Record `variant` as in progress.
    pub fn begin(&mut self, variant: WeaponVariant) -> Result<()> {
        self.check(variant)?;
        self.pending = Some(variant);
        Ok(())
    }

    /// Drop the in-progress refit.
    pub fn abort(&mut self) {
        self.pending = None;
    }

    /// Finish the refit, replacing the installed modifiers on `stack`.
    pub fn complete(
        &mut self,
        stack: &mut ModifierStack,
        config: &UpgradeConfig,
    ) -> Result<Option<WeaponVariant>> {
        let Some(variant) = self.pending.take() else {
            return Ok(None);
        };
        let source = SourceId::from(UPGRADE_SOURCE);
        stack.remove_source(&source);
        for spec in config.modifiers(variant) {
            stack.apply_spec(source.clone(), spec, None)?;
        }
        self.installed = Some(variant);
        Ok(Some(variant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_variant_rejected() {
        let mut loadout = WeaponLoadout::default();
        loadout.begin(WeaponVariant::LaserCannon).unwrap();
        assert_eq!(
            loadout.begin(WeaponVariant::LaserCannon),
            Err(CombatError::UpgradeAlreadyInstalled("LaserCannon"))
        );

        let mut stack = ModifierStack::new();
        loadout.complete(&mut stack, &UpgradeConfig::default()).unwrap();
        assert!(loadout.check(WeaponVariant::LaserCannon).is_err());
        assert!(loadout.check(WeaponVariant::MissileLauncher).is_ok());
    }

    #[test]
    fn test_completion_replaces_previous_variant() {
        let config = UpgradeConfig::default();
        let mut loadout = WeaponLoadout::default();
        let mut stack = ModifierStack::new();

        loadout.begin(WeaponVariant::LaserCannon).unwrap();
        loadout.complete(&mut stack, &config).unwrap();
        assert_eq!(
            stack.fold(ModifierScope::Damage, Fixed::from_num(10)).unwrap(),
            Fixed::from_num(15)
        );

        loadout.begin(WeaponVariant::MissileLauncher).unwrap();
        assert_eq!(
            loadout.complete(&mut stack, &config).unwrap(),
            Some(WeaponVariant::MissileLauncher)
        );
        assert_eq!(
            stack.fold(ModifierScope::Damage, Fixed::from_num(10)).unwrap(),
            Fixed::from_num(10)
        );
        assert_eq!(
            stack.fold(ModifierScope::AirDamage, Fixed::from_num(10)).unwrap(),
            Fixed::from_num(20)
        );
        assert_eq!(loadout.installed(), Some(WeaponVariant::MissileLauncher));
    }

    #[test]
    fn test_complete_without_pending_is_noop() {
        let mut loadout = WeaponLoadout::default();
        let mut stack = ModifierStack::new();
        assert_eq!(
            loadout.complete(&mut stack, &UpgradeConfig::default()).unwrap(),
            None
        );
        assert!(stack.is_empty());
    }
}
