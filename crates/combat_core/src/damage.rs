//! Damage resolution.
//!
//! [`resolve`] is a pure function of an attack profile, the two modifier
//! stacks, the defender's base armor and a roll in `[0, 1]`. The caller
//! supplies the roll, so the same inputs always give the same hit.
//!
//! Armor follows the diminishing-returns law `damage * 100 / (100 + armor)`:
//! 100 armor halves damage, 300 armor quarters it, and no finite armor
//! reaches immunity.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::{decimal_serde, ratio, Fixed};
use crate::modifiers::{ModifierScope, ModifierStack};

/// Static description of an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageProfile {
    /// Damage before modifiers.
    #[serde(with = "decimal_serde")]
    pub base_damage: Fixed,
    /// Critical hit chance before modifiers.
    #[serde(with = "decimal_serde")]
    pub crit_chance: Fixed,
    /// Critical multiplier before modifiers.
    #[serde(with = "decimal_serde")]
    pub crit_multiplier: Fixed,
    /// Armor ignored before modifiers.
    #[serde(with = "decimal_serde")]
    pub armor_penetration: Fixed,
    /// Skip the armor step entirely.
    #[serde(default)]
    pub ignore_armor: bool,
    /// Target is airborne, so `AirDamage` modifiers apply.
    #[serde(default)]
    pub against_air: bool,
}

impl DamageProfile {
    /// Plain attack with no crit chance or penetration.
    #[must_use]
    pub fn new(base_damage: Fixed) -> Self {
        Self {
            base_damage,
            crit_chance: Fixed::ZERO,
            crit_multiplier: Fixed::from_num(2),
            armor_penetration: Fixed::ZERO,
            ignore_armor: false,
            against_air: false,
        }
    }

    /// Set crit chance and multiplier.
    #[must_use]
    pub const fn with_crit(mut self, chance: Fixed, multiplier: Fixed) -> Self {
        self.crit_chance = chance;
        self.crit_multiplier = multiplier;
        self
    }

    /// Set base armor penetration.
    #[must_use]
    pub const fn with_penetration(mut self, penetration: Fixed) -> Self {
        self.armor_penetration = penetration;
        self
    }

    /// Bypass armor.
    #[must_use]
    pub const fn ignoring_armor(mut self) -> Self {
        self.ignore_armor = true;
        self
    }

    /// Mark the target as airborne.
    #[must_use]
    pub const fn against_air(mut self, airborne: bool) -> Self {
        self.against_air = airborne;
        self
    }
}

impl Default for DamageProfile {
    fn default() -> Self {
        Self::new(Fixed::from_num(10)).with_crit(ratio(1, 10), Fixed::from_num(2))
    }
}

/// Outcome of a single resolved attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageRoll {
    /// Final damage, never negative.
    pub amount: Fixed,
    /// Whether the crit branch fired.
    pub was_critical: bool,
}

/// Apply the armor law to `damage`.
#[must_use]
pub fn apply_armor(damage: Fixed, effective_armor: Fixed) -> Fixed {
    let hundred = Fixed::from_num(100);
    let armor = effective_armor.max(Fixed::ZERO);
    damage.saturating_mul(hundred) / hundred.saturating_add(armor)
}

/// Resolve one attack.
///
/// Order: attacker damage fold, crit, armor (net of penetration), then
/// the defender's combined damage reduction. Fails only when a stack
/// holds an unregistered custom scope.
pub fn resolve(
    profile: &DamageProfile,
    attacker: &ModifierStack,
    defender_base_armor: Fixed,
    defender: &ModifierStack,
    roll: Fixed,
) -> Result<DamageRoll> {
    let mut damage = attacker.fold(ModifierScope::Damage, profile.base_damage)?;
    if profile.against_air {
        damage = attacker.fold(ModifierScope::AirDamage, damage)?;
    }

    let crit_chance = attacker.fold(ModifierScope::CritChance, profile.crit_chance)?;
    let was_critical = crit_chance > Fixed::ZERO && roll <= crit_chance;
    if was_critical {
        let multiplier = attacker.fold(ModifierScope::CritMultiplier, profile.crit_multiplier)?;
        damage = damage.saturating_mul(multiplier);
    }

    if !profile.ignore_armor {
        let armor = defender.fold(ModifierScope::Armor, defender_base_armor)?;
        let penetration =
            attacker.fold(ModifierScope::ArmorPenetration, profile.armor_penetration)?;
        damage = apply_armor(damage, armor.saturating_sub(penetration));
    }

    let reduction = defender.fold_damage_reduction();
    damage = damage.saturating_mul(Fixed::ONE - reduction);

    let amount = damage.max(Fixed::ZERO);
    tracing::trace!(
        damage = %amount,
        critical = was_critical,
        "Resolved attack"
    );

    Ok(DamageRoll {
        amount,
        was_critical,
    })
}
