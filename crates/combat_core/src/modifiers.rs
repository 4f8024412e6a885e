//! Keyed modifier stacks.
//!
//! Every stat that can be buffed or debuffed is resolved by folding a
//! [`ModifierStack`] over a base value. Producers (abilities, garrisons,
//! formations, terrain, weather) own entries keyed by `(source, scope)`
//! and replace them with [`ModifierStack::upsert`] instead of stacking
//! duplicates.
//!
//! Fold law for a scope: `A = Σ additive`, `M = Π multiplicative`,
//! result `(base + A) * M`. Damage reduction folds separately as
//! `1 - Π(1 - r_i)` so two 50 % reductions give 75 %, never 100 %.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CombatError, Result};
use crate::math::{clamp01, fixed_serde, Fixed, SimTime};

/// Identifier of the producer that owns a modifier entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Create a source id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Stat a modifier applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModifierScope {
    /// Outgoing damage.
    Damage,
    /// Extra outgoing damage against airborne targets.
    AirDamage,
    /// Armor rating.
    Armor,
    /// Movement speed.
    Speed,
    /// Armor ignored on outgoing attacks.
    ArmorPenetration,
    /// Critical hit chance in `[0, 1]`.
    CritChance,
    /// Damage multiplier on a critical hit.
    CritMultiplier,
    /// Fraction of incoming damage removed after armor.
    DamageReduction,
    /// Weapon reach.
    AttackRange,
    /// Time between attacks.
    AttackInterval,
    /// Game-specific scope; must be registered on the stack before use.
    Custom(u16),
}

/// How a modifier combines with others on the same scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierKind {
    /// Added to the base before multipliers.
    Additive,
    /// Multiplies the sum of base and additives.
    Multiplicative,
}

/// A single modifier entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    /// Producer that owns this entry.
    pub source: SourceId,
    /// Stat affected.
    pub scope: ModifierScope,
    /// Combination rule.
    pub kind: ModifierKind,
    /// Magnitude.
    #[serde(with = "fixed_serde")]
    pub value: Fixed,
    /// Tick at which the entry stops applying, if any.
    pub expires_at: Option<SimTime>,
}

impl Modifier {
    /// Whether the entry has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: SimTime) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// A modifier template without an owner, used by configuration tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSpec {
    /// Stat affected.
    pub scope: ModifierScope,
    /// Combination rule.
    pub kind: ModifierKind,
    /// Magnitude.
    #[serde(with = "fixed_serde")]
    pub value: Fixed,
}

impl ModifierSpec {
    /// Additive template.
    #[must_use]
    pub const fn additive(scope: ModifierScope, value: Fixed) -> Self {
        Self {
            scope,
            kind: ModifierKind::Additive,
            value,
        }
    }

    /// Multiplicative template.
    #[must_use]
    pub const fn multiplicative(scope: ModifierScope, value: Fixed) -> Self {
        Self {
            scope,
            kind: ModifierKind::Multiplicative,
            value,
        }
    }
}

/// Folded view of one scope, for debugging and UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSummary {
    /// Sum of additive entries.
    #[serde(with = "fixed_serde")]
    pub additive: Fixed,
    /// Product of multiplicative entries.
    #[serde(with = "fixed_serde")]
    pub multiplier: Fixed,
    /// Sources contributing to this scope.
    pub sources: Vec<SourceId>,
}

impl Default for ScopeSummary {
    fn default() -> Self {
        Self {
            additive: Fixed::ZERO,
            multiplier: Fixed::ONE,
            sources: Vec::new(),
        }
    }
}

/// Read-only summary of every live entry on a stack.
pub type ModifierSummary = BTreeMap<ModifierScope, ScopeSummary>;

/// Modifier collection owned by one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierStack {
    entries: BTreeMap<(SourceId, ModifierScope), Modifier>,
    custom_scopes: BTreeSet<u16>,
    now: SimTime,
}

impl ModifierStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow a custom scope on this stack.
    pub fn register_scope(&mut self, id: u16) {
        self.custom_scopes.insert(id);
    }

    fn check_scope(&self, scope: ModifierScope) -> Result<()> {
        match scope {
            ModifierScope::Custom(id) if !self.custom_scopes.contains(&id) => {
                Err(CombatError::UnknownModifierScope(scope))
            }
            _ => Ok(()),
        }
    }

    /// Insert or replace the entry keyed by `(source, scope)`.
    ///
    /// Damage reduction values are clamped into `[0, 1]`.
    pub fn upsert(
        &mut self,
        source: impl Into<SourceId>,
        scope: ModifierScope,
        kind: ModifierKind,
        value: Fixed,
        expires_at: Option<SimTime>,
    ) -> Result<()> {
        self.check_scope(scope)?;
        let value = if scope == ModifierScope::DamageReduction {
            clamp01(value)
        } else {
            value
        };
        let source = source.into();
        self.entries.insert(
            (source.clone(), scope),
            Modifier {
                source,
                scope,
                kind,
                value,
                expires_at,
            },
        );
        Ok(())
    }

    /// Upsert a template under `source`.
    pub fn apply_spec(
        &mut self,
        source: impl Into<SourceId>,
        spec: ModifierSpec,
        expires_at: Option<SimTime>,
    ) -> Result<()> {
        self.upsert(source, spec.scope, spec.kind, spec.value, expires_at)
    }

    /// Remove a single entry. Missing keys are a no-op.
    pub fn remove(&mut self, source: &SourceId, scope: ModifierScope) -> Option<Modifier> {
        self.entries.remove(&(source.clone(), scope))
    }

    /// Remove every entry owned by `source`, returning how many were dropped.
    pub fn remove_source(&mut self, source: &SourceId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(owner, _), _| owner != source);
        before - self.entries.len()
    }

    /// Look up a live entry.
    #[must_use]
    pub fn get(&self, source: &SourceId, scope: ModifierScope) -> Option<&Modifier> {
        self.entries
            .get(&(source.clone(), scope))
            .filter(|m| !m.is_expired(self.now))
    }

    /// Whether `source` owns any live entry.
    #[must_use]
    pub fn has_source(&self, source: &SourceId) -> bool {
        self.live().any(|m| &m.source == source)
    }

    /// Drop entries whose expiry has passed and advance the stack clock.
    ///
    /// Folds between purges treat entries expiring at or before the last
    /// seen clock as absent.
    pub fn purge_expired(&mut self, now: SimTime) -> usize {
        self.now = self.now.max(now);
        let clock = self.now;
        let before = self.entries.len();
        self.entries.retain(|_, m| !m.is_expired(clock));
        before - self.entries.len()
    }

    fn live(&self) -> impl Iterator<Item = &Modifier> {
        self.entries.values().filter(|m| !m.is_expired(self.now))
    }

    fn live_in(&self, scope: ModifierScope) -> impl Iterator<Item = &Modifier> {
        self.live().filter(move |m| m.scope == scope)
    }

    /// Fold `scope` over `base`: `(base + Σ additive) * Π multiplicative`.
    pub fn fold(&self, scope: ModifierScope, base: Fixed) -> Result<Fixed> {
        self.check_scope(scope)?;
        let mut additive = Fixed::ZERO;
        let mut multiplier = Fixed::ONE;
        for modifier in self.live_in(scope) {
            match modifier.kind {
                ModifierKind::Additive => additive = additive.saturating_add(modifier.value),
                ModifierKind::Multiplicative => {
                    multiplier = multiplier.saturating_mul(modifier.value);
                }
            }
        }
        Ok(base.saturating_add(additive).saturating_mul(multiplier))
    }

    /// Product of the multiplicative entries on `scope`, ignoring additives.
    pub fn fold_multiplicative(&self, scope: ModifierScope) -> Result<Fixed> {
        self.check_scope(scope)?;
        Ok(self
            .live_in(scope)
            .filter(|m| m.kind == ModifierKind::Multiplicative)
            .fold(Fixed::ONE, |acc, m| acc.saturating_mul(m.value)))
    }

    /// Combined damage reduction `1 - Π(1 - r_i)`, always in `[0, 1]`.
    #[must_use]
    pub fn fold_damage_reduction(&self) -> Fixed {
        let remaining = self
            .live_in(ModifierScope::DamageReduction)
            .fold(Fixed::ONE, |acc, m| acc * (Fixed::ONE - clamp01(m.value)));
        clamp01(Fixed::ONE - remaining)
    }

    /// Per-scope view of all live entries.
    #[must_use]
    pub fn summary(&self) -> ModifierSummary {
        let mut summary = ModifierSummary::new();
        for modifier in self.live() {
            let scope = summary.entry(modifier.scope).or_default();
            match modifier.kind {
                ModifierKind::Additive => {
                    scope.additive = scope.additive.saturating_add(modifier.value);
                }
                ModifierKind::Multiplicative => {
                    scope.multiplier = scope.multiplier.saturating_mul(modifier.value);
                }
            }
            scope.sources.push(modifier.source.clone());
        }
        summary
    }

    /// Iterate over live entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Modifier> {
        self.live()
    }

    /// Number of stored entries, including any not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stack holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ratio;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    #[test]
    fn test_empty_fold_returns_base() {
        let stack = ModifierStack::new();
        assert_eq!(stack.fold(ModifierScope::Armor, fixed(50)).unwrap(), fixed(50));
    }

    #[test]
    fn test_fold_adds_then_multiplies() {
        let mut stack = ModifierStack::new();
        stack
            .upsert("garrison", ModifierScope::Armor, ModifierKind::Additive, fixed(10), None)
            .unwrap();
        stack
            .upsert("formation", ModifierScope::Armor, ModifierKind::Multiplicative, fixed(2), None)
            .unwrap();
        assert_eq!(stack.fold(ModifierScope::Armor, fixed(40)).unwrap(), fixed(100));
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let mut stack = ModifierStack::new();
        for count in 1..=4 {
            stack
                .upsert(
                    "garrison",
                    ModifierScope::Armor,
                    ModifierKind::Additive,
                    fixed(count * 5),
                    None,
                )
                .unwrap();
        }
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.fold(ModifierScope::Armor, fixed(50)).unwrap(), fixed(70));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut stack = ModifierStack::new();
        assert!(stack.remove(&SourceId::from("nobody"), ModifierScope::Damage).is_none());
        assert_eq!(stack.remove_source(&SourceId::from("nobody")), 0);
    }

    #[test]
    fn test_remove_source_drops_all_scopes() {
        let mut stack = ModifierStack::new();
        let source = SourceId::from("ability.fortify");
        stack
            .upsert(source.clone(), ModifierScope::Armor, ModifierKind::Additive, fixed(25), None)
            .unwrap();
        stack
            .upsert(
                source.clone(),
                ModifierScope::Damage,
                ModifierKind::Multiplicative,
                ratio(3, 2),
                None,
            )
            .unwrap();
        assert_eq!(stack.remove_source(&source), 2);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_damage_reduction_stacks_multiplicatively() {
        let mut stack = ModifierStack::new();
        for source in ["terrain", "shield_wall"] {
            stack
                .upsert(
                    source,
                    ModifierScope::DamageReduction,
                    ModifierKind::Multiplicative,
                    ratio(1, 2),
                    None,
                )
                .unwrap();
        }
        assert_eq!(stack.fold_damage_reduction(), ratio(3, 4));
    }

    #[test]
    fn test_damage_reduction_clamped_on_insert() {
        let mut stack = ModifierStack::new();
        stack
            .upsert(
                "overcharged",
                ModifierScope::DamageReduction,
                ModifierKind::Multiplicative,
                fixed(3),
                None,
            )
            .unwrap();
        assert_eq!(stack.fold_damage_reduction(), Fixed::ONE);
    }

    #[test]
    fn test_expired_entries_ignored_after_clock_advances() {
        let mut stack = ModifierStack::new();
        stack
            .upsert("emp", ModifierScope::Damage, ModifierKind::Multiplicative, Fixed::ZERO, Some(10))
            .unwrap();
        stack.purge_expired(9);
        assert_eq!(stack.fold(ModifierScope::Damage, fixed(10)).unwrap(), Fixed::ZERO);
        assert_eq!(stack.purge_expired(10), 1);
        assert_eq!(stack.fold(ModifierScope::Damage, fixed(10)).unwrap(), fixed(10));
    }

    #[test]
    fn test_custom_scope_requires_registration() {
        let mut stack = ModifierStack::new();
        let scope = ModifierScope::Custom(7);
        assert_eq!(
            stack.fold(scope, Fixed::ONE),
            Err(CombatError::UnknownModifierScope(scope))
        );
        assert!(stack
            .upsert("x", scope, ModifierKind::Additive, Fixed::ONE, None)
            .is_err());

        stack.register_scope(7);
        stack
            .upsert("x", scope, ModifierKind::Additive, Fixed::ONE, None)
            .unwrap();
        assert_eq!(stack.fold(scope, Fixed::ONE).unwrap(), fixed(2));
    }

    #[test]
    fn test_fold_multiplicative_ignores_additives() {
        let mut stack = ModifierStack::new();
        stack
            .upsert("a", ModifierScope::Speed, ModifierKind::Additive, fixed(3), None)
            .unwrap();
        stack
            .upsert("b", ModifierScope::Speed, ModifierKind::Multiplicative, ratio(1, 2), None)
            .unwrap();
        assert_eq!(stack.fold_multiplicative(ModifierScope::Speed).unwrap(), ratio(1, 2));
    }

    #[test]
    fn test_summary_lists_sources_per_scope() {
        let mut stack = ModifierStack::new();
        stack
            .upsert("garrison", ModifierScope::Armor, ModifierKind::Additive, fixed(10), None)
            .unwrap();
        stack
            .upsert("ability.rage", ModifierScope::Damage, ModifierKind::Multiplicative, fixed(2), None)
            .unwrap();

        let summary = stack.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[&ModifierScope::Armor].additive, fixed(10));
        assert_eq!(summary[&ModifierScope::Damage].multiplier, fixed(2));
        assert_eq!(
            summary[&ModifierScope::Damage].sources,
            vec![SourceId::from("ability.rage")]
        );
    }
}
