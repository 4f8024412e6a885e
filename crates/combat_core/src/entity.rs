//! Combat entities: units and structures.
//!
//! An entity is a fixed set of combat fields plus optional capabilities
//! (weapon, garrison, repair aura, shield, weapon refits). Other entities
//! and the world affect it only through the methods here.

use serde::{Deserialize, Serialize};

use crate::ability::{AbilityKind, AbilityRegistry};
use crate::config::CombatConfig;
use crate::damage::{DamageProfile, DamageRoll};
use crate::environment::{EnvironmentResistance, EnvironmentState};
use crate::error::{CombatError, Result};
use crate::formation::FormationKind;
use crate::garrison::{Garrison, GarrisonClass};
use crate::math::{fixed_serde, Fixed, SimTime, Vec2Fixed};
use crate::modifiers::{ModifierScope, ModifierStack};
use crate::retreat::RetreatState;
use crate::terrain::{TerrainAdaptation, TerrainSample};
use crate::upgrade::WeaponLoadout;
use crate::vitals::{DamageOutcome, Shield, Vitals};

/// Unique identifier for entities.
pub type EntityId = u64;

/// Faction an entity fights for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct FactionId(pub u8);

/// Weapon with its own attack clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    /// Attack profile.
    pub profile: DamageProfile,
    /// Base ticks between attacks.
    pub attack_interval: SimTime,
    /// Base reach.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    ready_at: SimTime,
}

impl Weapon {
    /// Create a weapon that can fire immediately.
    #[must_use]
    pub const fn new(profile: DamageProfile, attack_interval: SimTime, range: Fixed) -> Self {
        Self {
            profile,
            attack_interval,
            range,
            ready_at: 0,
        }
    }

    /// Whether the weapon has reloaded at `now`.
    #[must_use]
    pub const fn is_ready(&self, now: SimTime) -> bool {
        now >= self.ready_at
    }
}

/// Periodic heal pulse carried by a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepairAura {
    /// Tick of the next pulse.
    pub next_pulse_at: SimTime,
}

/// Parameters for spawning an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnParams {
    /// Owning faction.
    pub faction: FactionId,
    /// Initial position.
    pub position: Vec2Fixed,
    /// Maximum (and starting) health.
    pub max_health: Fixed,
    /// Armor before modifiers.
    pub base_armor: Fixed,
    /// Speed before modifiers.
    pub base_speed: Fixed,
    /// Weapon, if the entity can attack.
    pub weapon: Option<Weapon>,
    /// Flying units take `AirDamage` bonuses.
    pub airborne: bool,
    /// Declared garrison capability; `None` cannot enter garrisons.
    pub garrison_class: Option<GarrisonClass>,
    /// Entity can host a garrison.
    pub garrison_host: bool,
    /// Entity has a regenerating shield.
    pub shielded: bool,
    /// Entity pulses repairs to nearby allies.
    pub repair_aura: bool,
    /// Entity can be refitted with weapon upgrades.
    pub upgradable: bool,
    /// Entity-owned abilities to register.
    pub abilities: Vec<AbilityKind>,
    /// Preferred fallback point for tactical retreat.
    pub rally_point: Option<Vec2Fixed>,
    /// Entity accumulates environmental strain.
    pub exposed: bool,
    /// Resistance to strain; the configured default when `None`.
    pub resistance: Option<EnvironmentResistance>,
}

impl Default for SpawnParams {
    fn default() -> Self {
        Self {
            faction: FactionId::default(),
            position: Vec2Fixed::ZERO,
            max_health: Fixed::from_num(100),
            base_armor: Fixed::ZERO,
            base_speed: Fixed::ONE,
            weapon: None,
            airborne: false,
            garrison_class: None,
            garrison_host: false,
            shielded: false,
            repair_aura: false,
            upgradable: false,
            abilities: Vec::new(),
            rally_point: None,
            exposed: false,
            resistance: None,
        }
    }
}

/// A unit or structure taking part in combat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatEntity {
    /// Unique identifier.
    pub id: EntityId,
    /// Owning faction.
    pub faction: FactionId,
    /// World position. Meaningless while garrisoned.
    pub position: Vec2Fixed,
    pub(crate) vitals: Vitals,
    #[serde(with = "fixed_serde")]
    pub(crate) base_armor: Fixed,
    #[serde(with = "fixed_serde")]
    pub(crate) base_speed: Fixed,
    pub(crate) airborne: bool,
    pub(crate) weapon: Option<Weapon>,
    pub(crate) attack_target: Option<EntityId>,
    pub(crate) modifiers: ModifierStack,
    pub(crate) abilities: AbilityRegistry,
    pub(crate) garrison: Option<Garrison>,
    pub(crate) garrison_class: Option<GarrisonClass>,
    pub(crate) garrisoned_in: Option<EntityId>,
    pub(crate) repair: Option<RepairAura>,
    pub(crate) loadout: Option<WeaponLoadout>,
    pub(crate) retreat: RetreatState,
    pub(crate) rally_point: Option<Vec2Fixed>,
    pub(crate) formation: FormationKind,
    pub(crate) terrain: TerrainSample,
    pub(crate) adaptation: TerrainAdaptation,
    pub(crate) environment: Option<EnvironmentState>,
    pub(crate) resting: bool,
}

impl CombatEntity {
    pub(crate) fn from_params(id: EntityId, params: SpawnParams, config: &CombatConfig) -> Self {
        let mut vitals = Vitals::new(params.max_health);
        if params.shielded {
            vitals = vitals.with_shield(Shield::new(
                config.shield.max,
                config.shield.regen_per_tick(),
            ));
        }

        let exclusions = config
            .exclusions
            .iter()
            .copied()
            .filter(|(a, b)| !a.is_faction_wide() && !b.is_faction_wide())
            .collect();
        let mut abilities = AbilityRegistry::new().with_exclusions(exclusions);
        for kind in params.abilities {
            if kind.is_faction_wide() {
                tracing::warn!(entity = id, ability = ?kind, "Faction ability ignored on entity spawn");
                continue;
            }
            abilities.register(kind, config.timing(kind));
        }
        if params.upgradable && !abilities.contains(AbilityKind::WeaponUpgrade) {
            abilities.register(
                AbilityKind::WeaponUpgrade,
                config.timing(AbilityKind::WeaponUpgrade),
            );
        }

        Self {
            id,
            faction: params.faction,
            position: params.position,
            vitals,
            base_armor: params.base_armor,
            base_speed: params.base_speed,
            airborne: params.airborne,
            weapon: params.weapon,
            attack_target: None,
            modifiers: ModifierStack::new(),
            abilities,
            garrison: params
                .garrison_host
                .then(|| Garrison::new(&config.garrison, garrison_seed(config.seed, id))),
            garrison_class: params.garrison_class,
            garrisoned_in: None,
            repair: params.repair_aura.then(RepairAura::default),
            loadout: params.upgradable.then(WeaponLoadout::default),
            retreat: RetreatState::default(),
            rally_point: params.rally_point,
            formation: FormationKind::default(),
            terrain: TerrainSample::default(),
            adaptation: TerrainAdaptation::default(),
            environment: params.exposed.then(|| {
                EnvironmentState::new(params.resistance.unwrap_or(config.environment.resistance))
            }),
            resting: false,
        }
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> Fixed {
        self.vitals.current()
    }

    /// Health and shield.
    #[must_use]
    pub const fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    /// Armor before modifiers.
    #[must_use]
    pub const fn base_armor(&self) -> Fixed {
        self.base_armor
    }

    /// Whether the entity flies.
    #[must_use]
    pub const fn is_airborne(&self) -> bool {
        self.airborne
    }

    /// Modifier stack.
    #[must_use]
    pub const fn modifiers(&self) -> &ModifierStack {
        &self.modifiers
    }

    /// Entity-owned abilities.
    #[must_use]
    pub const fn abilities(&self) -> &AbilityRegistry {
        &self.abilities
    }

    /// Garrison hosted by this entity.
    #[must_use]
    pub const fn garrison(&self) -> Option<&Garrison> {
        self.garrison.as_ref()
    }

    /// Host this entity is garrisoned in.
    #[must_use]
    pub const fn garrisoned_in(&self) -> Option<EntityId> {
        self.garrisoned_in
    }

    /// Weapon refit state.
    #[must_use]
    pub const fn loadout(&self) -> Option<&WeaponLoadout> {
        self.loadout.as_ref()
    }

    /// Retreat progress.
    #[must_use]
    pub const fn retreat(&self) -> &RetreatState {
        &self.retreat
    }

    /// Environmental strain, if tracked.
    #[must_use]
    pub const fn environment(&self) -> Option<&EnvironmentState> {
        self.environment.as_ref()
    }

    /// Current terrain sample.
    #[must_use]
    pub const fn terrain(&self) -> &TerrainSample {
        &self.terrain
    }

    /// Standing attack target.
    #[must_use]
    pub const fn attack_target(&self) -> Option<EntityId> {
        self.attack_target
    }

    /// Whether health has reached zero.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.vitals.is_destroyed()
    }

    /// Alive and not inside a garrison.
    #[must_use]
    pub const fn is_in_world(&self) -> bool {
        !self.is_destroyed() && self.garrisoned_in.is_none()
    }

    /// Armor after modifiers.
    pub fn armor(&self) -> Result<Fixed> {
        self.modifiers.fold(ModifierScope::Armor, self.base_armor)
    }

    /// Speed after modifiers.
    pub fn speed(&self) -> Result<Fixed> {
        self.modifiers.fold(ModifierScope::Speed, self.base_speed)
    }

    /// Reach after modifiers, if armed.
    pub fn attack_range(&self) -> Result<Option<Fixed>> {
        self.weapon
            .as_ref()
            .map(|weapon| self.modifiers.fold(ModifierScope::AttackRange, weapon.range))
            .transpose()
    }

    /// Ticks between attacks after modifiers, at least one.
    pub fn attack_interval(&self) -> Result<Option<SimTime>> {
        let Some(weapon) = self.weapon.as_ref() else {
            return Ok(None);
        };
        let base = Fixed::saturating_from_num(weapon.attack_interval);
        let folded = self.modifiers.fold(ModifierScope::AttackInterval, base)?;
        Ok(Some(folded.ceil().max(Fixed::ONE).to_num::<SimTime>()))
    }

    /// Whether the entity may fire at `now`.
    #[must_use]
    pub fn can_attack(&self, now: SimTime) -> bool {
        self.is_in_world()
            && !self.retreat.is_retreating()
            && self.weapon.as_ref().is_some_and(|weapon| weapon.is_ready(now))
    }

    pub(crate) fn profile_against(&self, target: &CombatEntity) -> Option<DamageProfile> {
        self.weapon
            .as_ref()
            .map(|weapon| weapon.profile.against_air(target.is_airborne()))
    }

    pub(crate) fn reload(&mut self, now: SimTime) -> Result<()> {
        let interval = self.attack_interval()?.unwrap_or(1);
        if let Some(weapon) = self.weapon.as_mut() {
            weapon.ready_at = now + interval;
        }
        Ok(())
    }

    /// Apply a resolved hit. No-op once destroyed.
    pub fn take_hit(&mut self, roll: DamageRoll) -> DamageOutcome {
        self.vitals.apply_damage(roll.amount)
    }

    /// Restore health, returning the amount healed.
    pub fn heal(&mut self, amount: Fixed) -> Fixed {
        self.vitals.heal(amount)
    }

    pub(crate) fn require_garrison(&mut self) -> Result<&mut Garrison> {
        let id = self.id;
        self.garrison.as_mut().ok_or(CombatError::MissingComponent {
            entity: id,
            component: "garrison",
        })
    }

    pub(crate) fn require_loadout(&mut self) -> Result<&mut WeaponLoadout> {
        let id = self.id;
        self.loadout.as_mut().ok_or(CombatError::MissingComponent {
            entity: id,
            component: "weapon loadout",
        })
    }
}

/// Independent RNG stream per host, derived from the world seed.
fn garrison_seed(seed: u64, id: EntityId) -> u64 {
    seed ^ id.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ratio;
    use crate::modifiers::ModifierKind;

    fn armed_unit() -> SpawnParams {
        SpawnParams {
            weapon: Some(Weapon::new(
                DamageProfile::new(Fixed::from_num(10)),
                20,
                Fixed::from_num(6),
            )),
            ..SpawnParams::default()
        }
    }

    fn spawn(params: SpawnParams) -> CombatEntity {
        CombatEntity::from_params(1, params, &CombatConfig::default())
    }

    #[test]
    fn test_attack_interval_folds_and_rounds_up() {
        let mut entity = spawn(armed_unit());
        assert_eq!(entity.attack_interval().unwrap(), Some(20));

        entity
            .modifiers
            .upsert(
                "weapon_upgrade",
                ModifierScope::AttackInterval,
                ModifierKind::Multiplicative,
                ratio(4, 5),
                None,
            )
            .unwrap();
        assert_eq!(entity.attack_interval().unwrap(), Some(16));
    }

    #[test]
    fn test_reload_gates_next_attack() {
        let mut entity = spawn(armed_unit());
        assert!(entity.can_attack(0));
        entity.reload(0).unwrap();
        assert!(!entity.can_attack(19));
        assert!(entity.can_attack(20));
    }

    #[test]
    fn test_unarmed_entity_has_no_range() {
        let entity = spawn(SpawnParams::default());
        assert_eq!(entity.attack_range().unwrap(), None);
        assert!(!entity.can_attack(0));
    }

    #[test]
    fn test_garrisoned_entity_is_out_of_world() {
        let mut entity = spawn(armed_unit());
        assert!(entity.is_in_world());
        entity.garrisoned_in = Some(99);
        assert!(!entity.is_in_world());
        assert!(!entity.can_attack(0));
    }

    #[test]
    fn test_spawn_registers_entity_abilities_only() {
        let entity = spawn(SpawnParams {
            abilities: vec![AbilityKind::Fortify, AbilityKind::Rage],
            upgradable: true,
            shielded: true,
            ..SpawnParams::default()
        });
        assert!(entity.abilities().contains(AbilityKind::Fortify));
        assert!(entity.abilities().contains(AbilityKind::WeaponUpgrade));
        assert!(!entity.abilities().contains(AbilityKind::Rage));
        assert!(entity.loadout().is_some());
        assert_eq!(entity.vitals().shield().unwrap().max, Fixed::from_num(200));
    }

    #[test]
    fn test_missing_garrison_is_reported() {
        let mut entity = spawn(SpawnParams::default());
        assert_eq!(
            entity.require_garrison().unwrap_err(),
            CombatError::MissingComponent {
                entity: 1,
                component: "garrison",
            }
        );
    }
}
