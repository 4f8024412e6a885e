//! Simulation root.
//!
//! [`World`] owns every combat entity, the per-faction ability registries,
//! queued commands and the event buffer. It advances at a fixed tick rate
//! and processes everything deterministically.
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - One seeded RNG for crit rolls; each garrison has its own stream
//! - Entities processed in ascending id order
//! - Same config, spawns and commands always produce the same hash
//!
//! # Example
//!
//! ```
//! use combat_core::ability::AbilityKind;
//! use combat_core::entity::SpawnParams;
//! use combat_core::math::Fixed;
//! use combat_core::modifiers::ModifierScope;
//! use combat_core::world::{Command, World};
//!
//! let mut world = World::default();
//! let bunker = world.spawn(SpawnParams {
//!     base_armor: Fixed::from_num(50),
//!     abilities: vec![AbilityKind::Fortify],
//!     ..Default::default()
//! });
//!
//! world.queue(Command::Activate { entity: bunker, ability: AbilityKind::Fortify });
//! let events = world.tick();
//! assert!(events.rejected.is_empty());
//!
//! let armor = world.entity(bunker).unwrap().armor().unwrap();
//! assert_eq!(armor, Fixed::from_num(75));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::ability::{AbilityKind, AbilityRegistry, AbilityState, AbilityTransition};
use crate::config::CombatConfig;
use crate::damage::{self, DamageProfile, DamageRoll};
use crate::entity::{CombatEntity, EntityId, FactionId, RepairAura, SpawnParams};
use crate::environment::Weather;
use crate::error::{CombatError, Result};
use crate::events::{AbilityOwner, CombatEvent, RejectedCommand, TickEvents};
use crate::formation::{morale_multiplier, proximity_multiplier, FormationConfig, FormationKind};
use crate::garrison::GARRISON_SOURCE;
use crate::math::{Fixed, SimTime, Vec2Fixed};
use crate::modifiers::{
    ModifierKind, ModifierScope, ModifierSpec, ModifierStack, ModifierSummary, SourceId,
};
use crate::retreat::{fallback_point, RetreatPhase};
use crate::terrain::TerrainSample;
use crate::upgrade::WeaponVariant;

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Player or AI intent, applied at the start of the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Activate an entity-owned ability.
    Activate {
        /// Owner.
        entity: EntityId,
        /// Ability.
        ability: AbilityKind,
    },
    /// Cancel an entity-owned ability.
    Cancel {
        /// Owner.
        entity: EntityId,
        /// Ability.
        ability: AbilityKind,
    },
    /// Start a weapon refit.
    Upgrade {
        /// Structure to refit.
        entity: EntityId,
        /// Variant to install.
        variant: WeaponVariant,
    },
    /// Activate a faction-owned ability at a point.
    ActivateFaction {
        /// Owner.
        faction: FactionId,
        /// Ability.
        ability: AbilityKind,
        /// Target point; ignored by abilities without an area.
        target: Vec2Fixed,
    },
    /// Cancel a faction-owned ability.
    CancelFaction {
        /// Owner.
        faction: FactionId,
        /// Ability.
        ability: AbilityKind,
    },
    /// Move a unit into a garrison.
    Enter {
        /// Unit entering.
        unit: EntityId,
        /// Host structure.
        host: EntityId,
    },
    /// Move a unit out of its garrison.
    Exit {
        /// Unit leaving.
        unit: EntityId,
    },
    /// Set a standing attack target.
    Attack {
        /// Attacker.
        attacker: EntityId,
        /// Target.
        target: EntityId,
    },
    /// Clear the standing attack target.
    StopAttack {
        /// Attacker.
        attacker: EntityId,
    },
    /// Change formation.
    SetFormation {
        /// Unit.
        entity: EntityId,
        /// New formation.
        formation: FormationKind,
    },
    /// Toggle resting, which recovers fatigue instead of building it.
    SetResting {
        /// Unit.
        entity: EntityId,
        /// Whether the unit rests.
        resting: bool,
    },
}

/// In-world entity data used by the contextual producers.
struct Snapshot {
    id: EntityId,
    faction: FactionId,
    position: Vec2Fixed,
    health: Fixed,
}

/// The combat simulation.
///
/// # System Execution Order
///
/// Each tick, systems run in this order:
/// 1. **Clock** - Advance time and purge expired modifiers
/// 2. **Abilities** - Advance ability machines and retreat phases
/// 3. **Commands** - Apply commands queued since the last tick
/// 4. **Auto-triggers** - Rage and tactical retreat
/// 5. **Producers** - Formation, terrain, environment, shields, repairs
/// 6. **Combat** - Resolve standing attacks
/// 7. **Events** - Drain the event buffer
#[derive(Debug, Clone, Serialize)]
pub struct World {
    now: SimTime,
    next_id: EntityId,
    entities: BTreeMap<EntityId, CombatEntity>,
    factions: BTreeMap<FactionId, AbilityRegistry>,
    pending: Vec<Command>,
    weather: Weather,
    rng: ChaCha8Rng,
    #[serde(skip)]
    config: CombatConfig,
    #[serde(skip)]
    events: Vec<CombatEvent>,
}

impl World {
    /// Create an empty world at tick 0.
    #[must_use]
    pub fn new(config: CombatConfig) -> Self {
        Self {
            now: 0,
            next_id: 1,
            entities: BTreeMap::new(),
            factions: BTreeMap::new(),
            pending: Vec::new(),
            weather: Weather::default(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            events: Vec::new(),
        }
    }

    /// Current tick.
    #[must_use]
    pub const fn now(&self) -> SimTime {
        self.now
    }

    /// Configuration the world was built with.
    #[must_use]
    pub const fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Current weather.
    #[must_use]
    pub const fn weather(&self) -> Weather {
        self.weather
    }

    /// Look up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&CombatEntity> {
        self.entities.get(&id)
    }

    /// Iterate over entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &CombatEntity> {
        self.entities.values()
    }

    /// Entity ids in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Number of entities, destroyed ones included until reaped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the world has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Faction-owned abilities.
    #[must_use]
    pub fn faction_abilities(&self, faction: FactionId) -> Option<&AbilityRegistry> {
        self.factions.get(&faction)
    }

    /// Spawn an entity and return its id.
    ///
    /// The first entity of a faction creates that faction's ability
    /// registry. Units joining a raging faction rage immediately.
    pub fn spawn(&mut self, params: SpawnParams) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;

        let faction = params.faction;
        let mut entity = CombatEntity::from_params(id, params, &self.config);
        let registry = self
            .factions
            .entry(faction)
            .or_insert_with(|| faction_registry(&self.config));
        if registry.is_active(AbilityKind::Rage) {
            if let Err(err) = apply_rage(&mut entity.modifiers, &self.config) {
                tracing::warn!(entity = id, %err, "Failed to apply rage on spawn");
            }
        }

        self.entities.insert(id, entity);
        id
    }

    /// Queue a command for the next tick.
    pub fn queue(&mut self, command: Command) {
        self.pending.push(command);
    }

    /// Apply a command immediately.
    ///
    /// Events it produces are reported by the next [`tick`](Self::tick).
    /// Commands addressed to destroyed entities are ignored.
    ///
    /// # Errors
    ///
    /// Returns the reason the command was rejected; nothing is mutated
    /// in that case.
    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Activate { entity, ability } => {
                self.activate_entity_ability(entity, ability, None)
            }
            Command::Cancel { entity, ability } => self.cancel_entity_ability(entity, ability),
            Command::Upgrade { entity, variant } => {
                self.activate_entity_ability(entity, AbilityKind::WeaponUpgrade, Some(variant))
            }
            Command::ActivateFaction {
                faction,
                ability,
                target,
            } => self.activate_faction_ability(faction, ability, target),
            Command::CancelFaction { faction, ability } => {
                self.cancel_faction_ability(faction, ability)
            }
            Command::Enter { unit, host } => self.enter_garrison(unit, host),
            Command::Exit { unit } => self.exit_garrison(unit),
            Command::Attack { attacker, target } => self.order_attack(attacker, target),
            Command::StopAttack { attacker } => {
                self.entity_mut(attacker)?.attack_target = None;
                Ok(())
            }
            Command::SetFormation { entity, formation } => {
                self.entity_mut(entity)?.formation = formation;
                Ok(())
            }
            Command::SetResting { entity, resting } => {
                self.entity_mut(entity)?.resting = resting;
                Ok(())
            }
        }
    }

    /// Move an entity. Garrisoned entities keep their recorded exit point.
    pub fn set_position(&mut self, id: EntityId, position: Vec2Fixed) -> Result<()> {
        self.entity_mut(id)?.position = position;
        Ok(())
    }

    /// Update the terrain under an entity.
    pub fn set_terrain(&mut self, id: EntityId, sample: TerrainSample) -> Result<()> {
        self.entity_mut(id)?.terrain = sample;
        Ok(())
    }

    /// Update the weather for all exposed entities.
    pub fn set_weather(&mut self, weather: Weather) {
        self.weather = weather;
    }

    /// Push an externally produced modifier onto an entity.
    pub fn apply_modifier(
        &mut self,
        id: EntityId,
        source: impl Into<SourceId>,
        spec: ModifierSpec,
        expires_at: Option<SimTime>,
    ) -> Result<()> {
        self.entity_mut(id)?
            .modifiers
            .apply_spec(source, spec, expires_at)
    }

    /// Remove every modifier `source` owns on an entity.
    pub fn remove_modifier_source(&mut self, id: EntityId, source: &SourceId) -> Result<usize> {
        Ok(self.entity_mut(id)?.modifiers.remove_source(source))
    }

    /// Read-only per-scope view of an entity's live modifiers.
    pub fn active_modifier_summary(&self, id: EntityId) -> Result<ModifierSummary> {
        self.entities
            .get(&id)
            .map(|entity| entity.modifiers.summary())
            .ok_or(CombatError::EntityNotFound(id))
    }

    /// Remove destroyed entities, returning their ids.
    pub fn reap_destroyed(&mut self) -> Vec<EntityId> {
        let dead: Vec<EntityId> = self
            .entities
            .values()
            .filter(|entity| entity.is_destroyed())
            .map(|entity| entity.id)
            .collect();
        for id in &dead {
            self.entities.remove(id);
        }
        dead
    }

    /// Advance the simulation by one tick.
    ///
    /// Returns the events generated since the previous tick, including
    /// any produced by [`apply`](Self::apply) in between.
    pub fn tick(&mut self) -> TickEvents {
        // 1. Clock
        self.now += 1;
        let now = self.now;
        for entity in self.entities.values_mut() {
            entity.modifiers.purge_expired(now);
        }

        let ids = self.sorted_ids();

        // 2. Ability machines
        self.advance_abilities(&ids);

        // 3. Queued commands
        let rejected = self.apply_pending();

        // 4. Auto-triggers
        self.evaluate_auto_triggers(&ids);

        // 5. Contextual producers
        if let Err(err) = self.refresh_producers(&ids) {
            tracing::warn!(tick = now, %err, "Producer refresh failed");
        }
        self.pulse_repairs(&ids);

        // 6. Combat
        self.resolve_attacks(&ids);

        #[cfg(feature = "debug-validation")]
        self.validate_garrisons();

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = now, state_hash = hash, "World state hash");
        }

        // 7. Events
        TickEvents {
            tick: now,
            events: std::mem::take(&mut self.events),
            rejected,
        }
    }

    /// Hash of the full world state.
    ///
    /// Two worlds built from the same config, spawns and commands produce
    /// identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self.serialize() {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(err) => {
                tracing::warn!(%err, "State hash fell back to tick only");
                self.now.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Encode the world state.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| CombatError::Encode(e.to_string()))
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut CombatEntity> {
        self.entities
            .get_mut(&id)
            .ok_or(CombatError::EntityNotFound(id))
    }

    fn apply_pending(&mut self) -> Vec<RejectedCommand> {
        let pending = std::mem::take(&mut self.pending);
        let mut rejected = Vec::new();
        for command in pending {
            if let Err(error) = self.apply(command.clone()) {
                tracing::warn!(?command, %error, "Rejected queued command");
                rejected.push(RejectedCommand { command, error });
            }
        }
        rejected
    }

    fn advance_abilities(&mut self, ids: &[EntityId]) {
        let now = self.now;

        let factions: Vec<FactionId> = self.factions.keys().copied().collect();
        for faction in factions {
            let transitions = match self.factions.get_mut(&faction) {
                Some(registry) => registry.tick(now),
                None => continue,
            };
            for (kind, transition) in transitions {
                self.on_faction_transition(faction, kind, transition);
            }
        }

        for &id in ids {
            if self.entities.get(&id).map_or(true, CombatEntity::is_destroyed) {
                continue;
            }
            self.advance_retreat(id);
            let transitions = match self.entities.get_mut(&id) {
                Some(entity) => entity.abilities.tick(now),
                None => continue,
            };
            for (kind, transition) in transitions {
                if let Err(err) = self.on_entity_transition(id, kind, transition, false) {
                    tracing::warn!(entity = id, ability = ?kind, %err, "Ability transition failed");
                }
            }
        }
    }

    fn advance_retreat(&mut self, id: EntityId) {
        let now = self.now;
        let Self {
            entities,
            config,
            events,
            ..
        } = self;
        let Some(entity) = entities.get_mut(&id) else {
            return;
        };
        if entity.is_destroyed() || !entity.retreat.is_retreating() {
            return;
        }

        if let Some(phase) = entity.retreat.advance(now, &config.retreat) {
            if phase == RetreatPhase::Idle {
                entity.position = entity.retreat.destination();
            }
            events.push(CombatEvent::RetreatPhaseChanged {
                entity: id,
                phase,
                destination: entity.retreat.destination(),
            });
        }
        if entity.retreat.phase() == RetreatPhase::Moving {
            entity.position = entity.retreat.position_at(now, &config.retreat);
        }
    }

    fn on_entity_transition(
        &mut self,
        id: EntityId,
        kind: AbilityKind,
        transition: AbilityTransition,
        cancelled: bool,
    ) -> Result<()> {
        let Self {
            entities,
            config,
            events,
            ..
        } = self;
        let Some(entity) = entities.get_mut(&id) else {
            return Ok(());
        };
        let owner = AbilityOwner::Entity(id);

        match transition {
            AbilityTransition::Activated => {
                events.push(CombatEvent::AbilityActivated {
                    owner,
                    ability: kind,
                });
            }
            AbilityTransition::Ready => {
                events.push(CombatEvent::AbilityReady {
                    owner,
                    ability: kind,
                });
            }
            AbilityTransition::Deactivated => {
                entity.modifiers.remove_source(&kind.source_id());
                events.push(CombatEvent::AbilityDeactivated {
                    owner,
                    ability: kind,
                });

                match kind {
                    AbilityKind::TacticalRetreat if entity.retreat.is_retreating() => {
                        if !cancelled {
                            entity.position = entity.retreat.destination();
                        }
                        entity.retreat.stop();
                        events.push(CombatEvent::RetreatPhaseChanged {
                            entity: id,
                            phase: RetreatPhase::Idle,
                            destination: entity.retreat.destination(),
                        });
                    }
                    AbilityKind::WeaponUpgrade => {
                        if let Some(loadout) = entity.loadout.as_mut() {
                            if cancelled {
                                loadout.abort();
                            } else if let Some(variant) =
                                loadout.complete(&mut entity.modifiers, &config.weapon_upgrade)?
                            {
                                events.push(CombatEvent::WeaponUpgradeCompleted {
                                    entity: id,
                                    variant,
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn on_faction_transition(
        &mut self,
        faction: FactionId,
        kind: AbilityKind,
        transition: AbilityTransition,
    ) {
        let owner = AbilityOwner::Faction(faction);
        match transition {
            AbilityTransition::Activated => self.events.push(CombatEvent::AbilityActivated {
                owner,
                ability: kind,
            }),
            AbilityTransition::Ready => self.events.push(CombatEvent::AbilityReady {
                owner,
                ability: kind,
            }),
            AbilityTransition::Deactivated => {
                let source = kind.source_id();
                for entity in self
                    .entities
                    .values_mut()
                    .filter(|entity| entity.faction == faction)
                {
                    entity.modifiers.remove_source(&source);
                }
                self.events.push(CombatEvent::AbilityDeactivated {
                    owner,
                    ability: kind,
                });
            }
        }
    }

    fn activate_entity_ability(
        &mut self,
        id: EntityId,
        kind: AbilityKind,
        variant: Option<WeaponVariant>,
    ) -> Result<()> {
        if kind.is_faction_wide() {
            return Err(CombatError::AbilityNotRegistered(kind));
        }
        let now = self.now;
        let destination = if kind == AbilityKind::TacticalRetreat {
            Some(self.fallback_for(id)?)
        } else {
            None
        };

        let Self {
            entities,
            config,
            events,
            ..
        } = self;
        let entity = entities
            .get_mut(&id)
            .ok_or(CombatError::EntityNotFound(id))?;
        if entity.is_destroyed() {
            return Ok(());
        }

        if kind == AbilityKind::WeaponUpgrade {
            let variant = variant.ok_or(CombatError::MissingComponent {
                entity: id,
                component: "weapon variant",
            })?;
            entity.require_loadout()?.check(variant)?;
            entity.abilities.activate(kind, now)?;
            entity.require_loadout()?.begin(variant)?;
            entity.modifiers.upsert(
                kind.source_id(),
                ModifierScope::Damage,
                ModifierKind::Multiplicative,
                Fixed::ZERO,
                None,
            )?;
        } else {
            entity.abilities.activate(kind, now)?;
            match kind {
                AbilityKind::Fortify => {
                    let source = kind.source_id();
                    entity.modifiers.apply_spec(
                        source.clone(),
                        ModifierSpec::additive(ModifierScope::Armor, config.fortify.armor_bonus),
                        None,
                    )?;
                    entity.modifiers.apply_spec(
                        source,
                        ModifierSpec::multiplicative(
                            ModifierScope::Damage,
                            config.fortify.damage_multiplier,
                        ),
                        None,
                    )?;
                }
                AbilityKind::TacticalRetreat => {
                    let destination = destination.unwrap_or(entity.position);
                    entity.retreat.begin(now, entity.position, destination);
                    entity.attack_target = None;
                    entity.modifiers.apply_spec(
                        kind.source_id(),
                        ModifierSpec::multiplicative(
                            ModifierScope::Speed,
                            config.retreat.speed_multiplier,
                        ),
                        None,
                    )?;
                    events.push(CombatEvent::RetreatPhaseChanged {
                        entity: id,
                        phase: RetreatPhase::Deploying,
                        destination,
                    });
                }
                _ => {}
            }
        }

        events.push(CombatEvent::AbilityActivated {
            owner: AbilityOwner::Entity(id),
            ability: kind,
        });
        Ok(())
    }

    fn cancel_entity_ability(&mut self, id: EntityId, kind: AbilityKind) -> Result<()> {
        let now = self.now;
        let entity = self.entity_mut(id)?;
        if entity.is_destroyed() {
            return Ok(());
        }
        let transitions = entity.abilities.cancel(kind, now)?;
        for transition in transitions {
            self.on_entity_transition(id, kind, transition, true)?;
        }
        Ok(())
    }

    fn activate_faction_ability(
        &mut self,
        faction: FactionId,
        kind: AbilityKind,
        target: Vec2Fixed,
    ) -> Result<()> {
        if !kind.is_faction_wide() {
            return Err(CombatError::AbilityNotRegistered(kind));
        }
        let now = self.now;
        self.factions
            .get_mut(&faction)
            .ok_or(CombatError::AbilityNotRegistered(kind))?
            .activate(kind, now)?;
        self.events.push(CombatEvent::AbilityActivated {
            owner: AbilityOwner::Faction(faction),
            ability: kind,
        });

        match kind {
            AbilityKind::Rage => {
                for entity in self
                    .entities
                    .values_mut()
                    .filter(|entity| entity.faction == faction && !entity.is_destroyed())
                {
                    apply_rage(&mut entity.modifiers, &self.config)?;
                }
            }
            AbilityKind::ArtilleryStrike => self.artillery_strike(faction, target)?,
            AbilityKind::SatelliteScan => self.events.push(CombatEvent::AreaRevealed {
                faction,
                center: target,
                radius: self.config.satellite_scan.radius,
            }),
            AbilityKind::EmpBlast => {
                let radius = self.config.emp.radius;
                let until = now + self.config.emp.disable_ticks;
                for entity in self.entities.values_mut().filter(|entity| {
                    entity.faction != faction
                        && entity.is_in_world()
                        && entity.position.within(target, radius)
                }) {
                    entity.modifiers.upsert(
                        kind.source_id(),
                        ModifierScope::Damage,
                        ModifierKind::Multiplicative,
                        Fixed::ZERO,
                        Some(until),
                    )?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn cancel_faction_ability(&mut self, faction: FactionId, kind: AbilityKind) -> Result<()> {
        let now = self.now;
        let transitions = self
            .factions
            .get_mut(&faction)
            .ok_or(CombatError::AbilityNotRegistered(kind))?
            .cancel(kind, now)?;
        for transition in transitions {
            self.on_faction_transition(faction, kind, transition);
        }
        Ok(())
    }

    fn artillery_strike(&mut self, faction: FactionId, center: Vec2Fixed) -> Result<()> {
        let radius = self.config.artillery.radius;
        let profile =
            DamageProfile::new(self.config.artillery.damage).with_crit(Fixed::ZERO, Fixed::ONE);
        let battery = ModifierStack::new();
        let targets: Vec<EntityId> = self
            .entities
            .values()
            .filter(|entity| {
                entity.faction != faction
                    && entity.is_in_world()
                    && entity.position.within(center, radius)
            })
            .map(|entity| entity.id)
            .collect();

        for id in targets {
            let Some(target) = self.entities.get(&id) else {
                continue;
            };
            let hit = damage::resolve(
                &profile.against_air(target.is_airborne()),
                &battery,
                target.base_armor,
                &target.modifiers,
                Fixed::ONE,
            )?;
            self.apply_hit(id, hit);
        }
        Ok(())
    }

    fn enter_garrison(&mut self, unit: EntityId, host: EntityId) -> Result<()> {
        let (class, faction) = {
            let entity = self
                .entities
                .get(&unit)
                .ok_or(CombatError::EntityNotFound(unit))?;
            if entity.is_destroyed() {
                return Ok(());
            }
            if entity.garrisoned_in.is_some() {
                return Err(CombatError::AlreadyMember(unit));
            }
            (entity.garrison_class, entity.faction)
        };
        if unit == host {
            return Err(CombatError::AdmissionDenied(unit));
        }

        let host_entity = self.entity_mut(host)?;
        if host_entity.is_destroyed() || host_entity.faction != faction {
            return Err(CombatError::AdmissionDenied(unit));
        }
        let host_position = host_entity.position;
        host_entity
            .require_garrison()?
            .admit(unit, class, host_position)?;
        if let Some(garrison) = host_entity.garrison.as_ref() {
            garrison.apply_armor(&mut host_entity.modifiers)?;
        }

        let entity = self.entity_mut(unit)?;
        entity.garrisoned_in = Some(host);
        entity.attack_target = None;
        self.events.push(CombatEvent::MemberAdmitted { host, member: unit });
        Ok(())
    }

    fn exit_garrison(&mut self, unit: EntityId) -> Result<()> {
        let host = self
            .entities
            .get(&unit)
            .ok_or(CombatError::EntityNotFound(unit))?
            .garrisoned_in
            .ok_or(CombatError::NotAMember(unit))?;

        let host_entity = self.entity_mut(host)?;
        let position = host_entity.require_garrison()?.evict(unit)?;
        if let Some(garrison) = host_entity.garrison.as_ref() {
            garrison.apply_armor(&mut host_entity.modifiers)?;
        }

        let entity = self.entity_mut(unit)?;
        entity.position = position;
        entity.garrisoned_in = None;
        self.events.push(CombatEvent::MemberEvicted {
            host,
            member: unit,
            position,
        });
        Ok(())
    }

    fn order_attack(&mut self, attacker: EntityId, target: EntityId) -> Result<()> {
        if !self.entities.contains_key(&target) {
            return Err(CombatError::EntityNotFound(target));
        }
        let entity = self.entity_mut(attacker)?;
        if entity.is_destroyed() {
            return Ok(());
        }
        if entity.weapon.is_none() {
            return Err(CombatError::MissingComponent {
                entity: attacker,
                component: "weapon",
            });
        }
        entity.attack_target = Some(target);
        Ok(())
    }

    fn fallback_for(&self, id: EntityId) -> Result<Vec2Fixed> {
        let entity = self
            .entities
            .get(&id)
            .ok_or(CombatError::EntityNotFound(id))?;
        let threat = self
            .entities
            .values()
            .filter(|other| other.faction != entity.faction && other.is_in_world())
            .min_by_key(|other| (other.position.distance_squared(entity.position), other.id))
            .map(|other| other.position);
        Ok(fallback_point(
            entity.position,
            entity.rally_point,
            threat,
            self.config.retreat.fallback_distance,
        ))
    }

    fn evaluate_auto_triggers(&mut self, ids: &[EntityId]) {
        if self.config.rage.auto_trigger {
            let threshold = self.config.rage.health_threshold;
            let ready: Vec<FactionId> = self
                .factions
                .iter()
                .filter(|(_, registry)| registry.is_ready(AbilityKind::Rage))
                .map(|(faction, _)| *faction)
                .collect();
            for faction in ready {
                let trigger = self
                    .entities
                    .values()
                    .find(|entity| {
                        entity.faction == faction
                            && entity.is_in_world()
                            && entity.vitals.ratio() <= threshold
                    })
                    .map(|entity| entity.position);
                if let Some(at) = trigger {
                    if let Err(err) = self.activate_faction_ability(faction, AbilityKind::Rage, at)
                    {
                        tracing::debug!(faction = faction.0, %err, "Rage auto-trigger skipped");
                    }
                }
            }
        }

        let threshold = self.config.retreat.health_threshold;
        for &id in ids {
            let wants_retreat = self.entities.get(&id).is_some_and(|entity| {
                entity.is_in_world()
                    && entity.abilities.is_ready(AbilityKind::TacticalRetreat)
                    && entity.vitals.ratio() <= threshold
            });
            if wants_retreat {
                if let Err(err) =
                    self.activate_entity_ability(id, AbilityKind::TacticalRetreat, None)
                {
                    tracing::debug!(entity = id, %err, "Retreat auto-trigger skipped");
                }
            }
        }
    }

    fn refresh_producers(&mut self, ids: &[EntityId]) -> Result<()> {
        let seconds = Fixed::ONE / Fixed::from_num(TICK_RATE);
        let snapshot: Vec<Snapshot> = self
            .entities
            .values()
            .filter(|entity| entity.is_in_world())
            .map(|entity| Snapshot {
                id: entity.id,
                faction: entity.faction,
                position: entity.position,
                health: entity.vitals.ratio(),
            })
            .collect();

        let Self {
            entities,
            config,
            weather,
            ..
        } = self;

        for id in ids {
            let Some(entity) = entities.get_mut(id) else {
                continue;
            };
            if !entity.is_in_world() {
                continue;
            }

            if entity.base_speed > Fixed::ZERO {
                let bonus = entity.formation.bonus(&config.formation);
                let stack = &mut entity.modifiers;
                set_factor(stack, "formation", ModifierScope::Damage, bonus.damage)?;
                set_factor(stack, "formation", ModifierScope::Armor, bonus.armor)?;
                set_factor(stack, "formation", ModifierScope::Speed, bonus.speed)?;

                // Loose units fight alone: no proximity or morale effects.
                let (proximity, morale) = if entity.formation == FormationKind::Loose {
                    (Fixed::ONE, Fixed::ONE)
                } else {
                    group_factors(
                        *id,
                        entity.faction,
                        entity.position,
                        &snapshot,
                        &config.formation,
                    )
                };
                set_factor(stack, "formation.proximity", ModifierScope::Damage, proximity)?;
                set_factor(stack, "formation.morale", ModifierScope::Damage, morale)?;

                entity
                    .adaptation
                    .update(entity.terrain.category, seconds, &config.terrain);
                let speed = entity.adaptation.speed_factor(&config.terrain);
                set_factor(&mut entity.modifiers, "terrain", ModifierScope::Speed, speed)?;
            }

            if let Some(environment) = entity.environment.as_mut() {
                if entity.resting {
                    environment.rest(seconds, &config.environment);
                } else {
                    environment.update(seconds, *weather, &config.environment);
                }
                let factor = environment.multiplier(&config.environment);
                set_factor(&mut entity.modifiers, "environment", ModifierScope::Damage, factor)?;
                set_factor(&mut entity.modifiers, "environment", ModifierScope::Speed, factor)?;
            }

            entity.vitals.regenerate_shield(Fixed::ONE);

            if let Some(garrison) = entity.garrison.as_ref() {
                garrison.apply_armor(&mut entity.modifiers)?;
            }
        }
        Ok(())
    }

    fn pulse_repairs(&mut self, ids: &[EntityId]) {
        let now = self.now;
        let radius = self.config.repair.radius;
        let amount = self.config.repair.amount;
        let interval = self.config.repair.interval;

        for &id in ids {
            let (faction, center) = match self.entities.get(&id) {
                Some(source)
                    if source.is_in_world()
                        && source.repair.is_some_and(|aura| now >= aura.next_pulse_at) =>
                {
                    (source.faction, source.position)
                }
                _ => continue,
            };

            let targets: Vec<EntityId> = self
                .entities
                .values()
                .filter(|entity| {
                    entity.id != id
                        && entity.faction == faction
                        && entity.is_in_world()
                        && entity.vitals.is_damaged()
                        && entity.position.within(center, radius)
                })
                .map(|entity| entity.id)
                .collect();

            for target in targets {
                let healed = self
                    .entities
                    .get_mut(&target)
                    .map_or(Fixed::ZERO, |entity| entity.heal(amount));
                if healed > Fixed::ZERO {
                    self.events.push(CombatEvent::Repaired {
                        source: id,
                        target,
                        amount: healed,
                    });
                }
            }

            if let Some(source) = self.entities.get_mut(&id) {
                source.repair = Some(RepairAura {
                    next_pulse_at: now + interval,
                });
            }
        }
    }

    fn resolve_attacks(&mut self, ids: &[EntityId]) {
        let now = self.now;
        for &id in ids {
            let step = {
                let Some(attacker) = self.entities.get(&id) else {
                    continue;
                };
                let Some(target_id) = attacker.attack_target else {
                    continue;
                };
                if !attacker.can_attack(now) {
                    continue;
                }
                let target = match self.entities.get(&target_id) {
                    Some(target) if !target.is_destroyed() => target,
                    _ => {
                        if let Some(attacker) = self.entities.get_mut(&id) {
                            attacker.attack_target = None;
                        }
                        continue;
                    }
                };
                if !target.is_in_world() {
                    continue;
                }
                let in_range = attacker
                    .attack_range()
                    .ok()
                    .flatten()
                    .is_some_and(|range| attacker.position.within(target.position, range));
                if !in_range {
                    continue;
                }
                let Some(mut profile) = attacker.profile_against(target) else {
                    continue;
                };
                profile.base_damage = profile.base_damage.saturating_mul(
                    self.config
                        .terrain
                        .combat_multiplier(&attacker.terrain, &target.terrain),
                );

                let roll = next_roll(&mut self.rng);
                damage::resolve(
                    &profile,
                    &attacker.modifiers,
                    target.base_armor,
                    &target.modifiers,
                    roll,
                )
                .map(|hit| (target_id, hit))
            };

            match step {
                Ok((target_id, hit)) => {
                    if let Some(attacker) = self.entities.get_mut(&id) {
                        if let Err(err) = attacker.reload(now) {
                            tracing::warn!(entity = id, %err, "Reload failed");
                        }
                    }
                    self.apply_hit(target_id, hit);
                }
                Err(err) => tracing::warn!(entity = id, %err, "Attack resolution failed"),
            }
        }
    }

    fn apply_hit(&mut self, id: EntityId, hit: DamageRoll) {
        let Some(target) = self.entities.get_mut(&id) else {
            return;
        };
        if target.is_destroyed() {
            return;
        }
        let outcome = target.take_hit(hit);
        // A disabled weapon lands nothing; no event for it.
        if outcome.dealt > Fixed::ZERO || outcome.absorbed > Fixed::ZERO {
            self.events.push(CombatEvent::DamageApplied {
                target: id,
                amount: outcome.dealt,
                absorbed: outcome.absorbed,
                was_critical: hit.was_critical,
            });
        }
        if outcome.destroyed {
            self.on_destroyed(id);
        }
    }

    fn on_destroyed(&mut self, id: EntityId) {
        tracing::debug!(entity = id, tick = self.now, "Entity destroyed");
        self.events.push(CombatEvent::EntityDestroyed { entity: id });

        let evicted = match self.entities.get_mut(&id) {
            Some(host) => {
                host.attack_target = None;
                host.modifiers
                    .remove(&SourceId::from(GARRISON_SOURCE), ModifierScope::Armor);
                host.garrison
                    .as_mut()
                    .map(|garrison| garrison.evict_all())
                    .unwrap_or_default()
            }
            None => Vec::new(),
        };

        for (member, position) in evicted {
            if let Some(unit) = self.entities.get_mut(&member) {
                unit.position = position;
                unit.garrisoned_in = None;
            }
            self.events.push(CombatEvent::MemberEvicted {
                host: id,
                member,
                position,
            });
        }

        self.end_abilities(id);
    }

    /// Cancel every active ability of a dead entity and halt its retreat.
    fn end_abilities(&mut self, id: EntityId) {
        let now = self.now;
        let active: Vec<AbilityKind> = match self.entities.get(&id) {
            Some(entity) => entity
                .abilities
                .iter()
                .filter(|state| state.is_active())
                .map(AbilityState::kind)
                .collect(),
            None => return,
        };

        for kind in active {
            let transitions = match self.entities.get_mut(&id) {
                Some(entity) => entity.abilities.cancel(kind, now),
                None => return,
            };
            match transitions {
                Ok(transitions) => {
                    for transition in transitions {
                        if let Err(err) = self.on_entity_transition(id, kind, transition, true) {
                            tracing::warn!(entity = id, ability = ?kind, %err, "Ability transition failed");
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(entity = id, ability = ?kind, %err, "Cancel on death failed");
                }
            }
        }

        if let Some(entity) = self.entities.get_mut(&id) {
            if entity.retreat.is_retreating() {
                entity.retreat.stop();
                self.events.push(CombatEvent::RetreatPhaseChanged {
                    entity: id,
                    phase: RetreatPhase::Idle,
                    destination: entity.retreat.destination(),
                });
            }
        }
    }

    #[cfg(feature = "debug-validation")]
    fn validate_garrisons(&self) {
        for host in self.entities.values() {
            if let Some(garrison) = host.garrison() {
                debug_assert!(garrison.len() <= garrison.capacity());
                for member in garrison.members() {
                    debug_assert_eq!(
                        self.entities.get(member).and_then(|m| m.garrisoned_in),
                        Some(host.id),
                        "garrison member {member} does not point back at host {}",
                        host.id
                    );
                }
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(CombatConfig::default())
    }
}

fn faction_registry(config: &CombatConfig) -> AbilityRegistry {
    let exclusions = config
        .exclusions
        .iter()
        .copied()
        .filter(|(a, b)| a.is_faction_wide() && b.is_faction_wide())
        .collect();
    let mut registry = AbilityRegistry::new().with_exclusions(exclusions);
    for kind in [
        AbilityKind::Rage,
        AbilityKind::ArtilleryStrike,
        AbilityKind::SatelliteScan,
        AbilityKind::EmpBlast,
    ] {
        registry.register(kind, config.timing(kind));
    }
    registry
}

fn apply_rage(stack: &mut ModifierStack, config: &CombatConfig) -> Result<()> {
    stack.apply_spec(
        AbilityKind::Rage.source_id(),
        ModifierSpec::multiplicative(ModifierScope::Damage, config.rage.damage_multiplier),
        None,
    )
}

/// Write a multiplicative factor, dropping the entry when it is neutral.
fn set_factor(
    stack: &mut ModifierStack,
    source: &str,
    scope: ModifierScope,
    value: Fixed,
) -> Result<()> {
    if value == Fixed::ONE {
        stack.remove(&SourceId::from(source), scope);
        return Ok(());
    }
    stack.upsert(source, scope, ModifierKind::Multiplicative, value, None)
}

/// Proximity and morale multipliers for one unit.
fn group_factors(
    id: EntityId,
    faction: FactionId,
    position: Vec2Fixed,
    snapshot: &[Snapshot],
    config: &FormationConfig,
) -> (Fixed, Fixed) {
    let allies_nearby = snapshot
        .iter()
        .filter(|other| {
            other.id != id
                && other.faction == faction
                && other.position.within(position, config.proximity_radius)
        })
        .count();

    let mut allied = (Fixed::ZERO, 0_i32);
    let mut enemy = (Fixed::ZERO, 0_i32);
    for other in snapshot
        .iter()
        .filter(|other| other.position.within(position, config.morale_radius))
    {
        let bucket = if other.faction == faction {
            &mut allied
        } else {
            &mut enemy
        };
        bucket.0 = bucket.0.saturating_add(other.health);
        bucket.1 += 1;
    }

    let average = |(sum, count): (Fixed, i32)| sum / Fixed::from_num(count.max(1));
    let enemy_health = (enemy.1 > 0).then(|| average(enemy));
    (
        proximity_multiplier(allies_nearby, config),
        morale_multiplier(average(allied), enemy_health, config),
    )
}

fn next_roll(rng: &mut ChaCha8Rng) -> Fixed {
    Fixed::from_bits(rng.gen_range(0..=(1_i64 << 32)))
}
