//! Garrison occupancy for bunkers and other enterable structures.
//!
//! Admission and eviction are atomic: a rejected call leaves membership,
//! exit positions and the armor modifier untouched. Each admitted unit
//! gets an exit point on a ring around the host, drawn from the
//! garrison's own seeded RNG, and is restored there on eviction.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::{CombatError, Result};
use crate::math::{decimal_serde, fixed_serde, Fixed, Vec2Fixed};
use crate::modifiers::{ModifierKind, ModifierScope, ModifierStack, SourceId};

/// Modifier source for the per-member armor bonus.
pub const GARRISON_SOURCE: &str = "garrison";

/// What kind of occupant an entity can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GarrisonClass {
    /// Foot soldiers; always admitted while there is room.
    Infantry,
    /// Small vehicles; admitted only while the garrison is under half full.
    LightVehicle,
}

/// Garrison tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarrisonConfig {
    /// Maximum number of members.
    pub capacity: usize,
    /// Armor added to the host per member.
    #[serde(with = "decimal_serde")]
    pub armor_per_member: Fixed,
    /// Radius of the exit ring around the host.
    #[serde(with = "decimal_serde")]
    pub exit_radius: Fixed,
}

impl Default for GarrisonConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            armor_per_member: Fixed::from_num(5),
            exit_radius: Fixed::from_num(5),
        }
    }
}

/// Occupancy state of one host structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Garrison {
    capacity: usize,
    #[serde(with = "fixed_serde")]
    armor_per_member: Fixed,
    #[serde(with = "fixed_serde")]
    exit_radius: Fixed,
    members: Vec<EntityId>,
    exits: BTreeMap<EntityId, Vec2Fixed>,
    rng: ChaCha8Rng,
}

impl Garrison {
    /// Create an empty garrison with its own RNG stream.
    #[must_use]
    pub fn new(config: &GarrisonConfig, seed: u64) -> Self {
        Self {
            capacity: config.capacity,
            armor_per_member: config.armor_per_member,
            exit_radius: config.exit_radius,
            members: Vec::new(),
            exits: BTreeMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Maximum number of members.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Members in admission order.
    #[must_use]
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the garrison is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `entity` is inside.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.exits.contains_key(&entity)
    }

    /// Recorded exit point for a member.
    #[must_use]
    pub fn exit_position(&self, entity: EntityId) -> Option<Vec2Fixed> {
        self.exits.get(&entity).copied()
    }

    /// Total armor bonus the members grant.
    #[must_use]
    pub fn armor_bonus(&self) -> Fixed {
        Fixed::saturating_from_num(self.members.len()).saturating_mul(self.armor_per_member)
    }

    /// Whether an occupant of `class` passes the admission rule right now.
    ///
    /// Light vehicles use integer half capacity, so a capacity of 1 never
    /// admits one.
    #[must_use]
    pub fn admits(&self, class: GarrisonClass) -> bool {
        match class {
            GarrisonClass::Infantry => true,
            GarrisonClass::LightVehicle => self.members.len() < self.capacity / 2,
        }
    }

    /// Admit `entity`, returning the exit point recorded for it.
    pub fn admit(
        &mut self,
        entity: EntityId,
        class: Option<GarrisonClass>,
        host_position: Vec2Fixed,
    ) -> Result<Vec2Fixed> {
        if self.contains(entity) {
            return Err(CombatError::AlreadyMember(entity));
        }
        if self.members.len() >= self.capacity {
            return Err(CombatError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        match class {
            Some(class) if self.admits(class) => {}
            _ => return Err(CombatError::AdmissionDenied(entity)),
        }

        let exit = host_position + self.exit_offset();
        self.members.push(entity);
        self.exits.insert(entity, exit);
        tracing::debug!(entity, members = self.members.len(), "Garrison admitted member");
        Ok(exit)
    }

    /// Remove `entity`, returning the exit point it should reappear at.
    pub fn evict(&mut self, entity: EntityId) -> Result<Vec2Fixed> {
        let exit = self
            .exits
            .remove(&entity)
            .ok_or(CombatError::NotAMember(entity))?;
        self.members.retain(|member| *member != entity);
        tracing::debug!(entity, members = self.members.len(), "Garrison evicted member");
        Ok(exit)
    }

    /// Remove every member in admission order.
    pub fn evict_all(&mut self) -> Vec<(EntityId, Vec2Fixed)> {
        let members = std::mem::take(&mut self.members);
        members
            .into_iter()
            .filter_map(|id| self.exits.remove(&id).map(|exit| (id, exit)))
            .collect()
    }

    /// Write the current armor bonus onto the host's stack, or remove it
    /// when the garrison is empty.
    pub fn apply_armor(&self, stack: &mut ModifierStack) -> Result<()> {
        let source = SourceId::from(GARRISON_SOURCE);
        if self.members.is_empty() {
            stack.remove(&source, ModifierScope::Armor);
            return Ok(());
        }
        stack.upsert(
            source,
            ModifierScope::Armor,
            ModifierKind::Additive,
            self.armor_bonus(),
            None,
        )
    }

    /// Point on the exit ring, uniform in angle.
    fn exit_offset(&mut self) -> Vec2Fixed {
        let min_len_sq = Fixed::from_num(1) / Fixed::from_num(64);
        loop {
            let x = Fixed::from_bits(self.rng.gen_range(-(1_i64 << 32)..=(1_i64 << 32)));
            let y = Fixed::from_bits(self.rng.gen_range(-(1_i64 << 32)..=(1_i64 << 32)));
            let candidate = Vec2Fixed::new(x, y);
            let len_sq = candidate.dot(candidate);
            if len_sq <= Fixed::ONE && len_sq >= min_len_sq {
                return candidate.normalize().scale(self.exit_radius);
            }
        }
    }
}
