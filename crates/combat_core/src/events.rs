//! Events emitted by the world each tick.

use serde::{Deserialize, Serialize};

use crate::ability::AbilityKind;
use crate::entity::{EntityId, FactionId};
use crate::error::CombatError;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::retreat::RetreatPhase;
use crate::upgrade::WeaponVariant;
use crate::world::Command;

/// Who owns an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityOwner {
    /// A single unit or structure.
    Entity(EntityId),
    /// A whole faction.
    Faction(FactionId),
}

/// Something observable that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// An ability fired.
    AbilityActivated {
        /// Owner.
        owner: AbilityOwner,
        /// Ability.
        ability: AbilityKind,
    },
    /// An ability's active window ended or was cancelled.
    AbilityDeactivated {
        /// Owner.
        owner: AbilityOwner,
        /// Ability.
        ability: AbilityKind,
    },
    /// An ability finished its cooldown.
    AbilityReady {
        /// Owner.
        owner: AbilityOwner,
        /// Ability.
        ability: AbilityKind,
    },
    /// Damage landed on an entity.
    DamageApplied {
        /// Entity hit.
        target: EntityId,
        /// Damage taken by health.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
        /// Damage taken by the shield.
        #[serde(with = "fixed_serde")]
        absorbed: Fixed,
        /// Whether the hit was critical.
        was_critical: bool,
    },
    /// An entity's health reached zero.
    EntityDestroyed {
        /// Entity destroyed.
        entity: EntityId,
    },
    /// A unit entered a garrison.
    MemberAdmitted {
        /// Host structure.
        host: EntityId,
        /// Unit admitted.
        member: EntityId,
    },
    /// A unit left a garrison.
    MemberEvicted {
        /// Host structure.
        host: EntityId,
        /// Unit evicted.
        member: EntityId,
        /// Where it reappeared.
        position: Vec2Fixed,
    },
    /// A repair pulse healed an ally.
    Repaired {
        /// Structure that pulsed.
        source: EntityId,
        /// Unit healed.
        target: EntityId,
        /// Health restored.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// A unit's retreat moved to a new phase.
    RetreatPhaseChanged {
        /// Retreating unit.
        entity: EntityId,
        /// New phase.
        phase: RetreatPhase,
        /// Fallback point.
        destination: Vec2Fixed,
    },
    /// A satellite scan revealed an area.
    AreaRevealed {
        /// Faction that scanned.
        faction: FactionId,
        /// Scan centre.
        center: Vec2Fixed,
        /// Scan radius.
        #[serde(with = "fixed_serde")]
        radius: Fixed,
    },
    /// A weapon refit finished.
    WeaponUpgradeCompleted {
        /// Structure refitted.
        entity: EntityId,
        /// Variant installed.
        variant: WeaponVariant,
    },
}

/// A queued command that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedCommand {
    /// The command as queued.
    pub command: Command,
    /// Why it failed.
    pub error: CombatError,
}

/// Everything produced by one call to [`World::tick`](crate::world::World::tick).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Tick the events belong to.
    pub tick: u64,
    /// Events in the order they happened.
    pub events: Vec<CombatEvent>,
    /// Commands that failed during this tick.
    pub rejected: Vec<RejectedCommand>,
}

impl TickEvents {
    /// Entities destroyed this tick.
    pub fn destroyed(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.events.iter().filter_map(|event| match event {
            CombatEvent::EntityDestroyed { entity } => Some(*entity),
            _ => None,
        })
    }

    /// Total health damage dealt this tick.
    #[must_use]
    pub fn total_damage(&self) -> Fixed {
        self.events
            .iter()
            .filter_map(|event| match event {
                CombatEvent::DamageApplied { amount, .. } => Some(*amount),
                _ => None,
            })
            .fold(Fixed::ZERO, |acc, amount| acc.saturating_add(amount))
    }
}
