//! Error types for the combat core.
//!
//! Every variant is a local, recoverable condition. A failed operation
//! leaves the component it was called on unchanged.

use thiserror::Error;

use crate::ability::{AbilityKind, AbilityPhaseKind};
use crate::entity::EntityId;
use crate::modifiers::ModifierScope;

/// Result type alias using [`CombatError`].
pub type Result<T> = std::result::Result<T, CombatError>;

/// Top-level error type for the combat core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    /// An ability was asked to change phase from a phase that disallows it.
    #[error("Invalid transition for {ability:?}: cannot {action} while {phase:?}")]
    InvalidTransition {
        /// Ability the request targeted.
        ability: AbilityKind,
        /// Phase the ability was in when the request arrived.
        phase: AbilityPhaseKind,
        /// Requested action.
        action: &'static str,
    },

    /// Activation conflicts with another active ability.
    #[error("{ability:?} is blocked while {blocker:?} is active")]
    AbilityBlocked {
        /// Ability that was requested.
        ability: AbilityKind,
        /// Active ability that excludes it.
        blocker: AbilityKind,
    },

    /// The owner has no such ability registered.
    #[error("Ability {0:?} is not registered for this owner")]
    AbilityNotRegistered(AbilityKind),

    /// Garrison is full.
    #[error("Garrison at capacity ({capacity})")]
    CapacityExceeded {
        /// Configured capacity.
        capacity: usize,
    },

    /// Entity's declared capabilities fail the admission rule.
    #[error("Entity {0} may not enter this garrison")]
    AdmissionDenied(EntityId),

    /// Entity is already garrisoned here.
    #[error("Entity {0} is already garrisoned")]
    AlreadyMember(EntityId),

    /// Evict requested for an entity that is not garrisoned here.
    #[error("Entity {0} is not a garrison member")]
    NotAMember(EntityId),

    /// Fold or upsert on a custom scope the stack never registered.
    #[error("Unknown modifier scope: {0:?}")]
    UnknownModifierScope(ModifierScope),

    /// Entity reference does not exist in the world.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Entity lacks a component the operation needs.
    #[error("Entity {entity} has no {component}")]
    MissingComponent {
        /// Entity the request targeted.
        entity: EntityId,
        /// Human-readable component name.
        component: &'static str,
    },

    /// Requested weapon upgrade is already installed.
    #[error("Weapon upgrade {0} already installed")]
    UpgradeAlreadyInstalled(&'static str),

    /// Failed to parse configuration text.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but holds values the engine cannot run with.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// World state could not be encoded.
    #[error("Failed to encode world state: {0}")]
    Encode(String),
}
