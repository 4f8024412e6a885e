//! # Combat Core
//!
//! Deterministic modifier and timed-ability resolution for the
//! Post-Scarcity RTS combat layer.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Every stat an entity exposes is `(base + additive) * multiplier`,
//! folded from a per-entity [`modifiers::ModifierStack`]. Abilities,
//! garrisons, formations, terrain and weather all write to that stack
//! under their own source ids and remove only what they wrote.
//!
//! ## Crate Structure
//!
//! - [`modifiers`] - Keyed modifier stacks and the stat fold
//! - [`ability`] - Timed ability state machines and registries
//! - [`damage`] - Attack resolution pipeline
//! - [`garrison`] - Occupancy and exit positions
//! - [`entity`] - Units and structures
//! - [`world`] - Tick loop, commands and faction abilities
//! - [`config`] - RON-loadable tuning
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ability;
pub mod config;
pub mod damage;
pub mod entity;
pub mod environment;
pub mod error;
pub mod events;
pub mod formation;
pub mod garrison;
pub mod math;
pub mod modifiers;
pub mod retreat;
pub mod terrain;
pub mod upgrade;
pub mod vitals;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ability::{
        AbilityKind, AbilityPhase, AbilityRegistry, AbilityState, AbilityTiming,
        AbilityTransition,
    };
    pub use crate::config::CombatConfig;
    pub use crate::damage::{DamageProfile, DamageRoll};
    pub use crate::entity::{CombatEntity, EntityId, FactionId, SpawnParams, Weapon};
    pub use crate::error::{CombatError, Result};
    pub use crate::events::{AbilityOwner, CombatEvent, TickEvents};
    pub use crate::formation::FormationKind;
    pub use crate::garrison::GarrisonClass;
    pub use crate::math::{Fixed, SimTime, Vec2Fixed};
    pub use crate::modifiers::{
        ModifierKind, ModifierScope, ModifierSpec, ModifierStack, ModifierSummary, SourceId,
    };
    pub use crate::upgrade::WeaponVariant;
    pub use crate::world::{Command, World, TICK_RATE};
}
