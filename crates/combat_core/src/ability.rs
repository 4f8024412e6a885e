//! Timed ability state machines.
//!
//! Every ability shares one lifecycle:
//!
//! ```text
//! Idle --activate--> Active --(duration elapsed)--> Cooldown --(cooldown elapsed)--> Idle
//!   \--activate (instant)------------------------------^
//! ```
//!
//! Timestamps are absolute ticks. Cooldown is measured from the scheduled
//! end of the active window, so a late tick never shortens or stretches
//! it. [`AbilityRegistry`] groups the states of one owner and enforces
//! mutual exclusion between them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CombatError, Result};
use crate::math::SimTime;
use crate::modifiers::SourceId;

/// Every ability the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Structure hunkers down: more armor and damage.
    Fortify,
    /// Faction-wide damage surge.
    Rage,
    /// Instant area bombardment.
    ArtilleryStrike,
    /// Instant area reveal.
    SatelliteScan,
    /// Instant area weapon disable.
    EmpBlast,
    /// Smoke, then fall back to a rally point.
    TacticalRetreat,
    /// Timed weapon swap, weapons offline meanwhile.
    WeaponUpgrade,
}

impl AbilityKind {
    /// Modifier source id used for this ability's effects.
    #[must_use]
    pub fn source_id(self) -> SourceId {
        SourceId::from(match self {
            AbilityKind::Fortify => "ability.fortify",
            AbilityKind::Rage => "ability.rage",
            AbilityKind::ArtilleryStrike => "ability.artillery_strike",
            AbilityKind::SatelliteScan => "ability.satellite_scan",
            AbilityKind::EmpBlast => "ability.emp_blast",
            AbilityKind::TacticalRetreat => "ability.tactical_retreat",
            AbilityKind::WeaponUpgrade => "ability.weapon_upgrade",
        })
    }

    /// Whether the ability belongs to a faction rather than one entity.
    #[must_use]
    pub const fn is_faction_wide(self) -> bool {
        matches!(
            self,
            AbilityKind::Rage
                | AbilityKind::ArtilleryStrike
                | AbilityKind::SatelliteScan
                | AbilityKind::EmpBlast
        )
    }
}

/// Lifecycle phase with the timestamps that govern it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AbilityPhase {
    /// Ready to activate.
    #[default]
    Idle,
    /// Effects applied.
    Active {
        /// Tick of activation.
        activated_at: SimTime,
        /// Scheduled end of the active window.
        ends_at: SimTime,
    },
    /// Waiting to become ready again.
    Cooldown {
        /// Tick at which the ability returns to idle.
        until: SimTime,
    },
}

impl AbilityPhase {
    /// Phase without timestamps.
    #[must_use]
    pub const fn kind(&self) -> AbilityPhaseKind {
        match self {
            AbilityPhase::Idle => AbilityPhaseKind::Idle,
            AbilityPhase::Active { .. } => AbilityPhaseKind::Active,
            AbilityPhase::Cooldown { .. } => AbilityPhaseKind::Cooldown,
        }
    }
}

/// Phase discriminant, used in errors and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityPhaseKind {
    /// Ready.
    Idle,
    /// Running.
    Active,
    /// Recharging.
    Cooldown,
}

/// Phase change reported to the owner of an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityTransition {
    /// Ability fired; apply its effects.
    Activated,
    /// Active window ended or was cancelled; remove its effects.
    Deactivated,
    /// Cooldown elapsed.
    Ready,
}

/// Timing parameters for one ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AbilityTiming {
    /// Active window in ticks. Zero means instantaneous.
    pub duration: SimTime,
    /// Cooldown in ticks, counted from the scheduled end of the window.
    pub cooldown: SimTime,
    /// Cancelling an active window starts the cooldown instead of
    /// returning straight to idle.
    #[serde(default)]
    pub cancel_costs_cooldown: bool,
}

impl AbilityTiming {
    /// Timing with the given duration and cooldown.
    #[must_use]
    pub const fn new(duration: SimTime, cooldown: SimTime) -> Self {
        Self {
            duration,
            cooldown,
            cancel_costs_cooldown: false,
        }
    }

    /// Make cancellation start the cooldown.
    #[must_use]
    pub const fn with_cancel_cost(mut self) -> Self {
        self.cancel_costs_cooldown = true;
        self
    }
}

/// State machine for one ability instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityState {
    kind: AbilityKind,
    timing: AbilityTiming,
    phase: AbilityPhase,
}

impl AbilityState {
    /// Create an idle ability.
    #[must_use]
    pub const fn new(kind: AbilityKind, timing: AbilityTiming) -> Self {
        Self {
            kind,
            timing,
            phase: AbilityPhase::Idle,
        }
    }

    /// Ability kind.
    #[must_use]
    pub const fn kind(&self) -> AbilityKind {
        self.kind
    }

    /// Timing parameters.
    #[must_use]
    pub const fn timing(&self) -> AbilityTiming {
        self.timing
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> AbilityPhase {
        self.phase
    }

    /// Whether the effects are currently applied.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.phase, AbilityPhase::Active { .. })
    }

    /// Whether the ability can be activated.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.phase, AbilityPhase::Idle)
    }

    /// Ticks left until the ability is idle again.
    #[must_use]
    pub fn remaining(&self, now: SimTime) -> SimTime {
        match self.phase {
            AbilityPhase::Idle => 0,
            AbilityPhase::Active { ends_at, .. } => {
                (ends_at + self.timing.cooldown).saturating_sub(now)
            }
            AbilityPhase::Cooldown { until } => until.saturating_sub(now),
        }
    }

    fn invalid(&self, action: &'static str) -> CombatError {
        CombatError::InvalidTransition {
            ability: self.kind,
            phase: self.phase.kind(),
            action,
        }
    }

    /// Activate from idle.
    ///
    /// Instantaneous abilities skip the active window and go straight to
    /// cooldown (or stay idle if they have none).
    pub fn activate(&mut self, now: SimTime) -> Result<AbilityTransition> {
        if !self.is_ready() {
            return Err(self.invalid("activate"));
        }

        self.phase = if self.timing.duration == 0 {
            Self::cooldown_from(now, self.timing.cooldown)
        } else {
            AbilityPhase::Active {
                activated_at: now,
                ends_at: now + self.timing.duration,
            }
        };
        tracing::debug!(ability = ?self.kind, tick = now, "Ability activated");
        Ok(AbilityTransition::Activated)
    }

    fn cooldown_from(start: SimTime, cooldown: SimTime) -> AbilityPhase {
        if cooldown == 0 {
            AbilityPhase::Idle
        } else {
            AbilityPhase::Cooldown {
                until: start + cooldown,
            }
        }
    }

    /// Advance to `now`, cascading through every phase boundary passed.
    pub fn tick(&mut self, now: SimTime) -> Vec<AbilityTransition> {
        let mut transitions = Vec::new();

        if let AbilityPhase::Active { ends_at, .. } = self.phase {
            if now >= ends_at {
                self.phase = Self::cooldown_from(ends_at, self.timing.cooldown);
                transitions.push(AbilityTransition::Deactivated);
                if self.is_ready() {
                    transitions.push(AbilityTransition::Ready);
                }
            }
        }

        if let AbilityPhase::Cooldown { until } = self.phase {
            if now >= until {
                self.phase = AbilityPhase::Idle;
                transitions.push(AbilityTransition::Ready);
            }
        }

        if !transitions.is_empty() {
            tracing::debug!(ability = ?self.kind, tick = now, phase = ?self.phase.kind(), "Ability phase advanced");
        }
        transitions
    }

    /// Force the ability out of its active window or cooldown.
    pub fn cancel(&mut self, now: SimTime) -> Result<Vec<AbilityTransition>> {
        let transitions = match self.phase {
            AbilityPhase::Idle => return Err(self.invalid("cancel")),
            AbilityPhase::Active { .. } if self.timing.cancel_costs_cooldown => {
                self.phase = Self::cooldown_from(now, self.timing.cooldown);
                if self.is_ready() {
                    vec![AbilityTransition::Deactivated, AbilityTransition::Ready]
                } else {
                    vec![AbilityTransition::Deactivated]
                }
            }
            AbilityPhase::Active { .. } => {
                self.phase = AbilityPhase::Idle;
                vec![AbilityTransition::Deactivated, AbilityTransition::Ready]
            }
            AbilityPhase::Cooldown { .. } => {
                self.phase = AbilityPhase::Idle;
                vec![AbilityTransition::Ready]
            }
        };
        tracing::debug!(ability = ?self.kind, tick = now, "Ability cancelled");
        Ok(transitions)
    }
}

/// All abilities of one owner plus the pairs that may not overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityRegistry {
    abilities: BTreeMap<AbilityKind, AbilityState>,
    exclusions: Vec<(AbilityKind, AbilityKind)>,
}

impl AbilityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the exclusion table. `(a, b)` blocks activating `a` while `b` is active.
    #[must_use]
    pub fn with_exclusions(mut self, exclusions: Vec<(AbilityKind, AbilityKind)>) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Register an ability, replacing any previous state for that kind.
    pub fn register(&mut self, kind: AbilityKind, timing: AbilityTiming) {
        self.abilities.insert(kind, AbilityState::new(kind, timing));
    }

    /// Whether `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: AbilityKind) -> bool {
        self.abilities.contains_key(&kind)
    }

    /// State of one ability.
    #[must_use]
    pub fn get(&self, kind: AbilityKind) -> Option<&AbilityState> {
        self.abilities.get(&kind)
    }

    /// Whether `kind` is registered and active.
    #[must_use]
    pub fn is_active(&self, kind: AbilityKind) -> bool {
        self.get(kind).is_some_and(AbilityState::is_active)
    }

    /// Whether `kind` is registered and idle.
    #[must_use]
    pub fn is_ready(&self, kind: AbilityKind) -> bool {
        self.get(kind).is_some_and(AbilityState::is_ready)
    }

    /// Iterate over registered abilities in kind order.
    pub fn iter(&self) -> impl Iterator<Item = &AbilityState> {
        self.abilities.values()
    }

    /// Activate `kind`, honouring the exclusion table.
    pub fn activate(&mut self, kind: AbilityKind, now: SimTime) -> Result<AbilityTransition> {
        if !self.contains(kind) {
            return Err(CombatError::AbilityNotRegistered(kind));
        }
        if let Some(&(_, blocker)) = self
            .exclusions
            .iter()
            .find(|(requested, blocker)| *requested == kind && self.is_active(*blocker))
        {
            return Err(CombatError::AbilityBlocked {
                ability: kind,
                blocker,
            });
        }
        self.abilities
            .get_mut(&kind)
            .ok_or(CombatError::AbilityNotRegistered(kind))?
            .activate(now)
    }

    /// Cancel `kind`.
    pub fn cancel(&mut self, kind: AbilityKind, now: SimTime) -> Result<Vec<AbilityTransition>> {
        self.abilities
            .get_mut(&kind)
            .ok_or(CombatError::AbilityNotRegistered(kind))?
            .cancel(now)
    }

    /// Advance every ability, in kind order.
    pub fn tick(&mut self, now: SimTime) -> Vec<(AbilityKind, AbilityTransition)> {
        let mut out = Vec::new();
        for (kind, state) in &mut self.abilities {
            for transition in state.tick(now) {
                out.push((*kind, transition));
            }
        }
        out
    }
}
