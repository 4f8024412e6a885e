//! Tactical retreat sub-machine.
//!
//! The `TacticalRetreat` ability owns timing and cooldown; this module
//! tracks what the unit is doing inside the active window. The phase is
//! derived from the activation tick, so a late tick lands in the same
//! phase an on-time tick would have.

use serde::{Deserialize, Serialize};

use crate::ability::AbilityTiming;
use crate::math::{decimal_serde, ratio, Fixed, SimTime, Vec2Fixed};

/// Retreat tuning. Durations are in ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetreatConfig {
    /// Health ratio at or below which retreat triggers on its own.
    #[serde(with = "decimal_serde")]
    pub health_threshold: Fixed,
    /// Speed multiplier while retreating.
    #[serde(with = "decimal_serde")]
    pub speed_multiplier: Fixed,
    /// Smoke deployment time before moving.
    pub smoke_ticks: SimTime,
    /// Time spent moving to the fallback point.
    pub move_ticks: SimTime,
    /// Cooldown after the retreat ends.
    pub cooldown: SimTime,
    /// How far to fall back when no rally point is set.
    #[serde(with = "decimal_serde")]
    pub fallback_distance: Fixed,
}

impl Default for RetreatConfig {
    fn default() -> Self {
        Self {
            health_threshold: ratio(3, 10),
            speed_multiplier: ratio(3, 2),
            smoke_ticks: 60,
            move_ticks: 100,
            cooldown: 600,
            fallback_distance: Fixed::from_num(20),
        }
    }
}

impl RetreatConfig {
    /// Ability timing covering smoke and movement.
    #[must_use]
    pub const fn timing(&self) -> AbilityTiming {
        AbilityTiming::new(self.smoke_ticks + self.move_ticks, self.cooldown)
    }
}

/// What a retreating unit is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RetreatPhase {
    /// Not retreating.
    #[default]
    Idle,
    /// Laying smoke in place.
    Deploying,
    /// Falling back toward the destination.
    Moving,
}

/// Per-unit retreat progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetreatState {
    phase: RetreatPhase,
    started_at: SimTime,
    origin: Vec2Fixed,
    destination: Vec2Fixed,
}

impl RetreatState {
    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> RetreatPhase {
        self.phase
    }

    /// Fallback point of the current retreat.
    #[must_use]
    pub const fn destination(&self) -> Vec2Fixed {
        self.destination
    }

    /// Whether the unit is in any retreat phase.
    #[must_use]
    pub const fn is_retreating(&self) -> bool {
        !matches!(self.phase, RetreatPhase::Idle)
    }

    /// Start a retreat from `origin` toward `destination`.
    pub fn begin(&mut self, now: SimTime, origin: Vec2Fixed, destination: Vec2Fixed) {
        self.phase = RetreatPhase::Deploying;
        self.started_at = now;
        self.origin = origin;
        self.destination = destination;
    }

    /// Return to idle, as when the ability is cancelled.
    pub fn stop(&mut self) {
        self.phase = RetreatPhase::Idle;
    }

    fn phase_at(&self, now: SimTime, config: &RetreatConfig) -> RetreatPhase {
        if !self.is_retreating() {
            return RetreatPhase::Idle;
        }
        let elapsed = now.saturating_sub(self.started_at);
        if elapsed < config.smoke_ticks {
            RetreatPhase::Deploying
        } else if elapsed < config.smoke_ticks + config.move_ticks {
            RetreatPhase::Moving
        } else {
            RetreatPhase::Idle
        }
    }

    /// Advance to `now`. Returns the new phase when it changed.
    pub fn advance(&mut self, now: SimTime, config: &RetreatConfig) -> Option<RetreatPhase> {
        let next = self.phase_at(now, config);
        if next == self.phase {
            return None;
        }
        self.phase = next;
        Some(next)
    }

    /// Position along the fallback path at `now`.
    ///
    /// Holds the origin while deploying and interpolates linearly while
    /// moving.
    #[must_use]
    pub fn position_at(&self, now: SimTime, config: &RetreatConfig) -> Vec2Fixed {
        match self.phase {
            RetreatPhase::Idle => self.destination,
            RetreatPhase::Deploying => self.origin,
            RetreatPhase::Moving => {
                if config.move_ticks == 0 {
                    return self.destination;
                }
                let moving_for = now
                    .saturating_sub(self.started_at + config.smoke_ticks)
                    .min(config.move_ticks);
                let t = Fixed::saturating_from_num(moving_for)
                    / Fixed::saturating_from_num(config.move_ticks);
                self.origin.lerp(self.destination, t)
            }
        }
    }
}

/// Fallback point `distance` away from `threat`, or the rally point when set.
#[must_use]
pub fn fallback_point(
    position: Vec2Fixed,
    rally_point: Option<Vec2Fixed>,
    threat: Option<Vec2Fixed>,
    distance: Fixed,
) -> Vec2Fixed {
    if let Some(rally) = rally_point {
        return rally;
    }
    match threat {
        Some(threat) => position + (position - threat).normalize().scale(distance),
        None => position,
    }
}
