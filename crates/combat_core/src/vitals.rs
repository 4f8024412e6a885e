//! Health and shield bookkeeping.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};

/// Regenerating shield that absorbs damage before health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shield {
    /// Current shield points.
    #[serde(with = "fixed_serde")]
    pub current: Fixed,
    /// Shield capacity.
    #[serde(with = "fixed_serde")]
    pub max: Fixed,
    /// Points regenerated per tick.
    #[serde(with = "fixed_serde")]
    pub regen_per_tick: Fixed,
}

impl Shield {
    /// Create a full shield.
    #[must_use]
    pub const fn new(max: Fixed, regen_per_tick: Fixed) -> Self {
        Self {
            current: max,
            max,
            regen_per_tick,
        }
    }
}

/// Result of applying one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DamageOutcome {
    /// Damage taken by the shield.
    pub absorbed: Fixed,
    /// Damage taken by health.
    pub dealt: Fixed,
    /// True only on the hit that destroyed the owner.
    pub destroyed: bool,
}

/// Health pool with optional shield and one-shot destruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(with = "fixed_serde")]
    current: Fixed,
    #[serde(with = "fixed_serde")]
    max: Fixed,
    shield: Option<Shield>,
    destroyed: bool,
}

impl Vitals {
    /// Create vitals at full health.
    #[must_use]
    pub const fn new(max: Fixed) -> Self {
        Self {
            current: max,
            max,
            shield: None,
            destroyed: false,
        }
    }

    /// Attach a shield.
    #[must_use]
    pub const fn with_shield(mut self, shield: Shield) -> Self {
        self.shield = Some(shield);
        self
    }

    /// Current health.
    #[must_use]
    pub const fn current(&self) -> Fixed {
        self.current
    }

    /// Maximum health.
    #[must_use]
    pub const fn max(&self) -> Fixed {
        self.max
    }

    /// Shield state, if any.
    #[must_use]
    pub const fn shield(&self) -> Option<&Shield> {
        self.shield.as_ref()
    }

    /// Whether health has reached zero.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Health as a fraction of maximum.
    #[must_use]
    pub fn ratio(&self) -> Fixed {
        if self.max <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        self.current / self.max
    }

    /// Apply resolved damage. The shield absorbs first.
    ///
    /// Once destroyed, further damage is ignored.
    pub fn apply_damage(&mut self, amount: Fixed) -> DamageOutcome {
        if self.destroyed || amount <= Fixed::ZERO {
            return DamageOutcome::default();
        }

        let mut remaining = amount;
        let mut absorbed = Fixed::ZERO;
        if let Some(shield) = self.shield.as_mut() {
            absorbed = shield.current.min(remaining);
            shield.current = (shield.current - absorbed).max(Fixed::ZERO);
            remaining -= absorbed;
        }

        let dealt = remaining.min(self.current);
        self.current -= dealt;

        let destroyed = self.current <= Fixed::ZERO;
        if destroyed {
            self.current = Fixed::ZERO;
            self.destroyed = true;
        }

        DamageOutcome {
            absorbed,
            dealt,
            destroyed,
        }
    }

    /// Restore health up to maximum, returning the amount actually healed.
    pub fn heal(&mut self, amount: Fixed) -> Fixed {
        if self.destroyed || amount <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        let healed = amount.min(self.max - self.current);
        self.current += healed;
        healed
    }

    /// Regenerate the shield by `ticks` worth of its rate.
    pub fn regenerate_shield(&mut self, ticks: Fixed) {
        if self.destroyed {
            return;
        }
        if let Some(shield) = self.shield.as_mut() {
            shield.current = shield
                .current
                .saturating_add(shield.regen_per_tick.saturating_mul(ticks))
                .min(shield.max);
        }
    }

    /// Whether the entity is alive and below full health.
    #[must_use]
    pub fn is_damaged(&self) -> bool {
        !self.destroyed && self.current < self.max
    }
}
