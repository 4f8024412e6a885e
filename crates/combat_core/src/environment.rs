//! Environmental attrition: fatigue, cold, heat and moisture.

use serde::{Deserialize, Serialize};

use crate::math::{clamp01, decimal_serde, fixed_serde, ratio, Fixed};

/// Weather at the battlefield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Weather {
    /// Temperature in degrees; below zero is cold.
    #[serde(with = "decimal_serde")]
    pub temperature: Fixed,
    /// Moisture level.
    #[serde(with = "decimal_serde")]
    pub moisture: Fixed,
}

/// Environmental tuning. Rates are per second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Fatigue gained per second while active.
    #[serde(with = "decimal_serde")]
    pub fatigue_rate: Fixed,
    /// Cold gained per degree below zero per second.
    #[serde(with = "decimal_serde")]
    pub cold_rate: Fixed,
    /// Heat gained per degree above zero per second.
    #[serde(with = "decimal_serde")]
    pub heat_rate: Fixed,
    /// Moisture gained per unit of moisture per second.
    #[serde(with = "decimal_serde")]
    pub moisture_rate: Fixed,
    /// Recovery per second for fatigue at rest and the opposing temperature effect.
    #[serde(with = "decimal_serde")]
    pub recovery_rate: Fixed,
    /// Fatigue ceiling.
    #[serde(with = "decimal_serde")]
    pub max_fatigue: Fixed,
    /// Cold ceiling.
    #[serde(with = "decimal_serde")]
    pub max_cold: Fixed,
    /// Heat ceiling.
    #[serde(with = "decimal_serde")]
    pub max_heat: Fixed,
    /// Moisture ceiling.
    #[serde(with = "decimal_serde")]
    pub max_moisture: Fixed,
    /// Resistance for units spawned without their own.
    pub resistance: EnvironmentResistance,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        let hundred = Fixed::from_num(100);
        Self {
            fatigue_rate: ratio(1, 10),
            cold_rate: ratio(3, 20),
            heat_rate: ratio(3, 25),
            moisture_rate: ratio(2, 25),
            recovery_rate: ratio(1, 20),
            max_fatigue: hundred,
            max_cold: hundred,
            max_heat: hundred,
            max_moisture: hundred,
            resistance: EnvironmentResistance::default(),
        }
    }
}

/// Fractions of each kind of strain a unit ignores, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentResistance {
    /// Fraction of fatigue ignored.
    #[serde(with = "decimal_serde")]
    pub fatigue: Fixed,
    /// Fraction of cold ignored.
    #[serde(with = "decimal_serde")]
    pub cold: Fixed,
    /// Fraction of heat ignored.
    #[serde(with = "decimal_serde")]
    pub heat: Fixed,
    /// Fraction of moisture ignored.
    #[serde(with = "decimal_serde")]
    pub moisture: Fixed,
}

impl Default for EnvironmentResistance {
    fn default() -> Self {
        Self {
            fatigue: Fixed::ZERO,
            cold: ratio(4, 5),
            heat: ratio(9, 10),
            moisture: ratio(19, 20),
        }
    }
}

impl EnvironmentResistance {
    /// Every field, labelled, for validation.
    #[must_use]
    pub fn fields(&self) -> [(&'static str, Fixed); 4] {
        [
            ("fatigue", self.fatigue),
            ("cold", self.cold),
            ("heat", self.heat),
            ("moisture", self.moisture),
        ]
    }
}

/// Accumulated environmental strain on one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvironmentState {
    #[serde(with = "fixed_serde")]
    fatigue: Fixed,
    #[serde(with = "fixed_serde")]
    cold: Fixed,
    #[serde(with = "fixed_serde")]
    heat: Fixed,
    #[serde(with = "fixed_serde")]
    moisture: Fixed,
    resistance: EnvironmentResistance,
}

impl EnvironmentState {
    /// Fresh state for a unit with the given resistance.
    #[must_use]
    pub fn new(resistance: EnvironmentResistance) -> Self {
        Self {
            resistance,
            ..Self::default()
        }
    }

    /// Resistance this unit was spawned with.
    #[must_use]
    pub const fn resistance(&self) -> &EnvironmentResistance {
        &self.resistance
    }

    /// Current fatigue.
    #[must_use]
    pub const fn fatigue(&self) -> Fixed {
        self.fatigue
    }

    /// Current cold strain.
    #[must_use]
    pub const fn cold(&self) -> Fixed {
        self.cold
    }

    /// Current heat strain.
    #[must_use]
    pub const fn heat(&self) -> Fixed {
        self.heat
    }

    /// Current moisture strain.
    #[must_use]
    pub const fn moisture(&self) -> Fixed {
        self.moisture
    }

    /// Accumulate strain for `seconds` of exposure.
    ///
    /// Cold and heat never build at once: whichever side the temperature
    /// falls on accumulates while the other recovers.
    pub fn update(&mut self, seconds: Fixed, weather: Weather, config: &EnvironmentConfig) {
        let resist = self.resistance;
        let tiring = config.fatigue_rate * (Fixed::ONE - resist.fatigue) * seconds;
        self.fatigue = (self.fatigue + tiring).clamp(Fixed::ZERO, config.max_fatigue);

        let recovery = config.recovery_rate * seconds;
        if weather.temperature < Fixed::ZERO {
            let gain = config.cold_rate
                * (Fixed::ONE - resist.cold)
                * weather.temperature.abs()
                * seconds;
            self.cold = (self.cold + gain).clamp(Fixed::ZERO, config.max_cold);
            self.heat = (self.heat - recovery).max(Fixed::ZERO);
        } else {
            let gain = config.heat_rate
                * (Fixed::ONE - resist.heat)
                * weather.temperature
                * seconds;
            self.heat = (self.heat + gain).clamp(Fixed::ZERO, config.max_heat);
            self.cold = (self.cold - recovery).max(Fixed::ZERO);
        }

        let wet = config.moisture_rate
            * (Fixed::ONE - resist.moisture)
            * weather.moisture
            * seconds;
        self.moisture = (self.moisture + wet).clamp(Fixed::ZERO, config.max_moisture);
    }

    /// Recover fatigue for `seconds` of rest.
    pub fn rest(&mut self, seconds: Fixed, config: &EnvironmentConfig) {
        self.fatigue = (self.fatigue - config.recovery_rate * seconds).max(Fixed::ZERO);
    }

    /// Aggregate effectiveness multiplier in `[0, 1]`.
    #[must_use]
    pub fn multiplier(&self, config: &EnvironmentConfig) -> Fixed {
        let fatigue = Fixed::ONE - ratio_of(self.fatigue, config.max_fatigue);
        let temperature =
            Fixed::ONE - ratio_of(self.cold + self.heat, config.max_cold + config.max_heat);
        let moisture = Fixed::ONE - ratio_of(self.moisture, config.max_moisture);
        clamp01(fatigue) * clamp01(temperature) * clamp01(moisture)
    }
}

fn ratio_of(value: Fixed, max: Fixed) -> Fixed {
    if max <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    value / max
}
