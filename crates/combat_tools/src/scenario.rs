//! Scenario loading and headless runs.
//!
//! Scenarios place labelled units, schedule orders by tick and run the
//! combat world for a fixed number of ticks. Positions and stats are
//! written as decimals and converted to fixed point on load.

use std::collections::BTreeMap;
use std::path::Path;

use combat_core::ability::AbilityKind;
use combat_core::config::CombatConfig;
use combat_core::damage::DamageProfile;
use combat_core::entity::{EntityId, FactionId, SpawnParams, Weapon};
use combat_core::environment::{EnvironmentResistance, Weather};
use combat_core::formation::FormationKind;
use combat_core::garrison::GarrisonClass;
use combat_core::math::{Fixed, Vec2Fixed};
use combat_core::terrain::{TerrainCategory, TerrainSample};
use combat_core::upgrade::WeaponVariant;
use combat_core::world::{Command, World};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Ticks to simulate.
    pub ticks: u64,
    /// Battlefield weather.
    #[serde(default)]
    pub weather: WeatherSetup,
    /// Units and structures to place.
    pub units: Vec<UnitPlacement>,
    /// Orders issued during the run.
    #[serde(default)]
    pub orders: Vec<ScheduledOrder>,
}

/// Weather in plain decimals.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WeatherSetup {
    /// Temperature in degrees.
    pub temperature: f64,
    /// Moisture level.
    pub moisture: f64,
}

/// Weapon stats in plain decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponSetup {
    /// Base damage per attack.
    pub damage: f64,
    /// Ticks between attacks.
    pub interval: u64,
    /// Reach.
    pub range: f64,
    /// Crit chance in `[0, 1]`.
    #[serde(default)]
    pub crit_chance: f64,
    /// Crit multiplier.
    #[serde(default = "default_crit_multiplier")]
    pub crit_multiplier: f64,
    /// Armor ignored per hit.
    #[serde(default)]
    pub armor_penetration: f64,
}

fn default_crit_multiplier() -> f64 {
    2.0
}

fn default_health() -> f64 {
    100.0
}

fn default_speed() -> f64 {
    1.0
}

/// One labelled unit or structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Label used by orders and the report.
    pub label: String,
    /// Owning faction.
    #[serde(default)]
    pub faction: u8,
    /// Position in world units.
    pub position: (f64, f64),
    /// Maximum health.
    #[serde(default = "default_health")]
    pub max_health: f64,
    /// Base armor.
    #[serde(default)]
    pub armor: f64,
    /// Base speed; zero for structures.
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Weapon, if armed.
    #[serde(default)]
    pub weapon: Option<WeaponSetup>,
    /// Flying unit.
    #[serde(default)]
    pub airborne: bool,
    /// Garrison capability.
    #[serde(default)]
    pub garrison_class: Option<GarrisonClass>,
    /// Hosts a garrison.
    #[serde(default)]
    pub garrison_host: bool,
    /// Carries a shield.
    #[serde(default)]
    pub shielded: bool,
    /// Pulses repairs.
    #[serde(default)]
    pub repair_aura: bool,
    /// Accepts weapon refits.
    #[serde(default)]
    pub upgradable: bool,
    /// Accumulates environmental strain.
    #[serde(default)]
    pub exposed: bool,
    /// Strain resistance; the configured default when omitted.
    #[serde(default)]
    pub resistance: Option<EnvironmentResistance>,
    /// Entity abilities.
    #[serde(default)]
    pub abilities: Vec<AbilityKind>,
    /// Retreat rally point.
    #[serde(default)]
    pub rally_point: Option<(f64, f64)>,
    /// Ground type.
    #[serde(default)]
    pub terrain: TerrainCategory,
    /// Ground height.
    #[serde(default)]
    pub elevation: f64,
    /// Standing in cover.
    #[serde(default)]
    pub in_cover: bool,
    /// Firing from fortifications.
    #[serde(default)]
    pub fortified: bool,
}

/// An order and the tick it is queued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledOrder {
    /// Tick the order applies on; tick 0 applies on the first tick.
    pub tick: u64,
    /// The order.
    pub order: Order,
}

/// Orders addressed by unit label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Order {
    /// Activate an entity ability.
    Activate {
        /// Unit label.
        unit: String,
        /// Ability.
        ability: AbilityKind,
    },
    /// Cancel an entity ability.
    Cancel {
        /// Unit label.
        unit: String,
        /// Ability.
        ability: AbilityKind,
    },
    /// Start a weapon refit.
    Upgrade {
        /// Unit label.
        unit: String,
        /// Variant.
        variant: WeaponVariant,
    },
    /// Fire a faction ability.
    FactionAbility {
        /// Faction.
        faction: u8,
        /// Ability.
        ability: AbilityKind,
        /// Target point.
        target: (f64, f64),
    },
    /// Enter a garrison.
    Enter {
        /// Unit label.
        unit: String,
        /// Host label.
        host: String,
    },
    /// Leave a garrison.
    Exit {
        /// Unit label.
        unit: String,
    },
    /// Attack a unit.
    Attack {
        /// Attacker label.
        attacker: String,
        /// Target label.
        target: String,
    },
    /// Stop attacking.
    StopAttack {
        /// Attacker label.
        attacker: String,
    },
    /// Change formation.
    SetFormation {
        /// Unit label.
        unit: String,
        /// Formation.
        formation: FormationKind,
    },
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Final world hash.
    pub state_hash: u64,
    /// Events emitted across the run.
    pub events: usize,
    /// Total health damage dealt.
    pub total_damage: f64,
    /// Rejected orders as `tick: reason`.
    pub rejected: Vec<String>,
    /// Final state per unit, in placement order.
    pub units: Vec<UnitReport>,
}

/// Final state of one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    /// Unit label.
    pub label: String,
    /// Owning faction.
    pub faction: u8,
    /// Remaining health.
    pub health: f64,
    /// Health reached zero.
    pub destroyed: bool,
    /// Inside a garrison.
    pub garrisoned: bool,
    /// Final position.
    pub position: (f64, f64),
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ToolError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Run the scenario against `config`.
    pub fn run(&self, config: CombatConfig) -> Result<ScenarioReport> {
        let mut world = World::new(config);
        world.set_weather(Weather {
            temperature: decimal(self.weather.temperature)?,
            moisture: decimal(self.weather.moisture)?,
        });

        let mut labels = BTreeMap::new();
        for unit in &self.units {
            if labels.contains_key(&unit.label) {
                return Err(ToolError::DuplicateUnit(unit.label.clone()));
            }
            let id = world.spawn(unit.spawn_params()?);
            world.set_terrain(
                id,
                TerrainSample {
                    category: unit.terrain,
                    elevation: decimal(unit.elevation)?,
                    in_cover: unit.in_cover,
                    fortified: unit.fortified,
                },
            )?;
            labels.insert(unit.label.clone(), id);
        }

        let mut schedule: BTreeMap<u64, Vec<Command>> = BTreeMap::new();
        for scheduled in &self.orders {
            let command = scheduled.order.resolve(&labels)?;
            schedule
                .entry(scheduled.tick.max(1))
                .or_default()
                .push(command);
        }

        tracing::info!(
            scenario = %self.name,
            units = self.units.len(),
            orders = self.orders.len(),
            ticks = self.ticks,
            "Running scenario"
        );

        let mut events = 0;
        let mut total_damage = Fixed::ZERO;
        let mut rejected = Vec::new();
        for tick in 1..=self.ticks {
            if let Some(commands) = schedule.remove(&tick) {
                for command in commands {
                    world.queue(command);
                }
            }
            let output = world.tick();
            events += output.events.len();
            total_damage = total_damage.saturating_add(output.total_damage());
            for entry in output.rejected {
                rejected.push(format!("{tick}: {}", entry.error));
            }
        }

        let units = self
            .units
            .iter()
            .filter_map(|unit| {
                let entity = world.entity(*labels.get(&unit.label)?)?;
                Some(UnitReport {
                    label: unit.label.clone(),
                    faction: entity.faction.0,
                    health: entity.health().to_num::<f64>(),
                    destroyed: entity.is_destroyed(),
                    garrisoned: entity.garrisoned_in().is_some(),
                    position: (
                        entity.position.x.to_num::<f64>(),
                        entity.position.y.to_num::<f64>(),
                    ),
                })
            })
            .collect();

        Ok(ScenarioReport {
            name: self.name.clone(),
            ticks: self.ticks,
            state_hash: world.state_hash(),
            events,
            total_damage: total_damage.to_num::<f64>(),
            rejected,
            units,
        })
    }
}

impl UnitPlacement {
    fn spawn_params(&self) -> Result<SpawnParams> {
        let weapon = self
            .weapon
            .as_ref()
            .map(|w| -> Result<Weapon> {
                let profile = DamageProfile::new(decimal(w.damage)?)
                    .with_crit(decimal(w.crit_chance)?, decimal(w.crit_multiplier)?)
                    .with_penetration(decimal(w.armor_penetration)?);
                Ok(Weapon::new(profile, w.interval, decimal(w.range)?))
            })
            .transpose()?;

        Ok(SpawnParams {
            faction: FactionId(self.faction),
            position: point(self.position)?,
            max_health: decimal(self.max_health)?,
            base_armor: decimal(self.armor)?,
            base_speed: decimal(self.speed)?,
            weapon,
            airborne: self.airborne,
            garrison_class: self.garrison_class,
            garrison_host: self.garrison_host,
            shielded: self.shielded,
            repair_aura: self.repair_aura,
            upgradable: self.upgradable,
            abilities: self.abilities.clone(),
            rally_point: self.rally_point.map(point).transpose()?,
            exposed: self.exposed,
            resistance: self.resistance,
        })
    }
}

impl Order {
    fn resolve(&self, labels: &BTreeMap<String, EntityId>) -> Result<Command> {
        let id = |label: &String| {
            labels
                .get(label)
                .copied()
                .ok_or_else(|| ToolError::UnknownUnit(label.clone()))
        };
        Ok(match self {
            Order::Activate { unit, ability } => Command::Activate {
                entity: id(unit)?,
                ability: *ability,
            },
            Order::Cancel { unit, ability } => Command::Cancel {
                entity: id(unit)?,
                ability: *ability,
            },
            Order::Upgrade { unit, variant } => Command::Upgrade {
                entity: id(unit)?,
                variant: *variant,
            },
            Order::FactionAbility {
                faction,
                ability,
                target,
            } => Command::ActivateFaction {
                faction: FactionId(*faction),
                ability: *ability,
                target: point(*target)?,
            },
            Order::Enter { unit, host } => Command::Enter {
                unit: id(unit)?,
                host: id(host)?,
            },
            Order::Exit { unit } => Command::Exit { unit: id(unit)? },
            Order::Attack { attacker, target } => Command::Attack {
                attacker: id(attacker)?,
                target: id(target)?,
            },
            Order::StopAttack { attacker } => Command::StopAttack {
                attacker: id(attacker)?,
            },
            Order::SetFormation { unit, formation } => Command::SetFormation {
                entity: id(unit)?,
                formation: *formation,
            },
        })
    }
}

fn decimal(value: f64) -> Result<Fixed> {
    Fixed::checked_from_num(value).ok_or(ToolError::OutOfRange(value))
}

fn point((x, y): (f64, f64)) -> Result<Vec2Fixed> {
    Ok(Vec2Fixed::new(decimal(x)?, decimal(y)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIEGE: &str = r#"
Scenario(
    name: "Bunker siege",
    ticks: 60,
    units: [
        (label: "bunker", position: (0.0, 0.0), max_health: 1000.0, armor: 50.0,
         speed: 0.0, garrison_host: true, abilities: [Fortify]),
        (label: "rifle", position: (2.0, 0.0), garrison_class: Some(Infantry)),
        (label: "tower", faction: 1, position: (20.0, 0.0), max_health: 1000.0, speed: 0.0,
         weapon: Some((damage: 100.0, interval: 20, range: 40.0, crit_chance: 0.0))),
    ],
    orders: [
        (tick: 0, order: Enter(unit: "rifle", host: "bunker")),
        (tick: 0, order: Activate(unit: "bunker", ability: Fortify)),
        (tick: 1, order: Attack(attacker: "tower", target: "bunker")),
        (tick: 5, order: Activate(unit: "bunker", ability: Fortify)),
    ],
)
"#;

    #[test]
    fn test_siege_scenario_runs() {
        let scenario = Scenario::from_ron_str(SIEGE).unwrap();
        let report = scenario.run(CombatConfig::default()).unwrap();

        assert_eq!(report.ticks, 60);
        assert_eq!(report.units.len(), 3);
        let bunker = &report.units[0];
        assert!(bunker.health < 1000.0);
        assert!(!bunker.destroyed);
        assert!(report.units[1].garrisoned);
        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].starts_with("5:"));
    }

    #[test]
    fn test_reports_are_reproducible() {
        let scenario = Scenario::from_ron_str(SIEGE).unwrap();
        let first = scenario.run(CombatConfig::default()).unwrap();
        let second = scenario.run(CombatConfig::default()).unwrap();
        assert_eq!(first.state_hash, second.state_hash);
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let scenario = Scenario::from_ron_str(
            r#"Scenario(name: "bad", ticks: 1, units: [],
                orders: [(tick: 1, order: Exit(unit: "ghost"))])"#,
        )
        .unwrap();
        assert!(matches!(
            scenario.run(CombatConfig::default()),
            Err(ToolError::UnknownUnit(label)) if label == "ghost"
        ));
    }

    #[test]
    fn test_report_encodes_as_json() {
        let scenario = Scenario::from_ron_str(SIEGE).unwrap();
        let report = scenario.run(CombatConfig::default()).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"name\":\"Bunker siege\""));
    }
}
