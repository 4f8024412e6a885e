//! Test fixtures and helpers.
//!
//! Pre-built spawn parameters and world setups
//! for consistent testing.

use combat_core::ability::AbilityKind;
use combat_core::config::CombatConfig;
use combat_core::damage::DamageProfile;
use combat_core::entity::{EntityId, FactionId, SpawnParams, Weapon};
use combat_core::events::TickEvents;
use combat_core::garrison::GarrisonClass;
use combat_core::math::Vec2Fixed;
use combat_core::world::World;
use fixed::types::I32F32;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Position from integer coordinates.
#[must_use]
pub fn at(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Weapon that never crits, so damage is exact.
#[must_use]
pub fn plain_weapon(damage: i32, interval: u64, range: i32) -> Weapon {
    Weapon::new(
        DamageProfile::new(fixed(damage)).with_crit(I32F32::ZERO, I32F32::ONE),
        interval,
        fixed(range),
    )
}

/// Infantry unit with a 10 damage rifle and tactical retreat.
#[must_use]
pub fn rifleman(faction: u8, position: Vec2Fixed) -> SpawnParams {
    SpawnParams {
        faction: FactionId(faction),
        position,
        weapon: Some(plain_weapon(10, 20, 8)),
        garrison_class: Some(GarrisonClass::Infantry),
        abilities: vec![AbilityKind::TacticalRetreat],
        ..SpawnParams::default()
    }
}

/// Immobile 1000 HP bunker with 50 armor, a garrison and fortify.
#[must_use]
pub fn bunker(faction: u8, position: Vec2Fixed) -> SpawnParams {
    SpawnParams {
        faction: FactionId(faction),
        position,
        max_health: fixed(1000),
        base_armor: fixed(50),
        base_speed: I32F32::ZERO,
        garrison_host: true,
        abilities: vec![AbilityKind::Fortify],
        ..SpawnParams::default()
    }
}

/// Immobile gun tower that fires 100 damage every tick at range 50.
#[must_use]
pub fn gun_tower(faction: u8, position: Vec2Fixed) -> SpawnParams {
    SpawnParams {
        faction: FactionId(faction),
        position,
        max_health: fixed(1000),
        base_speed: I32F32::ZERO,
        weapon: Some(plain_weapon(100, 1, 50)),
        ..SpawnParams::default()
    }
}

/// World with the default config and the given seed.
#[must_use]
pub fn world_with_seed(seed: u64) -> World {
    World::new(CombatConfig {
        seed,
        ..CombatConfig::default()
    })
}

/// Bunker under fire from one gun tower, with two riflemen inside.
///
/// Returns the world and `(bunker, tower)` ids.
#[must_use]
pub fn siege_scenario(seed: u64) -> (World, EntityId, EntityId) {
    let mut world = world_with_seed(seed);
    let host = world.spawn(bunker(0, at(0, 0)));
    for _ in 0..2 {
        let unit = world.spawn(rifleman(0, at(2, 2)));
        world
            .apply(combat_core::world::Command::Enter { unit, host })
            .expect("fresh bunker admits riflemen");
    }
    let tower = world.spawn(gun_tower(1, at(20, 0)));
    world
        .apply(combat_core::world::Command::Attack {
            attacker: tower,
            target: host,
        })
        .expect("tower can target the bunker");
    (world, host, tower)
}

/// Run `ticks` ticks and collect their events.
pub fn run_ticks(world: &mut World, ticks: u64) -> Vec<TickEvents> {
    (0..ticks).map(|_| world.tick()).collect()
}
