//! End-to-end combat tests driven through the public `World` API.

use combat_core::ability::{AbilityKind, AbilityPhaseKind};
use combat_core::config::CombatConfig;
use combat_core::entity::{FactionId, SpawnParams};
use combat_core::environment::{EnvironmentResistance, Weather};
use combat_core::error::CombatError;
use combat_core::events::{AbilityOwner, CombatEvent, TickEvents};
use combat_core::garrison::GarrisonClass;
use combat_core::math::Fixed;
use combat_core::modifiers::ModifierScope;
use combat_core::retreat::RetreatPhase;
use combat_core::terrain::{TerrainCategory, TerrainSample};
use combat_core::upgrade::WeaponVariant;
use combat_core::world::{Command, World};
use combat_test_utils::fixtures::{
    at, bunker, fixed, gun_tower, plain_weapon, rifleman, run_ticks, world_with_seed,
};

fn any_event(events: &[TickEvents], pred: impl Fn(&CombatEvent) -> bool) -> bool {
    events.iter().flat_map(|t| t.events.iter()).any(pred)
}

// =============================================================================
// Damage resolution
// =============================================================================

#[test]
fn test_three_hits_against_armored_bunker() {
    let mut world = world_with_seed(1);
    let host = world.spawn(bunker(0, at(0, 0)));
    let tower = world.spawn(gun_tower(1, at(30, 0)));
    world.queue(Command::Attack {
        attacker: tower,
        target: host,
    });

    run_ticks(&mut world, 3);

    let health = world.entity(host).unwrap().health();
    assert!((health - fixed(800)).abs() < fixed(1) / fixed(1000));
}

#[test]
fn test_out_of_range_target_is_not_hit() {
    let mut world = World::default();
    let host = world.spawn(bunker(0, at(0, 0)));
    let tower = world.spawn(gun_tower(1, at(51, 0)));
    world
        .apply(Command::Attack {
            attacker: tower,
            target: host,
        })
        .unwrap();

    let events = run_ticks(&mut world, 5);
    assert!(events.iter().all(|t| t.total_damage() == Fixed::ZERO));
}

#[test]
fn test_shield_absorbs_before_health() {
    let mut world = World::default();
    let target = world.spawn(SpawnParams {
        faction: FactionId(0),
        max_health: fixed(500),
        shielded: true,
        base_speed: Fixed::ZERO,
        ..SpawnParams::default()
    });
    let tower = world.spawn(gun_tower(1, at(10, 0)));
    world
        .apply(Command::Attack {
            attacker: tower,
            target,
        })
        .unwrap();

    let events = world.tick();
    let absorbed = events.events.iter().find_map(|event| match event {
        CombatEvent::DamageApplied { absorbed, .. } => Some(*absorbed),
        _ => None,
    });
    assert_eq!(absorbed, Some(fixed(100)));
    assert_eq!(world.entity(target).unwrap().health(), fixed(500));
}

#[test]
fn test_height_advantage_increases_damage() {
    let mut world = World::default();
    let low = world.spawn(SpawnParams {
        max_health: fixed(1000),
        base_speed: Fixed::ZERO,
        ..SpawnParams::default()
    });
    let tower = world.spawn(gun_tower(1, at(10, 0)));
    world
        .set_terrain(
            tower,
            TerrainSample {
                elevation: fixed(5),
                ..TerrainSample::default()
            },
        )
        .unwrap();
    world
        .apply(Command::Attack {
            attacker: tower,
            target: low,
        })
        .unwrap();

    let events = world.tick();
    assert!(events.total_damage() > fixed(100));
}

#[test]
fn test_cover_boosts_the_attacker_not_the_target() {
    let mut world = World::default();
    let target = world.spawn(SpawnParams {
        max_health: fixed(1000),
        base_speed: Fixed::ZERO,
        ..SpawnParams::default()
    });
    let tower = world.spawn(gun_tower(1, at(10, 0)));
    world
        .apply(Command::Attack {
            attacker: tower,
            target,
        })
        .unwrap();

    let covered = TerrainSample {
        in_cover: true,
        ..TerrainSample::default()
    };
    world.set_terrain(target, covered).unwrap();
    assert_eq!(world.tick().total_damage(), fixed(100));
    assert!(!world
        .active_modifier_summary(target)
        .unwrap()
        .contains_key(&ModifierScope::Armor));

    world.set_terrain(target, TerrainSample::default()).unwrap();
    world.set_terrain(tower, covered).unwrap();
    let dealt = world.tick().total_damage();
    assert!((dealt - fixed(115)).abs() < fixed(1) / fixed(1000));
}

#[test]
fn test_many_lethal_hits_destroy_once() {
    let mut world = World::default();
    let unit = world.spawn(rifleman(0, at(0, 0)));
    for y in 0..3 {
        let tower = world.spawn(SpawnParams {
            weapon: Some(plain_weapon(5000, 1, 50)),
            ..gun_tower(1, at(10, y))
        });
        world
            .apply(Command::Attack {
                attacker: tower,
                target: unit,
            })
            .unwrap();
    }

    let events = run_ticks(&mut world, 3);
    let destroyed = events
        .iter()
        .flat_map(|t| t.events.iter())
        .filter(|event| matches!(event, CombatEvent::EntityDestroyed { entity } if *entity == unit))
        .count();
    assert_eq!(destroyed, 1);
    assert_eq!(world.entity(unit).unwrap().health(), Fixed::ZERO);

    let later = run_ticks(&mut world, 5);
    assert!(!any_event(&later, |event| matches!(event, CombatEvent::DamageApplied { .. })));
    assert_eq!(world.entity(unit).unwrap().health(), Fixed::ZERO);
}

// =============================================================================
// Abilities
// =============================================================================

#[test]
fn test_fortify_restores_armor_across_cycles() {
    let config = CombatConfig::default();
    let cycle = config.fortify.timing.duration + config.fortify.timing.cooldown;
    let mut world = World::new(config);
    let host = world.spawn(bunker(0, at(0, 0)));

    for _ in 0..3 {
        world
            .apply(Command::Activate {
                entity: host,
                ability: AbilityKind::Fortify,
            })
            .unwrap();
        assert_eq!(world.entity(host).unwrap().armor().unwrap(), fixed(75));

        run_ticks(&mut world, cycle);

        let entity = world.entity(host).unwrap();
        assert_eq!(entity.armor().unwrap(), fixed(50));
        assert!(entity.abilities().is_ready(AbilityKind::Fortify));
    }
}

#[test]
fn test_fortify_on_cooldown_is_rejected() {
    let mut world = World::default();
    let host = world.spawn(bunker(0, at(0, 0)));
    world
        .apply(Command::Activate {
            entity: host,
            ability: AbilityKind::Fortify,
        })
        .unwrap();
    world.queue(Command::Activate {
        entity: host,
        ability: AbilityKind::Fortify,
    });

    let events = world.tick();
    assert!(matches!(
        events.rejected[0].error,
        CombatError::InvalidTransition {
            ability: AbilityKind::Fortify,
            phase: AbilityPhaseKind::Active,
            ..
        }
    ));
}

#[test]
fn test_cancel_fortify_removes_modifiers_immediately() {
    let mut world = World::default();
    let host = world.spawn(bunker(0, at(0, 0)));
    world
        .apply(Command::Activate {
            entity: host,
            ability: AbilityKind::Fortify,
        })
        .unwrap();
    world
        .apply(Command::Cancel {
            entity: host,
            ability: AbilityKind::Fortify,
        })
        .unwrap();

    let summary = world.active_modifier_summary(host).unwrap();
    assert!(!summary.contains_key(&ModifierScope::Armor));
    assert_eq!(world.entity(host).unwrap().armor().unwrap(), fixed(50));
}

#[test]
fn test_death_ends_active_fortify() {
    let mut world = World::default();
    let host = world.spawn(bunker(0, at(0, 0)));
    let tower = world.spawn(SpawnParams {
        weapon: Some(plain_weapon(100_000, 1, 50)),
        ..gun_tower(1, at(10, 0))
    });
    world
        .apply(Command::Activate {
            entity: host,
            ability: AbilityKind::Fortify,
        })
        .unwrap();
    world
        .apply(Command::Attack {
            attacker: tower,
            target: host,
        })
        .unwrap();

    let events = run_ticks(&mut world, 1);
    let entity = world.entity(host).unwrap();
    assert!(entity.is_destroyed());
    assert!(!entity.abilities().is_active(AbilityKind::Fortify));
    assert!(!entity.modifiers().has_source(&AbilityKind::Fortify.source_id()));
    assert!(!world
        .active_modifier_summary(host)
        .unwrap()
        .contains_key(&ModifierScope::Armor));
    assert!(any_event(&events, |event| matches!(
        event,
        CombatEvent::AbilityDeactivated {
            owner: AbilityOwner::Entity(id),
            ability: AbilityKind::Fortify,
        } if *id == host
    )));
}

#[test]
fn test_upgrade_blocked_while_fortified() {
    let mut world = World::default();
    let turret = world.spawn(SpawnParams {
        weapon: Some(plain_weapon(20, 20, 30)),
        upgradable: true,
        abilities: vec![AbilityKind::Fortify],
        base_speed: Fixed::ZERO,
        ..SpawnParams::default()
    });
    world
        .apply(Command::Activate {
            entity: turret,
            ability: AbilityKind::Fortify,
        })
        .unwrap();
    let before = world.active_modifier_summary(turret).unwrap();

    assert_eq!(
        world.apply(Command::Upgrade {
            entity: turret,
            variant: WeaponVariant::LaserCannon,
        }),
        Err(CombatError::AbilityBlocked {
            ability: AbilityKind::WeaponUpgrade,
            blocker: AbilityKind::Fortify,
        })
    );

    let entity = world.entity(turret).unwrap();
    assert_eq!(entity.loadout().unwrap().pending(), None);
    assert!(entity.abilities().is_ready(AbilityKind::WeaponUpgrade));
    assert!(entity.abilities().is_active(AbilityKind::Fortify));
    assert_eq!(world.active_modifier_summary(turret).unwrap(), before);
}

#[test]
fn test_rage_auto_triggers_and_covers_new_units() {
    let mut world = World::default();
    let host = world.spawn(bunker(0, at(0, 0)));
    let tower = world.spawn(SpawnParams {
        weapon: Some(plain_weapon(1000, 1000, 50)),
        ..gun_tower(1, at(10, 0))
    });
    world
        .apply(Command::Attack {
            attacker: tower,
            target: host,
        })
        .unwrap();

    // 1000 damage through 50 armor leaves the bunker at a third.
    world.tick();
    world.tick();
    let rage = world.faction_abilities(FactionId(0)).unwrap();
    assert!(rage.is_active(AbilityKind::Rage));

    let recruit = world.spawn(rifleman(0, at(-5, 0)));
    let stack = world.entity(recruit).unwrap().modifiers();
    assert_eq!(stack.fold(ModifierScope::Damage, fixed(10)).unwrap(), fixed(20));
}

#[test]
fn test_faction_ability_on_entity_command_is_rejected() {
    let mut world = World::default();
    let host = world.spawn(bunker(0, at(0, 0)));
    assert_eq!(
        world.apply(Command::Activate {
            entity: host,
            ability: AbilityKind::Rage,
        }),
        Err(CombatError::AbilityNotRegistered(AbilityKind::Rage))
    );
}

#[test]
fn test_satellite_scan_reveals_area() {
    let mut world = World::default();
    world.spawn(rifleman(2, at(0, 0)));
    world
        .apply(Command::ActivateFaction {
            faction: FactionId(2),
            ability: AbilityKind::SatelliteScan,
            target: at(100, 100),
        })
        .unwrap();

    let events = world.tick();
    assert!(events.events.iter().any(|event| matches!(
        event,
        CombatEvent::AreaRevealed { faction: FactionId(2), center, .. } if *center == at(100, 100)
    )));
    assert!(events.events.iter().any(|event| matches!(
        event,
        CombatEvent::AbilityActivated {
            owner: AbilityOwner::Faction(FactionId(2)),
            ability: AbilityKind::SatelliteScan,
        }
    )));
}

// =============================================================================
// Tactical retreat
// =============================================================================

#[test]
fn test_low_health_unit_retreats_away_from_threat() {
    let config = CombatConfig::default();
    let retreat_ticks = config.retreat.smoke_ticks + config.retreat.move_ticks;
    let mut world = World::new(config);
    let unit = world.spawn(rifleman(0, at(0, 0)));
    let tower = world.spawn(SpawnParams {
        weapon: Some(plain_weapon(75, 10_000, 50)),
        ..gun_tower(1, at(10, 0))
    });
    world
        .apply(Command::Attack {
            attacker: tower,
            target: unit,
        })
        .unwrap();

    let mut events = run_ticks(&mut world, 2);
    assert!(world.entity(unit).unwrap().retreat().is_retreating());
    assert!(!world.entity(unit).unwrap().can_attack(world.now()));
    let retreat_source = AbilityKind::TacticalRetreat.source_id();
    let boost = world
        .entity(unit)
        .unwrap()
        .modifiers()
        .get(&retreat_source, ModifierScope::Speed)
        .map(|m| m.value);
    assert_eq!(boost, Some(Fixed::from_num(1.5)));

    events.extend(run_ticks(&mut world, retreat_ticks));
    assert!(any_event(&events, |event| matches!(
        event,
        CombatEvent::RetreatPhaseChanged {
            phase: RetreatPhase::Moving,
            ..
        }
    )));

    let entity = world.entity(unit).unwrap();
    assert!(!entity.retreat().is_retreating());
    assert!(entity.position.x < fixed(-19));
    assert!(!entity.modifiers().has_source(&retreat_source));
}

#[test]
fn test_retreat_prefers_rally_point() {
    let mut world = World::default();
    let unit = world.spawn(SpawnParams {
        rally_point: Some(at(-50, 40)),
        ..rifleman(0, at(0, 0))
    });
    world.spawn(gun_tower(1, at(10, 0)));
    world
        .apply(Command::Activate {
            entity: unit,
            ability: AbilityKind::TacticalRetreat,
        })
        .unwrap();
    assert_eq!(world.entity(unit).unwrap().retreat().destination(), at(-50, 40));
}

#[test]
fn test_unit_killed_mid_retreat_stays_put() {
    let config = CombatConfig::default();
    let smoke = config.retreat.smoke_ticks;
    let mut world = World::new(config);
    let unit = world.spawn(rifleman(0, at(0, 0)));
    let tower = world.spawn(SpawnParams {
        weapon: Some(plain_weapon(75, 10_000, 50)),
        ..gun_tower(1, at(10, 0))
    });
    world
        .apply(Command::Attack {
            attacker: tower,
            target: unit,
        })
        .unwrap();
    run_ticks(&mut world, smoke + 12);
    assert_eq!(world.entity(unit).unwrap().retreat().phase(), RetreatPhase::Moving);

    let killer = world.spawn(SpawnParams {
        weapon: Some(plain_weapon(10_000, 1, 500)),
        ..gun_tower(1, at(10, 5))
    });
    world
        .apply(Command::Attack {
            attacker: killer,
            target: unit,
        })
        .unwrap();
    let death = run_ticks(&mut world, 1);
    assert!(world.entity(unit).unwrap().is_destroyed());
    assert!(any_event(&death, |event| matches!(
        event,
        CombatEvent::AbilityDeactivated {
            ability: AbilityKind::TacticalRetreat,
            ..
        }
    )));
    let resting_place = world.entity(unit).unwrap().position;

    let after = run_ticks(&mut world, 200);
    let entity = world.entity(unit).unwrap();
    assert_eq!(entity.position, resting_place);
    assert!(!entity.retreat().is_retreating());
    assert!(!any_event(&after, |event| matches!(
        event,
        CombatEvent::RetreatPhaseChanged { .. }
    )));
}

// =============================================================================
// Garrison
// =============================================================================

#[test]
fn test_garrison_capacity_and_vehicle_rule() {
    let mut world = World::default();
    let host = world.spawn(bunker(0, at(0, 0)));
    let vehicle = world.spawn(SpawnParams {
        garrison_class: Some(GarrisonClass::LightVehicle),
        ..SpawnParams::default()
    });

    let mut soldiers = Vec::new();
    for i in 0..5 {
        soldiers.push(world.spawn(rifleman(0, at(i, 3))));
    }

    for &unit in &soldiers[..2] {
        world.apply(Command::Enter { unit, host }).unwrap();
    }
    assert_eq!(
        world.apply(Command::Enter {
            unit: vehicle,
            host
        }),
        Err(CombatError::AdmissionDenied(vehicle))
    );

    for &unit in &soldiers[2..4] {
        world.apply(Command::Enter { unit, host }).unwrap();
    }
    assert_eq!(
        world.apply(Command::Enter {
            unit: soldiers[4],
            host
        }),
        Err(CombatError::CapacityExceeded { capacity: 4 })
    );
    assert_eq!(
        world.apply(Command::Enter {
            unit: soldiers[0],
            host
        }),
        Err(CombatError::AlreadyMember(soldiers[0]))
    );

    assert_eq!(world.entity(host).unwrap().armor().unwrap(), fixed(70));
    assert!(!world.entity(soldiers[0]).unwrap().is_in_world());
}

#[test]
fn test_garrisoned_units_are_not_targets() {
    let mut world = World::default();
    let host = world.spawn(bunker(0, at(0, 0)));
    let unit = world.spawn(rifleman(0, at(0, 0)));
    world.apply(Command::Enter { unit, host }).unwrap();

    world.spawn(SpawnParams {
        faction: FactionId(1),
        ..SpawnParams::default()
    });
    world
        .apply(Command::ActivateFaction {
            faction: FactionId(1),
            ability: AbilityKind::ArtilleryStrike,
            target: at(0, 0),
        })
        .unwrap();

    assert_eq!(world.entity(unit).unwrap().health(), fixed(100));
    assert!(world.entity(host).unwrap().health() < fixed(1000));
}

// =============================================================================
// Weapon upgrades
// =============================================================================

#[test]
fn test_weapon_upgrade_disables_then_installs() {
    let config = CombatConfig::default();
    let refit = config.weapon_upgrade.duration;
    let mut world = World::new(config);
    let turret = world.spawn(SpawnParams {
        weapon: Some(plain_weapon(20, 20, 30)),
        upgradable: true,
        base_speed: Fixed::ZERO,
        ..SpawnParams::default()
    });
    let target = world.spawn(SpawnParams {
        faction: FactionId(1),
        max_health: fixed(10_000),
        position: at(5, 0),
        ..SpawnParams::default()
    });

    world
        .apply(Command::Upgrade {
            entity: turret,
            variant: WeaponVariant::LaserCannon,
        })
        .unwrap();
    assert_eq!(
        world.apply(Command::Upgrade {
            entity: turret,
            variant: WeaponVariant::LaserCannon,
        }),
        Err(CombatError::UpgradeAlreadyInstalled("LaserCannon"))
    );
    world
        .apply(Command::Attack {
            attacker: turret,
            target,
        })
        .unwrap();

    let events = run_ticks(&mut world, refit - 1);
    assert!(events.iter().all(|t| t.total_damage() == Fixed::ZERO));
    assert!(!any_event(&events, |event| matches!(event, CombatEvent::DamageApplied { .. })));

    let events = run_ticks(&mut world, 1);
    assert!(any_event(&events, |event| matches!(
        event,
        CombatEvent::WeaponUpgradeCompleted {
            variant: WeaponVariant::LaserCannon,
            ..
        }
    )));
    assert_eq!(world.entity(turret).unwrap().attack_interval().unwrap(), Some(16));

    let events = run_ticks(&mut world, 20);
    let dealt: Fixed = events.iter().map(TickEvents::total_damage).sum();
    assert!(dealt >= fixed(30));
}

#[test]
fn test_cancelled_upgrade_installs_nothing() {
    let mut world = World::default();
    let turret = world.spawn(SpawnParams {
        weapon: Some(plain_weapon(20, 20, 30)),
        upgradable: true,
        ..SpawnParams::default()
    });
    world
        .apply(Command::Upgrade {
            entity: turret,
            variant: WeaponVariant::MissileLauncher,
        })
        .unwrap();
    world
        .apply(Command::Cancel {
            entity: turret,
            ability: AbilityKind::WeaponUpgrade,
        })
        .unwrap();

    let entity = world.entity(turret).unwrap();
    assert_eq!(entity.loadout().unwrap().installed(), None);
    assert_eq!(entity.loadout().unwrap().pending(), None);
    assert!(entity.modifiers().is_empty());
}

// =============================================================================
// Contextual producers
// =============================================================================

#[test]
fn test_repair_pulse_heals_nearby_ally() {
    let mut world = World::default();
    let depot = world.spawn(SpawnParams {
        max_health: fixed(1000),
        repair_aura: true,
        base_speed: Fixed::ZERO,
        ..SpawnParams::default()
    });
    let wounded = world.spawn(SpawnParams {
        max_health: fixed(200),
        ..rifleman(0, at(3, 0))
    });
    world.spawn(SpawnParams {
        faction: FactionId(1),
        position: at(100, 0),
        ..SpawnParams::default()
    });
    world
        .apply(Command::ActivateFaction {
            faction: FactionId(1),
            ability: AbilityKind::ArtilleryStrike,
            target: at(3, 0),
        })
        .unwrap();
    assert_eq!(world.entity(wounded).unwrap().health(), fixed(100));

    let events = run_ticks(&mut world, 1);
    assert!(any_event(&events, |event| matches!(
        event,
        CombatEvent::Repaired { source, target, amount }
            if *source == depot && *target == wounded && *amount == fixed(10)
    )));
    assert!(!any_event(&events, |event| matches!(
        event,
        CombatEvent::Repaired { target, .. } if *target == depot
    )));

    // Next pulse waits a full interval.
    let events = run_ticks(&mut world, 19);
    assert!(!any_event(&events, |event| matches!(event, CombatEvent::Repaired { .. })));
    let events = run_ticks(&mut world, 1);
    assert!(any_event(&events, |event| matches!(event, CombatEvent::Repaired { .. })));
}

#[test]
fn test_formation_and_terrain_modifiers() {
    let mut world = World::default();
    let unit = world.spawn(rifleman(0, at(0, 0)));
    world
        .apply(Command::SetFormation {
            entity: unit,
            formation: combat_core::formation::FormationKind::Box,
        })
        .unwrap();
    world
        .set_terrain(
            unit,
            TerrainSample {
                category: TerrainCategory::Mud,
                in_cover: true,
                ..TerrainSample::default()
            },
        )
        .unwrap();
    world.tick();

    let summary = world.active_modifier_summary(unit).unwrap();
    let armor = &summary[&ModifierScope::Armor];
    assert!(armor.multiplier > Fixed::ONE);
    assert!(world.entity(unit).unwrap().speed().unwrap() < Fixed::ONE);

    world.set_terrain(unit, TerrainSample::default()).unwrap();
    world
        .apply(Command::SetFormation {
            entity: unit,
            formation: combat_core::formation::FormationKind::Loose,
        })
        .unwrap();
    world.tick();
    assert!(world.entity(unit).unwrap().modifiers().is_empty());
}

#[test]
fn test_cold_weather_wears_down_exposed_units() {
    let mut world = World::default();
    let unit = world.spawn(SpawnParams {
        exposed: true,
        ..rifleman(0, at(0, 0))
    });
    world.set_weather(Weather {
        temperature: fixed(-20),
        moisture: fixed(50),
    });

    run_ticks(&mut world, 200);

    let damage = world
        .entity(unit)
        .unwrap()
        .modifiers()
        .fold(ModifierScope::Damage, fixed(10))
        .unwrap();
    assert!(damage < fixed(10));
    assert!(world.entity(unit).unwrap().environment().unwrap().cold() > Fixed::ZERO);
}

#[test]
fn test_units_adapt_to_open_ground() {
    let mut world = World::default();
    let unit = world.spawn(rifleman(0, at(0, 0)));
    let base = world.entity(unit).unwrap().speed().unwrap();

    run_ticks(&mut world, 40);

    assert!(world.entity(unit).unwrap().speed().unwrap() > base);
}

#[test]
fn test_hardy_unit_resists_cold() {
    let mut world = World::default();
    let stock = world.spawn(SpawnParams {
        exposed: true,
        ..rifleman(0, at(0, 0))
    });
    let hardy = world.spawn(SpawnParams {
        exposed: true,
        resistance: Some(EnvironmentResistance {
            cold: Fixed::ONE,
            ..EnvironmentResistance::default()
        }),
        ..rifleman(0, at(0, 50))
    });
    world.set_weather(Weather {
        temperature: fixed(-20),
        moisture: Fixed::ZERO,
    });

    run_ticks(&mut world, 200);

    let cold = |id| world.entity(id).unwrap().environment().unwrap().cold();
    assert!(cold(stock) > Fixed::ZERO);
    assert_eq!(cold(hardy), Fixed::ZERO);

    let damage = |id| {
        world
            .entity(id)
            .unwrap()
            .modifiers()
            .fold(ModifierScope::Damage, fixed(10))
            .unwrap()
    };
    assert!(damage(stock) < damage(hardy));
}
