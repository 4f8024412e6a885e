//! Resolution benchmarks for combat_core.
//!
//! Run with: `cargo bench -p combat_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use combat_core::ability::AbilityKind;
use combat_core::damage::{resolve, DamageProfile};
use combat_core::entity::{FactionId, SpawnParams, Weapon};
use combat_core::math::{Fixed, Vec2Fixed};
use combat_core::modifiers::{ModifierKind, ModifierScope, ModifierStack};
use combat_core::world::{Command, World};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn loaded_stack(sources: usize) -> ModifierStack {
    let mut stack = ModifierStack::new();
    for i in 0..sources {
        let kind = if i % 2 == 0 {
            ModifierKind::Additive
        } else {
            ModifierKind::Multiplicative
        };
        let scope = if i % 3 == 0 {
            ModifierScope::Armor
        } else {
            ModifierScope::Damage
        };
        // Bench setup only; built-in scopes always accept upserts.
        let _ = stack.upsert(format!("bench.{i}"), scope, kind, Fixed::from_num(1.05), None);
    }
    stack
}

fn skirmish(units_per_side: i32) -> World {
    let mut world = World::default();
    let mut ids = [Vec::new(), Vec::new()];
    for side in 0..2u8 {
        for i in 0..units_per_side {
            let x = if side == 0 { 0 } else { 30 };
            ids[side as usize].push(world.spawn(SpawnParams {
                faction: FactionId(side),
                position: Vec2Fixed::from_ints(x, i),
                max_health: Fixed::from_num(10_000),
                weapon: Some(Weapon::new(
                    DamageProfile::new(Fixed::from_num(12)),
                    10,
                    Fixed::from_num(40),
                )),
                abilities: vec![AbilityKind::TacticalRetreat],
                ..SpawnParams::default()
            }));
        }
    }
    for (attacker, target) in ids[0].iter().zip(ids[1].iter()) {
        world.queue(Command::Attack {
            attacker: *attacker,
            target: *target,
        });
        world.queue(Command::Attack {
            attacker: *target,
            target: *attacker,
        });
    }
    world.tick();
    world
}

/// Benchmarks the stat fold, single attack resolution and a full world tick.
pub fn resolution_benchmark(c: &mut Criterion) {
    let stack = loaded_stack(24);
    c.bench_function("fold_24_sources", |b| {
        b.iter(|| stack.fold(black_box(ModifierScope::Damage), black_box(Fixed::from_num(100))))
    });

    let attacker = loaded_stack(12);
    let defender = loaded_stack(12);
    let profile = DamageProfile::new(Fixed::from_num(100));
    c.bench_function("resolve_attack", |b| {
        b.iter(|| {
            resolve(
                black_box(&profile),
                &attacker,
                black_box(Fixed::from_num(50)),
                &defender,
                black_box(Fixed::from_num(0.5)),
            )
        })
    });

    let mut world = skirmish(50);
    c.bench_function("tick_100_units", |b| b.iter(|| black_box(world.tick())));
}

criterion_group!(benches, resolution_benchmark);
criterion_main!(benches);
