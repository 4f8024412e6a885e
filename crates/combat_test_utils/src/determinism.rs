//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the combat world
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism the world guards against:
//!
//! - **Floating-point math**: We use fixed-point arithmetic via
//!   [`combat_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Entities, modifiers and abilities live
//!   in `BTreeMap`s and are processed in key order.
//!
//! - **System randomness**: Crit rolls and exit positions come from
//!   ChaCha streams seeded by the config.

use combat_core::world::World;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic world).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the world was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "World is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a world twice from the same setup and compare final hashes.
pub fn verify_world_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> World,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |world| {
            world.tick();
        },
        World::state_hash,
    )
    .is_deterministic
}

/// Compare two runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if the runs match, `Some(tick)` if they diverge at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> World,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        first.tick();
        second.tick();

        if first.state_hash() != second.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Proptest strategies for modifier and world testing.
pub mod strategies {
    use combat_core::ability::AbilityKind;
    use combat_core::math::Fixed;
    use combat_core::modifiers::{ModifierKind, ModifierScope, ModifierSpec};
    use combat_core::world::Command;
    use proptest::prelude::*;

    /// Generate a built-in modifier scope other than damage reduction.
    pub fn arb_stat_scope() -> impl Strategy<Value = ModifierScope> {
        prop_oneof![
            Just(ModifierScope::Damage),
            Just(ModifierScope::Armor),
            Just(ModifierScope::Speed),
            Just(ModifierScope::AttackRange),
        ]
    }

    /// Generate an additive or multiplicative modifier with a modest value.
    ///
    /// Values are multiples of 1/8 so folds are exact in fixed point.
    pub fn arb_modifier_spec(scope: ModifierScope) -> impl Strategy<Value = ModifierSpec> {
        prop_oneof![
            (-80i32..80i32).prop_map(move |n| {
                ModifierSpec::additive(scope, Fixed::from_num(n) / Fixed::from_num(8))
            }),
            (1i32..24i32).prop_map(move |n| {
                ModifierSpec::multiplicative(scope, Fixed::from_num(n) / Fixed::from_num(8))
            }),
        ]
    }

    /// Generate a list of `(source name, spec)` pairs with unique sources.
    pub fn arb_sourced_specs(
        scope: ModifierScope,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<(String, ModifierSpec)>> {
        proptest::collection::vec(arb_modifier_spec(scope), 0..max_len).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, spec)| (format!("source.{i}"), spec))
                .collect()
        })
    }

    /// Generate armor values (0-500).
    pub fn arb_armor() -> impl Strategy<Value = Fixed> {
        (0i32..500i32).prop_map(Fixed::from_num)
    }

    /// Generate damage values (1-1000).
    pub fn arb_damage() -> impl Strategy<Value = Fixed> {
        (1i32..1000i32).prop_map(Fixed::from_num)
    }

    /// Whether a modifier kind is additive.
    #[must_use]
    pub fn is_additive(spec: &ModifierSpec) -> bool {
        spec.kind == ModifierKind::Additive
    }

    /// Generate an entity-level ability command for ids in `1..=max_id`.
    pub fn arb_entity_command(max_id: u64) -> impl Strategy<Value = Command> {
        let ability = prop_oneof![
            Just(AbilityKind::Fortify),
            Just(AbilityKind::TacticalRetreat),
        ];
        (1..=max_id, ability, any::<bool>()).prop_map(|(entity, ability, cancel)| {
            if cancel {
                Command::Cancel { entity, ability }
            } else {
                Command::Activate { entity, ability }
            }
        })
    }

    /// Generate a sequence of per-tick command batches.
    pub fn arb_command_schedule(
        max_id: u64,
        ticks: usize,
    ) -> impl Strategy<Value = Vec<Vec<Command>>> {
        proptest::collection::vec(
            proptest::collection::vec(arb_entity_command(max_id), 0..3),
            ticks,
        )
    }
}
