// Rebirth Mutation
//
// Builds the successor of a killed brain. Discovery weights of the dying
// generation seed the successor, each scaled by a random factor.

use crate::types::{default_discovery_weights, BrainState};
use chrono::Utc;
use rand::Rng;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Multiplicative perturbation applied to each seeded weight
pub const MUTATION_RANGE: RangeInclusive<f64> = 0.7..=1.3;

/// Bounds on a mutated discovery weight
pub const WEIGHT_FLOOR: f64 = 0.5;
pub const WEIGHT_CEILING: f64 = 2.0;

/// Mutate the default discovery sources using `seed` values where present.
///
/// Keys are visited in sorted order, so a seeded RNG yields the same result
/// on every run. Sources missing from `seed` keep their default.
pub fn mutate_discovery_weights<R: Rng + ?Sized>(
    seed: &BTreeMap<String, f64>,
    rng: &mut R,
) -> BTreeMap<String, f64> {
    let mut weights = default_discovery_weights();
    for (source, weight) in weights.iter_mut() {
        if let Some(previous) = seed.get(source) {
            let factor = rng.gen_range(MUTATION_RANGE);
            *weight = (previous * factor).clamp(WEIGHT_FLOOR, WEIGHT_CEILING);
        }
    }
    weights
}

/// Fresh default brain at `generation`, seeded from the dying state
pub fn rebirth<R: Rng + ?Sized>(dying: &BrainState, generation: u64, rng: &mut R) -> BrainState {
    let mut reborn = BrainState::new(generation);
    reborn.timestamp = Utc::now();
    reborn.discovery_weights = mutate_discovery_weights(&dying.discovery_weights, rng);
    reborn
}
