// Learning Application
//
// Folds caller-supplied learning data into the live state: bounded pattern
// lists and multiplicative scoring-weight adjustments followed by
// renormalization.

use crate::types::{push_bounded, BrainState, LearningData};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Sums at or below this are not renormalized
pub const WEIGHT_SUM_EPSILON: f64 = 1e-9;

/// Apply `data` to `state`.
///
/// Returns false only when weight adjustments left a sum too small to
/// normalize; the adjusted weights are then kept as they are.
pub fn apply_learning(state: &mut BrainState, data: &LearningData) -> bool {
    let patterns = &mut state.learned_patterns;

    if let Some(sectors) = &data.successful_sectors {
        push_bounded(&mut patterns.successful_sectors, sectors);
    }
    if let Some(found) = &data.successful_patterns {
        push_bounded(&mut patterns.successful_patterns, found);
    }
    if let Some(symbols) = &data.failed_symbols {
        push_bounded(&mut patterns.failed_symbols, symbols);
    }
    if let Some(times) = &data.optimal_entry_times {
        push_bounded(&mut patterns.optimal_entry_times, times);
    }

    match &data.weight_adjustments {
        Some(adjustments) => adjust_weights(&mut state.scoring_weights, adjustments),
        None => true,
    }
}

/// Scale each known factor by `1 + delta`, then renormalize to sum 1.0.
/// Unknown factors, and deltas that would leave a factor non-finite, are
/// ignored.
pub fn adjust_weights(weights: &mut BTreeMap<String, f64>, adjustments: &BTreeMap<String, f64>) -> bool {
    for (factor, delta) in adjustments {
        let Some(weight) = weights.get_mut(factor) else {
            debug!("Ignoring adjustment for unknown factor {}", factor);
            continue;
        };

        let adjusted = *weight * (1.0 + delta);
        if adjusted.is_finite() {
            *weight = adjusted;
        } else {
            warn!("Ignoring adjustment {} for factor {}: result is not finite", delta, factor);
        }
    }

    normalize_weights(weights)
}

/// Normalize weights to sum to 1.0; false if the sum is not usable
pub fn normalize_weights(weights: &mut BTreeMap<String, f64>) -> bool {
    let sum: f64 = weights.values().sum();
    if !sum.is_finite() || sum <= WEIGHT_SUM_EPSILON {
        warn!(
            "Scoring weight sum {} cannot be normalized, keeping weights unnormalized",
            sum
        );
        return false;
    }

    for weight in weights.values_mut() {
        *weight /= sum;
    }
    true
}
