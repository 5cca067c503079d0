//! Property-based tests for rollout invariants.
//!
//! Test coverage:
//! - Rollouts whose weights sum above 1.0 are always rejected
//! - Valid rollouts select a target exactly when the fraction is allocated
//! - Selection only ever returns keys the rollout declares
//! - Decoding enforces the same invariant as construction

use proptest::prelude::*;

use variables_config::{ModelError, Rollout, RolloutTarget};

/// Strategy for generating variant keys.
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_filter("reserved key", |k| k != "latest")
}

/// Strategy for weights that are individually valid but may sum above 1.0.
fn weights_strategy() -> impl Strategy<Value = Vec<(String, f64)>> {
    prop::collection::vec((key_strategy(), 0.0f64..=1.0), 1..6)
}

/// Strategy for rollouts guaranteed to satisfy the weight invariant.
fn valid_rollout_strategy() -> impl Strategy<Value = Rollout> {
    (
        prop::collection::btree_map(key_strategy(), 1u32..100, 1..6),
        prop::option::of(1u32..100),
        1u32..4,
    )
        .prop_map(|(raw, latest, slack)| {
            let total: u32 = raw.values().sum::<u32>() + latest.unwrap_or(0);
            // Scale so the allocated mass is total / (total * slack) <= 1.0.
            let denominator = f64::from(total * slack);
            let weights = raw
                .into_iter()
                .map(|(k, w)| (k, f64::from(w) / denominator));
            Rollout::new(weights, latest.map(|w| f64::from(w) / denominator))
                .expect("scaled weights are valid")
        })
}

proptest! {
    #[test]
    fn prop_weights_above_one_rejected(weights in weights_strategy(), latest in prop::option::of(0.0f64..=1.0)) {
        let mut deduped = std::collections::BTreeMap::new();
        for (k, w) in &weights {
            deduped.insert(k.clone(), *w);
        }
        let total: f64 = deduped.values().sum::<f64>() + latest.unwrap_or(0.0);
        let result = Rollout::new(deduped, latest);
        if total > 1.0 + 1e-9 {
            let rejected = matches!(result, Err(ModelError::WeightsExceedOne { .. }));
            prop_assert!(rejected);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn prop_selection_matches_allocated_mass(rollout in valid_rollout_strategy(), fraction in 0.0f64..1.0) {
        let selected = rollout.select(fraction);
        if fraction < rollout.total_weight() - 1e-12 {
            prop_assert!(selected.is_some());
        }
        if fraction >= rollout.total_weight() {
            prop_assert!(selected.is_none());
        }
    }

    #[test]
    fn prop_selection_returns_declared_keys(rollout in valid_rollout_strategy(), fraction in 0.0f64..1.0) {
        match rollout.select(fraction) {
            Some(RolloutTarget::Named(key)) => prop_assert!(rollout.variants().contains_key(key)),
            Some(RolloutTarget::Latest) => prop_assert!(rollout.latest_weight().is_some()),
            None => {}
        }
    }

    #[test]
    fn prop_decode_agrees_with_construction(weights in weights_strategy()) {
        let map: std::collections::BTreeMap<String, f64> = weights.into_iter().collect();
        let json = serde_json::json!({ "variants": map });
        let decoded: Result<Rollout, _> = serde_json::from_value(json);
        let constructed = Rollout::new(map, None);
        prop_assert_eq!(decoded.is_ok(), constructed.is_ok());
    }
}
