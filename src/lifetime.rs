use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::aggregation::Accumulator;
use crate::model::{LumpId, LumpedState, LumpedTransition};

/// How partial lifetimes combine into a state's total lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LifetimeSummation {
    /// `1/tau_i = sum_f tau_if`, the established output of this pipeline.
    #[default]
    PartialLifetimes,
    /// `1/tau_i = sum_f 1/tau_if`. Opt-in only.
    PartialRates,
}

/// Per-pair partial lifetimes and per-state total lifetimes.
#[derive(Debug, Clone, Default)]
pub struct Lifetimes {
    /// Sorted by `(initial, final)`.
    pub transitions: Vec<LumpedTransition>,
    /// Indexed by lump id; infinite where nothing leaves the state.
    pub total_lifetimes: Vec<f64>,
}

#[derive(Default)]
struct Group {
    lifetime_sum: f64,
    finals: u64,
    lump_size: u64,
}

/// Turn accumulated rate sums into lifetimes.
///
/// Each `(i, f)` partial lifetime is the plain mean of `1 / rate_sum` over the
/// original final states of `f` that actually received a contribution.
/// `total_lifetimes` covers at least `lump_count` states and always every
/// initial lump seen in `acc`.
pub fn finalize(
    acc: &Accumulator,
    lump_count: usize,
    summation: LifetimeSummation,
) -> Lifetimes {
    // fixed summation order keeps repeated runs bit-identical
    let mut pairs: Vec<_> = acc.iter().collect();
    pairs.sort_unstable_by_key(|(key, _)| **key);

    let mut groups: BTreeMap<(LumpId, LumpId), Group> = BTreeMap::new();
    for (&(initial, _final_id), pair) in pairs {
        let group = groups.entry((initial, pair.lumped_final)).or_default();
        group.lifetime_sum += 1.0 / pair.rate_sum;
        group.finals += 1;
        group.lump_size += pair.count;
    }

    let transitions: Vec<LumpedTransition> = groups
        .into_iter()
        .map(|((initial, final_), g)| LumpedTransition {
            initial,
            final_,
            partial_lifetime: g.lifetime_sum / g.finals as f64,
            lump_size: g.lump_size,
        })
        .collect();

    let states = transitions
        .iter()
        .map(|t| t.initial + 1)
        .fold(lump_count, usize::max);
    let mut inverse = vec![0.0f64; states];
    let mut has_outgoing = vec![false; states];
    for t in &transitions {
        inverse[t.initial] += match summation {
            LifetimeSummation::PartialLifetimes => t.partial_lifetime,
            LifetimeSummation::PartialRates => 1.0 / t.partial_lifetime,
        };
        has_outgoing[t.initial] = true;
    }

    let total_lifetimes = inverse
        .iter()
        .zip(&has_outgoing)
        .map(|(&inv, &out)| if out { 1.0 / inv } else { f64::INFINITY })
        .collect();

    Lifetimes {
        transitions,
        total_lifetimes,
    }
}

/// Copy total lifetimes onto the catalogue.
pub fn apply_total_lifetimes(catalogue: &mut [LumpedState], lifetimes: &Lifetimes) {
    for lump in catalogue.iter_mut() {
        if let Some(&tau) = lifetimes.total_lifetimes.get(lump.id) {
            lump.total_lifetime = tau;
        }
    }
}
