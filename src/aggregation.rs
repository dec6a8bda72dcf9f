use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::LumpResult;
use crate::model::{LumpId, Membership, OriginalId, Transition};

/// Running totals for one `(lumped initial, original final)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairSum {
    /// Lump of the final original state, recorded when the pair was first seen.
    pub lumped_final: LumpId,
    /// Sum of Einstein A coefficients, i.e. the inverse partial lifetime.
    pub rate_sum: f64,
    /// Raw transitions that contributed.
    pub count: u64,
}

/// What happened to the raw records during the pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    pub records: u64,
    pub discarded_filtered: u64,
    pub discarded_intra_lump: u64,
    pub accumulated: u64,
}

/// Inverse-lifetime sums keyed by `(lumped initial, original final)`.
///
/// Grows with the number of distinct pairs observed, never with the number
/// of raw transitions.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    pairs: HashMap<(LumpId, OriginalId), PairSum>,
    stats: AggregationStats,
}

impl Accumulator {
    pub fn get(&self, initial: LumpId, final_id: OriginalId) -> Option<&PairSum> {
        self.pairs.get(&(initial, final_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(LumpId, OriginalId), &PairSum)> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn stats(&self) -> AggregationStats {
        self.stats
    }
}

/// Single forward pass over a transition stream.
pub struct TransitionAggregator<'a> {
    membership: &'a Membership,
    acc: Accumulator,
}

impl<'a> TransitionAggregator<'a> {
    pub fn new(membership: &'a Membership) -> Self {
        Self {
            membership,
            acc: Accumulator::default(),
        }
    }

    /// Fold one raw transition into the accumulator.
    ///
    /// Records touching a filtered-out state or staying inside one lump are
    /// dropped. Rates are taken as given, zero and negative included.
    pub fn push(&mut self, t: &Transition) {
        let stats = &mut self.acc.stats;
        stats.records += 1;

        let (Some(&i), Some(&f)) = (
            self.membership.get(&t.initial_id),
            self.membership.get(&t.final_id),
        ) else {
            stats.discarded_filtered += 1;
            return;
        };
        if i == f {
            stats.discarded_intra_lump += 1;
            return;
        }

        stats.accumulated += 1;
        let entry = self.acc.pairs.entry((i, t.final_id)).or_insert(PairSum {
            lumped_final: f,
            rate_sum: 0.0,
            count: 0,
        });
        entry.rate_sum += t.rate;
        entry.count += 1;
    }

    pub fn finish(self) -> Accumulator {
        let stats = self.acc.stats;
        debug!(
            records = stats.records,
            accumulated = stats.accumulated,
            pairs = self.acc.pairs.len(),
            "transitions aggregated"
        );
        self.acc
    }
}

/// Consume `transitions` once and return the accumulated pair sums.
///
/// The first read error aborts the pass.
pub fn aggregate<I>(transitions: I, membership: &Membership) -> LumpResult<Accumulator>
where
    I: IntoIterator<Item = LumpResult<Transition>>,
{
    let mut aggregator = TransitionAggregator::new(membership);
    for record in transitions {
        aggregator.push(&record?);
    }
    Ok(aggregator.finish())
}
