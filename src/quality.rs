use std::fmt;

use serde::Serialize;

use crate::model::{LumpId, LumpedState};

/// Non-fatal finding attached to a molecule's output for curator review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// No outgoing lumped transition left this state.
    InfiniteLifetime { lump: LumpId },
    NegativeLifetime { lump: LumpId, value: f64 },
    UndefinedLifetime { lump: LumpId },
    /// No member at the lowest J, so no energy could be assigned.
    EmptyLowestJ { lump: LumpId },
    /// The lowest-energy state should not decay.
    FiniteGroundLifetime { lump: LumpId, value: f64 },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InfiniteLifetime { lump } => {
                write!(f, "lumped state {lump} has an infinite total lifetime")
            }
            Self::NegativeLifetime { lump, value } => {
                write!(f, "lumped state {lump} has a negative total lifetime ({value})")
            }
            Self::UndefinedLifetime { lump } => {
                write!(f, "lumped state {lump} has an undefined (NaN) total lifetime")
            }
            Self::EmptyLowestJ { lump } => {
                write!(f, "lumped state {lump} has no members at its lowest J")
            }
            Self::FiniteGroundLifetime { lump, value } => {
                write!(
                    f,
                    "ground lumped state {lump} has a finite total lifetime ({value})"
                )
            }
        }
    }
}

/// Lowest-energy lumped state, ignoring states without an energy.
pub fn ground_state(catalogue: &[LumpedState]) -> Option<LumpId> {
    catalogue
        .iter()
        .filter_map(|l| l.energy.map(|e| (l.id, e)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Inspect the finished catalogue's lifetimes.
///
/// Every infinite, negative or NaN lifetime is reported. On top of that a
/// ground state that decays is flagged.
pub fn check_lifetimes(catalogue: &[LumpedState]) -> Vec<DataQualityWarning> {
    let ground = ground_state(catalogue);
    let mut warnings = Vec::new();

    for lump in catalogue {
        let tau = lump.total_lifetime;
        if tau.is_nan() {
            warnings.push(DataQualityWarning::UndefinedLifetime { lump: lump.id });
        } else if tau < 0.0 {
            warnings.push(DataQualityWarning::NegativeLifetime {
                lump: lump.id,
                value: tau,
            });
        } else if tau.is_infinite() {
            warnings.push(DataQualityWarning::InfiniteLifetime { lump: lump.id });
        } else if Some(lump.id) == ground {
            warnings.push(DataQualityWarning::FiniteGroundLifetime {
                lump: lump.id,
                value: tau,
            });
        }
    }
    warnings
}
