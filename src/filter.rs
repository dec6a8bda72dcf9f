use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

use tracing::debug;

use crate::error::{LumpError, LumpResult};
use crate::model::{LumpSpec, OriginalState, StatesSchema};
use crate::schema::{placeholder, states};

/// User-facing state selection: energy ceiling plus per-label conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub energy_max: Option<f64>,
    pub only_with: BTreeMap<String, String>,
    pub only_without: BTreeMap<String, String>,
}

/// Which column a label condition reads.
#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Quantum(usize),
    J(f64),
}

#[derive(Debug, Clone)]
struct Condition {
    label: String,
    value: String,
    selector: Selector,
}

impl Condition {
    fn matches(&self, state: &OriginalState) -> bool {
        match self.selector {
            Selector::Quantum(idx) => state.quantum(idx) == self.value,
            Selector::J(j) => state.angular_momentum == j,
        }
    }
}

/// Compiled state filter for one molecule.
///
/// Label conditions are checked one label at a time: `only_with` keeps a state
/// only if every listed label matches, `only_without` drops a state if any
/// listed label matches. Joint conditions over several labels at once are not
/// expressible.
#[derive(Debug, Clone)]
pub struct StateFilter {
    molecule: String,
    energy_max: Option<f64>,
    only_with: Vec<Condition>,
    only_without: Vec<Condition>,
    resolved: Vec<usize>,
    vibrational: Vec<usize>,
}

impl StateFilter {
    pub fn new(
        molecule: &str,
        schema: &StatesSchema,
        lump_spec: &LumpSpec,
        criteria: &FilterCriteria,
    ) -> LumpResult<Self> {
        let resolved = lump_spec
            .resolve(schema)
            .map_err(|e| LumpError::config(molecule, e.to_string()))?;
        let vibrational = resolved[lump_spec.electronic().len()..].to_vec();

        Ok(Self {
            molecule: molecule.to_string(),
            energy_max: criteria.energy_max,
            only_with: Self::compile(molecule, schema, &criteria.only_with)?,
            only_without: Self::compile(molecule, schema, &criteria.only_without)?,
            resolved,
            vibrational,
        })
    }

    fn compile(
        molecule: &str,
        schema: &StatesSchema,
        conditions: &BTreeMap<String, String>,
    ) -> LumpResult<Vec<Condition>> {
        conditions
            .iter()
            .map(|(label, value)| -> LumpResult<Condition> {
                let selector = if label == states::J {
                    let j = value.trim().parse::<f64>().map_err(|_| {
                        LumpError::config(molecule, format!("J condition '{value}' is not a number"))
                    })?;
                    Selector::J(j)
                } else {
                    let idx = schema.quantum_index(label).ok_or_else(|| {
                        LumpError::config(
                            molecule,
                            format!("filter label '{label}' is not among the state quanta"),
                        )
                    })?;
                    Selector::Quantum(idx)
                };
                Ok(Condition {
                    label: label.clone(),
                    value: value.clone(),
                    selector,
                })
            })
            .collect()
    }

    /// Whether a single state survives every rule.
    pub fn accepts(&self, state: &OriginalState) -> bool {
        if self
            .resolved
            .iter()
            .any(|&idx| placeholder::ALL.contains(&state.quantum(idx)))
        {
            return false;
        }
        // negative vibrational quanta are placeholders too
        if self.vibrational.iter().any(|&idx| {
            state
                .quantum(idx)
                .parse::<i64>()
                .map(|v| v < 0)
                .unwrap_or(false)
        }) {
            return false;
        }
        if let Some(e_max) = self.energy_max {
            if state.energy > e_max {
                return false;
            }
        }
        if !self.only_with.iter().all(|c| c.matches(state)) {
            return false;
        }
        !self.only_without.iter().any(|c| c.matches(state))
    }

    /// Filter a stream of state records, preserving order.
    ///
    /// Fails with [`LumpError::FilterExhaustion`] when nothing survives.
    pub fn filter_records<I>(&self, records: I) -> LumpResult<Vec<OriginalState>>
    where
        I: IntoIterator<Item = LumpResult<OriginalState>>,
    {
        let mut kept = Vec::new();
        let mut seen = 0usize;
        for record in records {
            let state = record?;
            seen += 1;
            if self.accepts(&state) {
                kept.push(state);
            }
        }
        debug!(seen, kept = kept.len(), "states filtered");

        if kept.is_empty() {
            return Err(LumpError::FilterExhaustion {
                molecule: self.molecule.clone(),
                predicate: self.describe(),
            });
        }
        Ok(kept)
    }

    /// Filter already materialised states.
    pub fn filter<I>(&self, states: I) -> LumpResult<Vec<OriginalState>>
    where
        I: IntoIterator<Item = OriginalState>,
    {
        self.filter_records(states.into_iter().map(Ok))
    }

    /// Human-readable summary of the active rules.
    pub fn describe(&self) -> String {
        let mut out = String::from("resolved labels free of placeholders");
        if let Some(e_max) = self.energy_max {
            let _ = write!(out, ", E <= {e_max}");
        }
        for c in &self.only_with {
            let _ = write!(out, ", {} == {}", c.label, c.value);
        }
        for c in &self.only_without {
            let _ = write!(out, ", {} != {}", c.label, c.value);
        }
        out
    }
}
