use std::collections::HashMap;

use crate::error::{LumpError, LumpResult};
use crate::schema::states;

/// Row id in the raw states table.
pub type OriginalId = u64;

/// Dense id of a composite state, assigned in first-seen order.
pub type LumpId = usize;

/// Original id -> id of the lump it belongs to.
pub type Membership = HashMap<OriginalId, LumpId>;

// ── Schema descriptor ───────────────────────────────────────────────────────

/// Column layout of one molecule's raw states table.
///
/// Resolved once per molecule from the declared header; every record is then
/// read against it rather than inferring columns row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatesSchema {
    molecule: String,
    header: Vec<String>,
    /// Header position of each quantum label, in declared order.
    quantum_columns: Vec<usize>,
    quantum_labels: Vec<String>,
    lifetime_column: Option<usize>,
}

impl StatesSchema {
    /// Build the descriptor from a declared header.
    ///
    /// The header must start with `i, E, g_tot, J`. `tau` and `g_J` are
    /// recognised as special columns; everything else is a quantum label.
    pub fn from_header(molecule: &str, header: &[String]) -> LumpResult<Self> {
        if header.len() < states::LEADING.len()
            || header
                .iter()
                .zip(states::LEADING.iter())
                .any(|(got, want)| got != want)
        {
            return Err(LumpError::config(
                molecule,
                format!(
                    "states_header must start with {:?}, got {:?}",
                    states::LEADING,
                    header
                ),
            ));
        }

        let mut quantum_columns = Vec::new();
        let mut quantum_labels = Vec::new();
        let mut lifetime_column = None;
        for (pos, name) in header.iter().enumerate().skip(states::LEADING.len()) {
            if name == states::LIFETIME {
                lifetime_column = Some(pos);
            } else if name != states::LANDE_G {
                if quantum_labels.contains(name) {
                    return Err(LumpError::config(
                        molecule,
                        format!("duplicate column '{name}' in states_header"),
                    ));
                }
                quantum_columns.push(pos);
                quantum_labels.push(name.clone());
            }
        }

        Ok(Self {
            molecule: molecule.to_string(),
            header: header.to_vec(),
            quantum_columns,
            quantum_labels,
            lifetime_column,
        })
    }

    /// Formula of the molecule this layout belongs to.
    pub fn molecule(&self) -> &str {
        &self.molecule
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    pub fn quantum_labels(&self) -> &[String] {
        &self.quantum_labels
    }

    pub(crate) fn quantum_columns(&self) -> &[usize] {
        &self.quantum_columns
    }

    /// Index of `label` within [`OriginalState::quanta`].
    pub fn quantum_index(&self, label: &str) -> Option<usize> {
        self.quantum_labels.iter().position(|l| l == label)
    }

    pub fn lifetime_column(&self) -> Option<usize> {
        self.lifetime_column
    }

    pub fn has_lifetimes(&self) -> bool {
        self.lifetime_column.is_some()
    }
}

// ── Raw records ─────────────────────────────────────────────────────────────

/// One row of the raw states table.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalState {
    pub id: OriginalId,
    pub energy: f64,
    pub total_degeneracy: f64,
    pub angular_momentum: f64,
    /// Original radiative lifetime, when the dataset carries one.
    pub lifetime: Option<f64>,
    /// Raw quantum values, aligned with [`StatesSchema::quantum_labels`].
    pub quanta: Vec<String>,
}

impl OriginalState {
    pub fn quantum(&self, index: usize) -> &str {
        &self.quanta[index]
    }
}

/// One row of the raw transitions table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub initial_id: OriginalId,
    pub final_id: OriginalId,
    /// Einstein A coefficient, 1/s.
    pub rate: f64,
}

impl Transition {
    pub fn new(initial_id: OriginalId, final_id: OriginalId, rate: f64) -> Self {
        Self {
            initial_id,
            final_id,
            rate,
        }
    }
}

// ── Lump specification ──────────────────────────────────────────────────────

/// Ordered quantum labels whose value combination defines a composite state:
/// resolved electronic labels first, then resolved vibrational labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumpSpec {
    labels: Vec<String>,
    electronic: usize,
}

impl LumpSpec {
    pub fn new(resolve_el: &[String], resolve_vib: &[String]) -> Self {
        let mut labels = resolve_el.to_vec();
        labels.extend_from_slice(resolve_vib);
        Self {
            labels,
            electronic: resolve_el.len(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn electronic(&self) -> &[String] {
        &self.labels[..self.electronic]
    }

    pub fn vibrational(&self) -> &[String] {
        &self.labels[self.electronic..]
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Map each label onto its index in the states' quanta.
    pub fn resolve(&self, schema: &StatesSchema) -> LumpResult<Vec<usize>> {
        self.labels
            .iter()
            .map(|label| {
                schema.quantum_index(label).ok_or_else(|| {
                    LumpError::integrity(
                        schema.molecule(),
                        format!("resolved label '{label}' is not a quantum column of the states table"),
                    )
                })
            })
            .collect()
    }
}

// ── Derived entities ────────────────────────────────────────────────────────

/// Composite state built from every original state sharing one key.
#[derive(Debug, Clone, PartialEq)]
pub struct LumpedState {
    pub id: LumpId,
    /// Quantum values, one per [`LumpSpec`] label.
    pub key: Vec<String>,
    /// Original ids in the order they were seen.
    pub members: Vec<OriginalId>,
    /// Degeneracy-weighted energy of the lowest-J members (input units).
    pub energy: Option<f64>,
    /// The J the energy was taken at.
    pub energy_j: Option<f64>,
    /// Seconds; infinite until an outgoing lumped transition says otherwise.
    pub total_lifetime: f64,
}

impl LumpedState {
    pub fn new(id: LumpId, key: Vec<String>) -> Self {
        Self {
            id,
            key,
            members: Vec::new(),
            energy: None,
            energy_j: None,
            total_lifetime: f64::INFINITY,
        }
    }

    pub fn lump_size(&self) -> usize {
        self.members.len()
    }
}

/// Aggregated radiative decay channel between two different composite states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LumpedTransition {
    pub initial: LumpId,
    pub final_: LumpId,
    /// Seconds.
    pub partial_lifetime: f64,
    /// Raw transitions merged into this one.
    pub lump_size: u64,
}
