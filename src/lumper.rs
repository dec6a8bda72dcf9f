use std::collections::HashMap;

use tracing::debug;

use crate::error::{LumpError, LumpResult};
use crate::model::{LumpId, LumpSpec, LumpedState, Membership, OriginalState, StatesSchema};

/// Composite-state catalogue plus the original -> lumped membership map.
#[derive(Debug, Clone, Default)]
pub struct Lumping {
    pub catalogue: Vec<LumpedState>,
    pub membership: Membership,
}

/// Partitions filtered states into composite states keyed by a [`LumpSpec`].
#[derive(Debug, Clone)]
pub struct StateLumper {
    molecule: String,
    key_columns: Vec<usize>,
}

impl StateLumper {
    pub fn new(schema: &StatesSchema, spec: &LumpSpec) -> LumpResult<Self> {
        if spec.is_empty() {
            return Err(LumpError::integrity(
                schema.molecule(),
                "lump specification has no labels",
            ));
        }
        Ok(Self {
            molecule: schema.molecule().to_string(),
            key_columns: spec.resolve(schema)?,
        })
    }

    /// Single ordered pass over `states`.
    ///
    /// Lump ids are handed out in first-seen order of their keys, so the same
    /// input sequence always yields the same ids and membership.
    pub fn lump(&self, states: &[OriginalState]) -> LumpResult<Lumping> {
        let mut catalogue: Vec<LumpedState> = Vec::new();
        let mut index: HashMap<Vec<String>, LumpId> = HashMap::new();
        let mut membership = Membership::with_capacity(states.len());

        for state in states {
            let key: Vec<String> = self
                .key_columns
                .iter()
                .map(|&idx| state.quantum(idx).to_string())
                .collect();

            let lump_id = match index.get(&key) {
                Some(&id) => id,
                None => {
                    let id = catalogue.len();
                    catalogue.push(LumpedState::new(id, key.clone()));
                    index.insert(key, id);
                    id
                }
            };

            if let Some(previous) = membership.insert(state.id, lump_id) {
                return Err(LumpError::integrity(
                    &self.molecule,
                    format!(
                        "original state {} assigned to lumps {previous} and {lump_id}",
                        state.id
                    ),
                ));
            }
            catalogue[lump_id].members.push(state.id);
        }

        debug!(
            states = states.len(),
            lumps = catalogue.len(),
            "states lumped"
        );
        Ok(Lumping {
            catalogue,
            membership,
        })
    }
}
