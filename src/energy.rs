use std::collections::HashMap;

use tracing::warn;

use crate::error::{LumpError, LumpResult};
use crate::model::{LumpedState, OriginalId, OriginalState};
use crate::quality::DataQualityWarning;

/// Index filtered states by id for the energy pass.
pub fn states_by_id(states: &[OriginalState]) -> HashMap<OriginalId, &OriginalState> {
    states.iter().map(|s| (s.id, s)).collect()
}

/// Fill in each lump's energy.
///
/// The energy is the `g_tot`-weighted mean over the members at the lump's
/// lowest J. A lump with no member at that J is reported as a warning and
/// keeps no energy; a zero weight sum is an integrity failure.
pub fn assign_energies(
    molecule: &str,
    catalogue: &mut [LumpedState],
    states_by_id: &HashMap<OriginalId, &OriginalState>,
) -> LumpResult<Vec<DataQualityWarning>> {
    let mut warnings = Vec::new();

    for lump in catalogue.iter_mut() {
        let members = lump
            .members
            .iter()
            .map(|id| {
                states_by_id.get(id).copied().ok_or_else(|| {
                    LumpError::integrity(
                        molecule,
                        format!(
                            "lumped state {} references unknown original state {id}",
                            lump.id
                        ),
                    )
                })
            })
            .collect::<LumpResult<Vec<_>>>()?;

        let Some(j_min) = members
            .iter()
            .map(|s| s.angular_momentum)
            .min_by(|a, b| a.total_cmp(b))
        else {
            warn!(lump = lump.id, "lumped state has no members at its lowest J");
            warnings.push(DataQualityWarning::EmptyLowestJ { lump: lump.id });
            continue;
        };

        let mut sum_w = 0.0;
        let mut sum_en_x_w = 0.0;
        for s in members.iter().filter(|s| s.angular_momentum == j_min) {
            sum_w += s.total_degeneracy;
            sum_en_x_w += s.total_degeneracy * s.energy;
        }

        if sum_w == 0.0 {
            return Err(LumpError::integrity(
                molecule,
                format!(
                    "lumped state {} has zero total degeneracy at J = {j_min}",
                    lump.id
                ),
            ));
        }

        lump.energy = Some(sum_en_x_w / sum_w);
        lump.energy_j = Some(j_min);
    }

    Ok(warnings)
}
