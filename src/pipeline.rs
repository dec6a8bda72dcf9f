use std::collections::BTreeMap;
use std::path::Path;

use tracing::{error, info, info_span, warn};

use crate::aggregation::{aggregate, AggregationStats};
use crate::config::{LumpingOptions, MoleculeConfig, MoleculeInputs, ProcessingOptions};
use crate::energy::{assign_energies, states_by_id};
use crate::error::{LumpError, LumpResult};
use crate::filter::StateFilter;
use crate::lifetime::{apply_total_lifetimes, finalize, LifetimeSummation};
use crate::linelist::{DatasetFiles, StatesReader, TransitionsReader};
use crate::lumper::{Lumping, StateLumper};
use crate::model::{
    LumpId, LumpSpec, LumpedState, LumpedTransition, Membership, OriginalId, OriginalState,
    StatesSchema, Transition,
};
use crate::output;
use crate::quality::{check_lifetimes, DataQualityWarning};

/// Result of the state branch: filtered, lumped and energy-assigned.
#[derive(Debug, Clone)]
pub struct StateCatalogue {
    pub lump_spec: LumpSpec,
    pub catalogue: Vec<LumpedState>,
    pub membership: Membership,
    pub warnings: Vec<DataQualityWarning>,
    /// Lump id -> original lifetimes of its members (NaN where missing).
    pub original_lifetimes: Option<BTreeMap<LumpId, Vec<f64>>>,
}

/// Everything produced for one molecule.
#[derive(Debug, Clone)]
pub struct MoleculeResult {
    pub formula: String,
    pub lump_spec: LumpSpec,
    pub catalogue: Vec<LumpedState>,
    pub membership: Membership,
    pub transitions: Vec<LumpedTransition>,
    pub stats: AggregationStats,
    pub lifetime_summation: LifetimeSummation,
    pub warnings: Vec<DataQualityWarning>,
    pub original_lifetimes: Option<BTreeMap<LumpId, Vec<f64>>>,
}

impl MoleculeResult {
    /// Lump id -> sorted original ids.
    pub fn composite_map(&self) -> BTreeMap<LumpId, Vec<OriginalId>> {
        self.catalogue
            .iter()
            .map(|l| {
                let mut members = l.members.clone();
                members.sort_unstable();
                (l.id, members)
            })
            .collect()
    }
}

/// Filter, lump and assign energies.
pub fn build_catalogue<S>(
    config: &MoleculeConfig,
    schema: &StatesSchema,
    states: S,
    options: &LumpingOptions,
) -> LumpResult<StateCatalogue>
where
    S: IntoIterator<Item = LumpResult<OriginalState>>,
{
    let lump_spec = config.lump_spec();
    let filter = StateFilter::new(&config.formula, schema, &lump_spec, &config.filter_criteria())?;
    let filtered = filter.filter_records(states)?;
    info!(states = filtered.len(), "states kept after filtering");

    let Lumping {
        mut catalogue,
        membership,
    } = StateLumper::new(schema, &lump_spec)?.lump(&filtered)?;
    info!(lumps = catalogue.len(), "composite states built");

    let by_id = states_by_id(&filtered);
    let warnings = assign_energies(&config.formula, &mut catalogue, &by_id)?;

    let original_lifetimes = (options.include_original_lifetimes && schema.has_lifetimes())
        .then(|| {
            catalogue
                .iter()
                .map(|l| {
                    let taus = l
                        .members
                        .iter()
                        .map(|id| by_id[id].lifetime.unwrap_or(f64::NAN))
                        .collect();
                    (l.id, taus)
                })
                .collect()
        });

    Ok(StateCatalogue {
        lump_spec,
        catalogue,
        membership,
        warnings,
        original_lifetimes,
    })
}

/// Stream the transitions once and finish the molecule.
pub fn finish_molecule<T>(
    config: &MoleculeConfig,
    states: StateCatalogue,
    transitions: T,
    options: &LumpingOptions,
) -> LumpResult<MoleculeResult>
where
    T: IntoIterator<Item = LumpResult<Transition>>,
{
    let StateCatalogue {
        lump_spec,
        mut catalogue,
        membership,
        mut warnings,
        original_lifetimes,
    } = states;

    let acc = aggregate(transitions, &membership)?;
    let stats = acc.stats();
    info!(
        records = stats.records,
        accumulated = stats.accumulated,
        pairs = acc.len(),
        "transitions streamed"
    );

    let lifetimes = finalize(&acc, catalogue.len(), options.lifetime_summation);
    drop(acc);
    apply_total_lifetimes(&mut catalogue, &lifetimes);
    info!(
        lumped_transitions = lifetimes.transitions.len(),
        "lifetimes computed"
    );

    let lifetime_warnings = check_lifetimes(&catalogue);
    for w in &lifetime_warnings {
        warn!("{w}");
    }
    warnings.extend(lifetime_warnings);

    Ok(MoleculeResult {
        formula: config.formula.clone(),
        lump_spec,
        catalogue,
        membership,
        transitions: lifetimes.transitions,
        stats,
        lifetime_summation: options.lifetime_summation,
        warnings,
        original_lifetimes,
    })
}

/// Lump in-memory (or otherwise already opened) record streams.
///
/// The transition stream is not touched when the state branch fails.
pub fn lump_molecule<S, T>(
    config: &MoleculeConfig,
    states: S,
    transitions: T,
    options: &LumpingOptions,
) -> LumpResult<MoleculeResult>
where
    S: IntoIterator<Item = LumpResult<OriginalState>>,
    T: IntoIterator<Item = LumpResult<Transition>>,
{
    let schema = config.validate()?;
    let catalogue = build_catalogue(config, &schema, states, options)?;
    finish_molecule(config, catalogue, transitions, options)
}

/// Read one molecule's dataset from `data_dir` and lump it.
pub fn run_molecule(
    config: &MoleculeConfig,
    data_dir: &Path,
    options: &LumpingOptions,
) -> LumpResult<MoleculeResult> {
    let schema = config.validate()?;
    let files = DatasetFiles::locate(data_dir, config)?;
    files.check_columns(&config.formula, &schema)?;

    let states = StatesReader::open(&files.states, &schema)?;
    let catalogue = build_catalogue(config, &schema, states, options)?;

    info!(files = files.transitions.len(), "streaming transitions");
    finish_molecule(
        config,
        catalogue,
        TransitionsReader::new(&files.transitions),
        options,
    )
}

/// Lump one molecule and write its outputs under `<output_dir>/<formula>/`.
pub fn process_molecule(
    config: &MoleculeConfig,
    options: &ProcessingOptions,
) -> LumpResult<MoleculeResult> {
    let span = info_span!("molecule", formula = %config.formula);
    let _enter = span.enter();

    let out_dir = options.output_dir.join(&config.formula);
    output::prepare_output_dir(&out_dir)?;

    let result = run_molecule(config, &options.data_dir, &options.lumping)?;
    output::write_molecule(&out_dir, config, &result, options.electronic_terms.as_ref())?;
    info!(
        lumps = result.catalogue.len(),
        transitions = result.transitions.len(),
        warnings = result.warnings.len(),
        "molecule processed"
    );
    Ok(result)
}

#[derive(Debug, Clone)]
pub struct MoleculeSummary {
    pub formula: String,
    pub lumped_states: usize,
    pub lumped_transitions: usize,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug)]
pub struct MoleculeFailure {
    pub formula: String,
    pub error: LumpError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: Vec<MoleculeSummary>,
    pub failed: Vec<MoleculeFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Process the selected molecules (all when `selection` is empty).
///
/// A failing molecule is recorded and the batch moves on.
pub fn run_batch(
    inputs: &MoleculeInputs,
    selection: &[String],
    options: &ProcessingOptions,
) -> BatchReport {
    let formulas: Vec<String> = if selection.is_empty() {
        inputs.formulas().map(str::to_string).collect()
    } else {
        selection.to_vec()
    };

    let mut report = BatchReport::default();
    for formula in formulas {
        let outcome = match inputs.get(&formula) {
            Some(config) => process_molecule(config, options),
            None => Err(LumpError::config(&formula, "not present in the inputs file")),
        };
        match outcome {
            Ok(result) => report.processed.push(MoleculeSummary {
                formula,
                lumped_states: result.catalogue.len(),
                lumped_transitions: result.transitions.len(),
                warnings: result.warnings,
            }),
            Err(e) => {
                error!(formula = %formula, error = %e, "molecule aborted");
                report.failed.push(MoleculeFailure { formula, error: e });
            }
        }
    }
    report
}
