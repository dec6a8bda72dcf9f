use std::fs::{self, File};
use std::path::Path;

use chrono::Utc;
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::aggregation::AggregationStats;
use crate::config::{ElectronicTermMap, MoleculeConfig};
use crate::error::{LumpError, LumpResult};
use crate::lifetime::LifetimeSummation;
use crate::pipeline::MoleculeResult;
use crate::quality::DataQualityWarning;
use crate::schema::{files, lumped_state, lumped_transition, EV_IN_CM};

/// Energy in eV, rounded to 5 decimals.
fn to_ev(energy_cm: f64) -> f64 {
    (energy_cm / EV_IN_CM * 1e5).round() / 1e5
}

// ── DataFrames ──────────────────────────────────────────────────────────────

/// Full composite-state table: numeric data, every resolved label, and the
/// electronic term symbol when a mapping for the molecule exists.
pub fn catalogue_frame(
    result: &MoleculeResult,
    terms: Option<&ElectronicTermMap>,
) -> LumpResult<DataFrame> {
    let catalogue = &result.catalogue;
    let ids: Vec<u64> = catalogue.iter().map(|l| l.id as u64).collect();
    let energies: Vec<Option<f64>> = catalogue.iter().map(|l| l.energy.map(to_ev)).collect();
    let taus: Vec<f64> = catalogue.iter().map(|l| l.total_lifetime).collect();
    let sizes: Vec<u64> = catalogue.iter().map(|l| l.lump_size() as u64).collect();
    let energy_js: Vec<Option<f64>> = catalogue.iter().map(|l| l.energy_j).collect();

    let mut columns = vec![
        Column::new(lumped_state::ID.into(), &ids),
        Column::new(lumped_state::ENERGY.into(), &energies),
        Column::new(lumped_state::LIFETIME.into(), &taus),
        Column::new(lumped_state::LUMP_SIZE.into(), &sizes),
        Column::new(lumped_state::ENERGY_J.into(), &energy_js),
    ];

    for (pos, label) in result.lump_spec.labels().iter().enumerate() {
        let values: Vec<String> = catalogue.iter().map(|l| l.key[pos].clone()).collect();
        columns.push(Column::new(label.as_str().into(), &values));
    }

    if let Some(map) = terms.filter(|m| m.has_molecule(&result.formula)) {
        let n_el = result.lump_spec.electronic().len();
        let term_values: Vec<Option<String>> = catalogue
            .iter()
            .map(|l| {
                let term = map.term_for(&result.formula, &l.key[..n_el]);
                if term.is_none() {
                    warn!(lump = l.id, key = ?&l.key[..n_el], "no term symbol for electronic labels");
                }
                term.map(str::to_string)
            })
            .collect();
        columns.push(Column::new(lumped_state::TERM.into(), &term_values));
    }

    Ok(DataFrame::new(columns)?)
}

/// `i, E, tau, lump_size, J(E)`.
pub fn states_frame(catalogue: &DataFrame) -> LumpResult<DataFrame> {
    let df = catalogue
        .clone()
        .lazy()
        .select([
            col(lumped_state::ID),
            col(lumped_state::ENERGY),
            col(lumped_state::LIFETIME),
            col(lumped_state::LUMP_SIZE),
            col(lumped_state::ENERGY_J),
        ])
        .collect()?;
    Ok(df)
}

/// `i` plus the given resolved labels (and `term`, when requested and present).
pub fn resolved_frame(
    catalogue: &DataFrame,
    labels: &[String],
    with_term: bool,
) -> LumpResult<DataFrame> {
    let mut exprs: Vec<Expr> = vec![col(lumped_state::ID)];
    exprs.extend(labels.iter().map(|l| col(l.as_str())));
    if with_term && catalogue.column(lumped_state::TERM).is_ok() {
        exprs.push(col(lumped_state::TERM));
    }
    Ok(catalogue.clone().lazy().select(exprs).collect()?)
}

/// `i, f, tau_if, lump_size`.
pub fn transitions_frame(result: &MoleculeResult) -> LumpResult<DataFrame> {
    let t = &result.transitions;
    let initial: Vec<u64> = t.iter().map(|t| t.initial as u64).collect();
    let final_: Vec<u64> = t.iter().map(|t| t.final_ as u64).collect();
    let tau: Vec<f64> = t.iter().map(|t| t.partial_lifetime).collect();
    let sizes: Vec<u64> = t.iter().map(|t| t.lump_size).collect();

    let df = DataFrame::new(vec![
        Column::new(lumped_transition::INITIAL.into(), &initial),
        Column::new(lumped_transition::FINAL.into(), &final_),
        Column::new(lumped_transition::PARTIAL_LIFETIME.into(), &tau),
        Column::new(lumped_transition::LUMP_SIZE.into(), &sizes),
    ])?;
    Ok(df)
}

// ── Metadata ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RunMetadata<'a> {
    pub run_id: Uuid,
    pub input: &'a MoleculeConfig,
    pub iso_formula: Option<&'a str>,
    pub version: Option<u64>,
    pub mass: Option<f64>,
    pub processed_on: String,
    pub lifetime_summation: LifetimeSummation,
    pub lumped_states: usize,
    pub lumped_transitions: usize,
    pub aggregation: AggregationStats,
    pub warnings: &'a [DataQualityWarning],
}

impl<'a> RunMetadata<'a> {
    pub fn new(config: &'a MoleculeConfig, result: &'a MoleculeResult) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            input: config,
            iso_formula: config.iso_formula.as_deref(),
            version: config.version,
            mass: config.mass,
            processed_on: Utc::now().to_rfc3339(),
            lifetime_summation: result.lifetime_summation,
            lumped_states: result.catalogue.len(),
            lumped_transitions: result.transitions.len(),
            aggregation: result.stats,
            warnings: &result.warnings,
        }
    }
}

// ── Writers ─────────────────────────────────────────────────────────────────

/// Create `dir`, refusing to reuse one that already holds files.
pub fn prepare_output_dir(dir: &Path) -> LumpResult<()> {
    if dir.exists() && fs::read_dir(dir)?.next().is_some() {
        return Err(LumpError::OutputExists(dir.to_path_buf()));
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

pub fn write_csv(path: &Path, df: &mut DataFrame) -> LumpResult<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> LumpResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

/// Write every artefact of one processed molecule into `dir`.
pub fn write_molecule(
    dir: &Path,
    config: &MoleculeConfig,
    result: &MoleculeResult,
    terms: Option<&ElectronicTermMap>,
) -> LumpResult<()> {
    let catalogue = catalogue_frame(result, terms)?;

    write_csv(&dir.join(files::STATES_DATA), &mut states_frame(&catalogue)?)?;

    let electronic = result.lump_spec.electronic();
    if !electronic.is_empty() {
        let mut df = resolved_frame(&catalogue, electronic, true)?;
        write_csv(&dir.join(files::STATES_ELECTRONIC), &mut df)?;
    }
    let vibrational = result.lump_spec.vibrational();
    if !vibrational.is_empty() {
        let mut df = resolved_frame(&catalogue, vibrational, false)?;
        write_csv(&dir.join(files::STATES_VIBRATIONAL), &mut df)?;
    }

    write_csv(
        &dir.join(files::TRANSITIONS_DATA),
        &mut transitions_frame(result)?,
    )?;
    write_json(&dir.join(files::COMPOSITE_MAP), &result.composite_map())?;
    if let Some(taus) = &result.original_lifetimes {
        write_json(&dir.join(files::ORIGINAL_TAU), taus)?;
    }
    write_json(&dir.join(files::METADATA), &RunMetadata::new(config, result))?;

    debug!(dir = %dir.display(), "outputs written");
    Ok(())
}
