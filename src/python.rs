use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::config::{ElectronicTermMap, LumpingOptions, MoleculeInputs};
use crate::lifetime::LifetimeSummation;
use crate::output;
use crate::pipeline::{run_molecule, MoleculeResult};
use crate::schema;

/// Lumped data of one molecule, handed to Python as DataFrames.
#[pyclass(name = "LumpingResult")]
pub struct PyLumpingResult {
    result: MoleculeResult,
    terms: Option<ElectronicTermMap>,
}

#[pymethods]
impl PyLumpingResult {
    #[getter]
    fn formula(&self) -> String {
        self.result.formula.clone()
    }

    /// `i, E, tau, lump_size, J(E)`
    #[getter]
    fn states(&self) -> PyResult<PyDataFrame> {
        let catalogue = output::catalogue_frame(&self.result, self.terms.as_ref())?;
        Ok(PyDataFrame(output::states_frame(&catalogue)?))
    }

    #[getter]
    fn electronic(&self) -> PyResult<PyDataFrame> {
        let catalogue = output::catalogue_frame(&self.result, self.terms.as_ref())?;
        let labels = self.result.lump_spec.electronic();
        Ok(PyDataFrame(output::resolved_frame(&catalogue, labels, true)?))
    }

    #[getter]
    fn vibrational(&self) -> PyResult<PyDataFrame> {
        let catalogue = output::catalogue_frame(&self.result, self.terms.as_ref())?;
        let labels = self.result.lump_spec.vibrational();
        Ok(PyDataFrame(output::resolved_frame(&catalogue, labels, false)?))
    }

    /// `i, f, tau_if, lump_size`
    #[getter]
    fn transitions(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(output::transitions_frame(&self.result)?))
    }

    #[getter]
    fn composite_map(&self) -> BTreeMap<usize, Vec<u64>> {
        self.result.composite_map()
    }

    #[getter]
    fn warnings(&self) -> Vec<String> {
        self.result.warnings.iter().map(|w| w.to_string()).collect()
    }
}

/// Lump one molecule from an inputs file without writing any outputs.
#[pyfunction]
#[pyo3(signature = (
    inputs_path,
    formula,
    data_dir,
    include_original_lifetimes = false,
    lifetime_summation = "partial-lifetimes",
    electronic_terms = None,
))]
fn process_molecule(
    py: Python<'_>,
    inputs_path: PathBuf,
    formula: &str,
    data_dir: PathBuf,
    include_original_lifetimes: bool,
    lifetime_summation: &str,
    electronic_terms: Option<PathBuf>,
) -> PyResult<PyLumpingResult> {
    let summation = LifetimeSummation::from_str(lifetime_summation, true)
        .map_err(PyValueError::new_err)?;
    let inputs = MoleculeInputs::from_path(&inputs_path)?;
    let config = inputs
        .get(formula)
        .ok_or_else(|| PyKeyError::new_err(format!("'{formula}' not in {}", inputs_path.display())))?
        .clone();
    let terms = electronic_terms
        .as_deref()
        .map(ElectronicTermMap::from_path)
        .transpose()?;

    let options = LumpingOptions {
        include_original_lifetimes,
        lifetime_summation: summation,
    };
    let data_dir: &Path = &data_dir;
    let result = py.allow_threads(|| run_molecule(&config, data_dir, &options))?;

    Ok(PyLumpingResult { result, terms })
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Lumped states
    let states = PyModule::new(m.py(), "lumped_state")?;
    states.add("ID", schema::lumped_state::ID)?;
    states.add("ENERGY", schema::lumped_state::ENERGY)?;
    states.add("LIFETIME", schema::lumped_state::LIFETIME)?;
    states.add("LUMP_SIZE", schema::lumped_state::LUMP_SIZE)?;
    states.add("ENERGY_J", schema::lumped_state::ENERGY_J)?;
    states.add("TERM", schema::lumped_state::TERM)?;
    m.add_submodule(&states)?;

    // Lumped transitions
    let transitions = PyModule::new(m.py(), "lumped_transition")?;
    transitions.add("INITIAL", schema::lumped_transition::INITIAL)?;
    transitions.add("FINAL", schema::lumped_transition::FINAL)?;
    transitions.add(
        "PARTIAL_LIFETIME",
        schema::lumped_transition::PARTIAL_LIFETIME,
    )?;
    transitions.add("LUMP_SIZE", schema::lumped_transition::LUMP_SIZE)?;
    m.add_submodule(&transitions)?;

    m.add("EV_IN_CM", schema::EV_IN_CM)?;
    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyLumpingResult>()?;
    m.add_function(wrap_pyfunction!(process_molecule, m)?)?;
    add_schema_exports(m)?;
    Ok(())
}
