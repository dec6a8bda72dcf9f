use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{LumpError, LumpResult};
use crate::filter::FilterCriteria;
use crate::lifetime::LifetimeSummation;
use crate::model::{LumpSpec, StatesSchema};
use crate::schema::states;

/// Processing input for one molecule, as read from the inputs file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MoleculeConfig {
    /// Identifier in the species database; taken from the inputs-file key.
    #[serde(skip)]
    pub formula: String,
    #[serde(default)]
    pub mol_slug: String,
    #[serde(default)]
    pub iso_slug: String,
    #[serde(default)]
    pub dataset_name: String,
    #[serde(default)]
    pub states_header: Option<Vec<String>>,
    #[serde(default)]
    pub resolve_el: Vec<String>,
    #[serde(default)]
    pub resolve_vib: Vec<String>,
    /// Same units as the states energies (cm^-1 for ExoMol data).
    #[serde(default)]
    pub energy_max: Option<f64>,
    #[serde(default, deserialize_with = "label_values")]
    pub only_with: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "label_values")]
    pub only_without: BTreeMap<String, String>,
    #[serde(default)]
    pub iso_formula: Option<String>,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub mass: Option<f64>,
}

/// Accept label values written as JSON strings or numbers.
fn label_values<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(label, value)| -> Result<(String, String), D::Error> {
            match value {
                serde_json::Value::String(s) => Ok((label, s)),
                serde_json::Value::Number(n) => Ok((label, n.to_string())),
                other => Err(<D::Error as serde::de::Error>::custom(format!(
                    "value for '{label}' must be a string or number, got {other}"
                ))),
            }
        })
        .collect()
}

impl MoleculeConfig {
    pub fn lump_spec(&self) -> LumpSpec {
        LumpSpec::new(&self.resolve_el, &self.resolve_vib)
    }

    pub fn filter_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            energy_max: self.energy_max,
            only_with: self.only_with.clone(),
            only_without: self.only_without.clone(),
        }
    }

    /// Check the configuration on its own and resolve the states schema.
    ///
    /// Nothing here touches the data files.
    pub fn validate(&self) -> LumpResult<StatesSchema> {
        let mol = self.formula.as_str();
        let err = |reason: String| LumpError::config(mol, reason);

        if self.mol_slug.is_empty() || self.iso_slug.is_empty() || self.dataset_name.is_empty()
        {
            return Err(err(
                "missing some of the mandatory attributes (mol_slug, iso_slug, dataset_name)"
                    .into(),
            ));
        }
        if self.resolve_el.is_empty() && self.resolve_vib.is_empty() {
            return Err(err("neither resolve_el nor resolve_vib given".into()));
        }

        let header = self
            .states_header
            .as_ref()
            .ok_or_else(|| err("states_header is required".into()))?;
        let schema = StatesSchema::from_header(mol, header)?;

        let el: HashSet<&String> = self.resolve_el.iter().collect();
        if let Some(shared) = self.resolve_vib.iter().find(|l| el.contains(l)) {
            return Err(err(format!(
                "'{shared}' appears in both resolve_el and resolve_vib"
            )));
        }
        let mut seen = HashSet::new();
        for label in self.resolve_el.iter().chain(&self.resolve_vib) {
            if !seen.insert(label) {
                return Err(err(format!("resolved label '{label}' listed twice")));
            }
            if states::RESERVED.contains(&label.as_str()) {
                return Err(err(format!("'{label}' cannot be a resolved label")));
            }
            if schema.quantum_index(label).is_none() {
                return Err(err(format!(
                    "resolved label '{label}' not among the declared columns"
                )));
            }
        }

        for label in self.only_with.keys().chain(self.only_without.keys()) {
            if label != states::J && schema.quantum_index(label).is_none() {
                return Err(err(format!(
                    "filter label '{label}' not among the quanta available in {}",
                    self.dataset_name
                )));
            }
        }

        // isomers are never lumped together
        if schema.quantum_index(states::ISOMER).is_some()
            && !self.only_with.contains_key(states::ISOMER)
            && !seen.iter().any(|l| l.as_str() == states::ISOMER)
        {
            return Err(err(
                "'iso' must be either resolved or pinned with only_with".into(),
            ));
        }

        Ok(schema)
    }
}

/// The inputs file: formula -> molecule configuration, in file order.
#[derive(Clone, Debug, Default)]
pub struct MoleculeInputs {
    molecules: Vec<MoleculeConfig>,
}

impl<'de> Deserialize<'de> for MoleculeInputs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct InputsVisitor;

        impl<'de> Visitor<'de> for InputsVisitor {
            type Value = MoleculeInputs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of molecule formulas to processing inputs")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut molecules: Vec<MoleculeConfig> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                let mut seen = HashSet::new();
                while let Some((formula, mut cfg)) = map.next_entry::<String, MoleculeConfig>()? {
                    if !seen.insert(formula.clone()) {
                        return Err(de::Error::custom(format!(
                            "molecule '{formula}' listed twice"
                        )));
                    }
                    cfg.formula = formula;
                    molecules.push(cfg);
                }
                Ok(MoleculeInputs { molecules })
            }
        }

        deserializer.deserialize_map(InputsVisitor)
    }
}

impl MoleculeInputs {
    pub fn from_json(content: &str) -> LumpResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> LumpResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn get(&self, formula: &str) -> Option<&MoleculeConfig> {
        self.molecules.iter().find(|cfg| cfg.formula == formula)
    }

    /// Formulas in the order the inputs file lists them.
    pub fn formulas(&self) -> impl Iterator<Item = &str> {
        self.molecules.iter().map(|cfg| cfg.formula.as_str())
    }

    pub fn len(&self) -> usize {
        self.molecules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }
}

/// Knobs of the lumping itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LumpingOptions {
    /// Collect original per-state lifetimes when the states table has `tau`.
    pub include_original_lifetimes: bool,
    pub lifetime_summation: LifetimeSummation,
}

/// Everything a batch run needs besides the molecule inputs.
#[derive(Clone, Debug, Default)]
pub struct ProcessingOptions {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub lumping: LumpingOptions,
    pub electronic_terms: Option<ElectronicTermMap>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    /// Raw values of the resolved electronic labels, in declared order.
    pub labels: Vec<String>,
    pub term: String,
}

/// Raw electronic labels -> standardised term symbol, per formula.
///
/// Only used when formatting the electronic states table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElectronicTermMap {
    molecules: BTreeMap<String, Vec<TermEntry>>,
}

impl ElectronicTermMap {
    pub fn from_path(path: &Path) -> LumpResult<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn has_molecule(&self, formula: &str) -> bool {
        self.molecules.contains_key(formula)
    }

    pub fn term_for(&self, formula: &str, labels: &[String]) -> Option<&str> {
        self.molecules
            .get(formula)?
            .iter()
            .find(|e| e.labels == labels)
            .map(|e| e.term.as_str())
    }
}
