//! Reduce a molecular line list to composite ("lumped") states and
//! aggregated radiative lifetimes.
//!
//! The state branch ([`filter`], [`lumper`], [`energy`]) builds the composite
//! catalogue; [`aggregation`] streams the raw transitions once; [`lifetime`]
//! joins the two. [`pipeline`] wires them per molecule and per batch.

pub mod aggregation;
pub mod config;
pub mod energy;
pub mod error;
pub mod filter;
pub mod lifetime;
pub mod linelist;
pub mod lumper;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod quality;
pub mod schema;

#[cfg(feature = "python")]
mod python;

pub use config::{LumpingOptions, MoleculeConfig, MoleculeInputs, ProcessingOptions};
pub use error::{LumpError, LumpResult};
pub use lifetime::LifetimeSummation;
pub use pipeline::{lump_molecule, process_molecule, run_batch, BatchReport, MoleculeResult};
