#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use bzip2::write::BzEncoder;
use bzip2::Compression;
use tempfile::TempDir;

use linelist_lumper::config::{LumpingOptions, MoleculeConfig, ProcessingOptions};

/// Scratch tree with `data/` and `output/` subdirectories.
pub struct Workspace {
    pub root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(root.path().join("data")).expect("create data dir");
        Self { root }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.path().join("data")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("output")
    }

    pub fn options(&self) -> ProcessingOptions {
        ProcessingOptions {
            data_dir: self.data_dir(),
            output_dir: self.output_dir(),
            lumping: LumpingOptions::default(),
            electronic_terms: None,
        }
    }

    /// Write `<iso>__<ds>.states` and one `.trans` file per entry of `trans`.
    pub fn write_dataset(&self, cfg: &MoleculeConfig, states: &str, trans: &[&str]) {
        self.write_files(cfg, states, trans, "", write_text);
    }

    /// Same layout as [`Workspace::write_dataset`], bzip2-compressed as
    /// `*.states.bz2` / `*.trans.bz2`.
    pub fn write_compressed_dataset(&self, cfg: &MoleculeConfig, states: &str, trans: &[&str]) {
        self.write_files(cfg, states, trans, ".bz2", write_bz2);
    }

    fn write_files(
        &self,
        cfg: &MoleculeConfig,
        states: &str,
        trans: &[&str],
        suffix: &str,
        write: fn(&Path, &str),
    ) {
        let dir = self
            .data_dir()
            .join(&cfg.mol_slug)
            .join(&cfg.iso_slug)
            .join(&cfg.dataset_name);
        fs::create_dir_all(&dir).expect("create dataset dir");
        let stem = format!("{}__{}", cfg.iso_slug, cfg.dataset_name);
        write(&dir.join(format!("{stem}.states{suffix}")), states);
        for (n, body) in trans.iter().enumerate() {
            let name = format!(
                "{stem}__{:05}-{:05}.trans{suffix}",
                n * 1000,
                (n + 1) * 1000
            );
            write(&dir.join(name), body);
        }
    }
}

pub fn write_text(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write temp file");
}

pub fn write_bz2(path: &Path, contents: &str) {
    let file = File::create(path).expect("create temp file");
    let mut encoder = BzEncoder::new(file, Compression::default());
    encoder
        .write_all(contents.as_bytes())
        .expect("compress temp file");
    encoder.finish().expect("finish bzip2 stream");
}

pub fn header(cols: &[&str]) -> Option<Vec<String>> {
    Some(cols.iter().map(|s| s.to_string()).collect())
}

/// Diatomic with `State` and `v` quanta.
pub fn diatomic(formula: &str) -> MoleculeConfig {
    MoleculeConfig {
        formula: formula.to_string(),
        mol_slug: formula.to_string(),
        iso_slug: format!("1{formula}"),
        dataset_name: "Test".into(),
        states_header: header(&["i", "E", "g_tot", "J", "tau", "State", "v"]),
        resolve_el: vec!["State".into()],
        resolve_vib: vec!["v".into()],
        ..Default::default()
    }
}

/// Three states and three transitions; two composite states survive.
pub const SCENARIO_STATES: &str = "\
1  0.0  1  0  inf  X  0
2  0.1  3  1  1.0  X  0
3  1.0  1  0  0.4  X  1
";

pub const SCENARIO_TRANS: &str = "\
2  1  5.0
3  1  2.0
3  2  3.0
";

pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
