//! Streaming readers for whitespace-separated states and transitions files.
//!
//! States are read row by row against a [`StatesSchema`]; transitions from
//! any number of files are chained into one forward-only record stream.
//! Files ending in `.bz2` are decompressed on the fly.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;

use crate::config::MoleculeConfig;
use crate::error::{LumpError, LumpResult};
use crate::model::{OriginalState, StatesSchema, Transition};

/// Raw data files of one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFiles {
    pub states: PathBuf,
    /// Sorted by file name.
    pub transitions: Vec<PathBuf>,
}

/// Line source over a plain or bzip2-compressed text file.
pub type TextReader = Box<dyn BufRead + Send>;

const COMPRESSED: &str = ".bz2";

/// Open `path` for line reading, decompressing `*.bz2`.
pub fn open_text(path: &Path) -> LumpResult<TextReader> {
    let file = File::open(path)?;
    let compressed = path
        .to_str()
        .map(|p| p.ends_with(COMPRESSED))
        .unwrap_or(false);
    if compressed {
        Ok(Box::new(BufReader::new(MultiBzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

impl DatasetFiles {
    /// Find `<iso_slug>__<dataset>.states[.bz2]` and every
    /// `<iso_slug>__<dataset>*.trans[.bz2]` under
    /// `<data_dir>/<mol_slug>/<iso_slug>/<dataset>/`.
    pub fn locate(data_dir: &Path, cfg: &MoleculeConfig) -> LumpResult<Self> {
        let mol = cfg.formula.as_str();
        let ds_root = data_dir
            .join(&cfg.mol_slug)
            .join(&cfg.iso_slug)
            .join(&cfg.dataset_name);
        if !ds_root.is_dir() {
            return Err(LumpError::config(
                mol,
                format!("dataset directory not found: {}", ds_root.display()),
            ));
        }

        let stem = format!("{}__{}", cfg.iso_slug, cfg.dataset_name);
        let plain = ds_root.join(format!("{stem}.states"));
        let compressed = ds_root.join(format!("{stem}.states{COMPRESSED}"));
        let states = if plain.is_file() {
            plain
        } else if compressed.is_file() {
            compressed
        } else {
            return Err(LumpError::config(
                mol,
                format!(
                    ".states file not found under {} (plain or {COMPRESSED})",
                    plain.display()
                ),
            ));
        };

        let mut transitions = Vec::new();
        for entry in fs::read_dir(&ds_root)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| {
                    n.starts_with(&stem)
                        && (n.ends_with(".trans") || n.ends_with(&format!(".trans{COMPRESSED}")))
                })
                .unwrap_or(false);
            if matches && path.is_file() {
                transitions.push(path);
            }
        }
        if transitions.is_empty() {
            return Err(LumpError::config(
                mol,
                format!("no .trans files found under {}", ds_root.display()),
            ));
        }
        transitions.sort();

        Ok(Self {
            states,
            transitions,
        })
    }

    /// Check both tables' column counts before any record is read.
    pub fn check_columns(&self, molecule: &str, schema: &StatesSchema) -> LumpResult<()> {
        let states_cols = count_columns(&self.states)?;
        if states_cols != schema.column_count() {
            return Err(LumpError::config(
                molecule,
                format!(
                    "{} has {states_cols} columns, while states_header specifies {}",
                    self.states.display(),
                    schema.column_count()
                ),
            ));
        }
        let trans_cols = count_columns(&self.transitions[0])?;
        if !(3..=4).contains(&trans_cols) {
            return Err(LumpError::config(
                molecule,
                format!(
                    "{} has {trans_cols} columns, while 3 or 4 are expected",
                    self.transitions[0].display()
                ),
            ));
        }
        Ok(())
    }
}

/// Number of whitespace-separated fields on the first non-blank line.
pub fn count_columns(path: &Path) -> LumpResult<usize> {
    let reader = open_text(path)?;
    for line in reader.lines() {
        let line = line?;
        let n = line.split_whitespace().count();
        if n > 0 {
            return Ok(n);
        }
    }
    Ok(0)
}

fn parse_field<T: std::str::FromStr>(
    path: &Path,
    line: usize,
    name: &str,
    raw: &str,
) -> LumpResult<T> {
    raw.parse::<T>().map_err(|_| LumpError::Parse {
        path: path.to_path_buf(),
        line,
        reason: format!("invalid {name} value '{raw}'"),
    })
}

// ── States ──────────────────────────────────────────────────────────────────

/// Iterator over the rows of a states table.
pub struct StatesReader<R: BufRead> {
    lines: Lines<R>,
    schema: StatesSchema,
    path: PathBuf,
    line_no: usize,
}

impl StatesReader<TextReader> {
    pub fn open(path: &Path, schema: &StatesSchema) -> LumpResult<Self> {
        Ok(Self::new(open_text(path)?, schema, path))
    }
}

impl<R: BufRead> StatesReader<R> {
    pub fn new(reader: R, schema: &StatesSchema, path: &Path) -> Self {
        Self {
            lines: reader.lines(),
            schema: schema.clone(),
            path: path.to_path_buf(),
            line_no: 0,
        }
    }

    fn parse_line(&self, line: &str) -> LumpResult<OriginalState> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != self.schema.column_count() {
            return Err(LumpError::Parse {
                path: self.path.clone(),
                line: self.line_no,
                reason: format!(
                    "expected {} columns, found {}",
                    self.schema.column_count(),
                    fields.len()
                ),
            });
        }
        let (p, n) = (&self.path, self.line_no);
        Ok(OriginalState {
            id: parse_field(p, n, "i", fields[0])?,
            energy: parse_field(p, n, "E", fields[1])?,
            total_degeneracy: parse_field(p, n, "g_tot", fields[2])?,
            angular_momentum: parse_field(p, n, "J", fields[3])?,
            // unparsable lifetimes are treated as absent
            lifetime: self
                .schema
                .lifetime_column()
                .and_then(|idx| fields[idx].parse::<f64>().ok()),
            quanta: self
                .schema
                .quantum_columns()
                .iter()
                .map(|&idx| fields[idx].to_string())
                .collect(),
        })
    }
}

impl<R: BufRead> Iterator for StatesReader<R> {
    type Item = LumpResult<OriginalState>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.parse_line(&line));
        }
    }
}

// ── Transitions ─────────────────────────────────────────────────────────────

/// Forward-only stream of transitions across one or more files.
///
/// Files are opened lazily, one after another; a trailing wavenumber column
/// is ignored.
pub struct TransitionsReader {
    pending: std::vec::IntoIter<PathBuf>,
    current: Option<(PathBuf, Lines<TextReader>)>,
    line_no: usize,
}

impl TransitionsReader {
    pub fn new(paths: &[PathBuf]) -> Self {
        Self {
            pending: paths.to_vec().into_iter(),
            current: None,
            line_no: 0,
        }
    }

    fn parse_line(path: &Path, line_no: usize, line: &str) -> LumpResult<Transition> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if !(3..=4).contains(&fields.len()) {
            return Err(LumpError::Parse {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!("expected 3 or 4 columns, found {}", fields.len()),
            });
        }
        Ok(Transition {
            initial_id: parse_field(path, line_no, "i", fields[0])?,
            final_id: parse_field(path, line_no, "f", fields[1])?,
            rate: parse_field(path, line_no, "A_if", fields[2])?,
        })
    }
}

impl Iterator for TransitionsReader {
    type Item = LumpResult<Transition>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let path = self.pending.next()?;
                match open_text(&path) {
                    Ok(reader) => {
                        self.current = Some((path, reader.lines()));
                        self.line_no = 0;
                    }
                    Err(e) => return Some(Err(e)),
                }
            }
            let (path, lines) = self.current.as_mut()?;
            match lines.next() {
                None => {
                    self.current = None;
                }
                Some(Err(e)) => return Some(Err(e.into())),
                Some(Ok(line)) => {
                    self.line_no += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(Self::parse_line(path, self.line_no, &line));
                }
            }
        }
    }
}
