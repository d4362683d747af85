use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod tsv;

pub use tsv::{Table, is_missing};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("{table}: required column '{column}' not found")]
    MissingColumn { table: String, column: String },
    #[error(
        "data integrity: missing value in column '{column}' of {table} (data row {row}) after {stage}"
    )]
    MissingValue {
        stage: &'static str,
        table: String,
        column: String,
        row: usize,
    },
    #[error("data integrity: {stage}: key '{key}' has no match in {table}")]
    UnmatchedKey {
        stage: &'static str,
        table: String,
        key: String,
    },
    #[error("parse error: {0}")]
    Parse(String),
}

/// Per-taxonomy source tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyFiles {
    pub taxonomy_id: u64,
    pub dir: PathBuf,
    pub peptides: PathBuf,
    pub proteins: PathBuf,
    pub immunogenicity: PathBuf,
    pub antigenicity: PathBuf,
    pub assays: PathBuf,
}

impl TaxonomyFiles {
    /// Resolves table paths for `taxonomy_id`. A `{data_dir}/{taxonomy_id}/`
    /// subdirectory takes precedence over `data_dir` itself.
    pub fn discover(data_dir: &Path, taxonomy_id: u64) -> Self {
        let nested = data_dir.join(taxonomy_id.to_string());
        let dir = if nested.is_dir() {
            nested
        } else {
            data_dir.to_path_buf()
        };
        Self {
            taxonomy_id,
            peptides: resolve_table(&dir, &format!("mhci_peptides_{taxonomy_id}")),
            proteins: resolve_table(&dir, &format!("uniprot_protein_sequences_{taxonomy_id}")),
            immunogenicity: resolve_table(&dir, &format!("immunogenicity_peptides_{taxonomy_id}")),
            antigenicity: resolve_table(&dir, &format!("antigenicity_peptides_{taxonomy_id}")),
            assays: resolve_table(&dir, &format!("bvbrc_assay_results_{taxonomy_id}")),
            dir,
        }
    }

    pub fn required(&self) -> [&Path; 4] {
        [
            &self.peptides,
            &self.proteins,
            &self.immunogenicity,
            &self.antigenicity,
        ]
    }

    pub fn check_required(&self) -> Result<(), InputError> {
        for path in self.required() {
            if !path.exists() {
                return Err(InputError::MissingInput(format!(
                    "required table {} not found",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

fn resolve_table(dir: &Path, stem: &str) -> PathBuf {
    let plain = dir.join(format!("{stem}.tsv"));
    if plain.exists() {
        return plain;
    }
    let gz = dir.join(format!("{stem}.tsv.gz"));
    if gz.exists() {
        return gz;
    }
    plain
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;
