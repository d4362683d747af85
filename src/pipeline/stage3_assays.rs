use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::input::tsv::cell;
use crate::input::{InputError, Table};
use crate::model::scores::{AssayColumns, RankedRow, RankedTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AssayMode {
    /// Enrich when the assay table exists.
    #[default]
    Auto,
    /// Fail when the assay table is absent.
    Require,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssayRow {
    pub peptide: String,
    pub protein_id: String,
    pub columns: AssayColumns,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssayAudit {
    pub source: String,
    pub assay_rows: usize,
    /// Rows after the join, duplicates of repeated assay keys included.
    pub ranked_rows: usize,
    /// Of `ranked_rows`, those carrying assay values.
    pub matched_rows: usize,
}

#[derive(Debug)]
pub struct Stage3Output {
    pub table: RankedTable,
    pub audit: Option<AssayAudit>,
}

pub fn run_stage3(
    table: RankedTable,
    assays_path: &Path,
    mode: AssayMode,
) -> Result<Stage3Output, InputError> {
    match mode {
        AssayMode::Off => Ok(Stage3Output { table, audit: None }),
        AssayMode::Auto if !assays_path.exists() => {
            tracing::info!(
                path = %assays_path.display(),
                "assay results not found; skipping enrichment"
            );
            Ok(Stage3Output { table, audit: None })
        }
        AssayMode::Auto | AssayMode::Require => {
            let assays = load_assays(&Table::read(assays_path)?)?;
            let assay_rows = assays.len();
            let (table, matched_rows) = enrich_with_assays(table, &assays);
            tracing::info!(assay_rows, matched_rows, "merged assay results");
            Ok(Stage3Output {
                audit: Some(AssayAudit {
                    source: assays_path.display().to_string(),
                    assay_rows,
                    ranked_rows: table.rows.len(),
                    matched_rows,
                }),
                table,
            })
        }
    }
}

pub fn load_assays(table: &Table) -> Result<Vec<AssayRow>, InputError> {
    let pep_idx = table.column_index("peptide")?;
    let prot_idx = table.column_index("protein_id")?;
    let b_idx = table.column_index("bcell_assays")?;
    let t_idx = table.column_index("tcell_assays")?;
    let m_idx = table.column_index("mch_assays")?;

    let mut out = Vec::with_capacity(table.len());
    for cells in &table.rows {
        let (Some(peptide), Some(protein_id)) = (cell(cells, pep_idx), cell(cells, prot_idx)) else {
            continue;
        };
        out.push(AssayRow {
            peptide: peptide.to_string(),
            protein_id: protein_id.to_string(),
            columns: AssayColumns {
                bcell_assays: cell(cells, b_idx).map(str::to_string),
                tcell_assays: cell(cells, t_idx).map(str::to_string),
                mch_assays: cell(cells, m_idx).map(str::to_string),
            },
        });
    }
    Ok(out)
}

/// Left join on `(peptide, protein_id)`. Unmatched rows keep empty assay
/// columns; duplicate assay keys repeat the ranked row. Returns the number of
/// output rows carrying assay values.
pub fn enrich_with_assays(table: RankedTable, assays: &[AssayRow]) -> (RankedTable, usize) {
    let mut index: HashMap<(&str, &str), Vec<usize>> = HashMap::new();
    for (i, a) in assays.iter().enumerate() {
        index
            .entry((a.peptide.as_str(), a.protein_id.as_str()))
            .or_default()
            .push(i);
    }

    let RankedTable {
        taxonomy_id,
        peptide_extra_columns,
        antigen_extra_columns,
        rows,
        ..
    } = table;

    let mut matched = 0usize;
    let mut out: Vec<RankedRow> = Vec::with_capacity(rows.len());
    for row in &rows {
        let key = (row.row.hit.peptide.as_str(), row.row.hit.protein_id.as_str());
        match index.get(&key) {
            Some(hits) => {
                matched += hits.len();
                for &i in hits {
                    let mut joined = row.clone();
                    joined.assays = assays[i].columns.clone();
                    out.push(joined);
                }
            }
            None => {
                let mut kept = row.clone();
                kept.assays = AssayColumns::default();
                out.push(kept);
            }
        }
    }

    (
        RankedTable {
            taxonomy_id,
            peptide_extra_columns,
            antigen_extra_columns,
            rows: out,
            assays_joined: true,
        },
        matched,
    )
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_assays.rs"]
mod tests;
