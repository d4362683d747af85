use std::collections::HashMap;

use crate::input::tsv::{cell, parse_f64_cell};
use crate::input::{InputError, Table, TaxonomyFiles};
use crate::model::master::{ALLELE_COUNT_COLUMN, JoinAudit, MasterList, MasterRow, PeptideHit};

const STAGE_LOAD: &str = "loading MHC-I peptides";
const STAGE_ALLELES: &str = "merging binding allele counts";
const STAGE_PROTEINS: &str = "merging protein sequences";
const STAGE_IMMUNOGENICITY: &str = "merging immunogenicity scores";
const STAGE_ANTIGENICITY: &str = "merging antigenicity scores";

const PEPTIDE_COLUMNS: [&str; 6] = [
    "peptide",
    "allele",
    "protein_id",
    "mhcflurry_aff",
    "iedb_aff",
    "mhcflurry_processing_score",
];

/// Columns the merges add ahead of the antigenicity extras.
const MERGED_COLUMNS: [&str; 4] = [
    ALLELE_COUNT_COLUMN,
    "protein_sequence",
    "immunogenicity_score",
    "antigen_score",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Stage1Params {
    /// Treat rows without a join partner as an integrity error instead of
    /// dropping them.
    pub strict_joins: bool,
}

#[derive(Debug)]
pub struct Stage1Output {
    pub master: MasterList,
    pub audits: Vec<JoinAudit>,
}

#[derive(Debug, Clone)]
struct ProteinRow {
    protein_id: String,
    protein_sequence: Option<String>,
    row: usize,
}

#[derive(Debug, Clone)]
struct ImmunogenicityRow {
    peptide: String,
    score: Option<f64>,
    row: usize,
}

#[derive(Debug, Clone)]
struct AntigenRow {
    peptide: String,
    score: Option<f64>,
    extras: Vec<String>,
    row: usize,
}

/// Intermediate row between the protein and antigenicity joins.
#[derive(Debug, Clone)]
struct PartialRow {
    hit: PeptideHit,
    binding_alleles: u32,
    protein_sequence: String,
    immunogenicity_score: f64,
}

pub fn run_stage1(files: &TaxonomyFiles, params: &Stage1Params) -> Result<Stage1Output, InputError> {
    files.check_required()?;

    tracing::info!(taxonomy_id = files.taxonomy_id, "getting peptides");
    let peptides = Table::read(&files.peptides)?;
    let proteins = Table::read(&files.proteins)?;
    let immunogenicity = Table::read(&files.immunogenicity)?;
    let mut antigenicity = Table::read(&files.antigenicity)?;
    antigenicity.rename_column("sequence", "peptide");

    build_master_list(
        files.taxonomy_id,
        &peptides,
        &proteins,
        &immunogenicity,
        &antigenicity,
        params,
    )
}

pub fn build_master_list(
    taxonomy_id: u64,
    peptides: &Table,
    proteins: &Table,
    immunogenicity: &Table,
    antigenicity: &Table,
    params: &Stage1Params,
) -> Result<Stage1Output, InputError> {
    let mut audits = Vec::with_capacity(4);

    peptides.assert_complete(STAGE_LOAD)?;
    let (hits, peptide_extra_columns) = load_peptide_hits(peptides)?;
    tracing::info!(rows = hits.len(), "loaded peptide hits");

    tracing::info!("setting number of binding alleles per peptide");
    let counts = count_binding_alleles(&hits);
    let with_counts = attach_allele_counts(hits, &counts, &peptides.name)?;
    audits.push(JoinAudit {
        stage: STAGE_ALLELES,
        table: peptides.name.clone(),
        rows_in: with_counts.len(),
        rows_out: with_counts.len(),
        unmatched: 0,
    });

    tracing::info!("adding protein sequences");
    let protein_rows = load_proteins(proteins)?;
    let (joined, audit) = inner_join(
        STAGE_PROTEINS,
        &proteins.name,
        with_counts,
        &protein_rows,
        |(hit, _)| hit.protein_id.as_str(),
        |p| p.protein_id.as_str(),
        |(hit, count), p| {
            let protein_sequence =
                require(p.protein_sequence.clone(), STAGE_PROTEINS, proteins, "protein_sequence", p.row)?;
            Ok((hit.clone(), *count, protein_sequence))
        },
        params.strict_joins,
    )?;
    audits.push(audit);

    tracing::info!("adding immunogenicity");
    let imm_rows = load_immunogenicity(immunogenicity)?;
    let (joined, audit) = inner_join(
        STAGE_IMMUNOGENICITY,
        &immunogenicity.name,
        joined,
        &imm_rows,
        |(hit, _, _)| hit.peptide.as_str(),
        |r| r.peptide.as_str(),
        |(hit, count, seq), r| {
            let immunogenicity_score = require(
                r.score,
                STAGE_IMMUNOGENICITY,
                immunogenicity,
                "immunogenicity_score",
                r.row,
            )?;
            Ok(PartialRow {
                hit: hit.clone(),
                binding_alleles: *count,
                protein_sequence: seq.clone(),
                immunogenicity_score,
            })
        },
        params.strict_joins,
    )?;
    audits.push(audit);

    tracing::info!("adding antigenicity");
    let (antigen_rows, antigen_extra_idx) = load_antigenicity(antigenicity)?;
    let (rows, audit) = inner_join(
        STAGE_ANTIGENICITY,
        &antigenicity.name,
        joined,
        &antigen_rows,
        |p| p.hit.peptide.as_str(),
        |a| a.peptide.as_str(),
        |p, a| {
            let antigen_score =
                require(a.score, STAGE_ANTIGENICITY, antigenicity, "antigen_score", a.row)?;
            if let Some(pos) = a.extras.iter().position(|v| crate::input::is_missing(v)) {
                return Err(InputError::MissingValue {
                    stage: STAGE_ANTIGENICITY,
                    table: antigenicity.name.clone(),
                    column: antigenicity.columns[antigen_extra_idx[pos]].clone(),
                    row: a.row + 1,
                });
            }
            Ok(MasterRow {
                hit: p.hit.clone(),
                binding_alleles: p.binding_alleles,
                protein_sequence: p.protein_sequence.clone(),
                immunogenicity_score: p.immunogenicity_score,
                antigen_score,
                antigen_extras: a.extras.clone(),
            })
        },
        params.strict_joins,
    )?;
    audits.push(audit);

    let taken: Vec<String> = PEPTIDE_COLUMNS
        .iter()
        .chain(MERGED_COLUMNS.iter())
        .map(|s| s.to_string())
        .chain(peptide_extra_columns.iter().cloned())
        .collect();
    let antigen_extra_columns = antigen_extra_idx
        .iter()
        .map(|&idx| {
            let name = &antigenicity.columns[idx];
            if taken.contains(name) {
                format!("{name}_y")
            } else {
                name.clone()
            }
        })
        .collect();

    tracing::info!(rows = rows.len(), "master list built");
    Ok(Stage1Output {
        master: MasterList {
            taxonomy_id,
            peptide_extra_columns,
            antigen_extra_columns,
            rows,
        },
        audits,
    })
}

fn load_peptide_hits(table: &Table) -> Result<(Vec<PeptideHit>, Vec<String>), InputError> {
    let idx: Vec<usize> = PEPTIDE_COLUMNS
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<_, _>>()?;
    let extra_idx: Vec<usize> = (0..table.columns.len())
        .filter(|i| !idx.contains(i))
        .collect();
    let extra_columns = extra_idx.iter().map(|&i| table.columns[i].clone()).collect();

    let mut hits = Vec::with_capacity(table.len());
    for (row, cells) in table.rows.iter().enumerate() {
        let number = |col: usize| -> Result<f64, InputError> {
            parse_f64_cell(table, row, col)?.ok_or_else(|| InputError::MissingValue {
                stage: STAGE_LOAD,
                table: table.name.clone(),
                column: table.columns[col].clone(),
                row: row + 1,
            })
        };
        hits.push(PeptideHit {
            peptide: cells[idx[0]].clone(),
            allele: cells[idx[1]].clone(),
            protein_id: cells[idx[2]].clone(),
            mhcflurry_aff: number(idx[3])?,
            iedb_aff: number(idx[4])?,
            mhcflurry_processing_score: number(idx[5])?,
            extras: extra_idx.iter().map(|&i| cells[i].clone()).collect(),
        });
    }
    Ok((hits, extra_columns))
}

/// Allele rows per peptide.
pub fn count_binding_alleles(hits: &[PeptideHit]) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for hit in hits {
        *counts.entry(hit.peptide.clone()).or_insert(0) += 1;
    }
    counts
}

fn attach_allele_counts(
    hits: Vec<PeptideHit>,
    counts: &HashMap<String, u32>,
    table: &str,
) -> Result<Vec<(PeptideHit, u32)>, InputError> {
    hits.into_iter()
        .enumerate()
        .map(|(row, hit)| match counts.get(&hit.peptide) {
            Some(&count) => Ok((hit, count)),
            None => Err(InputError::MissingValue {
                stage: STAGE_ALLELES,
                table: table.to_string(),
                column: ALLELE_COUNT_COLUMN.to_string(),
                row: row + 1,
            }),
        })
        .collect()
}

fn load_proteins(table: &Table) -> Result<Vec<ProteinRow>, InputError> {
    let id_idx = table.column_index("protein_id")?;
    let seq_idx = table.column_index("protein_sequence")?;
    let mut out = Vec::with_capacity(table.len());
    for (row, cells) in table.rows.iter().enumerate() {
        let Some(protein_id) = cell(cells, id_idx) else {
            continue;
        };
        out.push(ProteinRow {
            protein_id: protein_id.to_string(),
            protein_sequence: cell(cells, seq_idx).map(str::to_string),
            row,
        });
    }
    Ok(out)
}

fn load_immunogenicity(table: &Table) -> Result<Vec<ImmunogenicityRow>, InputError> {
    let pep_idx = table.column_index("peptide")?;
    let score_idx = table.column_index("immunogenicity_score")?;
    let mut out = Vec::with_capacity(table.len());
    for (row, cells) in table.rows.iter().enumerate() {
        let Some(peptide) = cell(cells, pep_idx) else {
            continue;
        };
        out.push(ImmunogenicityRow {
            peptide: peptide.to_string(),
            score: parse_f64_cell(table, row, score_idx)?,
            row,
        });
    }
    Ok(out)
}

fn load_antigenicity(table: &Table) -> Result<(Vec<AntigenRow>, Vec<usize>), InputError> {
    let pep_idx = table.column_index("peptide")?;
    let score_idx = table.column_index("antigen_score")?;
    let extra_idx: Vec<usize> = (0..table.columns.len())
        .filter(|&i| i != pep_idx && i != score_idx)
        .collect();
    let mut out = Vec::with_capacity(table.len());
    for (row, cells) in table.rows.iter().enumerate() {
        let Some(peptide) = cell(cells, pep_idx) else {
            continue;
        };
        out.push(AntigenRow {
            peptide: peptide.to_string(),
            score: parse_f64_cell(table, row, score_idx)?,
            extras: extra_idx.iter().map(|&i| cells[i].clone()).collect(),
            row,
        });
    }
    Ok((out, extra_idx))
}

fn require<T>(
    value: Option<T>,
    stage: &'static str,
    table: &Table,
    column: &str,
    row: usize,
) -> Result<T, InputError> {
    value.ok_or_else(|| InputError::MissingValue {
        stage,
        table: table.name.clone(),
        column: column.to_string(),
        row: row + 1,
    })
}

/// Many-to-many inner join preserving left order, then right order among
/// repeated matches. `combine` runs on every joined pair and is where the
/// completeness of the merged columns is checked.
#[allow(clippy::too_many_arguments)]
fn inner_join<L, R, O>(
    stage: &'static str,
    table: &str,
    left: Vec<L>,
    right: &[R],
    left_key: impl Fn(&L) -> &str,
    right_key: impl Fn(&R) -> &str,
    combine: impl Fn(&L, &R) -> Result<O, InputError>,
    strict: bool,
) -> Result<(Vec<O>, JoinAudit), InputError> {
    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, r) in right.iter().enumerate() {
        index.entry(right_key(r)).or_default().push(i);
    }

    let rows_in = left.len();
    let mut unmatched = 0usize;
    let mut out = Vec::with_capacity(left.len());
    for l in &left {
        let key = left_key(l);
        match index.get(key) {
            Some(matches) => {
                for &i in matches {
                    out.push(combine(l, &right[i])?);
                }
            }
            None if strict => {
                return Err(InputError::UnmatchedKey {
                    stage,
                    table: table.to_string(),
                    key: key.to_string(),
                });
            }
            None => unmatched += 1,
        }
    }

    if unmatched > 0 {
        tracing::warn!(
            stage,
            table,
            unmatched,
            "rows without a join partner were dropped"
        );
    }

    let audit = JoinAudit {
        stage,
        table: table.to_string(),
        rows_in,
        rows_out: out.len(),
        unmatched,
    };
    Ok((out, audit))
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage1_master.rs"]
mod tests;
