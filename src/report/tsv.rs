use std::io::Write;

use crate::model::scores::{RankedRow, RankedTable};
use crate::report::ReportError;

const SCORE_COLUMNS: [&str; 4] = ["aff_score", "pro_score", "imm_score", "rank_score"];
const ASSAY_COLUMNS: [&str; 3] = ["bcell_assays", "tcell_assays", "mch_assays"];

pub fn header(table: &RankedTable) -> Vec<String> {
    let mut out: Vec<String> = [
        "peptide",
        "allele",
        "protein_id",
        "mhcflurry_aff",
        "iedb_aff",
        "mhcflurry_processing_score",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    out.extend(table.peptide_extra_columns.iter().cloned());
    out.push(crate::model::master::ALLELE_COUNT_COLUMN.to_string());
    out.push("protein_sequence".to_string());
    out.push("immunogenicity_score".to_string());
    out.push("antigen_score".to_string());
    out.extend(table.antigen_extra_columns.iter().cloned());
    out.extend(SCORE_COLUMNS.iter().map(|s| s.to_string()));
    if table.assays_joined {
        out.extend(ASSAY_COLUMNS.iter().map(|s| s.to_string()));
    }
    out
}

pub fn record(row: &RankedRow, assays_joined: bool) -> Vec<String> {
    let hit = &row.row.hit;
    let mut out = vec![
        hit.peptide.clone(),
        hit.allele.clone(),
        hit.protein_id.clone(),
        hit.mhcflurry_aff.to_string(),
        hit.iedb_aff.to_string(),
        hit.mhcflurry_processing_score.to_string(),
    ];
    out.extend(hit.extras.iter().cloned());
    out.push(row.row.binding_alleles.to_string());
    out.push(row.row.protein_sequence.clone());
    out.push(row.row.immunogenicity_score.to_string());
    out.push(row.row.antigen_score.to_string());
    out.extend(row.row.antigen_extras.iter().cloned());
    out.push(row.scores.aff_score.to_string());
    out.push(row.scores.pro_score.to_string());
    out.push(row.scores.imm_score.to_string());
    out.push(row.scores.rank_score.to_string());
    if assays_joined {
        let a = &row.assays;
        for value in [&a.bcell_assays, &a.tcell_assays, &a.mch_assays] {
            out.push(value.clone().unwrap_or_default());
        }
    }
    out
}

/// Writes the ranked table, keeping at most `limit` rows.
pub fn write_ranked_tsv<W: Write>(
    table: &RankedTable,
    limit: Option<usize>,
    writer: W,
) -> Result<(), ReportError> {
    let mut w = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    w.write_record(header(table))?;
    let limit = limit.unwrap_or(usize::MAX);
    for row in table.rows.iter().take(limit) {
        w.write_record(record(row, table.assays_joined))?;
    }
    w.flush()?;
    Ok(())
}
