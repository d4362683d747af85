use std::cmp::Ordering;

use crate::model::master::{MasterList, MasterRow};
use crate::model::scores::{AssayColumns, CompositeScores, RankedRow, RankedTable};
use crate::model::weights::RankWeights;

pub fn compute_scores(row: &MasterRow, w: &RankWeights) -> CompositeScores {
    let hit = &row.hit;
    let aff_score = (w.aff_flurry * hit.mhcflurry_aff + w.aff_netmhc * hit.iedb_aff) / 2.0;
    let pro_score = w.pro_flurry * hit.mhcflurry_processing_score;
    let imm_score = (w.vaxijen_w * row.antigen_score + w.iedb_w * row.immunogenicity_score) / 2.0;
    // Allele count enters unweighted; num_all_w is carried but not applied.
    let rank_score = w.aff_w * aff_score
        + w.pro_w * pro_score
        + w.imm_w * imm_score
        + row.binding_alleles as f64;
    CompositeScores {
        aff_score,
        pro_score,
        imm_score,
        rank_score,
    }
}

/// Scores every row and stable-sorts by descending `rank_score`.
pub fn rank(master: &MasterList, weights: &RankWeights) -> RankedTable {
    let mut rows: Vec<RankedRow> = master
        .rows
        .iter()
        .map(|row| RankedRow {
            scores: compute_scores(row, weights),
            row: row.clone(),
            assays: AssayColumns::default(),
        })
        .collect();
    rows.sort_by(|a, b| descending_nan_last(a.scores.rank_score, b.scores.rank_score));

    tracing::info!(
        rows = rows.len(),
        top = ?rows.first().map(|r| r.scores.rank_score),
        "ranked epitope candidates"
    );

    RankedTable {
        taxonomy_id: master.taxonomy_id,
        peptide_extra_columns: master.peptide_extra_columns.clone(),
        antigen_extra_columns: master.antigen_extra_columns.clone(),
        rows,
        assays_joined: false,
    }
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_rank.rs"]
mod tests;
