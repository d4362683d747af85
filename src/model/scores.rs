use crate::model::master::MasterRow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeScores {
    pub aff_score: f64,
    pub pro_score: f64,
    pub imm_score: f64,
    pub rank_score: f64,
}

/// Assay counts from BV-BRC; `None` when the ranked row had no match or the
/// cell was empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssayColumns {
    pub bcell_assays: Option<String>,
    pub tcell_assays: Option<String>,
    pub mch_assays: Option<String>,
}

impl AssayColumns {
    pub fn is_empty(&self) -> bool {
        self.bcell_assays.is_none() && self.tcell_assays.is_none() && self.mch_assays.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub row: MasterRow,
    pub scores: CompositeScores,
    pub assays: AssayColumns,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedTable {
    pub taxonomy_id: u64,
    pub peptide_extra_columns: Vec<String>,
    pub antigen_extra_columns: Vec<String>,
    pub rows: Vec<RankedRow>,
    pub assays_joined: bool,
}

impl RankedTable {
    pub fn rank_scores(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.scores.rank_score).collect()
    }
}
