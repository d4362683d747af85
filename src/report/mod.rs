use serde::Serialize;
use thiserror::Error;

use crate::model::master::JoinAudit;
use crate::model::scores::RankedTable;
use crate::model::weights::{RankWeights, WeightProfile};
use crate::pipeline::stage3_assays::{AssayAudit, AssayMode};

pub mod fasta;
pub mod json;
pub mod text;
pub mod tsv;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write table: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to encode summary: {0}")]
    Json(#[from] serde_json::Error),
}

/// Weights carried in the configuration but absent from the rank formula.
pub const UNAPPLIED_WEIGHTS: [&str; 4] = ["num_all_w", "aff_netctl", "pro_netmhc", "prime_w"];

#[derive(Debug, Clone, Serialize)]
pub struct ScoreStats {
    pub min: f64,
    pub median: f64,
    pub p90: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopCandidate {
    pub rank: usize,
    pub peptide: String,
    pub allele: String,
    pub protein_id: String,
    pub binding_alleles: u32,
    pub aff_score: f64,
    pub pro_score: f64,
    pub imm_score: f64,
    pub rank_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputPaths {
    pub peptides: String,
    pub proteins: String,
    pub immunogenicity: String,
    pub antigenicity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankSummary {
    pub tool: String,
    pub version: String,
    pub taxonomy_id: u64,
    pub inputs: InputPaths,
    pub joins: Vec<JoinAudit>,
    pub dropped_rows: usize,
    pub profile: WeightProfile,
    pub weights: RankWeights,
    pub unapplied_weights: Vec<&'static str>,
    pub assay_mode: AssayMode,
    pub assays: Option<AssayAudit>,
    pub n_rows: usize,
    pub n_peptides: usize,
    pub rank_score: ScoreStats,
    pub top: Vec<TopCandidate>,
}

pub struct SummaryInput<'a> {
    pub table: &'a RankedTable,
    pub inputs: InputPaths,
    pub joins: &'a [JoinAudit],
    pub profile: WeightProfile,
    pub weights: &'a RankWeights,
    pub assay_mode: AssayMode,
    pub assays: Option<&'a AssayAudit>,
    pub top_n: usize,
}

pub fn build_summary(input: &SummaryInput<'_>) -> RankSummary {
    let table = input.table;
    let scores = table.rank_scores();
    let mut peptides: Vec<&str> = table.rows.iter().map(|r| r.row.hit.peptide.as_str()).collect();
    peptides.sort_unstable();
    peptides.dedup();

    RankSummary {
        tool: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        taxonomy_id: table.taxonomy_id,
        inputs: input.inputs.clone(),
        joins: input.joins.to_vec(),
        dropped_rows: input.joins.iter().map(|j| j.unmatched).sum(),
        profile: input.profile,
        weights: *input.weights,
        unapplied_weights: UNAPPLIED_WEIGHTS.to_vec(),
        assay_mode: input.assay_mode,
        assays: input.assays.cloned(),
        n_rows: table.rows.len(),
        n_peptides: peptides.len(),
        rank_score: ScoreStats {
            min: quantile_indexed(&scores, 0.0),
            median: median(&scores),
            p90: p90(&scores),
            max: quantile_indexed(&scores, 1.0),
        },
        top: top_candidates(table, input.top_n),
    }
}

pub fn top_candidates(table: &RankedTable, n: usize) -> Vec<TopCandidate> {
    table
        .rows
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, r)| TopCandidate {
            rank: i + 1,
            peptide: r.row.hit.peptide.clone(),
            allele: r.row.hit.allele.clone(),
            protein_id: r.row.hit.protein_id.clone(),
            binding_alleles: r.row.binding_alleles,
            aff_score: r.scores.aff_score,
            pro_score: r.scores.pro_score,
            imm_score: r.scores.imm_score,
            rank_score: r.scores.rank_score,
        })
        .collect()
}

pub fn format_f64_6(v: f64) -> String {
    format!("{:.6}", v)
}

pub fn quantile_indexed(values: &[f64], p: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let idx = ((n - 1) as f64 * p).ceil() as usize;
    sorted[idx.min(n - 1)]
}

pub fn median(values: &[f64]) -> f64 {
    quantile_indexed(values, 0.5)
}

pub fn p90(values: &[f64]) -> f64 {
    quantile_indexed(values, 0.90)
}
