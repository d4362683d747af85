pub mod stage1_master;
pub mod stage2_rank;
pub mod stage3_assays;
pub mod stage4_report;

use crate::input::{InputError, TaxonomyFiles};
use crate::model::scores::RankedTable;
use crate::model::weights::{RankWeights, WeightProfile};
use crate::report::{InputPaths, RankSummary, SummaryInput, build_summary};
use stage1_master::{Stage1Output, Stage1Params, run_stage1};
use stage2_rank::rank;
use stage3_assays::{AssayMode, run_stage3};

#[derive(Debug, Clone)]
pub struct RankingRequest {
    pub files: TaxonomyFiles,
    pub profile: WeightProfile,
    pub weights: RankWeights,
    pub assay_mode: AssayMode,
    pub stage1: Stage1Params,
    /// Candidates listed in the summary.
    pub summary_top: usize,
}

#[derive(Debug)]
pub struct RankingRun {
    pub table: RankedTable,
    pub summary: RankSummary,
}

pub fn run_ranking(request: &RankingRequest) -> Result<RankingRun, InputError> {
    let stage1 = run_stage1(&request.files, &request.stage1)?;
    rank_from_master(&stage1, request)
}

/// Stages 2 and 3 over an already built master list.
pub fn rank_from_master(
    stage1: &Stage1Output,
    request: &RankingRequest,
) -> Result<RankingRun, InputError> {
    let ranked = rank(&stage1.master, &request.weights);
    let stage3 = run_stage3(ranked, &request.files.assays, request.assay_mode)?;

    let summary = build_summary(&SummaryInput {
        table: &stage3.table,
        inputs: input_paths(&request.files),
        joins: &stage1.audits,
        profile: request.profile,
        weights: &request.weights,
        assay_mode: request.assay_mode,
        assays: stage3.audit.as_ref(),
        top_n: request.summary_top,
    });

    Ok(RankingRun {
        table: stage3.table,
        summary,
    })
}

fn input_paths(files: &TaxonomyFiles) -> InputPaths {
    InputPaths {
        peptides: files.peptides.display().to_string(),
        proteins: files.proteins.display().to_string(),
        immunogenicity: files.immunogenicity.display().to_string(),
        antigenicity: files.antigenicity.display().to_string(),
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/mod.rs"]
mod tests;
