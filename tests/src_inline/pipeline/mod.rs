use std::fs;

use super::*;
use crate::pipeline::stage4_report::{ReportOptions, write_reports};
use crate::report::fasta::FastaMode;
use crate::test_support::{FIXTURE_TAXONOMY, make_temp_dir, write_taxonomy_fixture};

fn request(dir: &std::path::Path, assay_mode: AssayMode) -> RankingRequest {
    RankingRequest {
        files: TaxonomyFiles::discover(dir, FIXTURE_TAXONOMY),
        profile: WeightProfile::Function,
        weights: RankWeights::function_v1(),
        assay_mode,
        stage1: Stage1Params::default(),
        summary_top: 2,
    }
}

#[test]
fn test_end_to_end_ranking() {
    let dir = make_temp_dir("pipeline");
    write_taxonomy_fixture(&dir, true);
    let run = run_ranking(&request(&dir, AssayMode::Auto)).unwrap();

    assert_eq!(run.table.rows.len(), 4);
    assert!(run.table.assays_joined);
    assert_eq!(run.summary.n_rows, 4);
    assert_eq!(run.summary.n_peptides, 3);
    assert_eq!(run.summary.top.len(), 2);
    assert_eq!(run.summary.top[0].peptide, "AAAA");
    assert!((run.summary.rank_score.max - 47.185).abs() < 1e-9);
    assert!((run.summary.rank_score.min - 7.17).abs() < 1e-9);
    assert_eq!(run.summary.dropped_rows, 0);
    assert_eq!(run.summary.assays.as_ref().unwrap().matched_rows, 3);
}

#[test]
fn test_write_reports() {
    let dir = make_temp_dir("pipeline_reports");
    write_taxonomy_fixture(&dir, false);
    let run = run_ranking(&request(&dir, AssayMode::Auto)).unwrap();

    let out = dir.join("out");
    let fasta = out.join("peptides.fasta");
    let written = write_reports(
        &run.table,
        &run.summary,
        &out,
        &ReportOptions {
            top: Some(2),
            fasta: Some((fasta.clone(), FastaMode::SingleLine)),
        },
    )
    .unwrap();

    let ranked = fs::read_to_string(&written.ranked).unwrap();
    assert_eq!(ranked.lines().count(), 3);
    assert!(ranked.lines().nth(1).unwrap().starts_with("AAAA\tHLA-A*01:01\tP1"));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&written.summary).unwrap()).unwrap();
    assert_eq!(summary["taxonomy_id"], 9);
    assert_eq!(summary["n_rows"], 4);
    assert_eq!(summary["weights"]["aff_w"], 0.3);
    assert_eq!(summary["assays"], serde_json::Value::Null);
    assert_eq!(summary["profile"], "function");

    let report = fs::read_to_string(&written.report).unwrap();
    assert!(report.contains("num_all_w = 0.3 (not applied)"));

    assert_eq!(fs::read_to_string(&fasta).unwrap(), "AAAA\nBBBB\nCCCC\n");
    assert_eq!(written.fasta, Some(fasta));
}

#[test]
fn test_dashboard_profile_scores() {
    let dir = make_temp_dir("pipeline_dashboard");
    write_taxonomy_fixture(&dir, false);
    let mut req = request(&dir, AssayMode::Off);
    req.profile = WeightProfile::Dashboard;
    req.weights = RankWeights::dashboard_v1();
    let run = run_ranking(&req).unwrap();
    let scores = run.table.rank_scores();
    assert!(scores.windows(2).all(|p| p[0] >= p[1]));
    let top = &run.table.rows[0];
    assert_eq!(top.row.hit.peptide, "AAAA");
    let expected = 0.3 * ((0.3 * 100.0 + 0.3 * 200.0) / 2.0)
        + 0.1 * (0.3 * 0.5)
        + 0.3 * ((0.3 * 0.8 + 0.3 * 0.1) / 2.0)
        + 2.0;
    assert!((top.scores.rank_score - expected).abs() < 1e-9);
}
