use super::*;
use crate::input::TaxonomyFiles;
use crate::model::weights::RankWeights;
use crate::pipeline::stage1_master::{Stage1Params, run_stage1};
use crate::pipeline::stage2_rank::rank;
use crate::test_support::{ASSAYS_TSV, FIXTURE_TAXONOMY, make_temp_dir, table, write_taxonomy_fixture};

fn ranked_fixture(with_assays: bool) -> (RankedTable, TaxonomyFiles) {
    let dir = make_temp_dir("stage3");
    write_taxonomy_fixture(&dir, with_assays);
    let files = TaxonomyFiles::discover(&dir, FIXTURE_TAXONOMY);
    let master = run_stage1(&files, &Stage1Params::default()).unwrap().master;
    (rank(&master, &RankWeights::function_v1()), files)
}

#[test]
fn test_left_join_keeps_unmatched_rows() {
    let (ranked, _) = ranked_fixture(false);
    let n = ranked.rows.len();
    let assays = load_assays(&table("bvbrc_assay_results_9.tsv", ASSAYS_TSV)).unwrap();
    let (enriched, matched) = enrich_with_assays(ranked.clone(), &assays);

    assert!(enriched.assays_joined);
    assert_eq!(enriched.rows.len(), n);
    assert_eq!(matched, 3);

    let bbbb = enriched
        .rows
        .iter()
        .find(|r| r.row.hit.peptide == "BBBB")
        .unwrap();
    assert!(bbbb.assays.is_empty());
    let original = ranked
        .rows
        .iter()
        .find(|r| r.row.hit.peptide == "BBBB")
        .unwrap();
    assert_eq!(bbbb.row, original.row);
    assert_eq!(bbbb.scores, original.scores);

    let cccc = enriched
        .rows
        .iter()
        .find(|r| r.row.hit.peptide == "CCCC")
        .unwrap();
    assert_eq!(cccc.assays.bcell_assays.as_deref(), Some("0"));
    assert_eq!(cccc.assays.tcell_assays, None);
    assert_eq!(cccc.assays.mch_assays.as_deref(), Some("3"));
}

#[test]
fn test_enrichment_preserves_rank_order() {
    let (ranked, _) = ranked_fixture(false);
    let assays = load_assays(&table("bvbrc_assay_results_9.tsv", ASSAYS_TSV)).unwrap();
    let (enriched, _) = enrich_with_assays(ranked.clone(), &assays);
    assert_eq!(enriched.rank_scores(), ranked.rank_scores());
}

#[test]
fn test_key_requires_protein_match() {
    let (ranked, _) = ranked_fixture(false);
    let data = "peptide\tprotein_id\tbcell_assays\ttcell_assays\tmch_assays
BBBB\tP9\t5\t5\t5
";
    let assays = load_assays(&table("a.tsv", data)).unwrap();
    let (_, matched) = enrich_with_assays(ranked, &assays);
    assert_eq!(matched, 0);
}

#[test]
fn test_duplicate_assay_rows_repeat() {
    let (ranked, _) = ranked_fixture(false);
    let data = "peptide\tprotein_id\tbcell_assays\ttcell_assays\tmch_assays
BBBB\tP2\t1\t1\t1
BBBB\tP2\t2\t2\t2
";
    let assays = load_assays(&table("a.tsv", data)).unwrap();
    let (enriched, matched) = enrich_with_assays(ranked, &assays);
    assert_eq!(matched, 2);
    assert_eq!(enriched.rows.len(), 5);
    let with_assays = enriched
        .rows
        .iter()
        .filter(|r| r.assays.bcell_assays.is_some())
        .count();
    assert_eq!(matched, with_assays);
    let b: Vec<Option<&str>> = enriched
        .rows
        .iter()
        .filter(|r| r.row.hit.peptide == "BBBB")
        .map(|r| r.assays.bcell_assays.as_deref())
        .collect();
    assert_eq!(b, vec![Some("1"), Some("2")]);
}

#[test]
fn test_modes() {
    let (ranked, files) = ranked_fixture(false);
    let off = run_stage3(ranked.clone(), &files.assays, AssayMode::Off).unwrap();
    assert!(off.audit.is_none());
    assert!(!off.table.assays_joined);

    let auto = run_stage3(ranked.clone(), &files.assays, AssayMode::Auto).unwrap();
    assert!(auto.audit.is_none());

    let err = run_stage3(ranked, &files.assays, AssayMode::Require).unwrap_err();
    assert!(matches!(err, InputError::MissingInput(_)));
}

#[test]
fn test_auto_mode_enriches_when_present() {
    let (ranked, files) = ranked_fixture(true);
    let out = run_stage3(ranked, &files.assays, AssayMode::Auto).unwrap();
    let audit = out.audit.unwrap();
    assert_eq!(audit.assay_rows, 2);
    assert_eq!(audit.matched_rows, 3);
    assert!(out.table.assays_joined);
}

#[test]
fn test_missing_assay_column() {
    let err = load_assays(&table("a.tsv", "peptide\tprotein_id\n")).unwrap_err();
    assert!(err.to_string().contains("bcell_assays"));
}
