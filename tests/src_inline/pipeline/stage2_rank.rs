use super::*;
use crate::model::master::PeptideHit;

fn master_row(
    peptide: &str,
    allele: &str,
    aff: (f64, f64),
    processing: f64,
    antigen: f64,
    immunogenicity: f64,
    alleles: u32,
) -> MasterRow {
    MasterRow {
        hit: PeptideHit {
            peptide: peptide.to_string(),
            allele: allele.to_string(),
            protein_id: "P1".to_string(),
            mhcflurry_aff: aff.0,
            iedb_aff: aff.1,
            mhcflurry_processing_score: processing,
            extras: Vec::new(),
        },
        binding_alleles: alleles,
        protein_sequence: "MAAAAK".to_string(),
        immunogenicity_score: immunogenicity,
        antigen_score: antigen,
        antigen_extras: Vec::new(),
    }
}

fn fixture() -> MasterList {
    MasterList {
        taxonomy_id: 9,
        peptide_extra_columns: Vec::new(),
        antigen_extra_columns: Vec::new(),
        rows: vec![
            master_row("CCCC", "HLA-B*07:02", (10.0, 30.0), 0.2, 1.2, -0.2, 1),
            master_row("AAAA", "HLA-A*01:01", (100.0, 200.0), 0.5, 0.8, 0.1, 2),
            master_row("BBBB", "HLA-A*01:01", (50.0, 70.0), 0.9, 0.4, 0.3, 1),
            master_row("AAAA", "HLA-A*02:01", (120.0, 180.0), 0.5, 0.8, 0.1, 2),
        ],
    }
}

#[test]
fn test_affinity_example() {
    let row = master_row("AAAA", "HLA-A*01:01", (100.0, 200.0), 0.0, 0.0, 0.0, 1);
    let scores = compute_scores(&row, &RankWeights::function_v1());
    assert_eq!(scores.aff_score, 150.0);
}

#[test]
fn test_composite_formula() {
    let row = master_row("AAAA", "HLA-A*01:01", (100.0, 200.0), 0.5, 0.8, 0.1, 2);
    let w = RankWeights::function_v1();
    let s = compute_scores(&row, &w);
    let aff = (1.0 * 100.0 + 1.0 * 200.0) / 2.0;
    let pro = 1.0 * 0.5;
    let imm = (1.0 * 0.8 + 1.0 * 0.1) / 2.0;
    let expected = 0.3 * aff + 0.1 * pro + 0.3 * imm + 2.0;
    assert_eq!(s.pro_score, pro);
    assert_eq!(s.imm_score, imm);
    assert_eq!(s.rank_score.to_bits(), expected.to_bits());
}

#[test]
fn test_num_all_w_not_applied() {
    let row = master_row("AAAA", "HLA-A*01:01", (100.0, 200.0), 0.5, 0.8, 0.1, 3);
    let mut a = RankWeights::function_v1();
    let mut b = a;
    a.num_all_w = 0.0;
    b.num_all_w = 5.0;
    b.prime_w = 9.0;
    b.pro_netmhc = 9.0;
    b.aff_netctl = 9.0;
    assert_eq!(compute_scores(&row, &a), compute_scores(&row, &b));
}

#[test]
fn test_rank_sorted_descending_with_stable_ties() {
    let ranked = rank(&fixture(), &RankWeights::function_v1());
    let order: Vec<(&str, &str)> = ranked
        .rows
        .iter()
        .map(|r| (r.row.hit.peptide.as_str(), r.row.hit.allele.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("AAAA", "HLA-A*01:01"),
            ("AAAA", "HLA-A*02:01"),
            ("BBBB", "HLA-A*01:01"),
            ("CCCC", "HLA-B*07:02"),
        ]
    );
    assert!(!ranked.assays_joined);
}

#[test]
fn test_rank_non_increasing_for_weight_grid() {
    let master = fixture();
    let grid = [-1.0, 0.0, 0.3, 2.5];
    for &aff_w in &grid {
        for &pro_w in &grid {
            for &imm_w in &grid {
                let w = RankWeights {
                    aff_w,
                    pro_w,
                    imm_w,
                    ..RankWeights::dashboard_v1()
                };
                let scores = rank(&master, &w).rank_scores();
                assert!(
                    scores.windows(2).all(|p| p[0] >= p[1]),
                    "not sorted for {w:?}: {scores:?}"
                );
            }
        }
    }
}

#[test]
fn test_rank_idempotent() {
    let master = fixture();
    let w = RankWeights::dashboard_v1();
    let a = rank(&master, &w);
    let b = rank(&master, &w);
    assert_eq!(a, b);
    for (x, y) in a.rank_scores().iter().zip(b.rank_scores()) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
}

#[test]
fn test_nan_scores_sort_last() {
    let master = fixture();
    let w = RankWeights {
        aff_w: f64::NAN,
        ..RankWeights::function_v1()
    };
    let mut with_nan = master.clone();
    with_nan.rows[0].hit.mhcflurry_aff = 0.0;
    let ranked = rank(&with_nan, &w);
    assert!(ranked.rows.iter().all(|r| r.scores.rank_score.is_nan()));
    assert_eq!(ranked.rows.len(), 4);

    assert_eq!(descending_nan_last(f64::NAN, 1.0), Ordering::Greater);
    assert_eq!(descending_nan_last(1.0, f64::NAN), Ordering::Less);
    assert_eq!(descending_nan_last(2.0, 1.0), Ordering::Less);
}
