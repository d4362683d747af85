use crate::report::{RankSummary, format_f64_6};

pub fn render_report_text(summary: &RankSummary) -> String {
    let mut out = String::new();

    out.push_str("Epitope Candidate Ranking Report\n");
    out.push_str("================================\n\n");

    out.push_str("1. Inputs\n");
    out.push_str(&format!("Taxonomy ID: {}\n", summary.taxonomy_id));
    out.push_str(&format!("Peptides: {}\n", summary.inputs.peptides));
    out.push_str(&format!("Proteins: {}\n", summary.inputs.proteins));
    out.push_str(&format!(
        "Immunogenicity: {}\n",
        summary.inputs.immunogenicity
    ));
    out.push_str(&format!("Antigenicity: {}\n\n", summary.inputs.antigenicity));

    out.push_str("2. Master list\n");
    for join in &summary.joins {
        out.push_str(&format!(
            "{}: {} -> {} rows",
            join.stage, join.rows_in, join.rows_out
        ));
        if join.unmatched > 0 {
            out.push_str(&format!(" ({} unmatched dropped)", join.unmatched));
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "Rows: {} ({} distinct peptides)\n\n",
        summary.n_rows, summary.n_peptides
    ));

    out.push_str("3. Weights\n");
    out.push_str(&format!("Profile: {:?}\n", summary.profile));
    for (name, value) in summary.weights.as_pairs() {
        let note = if summary.unapplied_weights.contains(&name) {
            " (not applied)"
        } else {
            ""
        };
        out.push_str(&format!("{name} = {value}{note}\n"));
    }
    out.push('\n');

    out.push_str("4. Rank score\n");
    out.push_str(&format!(
        "min: {}\nmedian: {}\np90: {}\nmax: {}\n\n",
        format_f64_6(summary.rank_score.min),
        format_f64_6(summary.rank_score.median),
        format_f64_6(summary.rank_score.p90),
        format_f64_6(summary.rank_score.max)
    ));

    out.push_str("5. Assay results\n");
    match &summary.assays {
        Some(audit) => out.push_str(&format!(
            "{} of {} ranked rows carry assay data ({} assay rows read)\n\n",
            audit.matched_rows, audit.ranked_rows, audit.assay_rows
        )),
        None => out.push_str(&format!(
            "not merged (mode: {:?})\n\n",
            summary.assay_mode
        )),
    }

    out.push_str("6. Top candidates\n");
    if summary.top.is_empty() {
        out.push_str("none\n");
    }
    for c in &summary.top {
        out.push_str(&format!(
            "{:>3}. {} {} {} alleles={} rank_score={}\n",
            c.rank,
            c.peptide,
            c.allele,
            c.protein_id,
            c.binding_alleles,
            format_f64_6(c.rank_score)
        ));
    }

    out
}
