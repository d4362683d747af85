use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::scores::RankedTable;
use crate::report::fasta::{FastaMode, ranked_peptides, write_sequences};
use crate::report::json::render_summary_json;
use crate::report::text::render_report_text;
use crate::report::tsv::write_ranked_tsv;
use crate::report::{RankSummary, ReportError};

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Rows written to `ranked.tsv`; the summary always covers every row.
    pub top: Option<usize>,
    pub fasta: Option<(PathBuf, FastaMode)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReports {
    pub ranked: PathBuf,
    pub summary: PathBuf,
    pub report: PathBuf,
    pub fasta: Option<PathBuf>,
}

/// Hidden sibling the output is staged in before it is renamed into place.
fn staging_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(dest.file_name().unwrap_or_default());
    name.push(".partial");
    dest.with_file_name(name)
}

/// Stages every output next to its destination, then renames them all.
/// A failed write removes whatever was staged so no partial set is left.
fn commit_all(outputs: &[(PathBuf, Vec<u8>)]) -> Result<(), ReportError> {
    let mut staged: Vec<PathBuf> = Vec::with_capacity(outputs.len());
    for (dest, bytes) in outputs {
        let tmp = staging_path(dest);
        if let Err(err) = fs::write(&tmp, bytes) {
            discard(&staged);
            return Err(err.into());
        }
        staged.push(tmp);
    }
    for (i, (dest, _)) in outputs.iter().enumerate() {
        if let Err(err) = fs::rename(&staged[i], dest) {
            discard(&staged[i..]);
            return Err(err.into());
        }
    }
    Ok(())
}

fn discard(staged: &[PathBuf]) {
    for tmp in staged {
        if let Err(err) = fs::remove_file(tmp) {
            tracing::warn!(path = %tmp.display(), %err, "failed to remove staged report");
        }
    }
}

pub fn write_reports(
    table: &RankedTable,
    summary: &RankSummary,
    out_dir: &Path,
    options: &ReportOptions,
) -> Result<WrittenReports, ReportError> {
    let mut ranked_bytes = Vec::new();
    write_ranked_tsv(table, options.top, &mut ranked_bytes)?;
    let summary_bytes = render_summary_json(summary)?.into_bytes();
    let report_bytes = render_report_text(summary).into_bytes();

    let ranked = out_dir.join("ranked.tsv");
    let summary_path = out_dir.join("summary.json");
    let report = out_dir.join("report.txt");
    let mut outputs = vec![
        (ranked.clone(), ranked_bytes),
        (summary_path.clone(), summary_bytes),
        (report.clone(), report_bytes),
    ];

    let mut sequences = 0;
    if let Some((path, mode)) = &options.fasta {
        let peptides = ranked_peptides(table);
        sequences = peptides.len();
        let mut bytes = Vec::new();
        write_sequences(&mut bytes, &peptides, mode)?;
        outputs.push((path.clone(), bytes));
    }

    fs::create_dir_all(out_dir)?;
    commit_all(&outputs)?;

    let fasta = options.fasta.as_ref().map(|(path, _)| path.clone());
    if let Some(path) = &fasta {
        tracing::info!(path = %path.display(), sequences, "wrote FASTA");
    }
    tracing::info!(out_dir = %out_dir.display(), rows = table.rows.len(), "wrote reports");
    Ok(WrittenReports {
        ranked,
        summary: summary_path,
        report,
        fasta,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_report.rs"]
mod tests;
