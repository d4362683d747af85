//! Allele specification files are fed to binding predictors in small
//! batches: long files are cut into fixed-size line chunks, short ones are
//! copied through unchanged.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub const SPLIT_ABOVE_LINES: usize = 8;
pub const CHUNK_LINES: usize = 4;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0} has no file name")]
    NoFileName(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SplitError + '_ {
    move |source| SplitError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "paths", rename_all = "snake_case")]
pub enum SplitOutcome {
    Copied(PathBuf),
    Split(Vec<PathBuf>),
}

impl SplitOutcome {
    pub fn paths(&self) -> Vec<PathBuf> {
        match self {
            Self::Copied(p) => vec![p.clone()],
            Self::Split(ps) => ps.clone(),
        }
    }
}

/// Lines with their terminators; a final unterminated line still counts.
pub fn lines_inclusive(bytes: &[u8]) -> Vec<&[u8]> {
    bytes
        .split_inclusive(|&b| b == b'\n')
        .collect()
}

/// `fs::copy` onto the source truncates it before reading.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

pub fn split_allele_file(allele_file: &Path, out_dir: &Path) -> Result<SplitOutcome, SplitError> {
    fs::create_dir_all(out_dir).map_err(io_err(out_dir))?;
    let bytes = fs::read(allele_file).map_err(io_err(allele_file))?;
    let lines = lines_inclusive(&bytes);

    let file_name = allele_file
        .file_name()
        .ok_or_else(|| SplitError::NoFileName(allele_file.to_path_buf()))?;

    if lines.len() <= SPLIT_ABOVE_LINES {
        let dest = out_dir.join(file_name);
        if same_file(allele_file, &dest) {
            tracing::info!(dest = %dest.display(), "allele file already in output directory");
            return Ok(SplitOutcome::Copied(dest));
        }
        fs::copy(allele_file, &dest).map_err(io_err(&dest))?;
        tracing::info!(lines = lines.len(), dest = %dest.display(), "copied allele file");
        return Ok(SplitOutcome::Copied(dest));
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut chunks = Vec::new();
    for (i, chunk) in lines.chunks(CHUNK_LINES).enumerate() {
        let dest = out_dir.join(format!("{stem}_{}{ext}", i + 1));
        fs::write(&dest, chunk.concat()).map_err(io_err(&dest))?;
        chunks.push(dest);
    }
    tracing::info!(
        lines = lines.len(),
        chunks = chunks.len(),
        out_dir = %out_dir.display(),
        "split allele file"
    );
    Ok(SplitOutcome::Split(chunks))
}
