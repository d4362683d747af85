use std::io::Write;
use std::str::FromStr;

use crate::model::scores::RankedTable;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FastaMode {
    /// `> {seq}` header followed by the sequence.
    #[default]
    Paired,
    /// One sequence per line, no headers.
    SingleLine,
    /// Same header for every record.
    SeqId(String),
}

impl FromStr for FastaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paired" => Ok(Self::Paired),
            "single-line" => Ok(Self::SingleLine),
            other => match other.strip_prefix("seq-id:") {
                Some(id) if !id.is_empty() => Ok(Self::SeqId(id.to_string())),
                _ => Err(format!(
                    "invalid FASTA mode '{other}' (use paired|single-line|seq-id:ID)"
                )),
            },
        }
    }
}

pub fn write_sequences<W: Write>(
    mut w: W,
    sequences: &[&str],
    mode: &FastaMode,
) -> std::io::Result<()> {
    for seq in sequences {
        match mode {
            FastaMode::SingleLine => writeln!(w, "{seq}")?,
            FastaMode::Paired => write!(w, "> {seq}\n{seq}\n")?,
            FastaMode::SeqId(id) => write!(w, "> {id}\n{seq}\n")?,
        }
    }
    w.flush()
}

/// Distinct peptides in rank order.
pub fn ranked_peptides(table: &RankedTable) -> Vec<&str> {
    let mut seen = std::collections::HashSet::new();
    table
        .rows
        .iter()
        .map(|r| r.row.hit.peptide.as_str())
        .filter(|p| seen.insert(*p))
        .collect()
}
