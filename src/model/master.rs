pub const ALLELE_COUNT_COLUMN: &str = "Number of Binding Alleles";

/// One row of the MHC-I peptide table.
#[derive(Debug, Clone, PartialEq)]
pub struct PeptideHit {
    pub peptide: String,
    pub allele: String,
    pub protein_id: String,
    pub mhcflurry_aff: f64,
    pub iedb_aff: f64,
    pub mhcflurry_processing_score: f64,
    /// Cells of the peptide table's remaining columns, in header order.
    pub extras: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    pub hit: PeptideHit,
    pub binding_alleles: u32,
    pub protein_sequence: String,
    pub immunogenicity_score: f64,
    pub antigen_score: f64,
    pub antigen_extras: Vec<String>,
}

/// Denormalized per-taxonomy table: peptide hits joined with protein
/// sequences, immunogenicity and antigenicity scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterList {
    pub taxonomy_id: u64,
    pub peptide_extra_columns: Vec<String>,
    pub antigen_extra_columns: Vec<String>,
    pub rows: Vec<MasterRow>,
}

impl MasterList {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in output order, excluding derived score columns.
    pub fn columns(&self) -> Vec<String> {
        let mut out: Vec<String> = [
            "peptide",
            "allele",
            "protein_id",
            "mhcflurry_aff",
            "iedb_aff",
            "mhcflurry_processing_score",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        out.extend(self.peptide_extra_columns.iter().cloned());
        out.push(ALLELE_COUNT_COLUMN.to_string());
        out.push("protein_sequence".to_string());
        out.push("immunogenicity_score".to_string());
        out.push("antigen_score".to_string());
        out.extend(self.antigen_extra_columns.iter().cloned());
        out
    }
}

/// Row counts around one join step.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct JoinAudit {
    pub stage: &'static str,
    pub table: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub unmatched: usize,
}
