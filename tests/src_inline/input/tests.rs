use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::Compression;
use flate2::write::GzEncoder;

use super::*;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("belyntic_input_test_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_file(path: &Path, contents: &str) {
    let mut f = BufWriter::new(File::create(path).unwrap());
    f.write_all(contents.as_bytes()).unwrap();
}

fn write_gz(path: &Path, contents: &str) {
    let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    enc.write_all(contents.as_bytes()).unwrap();
    enc.finish().unwrap();
}

#[test]
fn test_discover_prefers_plain_tsv() {
    let dir = make_temp_dir();
    write_file(&dir.join("mhci_peptides_7.tsv"), "peptide\n");
    write_gz(&dir.join("mhci_peptides_7.tsv.gz"), "peptide\n");
    write_gz(&dir.join("antigenicity_peptides_7.tsv.gz"), "sequence\n");

    let files = TaxonomyFiles::discover(&dir, 7);
    assert_eq!(files.peptides, dir.join("mhci_peptides_7.tsv"));
    assert_eq!(files.antigenicity, dir.join("antigenicity_peptides_7.tsv.gz"));
    assert_eq!(files.proteins, dir.join("uniprot_protein_sequences_7.tsv"));
    assert_eq!(files.dir, dir);
}

#[test]
fn test_discover_uses_taxonomy_subdirectory() {
    let dir = make_temp_dir();
    let nested = dir.join("11");
    fs::create_dir_all(&nested).unwrap();
    let files = TaxonomyFiles::discover(&dir, 11);
    assert_eq!(files.dir, nested);
    assert_eq!(files.assays, nested.join("bvbrc_assay_results_11.tsv"));
}

#[test]
fn test_check_required_names_missing_table() {
    let dir = make_temp_dir();
    write_file(&dir.join("mhci_peptides_3.tsv"), "peptide\n");
    let files = TaxonomyFiles::discover(&dir, 3);
    let err = files.check_required().unwrap_err();
    assert!(matches!(err, InputError::MissingInput(_)));
    assert!(err.to_string().contains("uniprot_protein_sequences_3.tsv"));
}

#[test]
fn test_read_gz_table() {
    let dir = make_temp_dir();
    let path = dir.join("immunogenicity_peptides_1.tsv.gz");
    write_gz(&path, "peptide\timmunogenicity_score\nAAAA\t0.25\n");
    let table = Table::read(&path).unwrap();
    assert_eq!(table.name, "immunogenicity_peptides_1.tsv.gz");
    assert_eq!(table.rows, vec![vec!["AAAA".to_string(), "0.25".to_string()]]);
}

#[test]
fn test_read_missing_file_is_missing_input() {
    let dir = make_temp_dir();
    let err = Table::read(&dir.join("absent.tsv")).unwrap_err();
    assert!(matches!(err, InputError::MissingInput(_)));
}

#[test]
fn test_missing_column_error() {
    let table = Table::from_reader("p.tsv".to_string(), "peptide\n".as_bytes()).unwrap();
    let err = table.column_index("allele").unwrap_err();
    assert_eq!(err.to_string(), "p.tsv: required column 'allele' not found");
}

#[test]
fn test_rename_column() {
    let mut table =
        Table::from_reader("a.tsv".to_string(), "sequence\tantigen_score\n".as_bytes()).unwrap();
    table.rename_column("sequence", "peptide");
    assert_eq!(table.column_index("peptide").unwrap(), 0);
}
