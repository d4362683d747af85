use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::input::InputError;

const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
];

pub fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell)
}

pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>, InputError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            InputError::MissingInput(format!("{} not found", path.display()))
        }
        _ => InputError::Io(e),
    })?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Header plus raw cell text of a tab-separated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self, InputError> {
        let reader = open_maybe_gz(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_reader(name, reader).map_err(|err| match err {
            InputError::Csv { source, .. } => InputError::Csv {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_reader<R: Read>(name: String, reader: R) -> Result<Self, InputError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);
        let wrap = |source| InputError::Csv {
            path: name.clone().into(),
            source,
        };

        let columns: Vec<String> = rdr
            .headers()
            .map_err(wrap)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(InputError::Parse(format!("{name}: header row is empty")));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(wrap)?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self {
            name,
            columns,
            rows,
        })
    }

    pub fn column_index(&self, column: &str) -> Result<usize, InputError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| InputError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        for column in &mut self.columns {
            if column == from {
                *column = to.to_string();
            }
        }
    }

    /// First `(row, column)` holding a missing value, scanning row-major.
    pub fn first_missing(&self) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(row, cells)| {
            cells
                .iter()
                .position(|cell| is_missing(cell))
                .map(|col| (row, col))
        })
    }

    /// Fails with a data-integrity error if any cell is missing.
    pub fn assert_complete(&self, stage: &'static str) -> Result<(), InputError> {
        match self.first_missing() {
            Some((row, col)) => Err(InputError::MissingValue {
                stage,
                table: self.name.clone(),
                column: self.columns[col].clone(),
                row: row + 1,
            }),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cell text, `None` when missing.
pub fn cell<'a>(row: &'a [String], idx: usize) -> Option<&'a str> {
    row.get(idx).map(String::as_str).filter(|s| !is_missing(s))
}

/// Parses a float cell; missing cells yield `Ok(None)`.
pub fn parse_f64_cell(
    table: &Table,
    row: usize,
    idx: usize,
) -> Result<Option<f64>, InputError> {
    let Some(text) = cell(&table.rows[row], idx) else {
        return Ok(None);
    };
    text.trim().parse::<f64>().map(Some).map_err(|_| {
        InputError::Parse(format!(
            "{}: column '{}' data row {} is not a number: '{}'",
            table.name,
            table.columns[idx],
            row + 1,
            text
        ))
    })
}
