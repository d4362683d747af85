use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::detect::{DetectError, Detection};

#[derive(Debug, Deserialize)]
struct ClassRecord {
    #[serde(rename = "Class ID")]
    id: String,
    #[serde(rename = "Class Name")]
    name: String,
}

/// Class map rows, indexed by the detector's label.
#[derive(Debug, Clone, Default)]
pub struct ClassMap {
    ids: Vec<String>,
    names: Vec<String>,
}

impl ClassMap {
    pub fn from_path(path: &Path) -> Result<Self, DetectError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file).map_err(|source| DetectError::ClassMap {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut map = Self::default();
        for record in rdr.deserialize() {
            let record: ClassRecord = record?;
            map.ids.push(record.id);
            map.names.push(record.name);
        }
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id_for(&self, label: u32) -> Option<&str> {
        self.ids.get(label as usize).map(String::as_str)
    }

    pub fn name_for(&self, label: u32) -> Option<&str> {
        self.names.get(label as usize).map(String::as_str)
    }
}

/// `"{class}-{score:.2}"`, falling back to the numeric label when the map
/// has no row for it.
pub fn label_text(det: &Detection, classes: Option<&ClassMap>, show_names: bool) -> String {
    let class = classes
        .and_then(|m| {
            if show_names {
                m.name_for(det.label)
            } else {
                m.id_for(det.label)
            }
        })
        .map(str::to_string)
        .unwrap_or_else(|| det.label.to_string());
    format!("{}-{:.2}", class, det.score)
}
