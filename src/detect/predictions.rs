use std::path::{Path, PathBuf};

use image::RgbImage;
use serde::Deserialize;

use crate::detect::{DetectError, Detection, Detector};

/// Parallel arrays exported from a detector run.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPredictions {
    pub boxes: Vec<[f32; 4]>,
    pub scores: Vec<f32>,
    pub labels: Vec<u32>,
}

impl RawPredictions {
    pub fn from_slice(path: &Path, bytes: &[u8]) -> Result<Self, DetectError> {
        serde_json::from_slice(bytes).map_err(|source| DetectError::Predictions {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn into_detections(self) -> Result<Vec<Detection>, DetectError> {
        let (b, s, l) = (self.boxes.len(), self.scores.len(), self.labels.len());
        if b != s || b != l {
            return Err(DetectError::Shape {
                boxes: b,
                scores: s,
                labels: l,
            });
        }
        Ok(self
            .boxes
            .into_iter()
            .zip(self.scores)
            .zip(self.labels)
            .map(|((bbox, score), label)| Detection { bbox, score, label })
            .collect())
    }
}

/// Serves predictions read from a JSON file instead of running a model.
#[derive(Debug, Clone)]
pub struct PrecomputedDetector {
    path: PathBuf,
}

impl PrecomputedDetector {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Detector for PrecomputedDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectError> {
        let bytes = std::fs::read(&self.path)?;
        let detections = RawPredictions::from_slice(&self.path, &bytes)?.into_detections()?;
        let (w, h) = image.dimensions();
        let outside = detections
            .iter()
            .filter(|d| d.bbox[0] > w as f32 || d.bbox[1] > h as f32)
            .count();
        if outside > 0 {
            tracing::warn!(outside, width = w, height = h, "predicted boxes start outside the image");
        }
        tracing::debug!(path = %self.path.display(), n = detections.len(), "loaded predictions");
        Ok(detections)
    }
}
