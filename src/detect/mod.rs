//! Detector post-processing: confidence filter, class-agnostic NMS and
//! box rendering.

pub mod classes;
pub mod image_io;
pub mod nms;
pub mod predictions;
pub mod render;

use std::path::{Path, PathBuf};

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;

use classes::ClassMap;
use predictions::PrecomputedDetector;

pub const DEFAULT_CONF_THRESHOLD: f32 = 0.3;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{path}: cannot read image: {source}")]
    ImageRead {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("{path}: cannot write image: {source}")]
    ImageWrite {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("{path}: invalid predictions JSON: {source}")]
    Predictions {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("predictions shape mismatch: {boxes} boxes, {scores} scores, {labels} labels")]
    Shape {
        boxes: usize,
        scores: usize,
        labels: usize,
    },
    #[error("{path}: invalid class map: {source}")]
    ClassMap { path: PathBuf, source: csv::Error },
    #[error("{path}: invalid font file")]
    Font { path: PathBuf },
    #[error("failed to encode detections: {0}")]
    Json(#[from] serde_json::Error),
}

/// Box corners are `[x1, y1, x2, y2]` in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: [f32; 4],
    pub score: f32,
    pub label: u32,
}

pub trait Detector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectError>;
}

pub fn clamp_threshold(name: &'static str, value: f32) -> f32 {
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    if clamped != value {
        tracing::warn!(threshold = name, value, clamped, "threshold outside [0, 1]; clamped");
    }
    clamped
}

/// Confidence filter followed by NMS. Output is in descending score order.
pub fn postprocess(detections: Vec<Detection>, conf_threshold: f32, iou_threshold: f32) -> Vec<Detection> {
    let conf = clamp_threshold("conf_threshold", conf_threshold);
    let iou = clamp_threshold("iou_threshold", iou_threshold);
    let raw = detections.len();
    let kept = nms::filter_by_confidence(detections, conf);
    let confident = kept.len();
    let out = nms::non_max_suppression(kept, iou);
    tracing::info!(raw, confident, kept = out.len(), "post-processed detections");
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct LabeledDetection {
    #[serde(flatten)]
    pub detection: Detection,
    pub text: String,
}

pub fn label_detections(
    detections: &[Detection],
    classes: Option<&ClassMap>,
    show_names: bool,
) -> Vec<LabeledDetection> {
    detections
        .iter()
        .map(|d| LabeledDetection {
            detection: *d,
            text: classes::label_text(d, classes, show_names),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DetectRequest {
    pub image: PathBuf,
    pub predictions: PathBuf,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub classes: Option<PathBuf>,
    pub show_names: bool,
    pub font: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub detections_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectOutcome {
    pub detections: Vec<LabeledDetection>,
    pub image: Option<PathBuf>,
}

/// Runs the detector over the image and post-processes the raw output.
pub fn detect_image(
    image: &RgbImage,
    detector: &dyn Detector,
    conf_threshold: f32,
    iou_threshold: f32,
) -> Result<Vec<Detection>, DetectError> {
    let raw = detector.detect(image)?;
    Ok(postprocess(raw, conf_threshold, iou_threshold))
}

pub fn run_detection(request: &DetectRequest) -> Result<DetectOutcome, DetectError> {
    let image = image_io::load_rgb(&request.image)?;
    let detector = PrecomputedDetector::new(&request.predictions);
    let detections = detect_image(
        &image,
        &detector,
        request.conf_threshold,
        request.iou_threshold,
    )?;
    finish_detection(image, &detections, request)
}

/// Labels, renders and writes the outputs for already post-processed
/// detections.
pub fn finish_detection(
    mut image: RgbImage,
    detections: &[Detection],
    request: &DetectRequest,
) -> Result<DetectOutcome, DetectError> {
    let classes = request
        .classes
        .as_deref()
        .map(ClassMap::from_path)
        .transpose()?;
    let labeled = label_detections(detections, classes.as_ref(), request.show_names);

    let written = match &request.out {
        Some(out) => {
            let font = request.font.as_deref().map(render::load_font).transpose()?;
            if font.is_none() && !labeled.is_empty() {
                tracing::warn!("no font given; labels are written to the JSON sidecar only");
            }
            render::draw_detections(&mut image, &labeled, font.as_ref());
            image_io::save(&image, out)?;
            tracing::info!(path = %out.display(), boxes = labeled.len(), "wrote annotated image");
            Some(out.clone())
        }
        None => None,
    };

    if let Some(path) = &request.detections_json {
        write_detections_json(&labeled, path)?;
    }

    Ok(DetectOutcome {
        detections: labeled,
        image: written,
    })
}

pub fn write_detections_json(detections: &[LabeledDetection], path: &Path) -> Result<(), DetectError> {
    let mut text = serde_json::to_string_pretty(detections)?;
    text.push('\n');
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/detect/mod.rs"]
mod tests;
