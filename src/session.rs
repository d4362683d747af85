//! Line-oriented request loop. Each stdin line is one JSON request, each
//! response is one JSON line on stdout. Recomputed results are memoized by
//! content hash with a short time-to-live.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::alleles::{SplitError, split_allele_file};
use crate::detect::predictions::PrecomputedDetector;
use crate::detect::{
    DEFAULT_CONF_THRESHOLD, DEFAULT_IOU_THRESHOLD, DetectError, DetectRequest, Detection,
    clamp_threshold, detect_image, finish_detection, image_io,
};
use crate::input::{InputError, TaxonomyFiles};
use crate::memo::MemoCache;
use crate::memo::fingerprint::Fingerprint;
use crate::model::weights::{RankWeights, RankWeightsPatch, WeightProfile};
use crate::pipeline::stage1_master::{Stage1Output, Stage1Params, run_stage1};
use crate::pipeline::stage3_assays::AssayMode;
use crate::pipeline::stage4_report::{ReportOptions, write_reports};
use crate::pipeline::{RankingRequest, rank_from_master};
use crate::report::ReportError;

pub const DEFAULT_SUMMARY_TOP: usize = 10;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid request: {0}")]
    Request(#[from] serde_json::Error),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Rank(RankOp),
    Detect(DetectOp),
    SplitAlleles(SplitOp),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankOp {
    pub taxonomy_id: u64,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub profile: WeightProfile,
    #[serde(default)]
    pub weights: RankWeightsPatch,
    #[serde(default)]
    pub assays: AssayMode,
    #[serde(default)]
    pub strict_joins: bool,
    #[serde(default)]
    pub top: Option<usize>,
    /// When set, the report files are written here as well.
    #[serde(default)]
    pub out: Option<PathBuf>,
}

fn default_conf() -> f32 {
    DEFAULT_CONF_THRESHOLD
}

fn default_iou() -> f32 {
    DEFAULT_IOU_THRESHOLD
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectOp {
    pub image: PathBuf,
    pub predictions: PathBuf,
    #[serde(default = "default_conf")]
    pub conf_threshold: f32,
    #[serde(default = "default_iou")]
    pub iou_threshold: f32,
    #[serde(default)]
    pub class_names: Option<PathBuf>,
    #[serde(default)]
    pub show_names: bool,
    #[serde(default)]
    pub font: Option<PathBuf>,
    #[serde(default)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitOp {
    pub allele_file: PathBuf,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub data_dir: PathBuf,
    pub ttl: Duration,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub requests: usize,
    pub failed: usize,
}

pub struct Session {
    data_dir: PathBuf,
    masters: MemoCache<u64, Arc<Stage1Output>>,
    detections: MemoCache<u64, Arc<Vec<Detection>>>,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            masters: MemoCache::new(config.ttl, config.max_entries),
            detections: MemoCache::new(config.ttl, config.max_entries),
        }
    }

    /// Handles one request line. Failures become `{"ok": false}` responses.
    pub fn handle_line(&mut self, line: &str) -> Value {
        match self.dispatch(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "session request failed");
                json!({ "ok": false, "error": e.to_string() })
            }
        }
    }

    fn dispatch(&mut self, line: &str) -> Result<Value, SessionError> {
        match serde_json::from_str::<Request>(line)? {
            Request::Rank(op) => self.rank(&op),
            Request::Detect(op) => self.detect(&op),
            Request::SplitAlleles(op) => {
                let outcome = split_allele_file(&op.allele_file, &op.out_dir)?;
                Ok(json!({ "ok": true, "op": "split_alleles", "result": outcome }))
            }
        }
    }

    fn rank(&mut self, op: &RankOp) -> Result<Value, SessionError> {
        let data_dir = op.data_dir.as_deref().unwrap_or(&self.data_dir);
        let files = TaxonomyFiles::discover(data_dir, op.taxonomy_id);
        files.check_required()?;

        let mut weights = RankWeights::for_profile(op.profile);
        op.weights.apply(&mut weights);
        let request = RankingRequest {
            files,
            profile: op.profile,
            weights,
            assay_mode: op.assays,
            stage1: Stage1Params {
                strict_joins: op.strict_joins,
            },
            summary_top: op.top.unwrap_or(DEFAULT_SUMMARY_TOP),
        };

        let key = master_key(&request.files, &request.stage1)?;
        let mut cached = true;
        let stage1 = self.masters.get_or_try_insert_with(key, || {
            cached = false;
            run_stage1(&request.files, &request.stage1).map(Arc::new)
        })?;
        tracing::debug!(key, cached, "master list");

        let run = rank_from_master(&stage1, &request)?;
        let written = match &op.out {
            Some(out) => Some(write_reports(
                &run.table,
                &run.summary,
                out,
                &ReportOptions::default(),
            )?),
            None => None,
        };

        Ok(json!({
            "ok": true,
            "op": "rank",
            "cached": cached,
            "summary": run.summary,
            "ranked_tsv": written.map(|w| w.ranked),
        }))
    }

    fn detect(&mut self, op: &DetectOp) -> Result<Value, SessionError> {
        let conf = clamp_threshold("conf_threshold", op.conf_threshold);
        let iou = clamp_threshold("iou_threshold", op.iou_threshold);
        let image = image_io::load_rgb(&op.image)?;

        let key = detection_key(&op.image, &op.predictions, conf, iou)?;
        let mut cached = true;
        let detections = self.detections.get_or_try_insert_with(key, || {
            cached = false;
            let detector = PrecomputedDetector::new(&op.predictions);
            detect_image(&image, &detector, conf, iou).map(Arc::new)
        })?;

        let request = DetectRequest {
            image: op.image.clone(),
            predictions: op.predictions.clone(),
            conf_threshold: conf,
            iou_threshold: iou,
            classes: op.class_names.clone(),
            show_names: op.show_names,
            font: op.font.clone(),
            out: op.out.clone(),
            detections_json: None,
        };
        let outcome = finish_detection(image, &detections, &request)?;
        Ok(json!({
            "ok": true,
            "op": "detect",
            "cached": cached,
            "detections": outcome.detections,
            "image": outcome.image,
        }))
    }
}

/// Content hash of the four source tables, the taxonomy id and join mode.
pub fn master_key(files: &TaxonomyFiles, params: &Stage1Params) -> std::io::Result<u64> {
    let mut fp = Fingerprint::new("master");
    fp.push_u64(files.taxonomy_id).push_bool(params.strict_joins);
    for path in files.required() {
        fp.push_file(path)?;
    }
    Ok(fp.finish())
}

pub fn detection_key(image: &Path, predictions: &Path, conf: f32, iou: f32) -> std::io::Result<u64> {
    let mut fp = Fingerprint::new("detect");
    fp.push_file(image)?;
    fp.push_file(predictions)?;
    fp.push_f32(conf).push_f32(iou);
    Ok(fp.finish())
}

/// Serves requests until EOF. Blank lines are skipped.
pub fn run_session<R: BufRead, W: Write>(
    session: &mut Session,
    input: R,
    mut output: W,
) -> Result<SessionStats, SessionError> {
    let mut stats = SessionStats::default();
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = session.handle_line(&line);
        stats.requests += 1;
        if response["ok"] != Value::Bool(true) {
            stats.failed += 1;
        }
        serde_json::to_writer(&mut output, &response).map_err(std::io::Error::from)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    tracing::info!(requests = stats.requests, failed = stats.failed, "session closed");
    Ok(stats)
}

#[cfg(test)]
#[path = "../tests/src_inline/session.rs"]
mod tests;
