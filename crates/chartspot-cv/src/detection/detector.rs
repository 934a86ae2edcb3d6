//! Per-frame fusion pipeline.
//!
//! Control flow: delta gate -> ROI proposal -> multi-scale matching ->
//! NMS -> prior calibration -> temporal consensus -> fused output, with
//! the gate cache refreshed on every processed frame. Frames are handled
//! strictly in arrival order; `process` takes `&mut self` so tracker
//! decay always sees monotone timestamps.

use crate::Result;
use crate::bbox::BBox;
use crate::delta::DeltaGate;
use crate::frame::Frame;
use crate::roi::RoiProposer;
use crate::template::{TemplateLibrary, TemplateMatcher};
use crate::tracker::TemporalTracker;
use crate::traits::AuxiliaryScorer;
use anyhow::Context;
use chartspot_core::config::Config;
use chartspot_core::patterns::PatternCatalog;
use chartspot_core::timeframe;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Grid pitch for temporal identity buckets, in pixels. A pattern
/// drifting a few pixels keeps its accumulator; distinct instances on the
/// same chart get their own.
const SPATIAL_BUCKET_PX: i32 = 20;

/// Externally visible detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedPattern {
    pub pattern: String,
    /// Fused confidence in [0, 1]: instantaneous match strength blended
    /// with the temporal consensus weight.
    pub confidence: f64,
    pub bbox: BBox,
    pub timeframe: String,
    pub timestamp_ms: u64,
}

/// Observability counters. `pipeline_runs` counts cache misses, i.e.
/// frames that actually went through ROI proposal and matching.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DetectorStats {
    pub frames: u64,
    pub pipeline_runs: u64,
    pub deadline_overruns: u64,
    pub last_frame_ms: u64,
}

/// The single externally consumed entry point of the pipeline. Owns all
/// cross-frame state (gate, tracker); one detector per capture session.
pub struct PatternDetector {
    config: Config,
    catalog: PatternCatalog,
    library: TemplateLibrary,
    matcher: TemplateMatcher,
    tracker: TemporalTracker,
    gate: DeltaGate,
    aux: Option<Box<dyn AuxiliaryScorer>>,
    stats: DetectorStats,
}

impl PatternDetector {
    /// Build a detector. Fails on an invalid configuration; an empty
    /// library has already failed at `TemplateLibrary` construction.
    pub fn new(config: Config, library: TemplateLibrary) -> Result<Self> {
        config.validate()?;
        let matcher = TemplateMatcher::new(config.detection.clone());
        let tracker = TemporalTracker::new(
            config.detection.temporal_half_life_ms,
            config.detection.consensus_sigma,
        );
        Ok(Self {
            config,
            catalog: PatternCatalog::builtin(),
            library,
            matcher,
            tracker,
            gate: DeltaGate::new(),
            aux: None,
            stats: DetectorStats::default(),
        })
    }

    pub fn with_catalog(mut self, catalog: PatternCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_scorer(mut self, scorer: Box<dyn AuxiliaryScorer>) -> Self {
        self.aux = Some(scorer);
        self
    }

    /// Process one frame and return detections sorted by descending
    /// confidence. Unchanged frames short-circuit to the cached result;
    /// malformed frames produce an empty result, never an error that
    /// poisons the session.
    pub fn process(&mut self, frame: &Frame) -> Result<Vec<FusedPattern>> {
        let started = Instant::now();
        self.stats.frames += 1;

        if !self.gate.should_process(frame) {
            if let Some(cached) = self.gate.cached() {
                debug!(count = cached.len(), "frame unchanged, returning cached detections");
                return Ok(cached.to_vec());
            }
        }
        self.stats.pipeline_runs += 1;

        let deadline =
            Instant::now() + Duration::from_millis(self.config.performance.frame_interval_ms());
        let rois = RoiProposer::propose(frame.gray(), self.config.performance.roi_max_regions);
        let outcome = self.matcher.match_rois(
            frame.gray(),
            &rois,
            &self.library,
            Some(deadline),
            self.aux.as_deref(),
        );
        if outcome.truncated {
            self.stats.deadline_overruns += 1;
        }

        let kept = outcome
            .candidates
            .apply_nms(self.config.detection.iou_threshold);

        let estimate = timeframe::estimate_from_dimensions(frame.width(), frame.height());
        let now = frame.timestamp_ms();

        let mut fused = Vec::with_capacity(kept.len());
        for bbox in kept {
            let calibrated = calibrate(bbox.score, self.catalog.prior_for(&bbox.pattern));
            let smoothed = self.tracker.update(&spatial_key(&bbox), calibrated, now);
            let confidence = (0.5 * calibrated + 0.5 * smoothed).clamp(0.0, 1.0);
            fused.push(FusedPattern {
                pattern: bbox.pattern.clone(),
                confidence,
                bbox,
                timeframe: estimate.timeframe.label().to_string(),
                timestamp_ms: now,
            });
        }
        fused.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        self.gate.update_cache(fused.clone());
        self.stats.last_frame_ms = started.elapsed().as_millis() as u64;
        debug!(
            count = fused.len(),
            elapsed_ms = self.stats.last_frame_ms,
            "frame processed"
        );
        Ok(fused)
    }

    /// Drop all cross-frame state. Used when the capture source changes.
    pub fn reset(&mut self) {
        self.gate.reset();
        self.tracker.clear();
    }

    pub fn stats(&self) -> &DetectorStats {
        &self.stats
    }

    pub fn cache_hit_rate(&self) -> f64 {
        self.gate.hit_rate()
    }

    pub fn export_json(detections: &[FusedPattern]) -> Result<String> {
        serde_json::to_string_pretty(detections).context("failed to serialize detections")
    }
}

/// Posterior-odds calibration of a raw score against the pattern prior.
fn calibrate(score: f64, prior: f64) -> f64 {
    let numerator = score * prior;
    let denominator = numerator + (1.0 - prior);
    if denominator <= f64::EPSILON {
        0.0
    } else {
        (numerator / denominator).clamp(0.0, 1.0)
    }
}

/// Temporal identity: pattern name plus a coarse spatial bucket of the
/// box center.
fn spatial_key(bbox: &BBox) -> String {
    let (cx, cy) = bbox.center();
    let gx = cx.div_euclid(SPATIAL_BUCKET_PX) * SPATIAL_BUCKET_PX;
    let gy = cy.div_euclid(SPATIAL_BUCKET_PX) * SPATIAL_BUCKET_PX;
    format!("{}-{}-{}", bbox.pattern, gx, gy)
}
