//! Pipeline configuration.
//!
//! Every tunable the stages need arrives through this one structure; the
//! orchestrator threads validated values down and no stage reads global
//! state. Out-of-range values are rejected here, at ingestion, with a
//! descriptive error; they are never clamped mid-pipeline.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection of a configuration value at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("globalThreshold {0} outside [0.0, 0.99]")]
    GlobalThreshold(f64),
    #[error("iouThreshold {0} outside [0.0, 1.0]")]
    IouThreshold(f64),
    #[error("scale range [{min}, {max}] invalid (need 0.2 <= min <= max <= 4.0)")]
    ScaleRange { min: f64, max: f64 },
    #[error("scaleStride {0} outside [0.02, 0.5]")]
    ScaleStride(f64),
    #[error("temporalHalfLifeMs {0} below 1000")]
    HalfLife(u64),
    #[error("consensusSigma {0} outside [0.05, 1.0]")]
    ConsensusSigma(f64),
    #[error("targetFps {0} outside [4, 30]")]
    TargetFps(u32),
    #[error("roiMaxRegions {0} outside [1, 64]")]
    RoiMaxRegions(usize),
}

/// Detection-stage tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Detection {
    /// Minimum normalized match score a candidate must reach.
    pub global_threshold: f64,
    /// IoU at or above which NMS suppresses the lower-scoring box.
    pub iou_threshold: f64,
    pub scale_min: f64,
    pub scale_max: f64,
    pub scale_stride: f64,
    pub temporal_half_life_ms: u64,
    /// Weight floor for single-frame evidence in the temporal tracker.
    pub consensus_sigma: f64,
}

impl Default for Detection {
    fn default() -> Self {
        Self {
            global_threshold: 0.72,
            iou_threshold: 0.45,
            scale_min: 0.6,
            scale_max: 1.8,
            scale_stride: 0.15,
            temporal_half_life_ms: 7_000,
            consensus_sigma: 0.2,
        }
    }
}

/// Throughput tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Performance {
    pub target_fps: u32,
    pub roi_max_regions: usize,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            target_fps: 12,
            roi_max_regions: 8,
        }
    }
}

impl Performance {
    /// Soft per-frame budget derived from the target rate.
    pub fn frame_interval_ms(&self) -> u64 {
        1_000 / u64::from(self.target_fps.max(1))
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: Detection,
    pub performance: Performance,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detection;
        if !(0.0..=0.99).contains(&d.global_threshold) {
            return Err(ConfigError::GlobalThreshold(d.global_threshold));
        }
        if !(0.0..=1.0).contains(&d.iou_threshold) {
            return Err(ConfigError::IouThreshold(d.iou_threshold));
        }
        if d.scale_min < 0.2 || d.scale_max > 4.0 || d.scale_min > d.scale_max {
            return Err(ConfigError::ScaleRange {
                min: d.scale_min,
                max: d.scale_max,
            });
        }
        if !(0.02..=0.5).contains(&d.scale_stride) {
            return Err(ConfigError::ScaleStride(d.scale_stride));
        }
        if d.temporal_half_life_ms < 1_000 {
            return Err(ConfigError::HalfLife(d.temporal_half_life_ms));
        }
        if !(0.05..=1.0).contains(&d.consensus_sigma) {
            return Err(ConfigError::ConsensusSigma(d.consensus_sigma));
        }
        let p = &self.performance;
        if !(4..=30).contains(&p.target_fps) {
            return Err(ConfigError::TargetFps(p.target_fps));
        }
        if !(1..=64).contains(&p.roi_max_regions) {
            return Err(ConfigError::RoiMaxRegions(p.roi_max_regions));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(text).context("failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_iou_threshold_above_one() {
        let mut config = Config::default();
        config.detection.iou_threshold = 1.3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IouThreshold(_))
        ));
    }

    #[test]
    fn rejects_short_half_life() {
        let mut config = Config::default();
        config.detection.temporal_half_life_ms = 200;
        assert!(matches!(config.validate(), Err(ConfigError::HalfLife(200))));
    }

    #[test]
    fn rejects_inverted_scale_range() {
        let mut config = Config::default();
        config.detection.scale_min = 2.0;
        config.detection.scale_max = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ScaleRange { .. })
        ));
    }

    #[test]
    fn json_round_trip_preserves_values() {
        let mut config = Config::default();
        config.performance.target_fps = 24;
        let text = config.to_json_string().unwrap();
        let parsed = Config::from_json_str(&text).unwrap();
        assert_eq!(parsed.performance.target_fps, 24);
        assert_eq!(parsed.detection.global_threshold, 0.72);
    }

    #[test]
    fn from_json_rejects_out_of_range_values() {
        let text = r#"{ "performance": { "target_fps": 90 } }"#;
        assert!(Config::from_json_str(text).is_err());
    }
}
