//! Chartspot computer vision pipeline.
//!
//! Streaming chart-pattern detection over grayscale frames: delta frame
//! gating, region-of-interest proposal, multi-scale template matching,
//! non-maximum suppression and temporal consensus fusion.

pub mod bbox;
pub mod delta;
pub mod detection;
pub mod frame;
pub mod roi;
pub mod scale;
pub mod scorer;
pub mod template;
pub mod tracker;

// Re-export commonly used types
pub use bbox::{BBox, BBoxCollection};
pub use delta::DeltaGate;
pub use detection::{DetectorStats, FusedPattern, PatternDetector};
pub use frame::Frame;
pub use roi::{Roi, RoiProposer};
pub use template::{Template, TemplateLibrary, TemplateLoader, TemplateMatcher};
pub use tracker::TemporalTracker;

// Error handling
pub type Result<T> = anyhow::Result<T>;

/// Core traits for the detection pipeline.
pub mod traits {
    use crate::bbox::BBox;
    use image::GrayImage;

    /// Optional auxiliary signal the matcher consults for candidate boxes,
    /// e.g. an on-device classifier keyed on structural chart features.
    /// `None` means the scorer has no opinion and the candidate passes
    /// through unchanged; the matcher combines a returned score within a
    /// bounded factor, so this is never a hard gate.
    pub trait AuxiliaryScorer: Send + Sync {
        fn score(&self, frame: &GrayImage, candidate: &BBox) -> Option<f64>;
        fn name(&self) -> &str;
    }
}
