//! Detection orchestration.

pub mod detector;

pub use detector::{DetectorStats, FusedPattern, PatternDetector};
