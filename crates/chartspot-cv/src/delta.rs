//! Delta frame gate.
//!
//! Skips the full pipeline when the chart has not meaningfully changed,
//! letting the caller reuse the cached detections. Change detection is a
//! 64-bit average hash over an 8x8 downsample compared by Hamming
//! distance. Static charts reduce to a hash comparison per frame.

use crate::detection::FusedPattern;
use crate::frame::Frame;
use image::GrayImage;
use tracing::{debug, trace};

const HASH_GRID: u32 = 8;
/// More than this many differing hash bits counts as a changed frame.
const HAMMING_THRESHOLD: u32 = 5;

/// Per-session gate state. Independent capture sessions own independent
/// gates; nothing here is shared or persisted.
#[derive(Debug, Default)]
pub struct DeltaGate {
    previous_hash: u64,
    cached: Option<Vec<FusedPattern>>,
    cache_hits: u64,
    total_frames: u64,
}

impl DeltaGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the frame changed enough to require the full
    /// pipeline. Deterministic: identical byte-for-byte frames always
    /// compare unchanged. The hash is updated even for degenerate frames
    /// so a bad source does not force repeated reprocessing.
    pub fn should_process(&mut self, frame: &Frame) -> bool {
        self.total_frames += 1;

        let hash = perceptual_hash(frame.gray());
        let distance = (self.previous_hash ^ hash).count_ones();
        let changed = distance > HAMMING_THRESHOLD;

        if changed {
            self.previous_hash = hash;
            self.cached = None;
            trace!(distance, "frame changed, processing required");
        } else {
            self.cache_hits += 1;
            trace!(distance, hit_rate = self.hit_rate(), "frame unchanged, cache reusable");
        }

        changed
    }

    /// Detections from the last processed frame, if still valid.
    pub fn cached(&self) -> Option<&[FusedPattern]> {
        self.cached.as_deref()
    }

    pub fn update_cache(&mut self, detections: Vec<FusedPattern>) {
        self.cached = Some(detections);
    }

    /// Clear all state (hash, cache, counters). Used when switching input
    /// sources.
    pub fn reset(&mut self) {
        *self = Self::default();
        debug!("delta gate reset");
    }

    pub fn hit_rate(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_frames as f64
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }
}

/// 64-bit average hash: integer 8x8 average-pool, bit i set where cell i
/// exceeds the grid mean. Degenerate frames hash to 0.
fn perceptual_hash(gray: &GrayImage) -> u64 {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return 0;
    }

    let mut cells = [0u64; 64];
    for cy in 0..HASH_GRID {
        for cx in 0..HASH_GRID {
            let x0 = cx * width / HASH_GRID;
            let x1 = ((cx + 1) * width / HASH_GRID).max(x0 + 1).min(width);
            let y0 = cy * height / HASH_GRID;
            let y1 = ((cy + 1) * height / HASH_GRID).max(y0 + 1).min(height);

            let mut sum = 0u64;
            let mut count = 0u64;
            for y in y0..y1 {
                for x in x0..x1 {
                    sum += u64::from(gray.get_pixel(x, y).0[0]);
                    count += 1;
                }
            }
            if count > 0 {
                cells[(cy * HASH_GRID + cx) as usize] = sum / count;
            }
        }
    }

    let mean = cells.iter().sum::<u64>() / 64;
    let mut hash = 0u64;
    for (i, &cell) in cells.iter().enumerate() {
        if cell > mean {
            hash |= 1 << i;
        }
    }
    hash
}
