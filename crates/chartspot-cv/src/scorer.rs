//! Auxiliary candidate scoring.
//!
//! The matcher consults an optional [`AuxiliaryScorer`]; this module
//! provides a lightweight structural heuristic: vertical stroke density,
//! which is high inside candlestick regions and low over axis labels and
//! empty chart margins.

use crate::bbox::BBox;
use crate::traits::AuxiliaryScorer;
use image::GrayImage;

/// Minimum horizontal intensity step that counts as a stroke edge.
const EDGE_DELTA: i16 = 24;
/// Edge ratio at which the signal saturates to 1.0.
const SATURATION_RATIO: f64 = 0.25;

/// Scores candidates by the density of vertical strokes inside the box.
#[derive(Debug, Default)]
pub struct EdgeDensityScorer;

impl AuxiliaryScorer for EdgeDensityScorer {
    fn score(&self, frame: &GrayImage, candidate: &BBox) -> Option<f64> {
        let (fw, fh) = frame.dimensions();
        if fw < 2 || fh == 0 || candidate.width <= 1 || candidate.height <= 0 {
            return None;
        }

        let x0 = candidate.x.clamp(0, fw as i32 - 1) as u32;
        let y0 = candidate.y.clamp(0, fh as i32 - 1) as u32;
        let x1 = (candidate.x + candidate.width).clamp(1, fw as i32) as u32;
        let y1 = (candidate.y + candidate.height).clamp(1, fh as i32) as u32;
        if x1 <= x0 + 1 || y1 <= y0 {
            return None;
        }

        let mut edges = 0u64;
        let mut total = 0u64;
        for y in y0..y1 {
            for x in x0..x1 - 1 {
                let here = i16::from(frame.get_pixel(x, y).0[0]);
                let right = i16::from(frame.get_pixel(x + 1, y).0[0]);
                if (right - here).abs() >= EDGE_DELTA {
                    edges += 1;
                }
                total += 1;
            }
        }
        if total == 0 {
            return None;
        }

        let ratio = edges as f64 / total as f64;
        Some((ratio / SATURATION_RATIO).min(1.0))
    }

    fn name(&self) -> &str {
        "edge-density"
    }
}
