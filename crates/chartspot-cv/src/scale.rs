//! Deterministic multi-scale ladder for template matching.
//!
//! Timeframes change apparent candle width and pattern geometry on screen;
//! to stay timeframe-agnostic the matcher searches a bounded set of scales.

use chartspot_core::config::Detection;
use image::{GrayImage, imageops};

pub struct ScaleSpace;

impl ScaleSpace {
    /// Geometric ladder `[scale_min..scale_max]` with fixed stride. Each
    /// value is quantized to two decimals so the ladder is identical
    /// across runs and platforms.
    pub fn scales(cfg: &Detection) -> Vec<f64> {
        let mut list = Vec::new();
        let mut s = cfg.scale_min;
        while s <= cfg.scale_max + 1e-9 {
            list.push((s * 100.0).round() / 100.0);
            s += cfg.scale_stride;
        }
        list
    }

    /// Resize keeping a minimum side of 8 px.
    pub fn resize_for_scale(src: &GrayImage, scale: f64) -> GrayImage {
        let width = ((f64::from(src.width()) * scale) as u32).max(8);
        let height = ((f64::from(src.height()) * scale) as u32).max(8);
        if (width, height) == src.dimensions() {
            return src.clone();
        }
        imageops::resize(src, width, height, imageops::FilterType::Triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ladder_is_quantized() {
        let cfg = Detection::default();
        let scales = ScaleSpace::scales(&cfg);
        assert_eq!(scales.first(), Some(&0.6));
        assert_eq!(scales.last(), Some(&1.8));
        assert_eq!(scales.len(), 9);
        for s in &scales {
            assert_eq!((s * 100.0).round() / 100.0, *s);
        }
    }

    #[test]
    fn degenerate_range_yields_single_scale() {
        let cfg = Detection {
            scale_min: 1.0,
            scale_max: 1.0,
            ..Detection::default()
        };
        assert_eq!(ScaleSpace::scales(&cfg), vec![1.0]);
    }

    #[test]
    fn resize_enforces_minimum_side() {
        let img = GrayImage::new(10, 10);
        let scaled = ScaleSpace::resize_for_scale(&img, 0.2);
        assert_eq!(scaled.dimensions(), (8, 8));
    }

    #[test]
    fn unit_scale_is_identity() {
        let img = GrayImage::from_pixel(24, 16, image::Luma([77u8]));
        let scaled = ScaleSpace::resize_for_scale(&img, 1.0);
        assert_eq!(scaled.as_raw(), img.as_raw());
    }
}
