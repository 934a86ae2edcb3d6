//! Frame input type.

use crate::Result;
use anyhow::{anyhow, bail};
use image::{GrayImage, RgbImage, imageops};

/// A single captured frame: grayscale pixels plus the capture timestamp in
/// milliseconds. Timestamps come from the capture source, not the wall
/// clock, so replayed sequences stay deterministic. Never mutated after
/// construction.
#[derive(Debug, Clone)]
pub struct Frame {
    gray: GrayImage,
    timestamp_ms: u64,
}

impl Frame {
    pub fn from_gray(gray: GrayImage, timestamp_ms: u64) -> Self {
        Self { gray, timestamp_ms }
    }

    pub fn from_rgb(rgb: &RgbImage, timestamp_ms: u64) -> Self {
        Self {
            gray: imageops::grayscale(rgb),
            timestamp_ms,
        }
    }

    /// Build from a raw luma buffer, rejecting size mismatches.
    pub fn from_raw_luma(data: Vec<u8>, width: u32, height: u32, timestamp_ms: u64) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            bail!(
                "luma buffer length {} does not match {}x{} frame",
                data.len(),
                width,
                height
            );
        }
        let gray = GrayImage::from_raw(width, height, data)
            .ok_or_else(|| anyhow!("failed to build {}x{} frame buffer", width, height))?;
        Ok(Self { gray, timestamp_ms })
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn is_empty(&self) -> bool {
        self.gray.width() == 0 || self.gray.height() == 0
    }
}
