//! Deterministic region-of-interest proposal.
//!
//! Filters large charts down to high-gradient areas before template
//! matching. No randomness; fixed thresholds and stable ordering.

use image::GrayImage;

/// Rectangles with either side below this are discarded as noise.
const MIN_SIDE: u32 = 20;

/// Candidate region: bounding rectangle plus a score derived from the
/// gradient contour area. Not yet a pattern detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f64,
}

pub struct RoiProposer;

impl RoiProposer {
    /// Propose up to `max_rois` regions, highest gradient-area score first.
    /// Ties keep the order regions were discovered in (row-major scan).
    /// Degenerate input yields an empty list.
    pub fn propose(gray: &GrayImage, max_rois: usize) -> Vec<Roi> {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 || max_rois == 0 {
            return Vec::new();
        }

        let magnitude = gradient_magnitude(gray);
        let Some(mask) = normalize(&magnitude) else {
            return Vec::new();
        };

        let mut rois = components(&mask, width as usize, height as usize);
        rois.sort_by(|a, b| b.score.total_cmp(&a.score));
        rois.truncate(max_rois);
        rois
    }
}

/// Sobel gradient magnitude; border pixels are left at zero.
fn gradient_magnitude(gray: &GrayImage) -> Vec<f32> {
    let (width, height) = gray.dimensions();
    let w = width as usize;
    let h = height as usize;
    let pixels = gray.as_raw();
    let mut magnitude = vec![0.0f32; w * h];

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let p = |dx: isize, dy: isize| -> i32 {
                let xi = (x as isize + dx) as usize;
                let yi = (y as isize + dy) as usize;
                i32::from(pixels[yi * w + xi])
            };
            let gx = -p(-1, -1) - 2 * p(-1, 0) - p(-1, 1) + p(1, -1) + 2 * p(1, 0) + p(1, 1);
            let gy = -p(-1, -1) - 2 * p(0, -1) - p(1, -1) + p(-1, 1) + 2 * p(0, 1) + p(1, 1);
            magnitude[y * w + x] = ((gx * gx + gy * gy) as f32).sqrt();
        }
    }

    magnitude
}

/// Min-max normalize to 0..255. Returns None for a flat map (no gradient
/// anywhere, nothing to propose).
fn normalize(magnitude: &[f32]) -> Option<Vec<u8>> {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in magnitude {
        min = min.min(v);
        max = max.max(v);
    }
    if !(max > min) {
        return None;
    }
    let range = max - min;
    Some(
        magnitude
            .iter()
            .map(|&v| ((v - min) / range * 255.0) as u8)
            .collect(),
    )
}

/// Bounding rectangles of 8-connected nonzero components, discovered in
/// row-major order, filtered by minimum side and scored by area.
fn components(mask: &[u8], w: usize, h: usize) -> Vec<Roi> {
    let mut visited = vec![false; w * h];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut rois = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if visited[idx] || mask[idx] == 0 {
                continue;
            }

            visited[idx] = true;
            stack.push((x, y));
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);

            while let Some((cx, cy)) = stack.pop() {
                min_x = min_x.min(cx);
                min_y = min_y.min(cy);
                max_x = max_x.max(cx);
                max_y = max_y.max(cy);

                for dy in -1isize..=1 {
                    for dx in -1isize..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = cx as isize + dx;
                        let ny = cy as isize + dy;
                        if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                            continue;
                        }
                        let nidx = ny as usize * w + nx as usize;
                        if !visited[nidx] && mask[nidx] > 0 {
                            visited[nidx] = true;
                            stack.push((nx as usize, ny as usize));
                        }
                    }
                }
            }

            let bw = (max_x - min_x + 1) as u32;
            let bh = (max_y - min_y + 1) as u32;
            if bw < MIN_SIDE || bh < MIN_SIDE {
                continue;
            }
            rois.push(Roi {
                x: min_x as u32,
                y: min_y as u32,
                width: bw,
                height: bh,
                score: f64::from(bw) * f64::from(bh),
            });
        }
    }

    rois
}
