//! Bounding box operations and non-maximum suppression.
//!
//! Core abstraction for representing and collapsing detection candidates.

use serde::{Deserialize, Serialize};

/// A detection candidate: axis-aligned rectangle, match score and the
/// pattern identity that produced it. Plain value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub score: f64,
    pub pattern: String,
}

impl BBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32, score: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
            pattern: String::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Intersection over union with integer rectangle arithmetic. A union
    /// of zero or negative area yields 0 rather than a division error.
    pub fn iou(&self, other: &BBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = i64::from(x2 - x1) * i64::from(y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union <= 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    pub fn overlaps(&self, other: &BBox, threshold: f64) -> bool {
        self.iou(other) >= threshold
    }
}

/// Ordered collection of candidates with batch operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BBoxCollection {
    boxes: Vec<BBox>,
}

impl BBoxCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(boxes: Vec<BBox>) -> Self {
        Self { boxes }
    }

    pub fn push(&mut self, bbox: BBox) {
        self.boxes.push(bbox);
    }

    pub fn extend(&mut self, other: BBoxCollection) {
        self.boxes.extend(other.boxes);
    }

    pub fn as_slice(&self) -> &[BBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Stable sort, highest score first; equal scores keep insertion order.
    pub fn sort_by_score(&mut self) {
        self.boxes.sort_by(|a, b| b.score.total_cmp(&a.score));
    }

    /// Canonical deterministic ordering: score descending, then pattern
    /// name, then position. Parallel matching merges through this sort so
    /// downstream stages see an order-independent input.
    pub fn sort_canonical(&mut self) {
        self.boxes.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.pattern.cmp(&b.pattern))
                .then_with(|| (a.x, a.y).cmp(&(b.x, b.y)))
        });
    }

    pub fn filter_by_score(mut self, threshold: f64) -> Self {
        self.boxes.retain(|bbox| bbox.score >= threshold);
        self
    }

    /// Zero-area boxes are not valid NMS input.
    pub fn retain_positive_area(&mut self) {
        self.boxes.retain(|bbox| bbox.area() > 0);
    }

    /// Greedy non-maximum suppression: keep the highest-scoring remaining
    /// box, suppress every candidate overlapping it at or above the
    /// threshold, repeat. Applying it twice gives the same result as once.
    pub fn apply_nms(mut self, iou_threshold: f64) -> Self {
        if self.boxes.is_empty() {
            return self;
        }

        self.sort_by_score();

        let mut keep = Vec::new();
        let mut suppressed = vec![false; self.boxes.len()];

        for i in 0..self.boxes.len() {
            if suppressed[i] {
                continue;
            }

            keep.push(self.boxes[i].clone());

            for j in (i + 1)..self.boxes.len() {
                if !suppressed[j] && self.boxes[i].overlaps(&self.boxes[j], iou_threshold) {
                    suppressed[j] = true;
                }
            }
        }

        Self::from_vec(keep)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BBox> {
        self.boxes.iter()
    }
}

impl IntoIterator for BBoxCollection {
    type Item = BBox;
    type IntoIter = std::vec::IntoIter<BBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.into_iter()
    }
}

impl FromIterator<BBox> for BBoxCollection {
    fn from_iter<T: IntoIterator<Item = BBox>>(iter: T) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}
