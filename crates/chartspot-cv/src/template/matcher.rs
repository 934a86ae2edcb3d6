//! Multi-scale template matching over proposed regions.
//!
//! Scores are zero-mean normalized cross-correlation in [-1, 1]; the
//! best scale per (region, template) pair survives. This is the dominant
//! cost center, so the matcher honors a soft deadline and truncates
//! remaining work instead of blocking past the frame interval.

use super::{Template, TemplateLibrary};
use crate::bbox::{BBox, BBoxCollection};
use crate::roi::Roi;
use crate::scale::ScaleSpace;
use crate::traits::AuxiliaryScorer;
use chartspot_core::config::Detection;
use image::{GrayImage, imageops};
use std::time::Instant;
use tracing::warn;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Result of one matcher pass over a frame's regions.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub candidates: BBoxCollection,
    /// True when the soft deadline cut evaluation short; the candidates
    /// present are still valid, later regions/templates were skipped.
    pub truncated: bool,
}

pub struct TemplateMatcher {
    config: Detection,
    scales: Vec<f64>,
}

impl TemplateMatcher {
    pub fn new(config: Detection) -> Self {
        let scales = ScaleSpace::scales(&config);
        Self { config, scales }
    }

    /// Evaluate every (region, template) pair, keeping the best scale for
    /// each. Output ordering is canonical (score, pattern, position) so it
    /// does not depend on evaluation or completion order.
    pub fn match_rois(
        &self,
        frame: &GrayImage,
        rois: &[Roi],
        library: &TemplateLibrary,
        deadline: Option<Instant>,
        aux: Option<&dyn AuxiliaryScorer>,
    ) -> MatchOutcome {
        let mut candidates = BBoxCollection::new();
        let mut truncated = false;

        for roi in rois {
            if deadline_passed(deadline) {
                truncated = true;
                break;
            }
            candidates.extend(self.match_roi(frame, roi, library, deadline, &mut truncated));
        }

        if truncated {
            warn!("matcher deadline overrun, emitting partial results");
        }

        if let Some(aux) = aux {
            candidates = apply_aux(frame, candidates, aux);
        }

        candidates.retain_positive_area();
        candidates.sort_canonical();

        MatchOutcome {
            candidates,
            truncated,
        }
    }

    fn match_roi(
        &self,
        frame: &GrayImage,
        roi: &Roi,
        library: &TemplateLibrary,
        _deadline: Option<Instant>,
        _truncated: &mut bool,
    ) -> BBoxCollection {
        // With the parallel feature, templates for one region run on the
        // rayon pool and the deadline is only observed between regions;
        // collect() preserves template order, keeping the merge stable.
        #[cfg(feature = "parallel")]
        let results: Vec<Option<BBox>> = library
            .templates()
            .par_iter()
            .map(|template| self.best_match(frame, roi, template))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let results: Vec<Option<BBox>> = {
            let mut acc = Vec::with_capacity(library.len());
            for template in library.templates() {
                if deadline_passed(_deadline) {
                    *_truncated = true;
                    break;
                }
                acc.push(self.best_match(frame, roi, template));
            }
            acc
        };

        results.into_iter().flatten().collect()
    }

    /// Best-scoring scale for one (region, template) pair, or None when
    /// nothing reaches the threshold. Scale ties keep the earlier rung.
    fn best_match(&self, frame: &GrayImage, roi: &Roi, template: &Template) -> Option<BBox> {
        let threshold = template.threshold.unwrap_or(self.config.global_threshold);
        let mut best: Option<(f64, u32, u32, u32, u32)> = None;

        for &scale in &self.scales {
            let scaled = ScaleSpace::resize_for_scale(&template.image, scale);
            let (tw, th) = scaled.dimensions();
            let Some((px, py, patch)) = padded_patch(frame, roi, tw, th) else {
                continue;
            };
            let Some((mx, my, score)) = best_correlation(&patch, &scaled) else {
                continue;
            };
            if best.is_none_or(|(s, ..)| score > s) {
                best = Some((score, px + mx, py + my, tw, th));
            }
        }

        let (score, x, y, w, h) = best?;
        if score < threshold {
            return None;
        }
        Some(
            BBox::new(x as i32, y as i32, w as i32, h as i32, score.clamp(0.0, 1.0))
                .with_pattern(template.name.clone()),
        )
    }
}

/// Crop the region, expanded symmetrically to at least the template size
/// and clamped to the frame. None when the frame itself is too small.
fn padded_patch(frame: &GrayImage, roi: &Roi, tw: u32, th: u32) -> Option<(u32, u32, GrayImage)> {
    let (fw, fh) = frame.dimensions();
    if fw < tw || fh < th || tw == 0 || th == 0 {
        return None;
    }

    let w = roi.width.max(tw).min(fw);
    let h = roi.height.max(th).min(fh);
    let cx = roi.x + roi.width / 2;
    let cy = roi.y + roi.height / 2;
    let x = cx.saturating_sub(w / 2).min(fw - w);
    let y = cy.saturating_sub(h / 2).min(fh - h);

    Some((x, y, imageops::crop_imm(frame, x, y, w, h).to_image()))
}

/// Sliding zero-mean normalized cross-correlation. Returns the placement
/// with the highest score; earlier placements win exact ties. Flat
/// templates and flat windows carry no signal and score nothing.
fn best_correlation(image: &GrayImage, template: &GrayImage) -> Option<(u32, u32, f64)> {
    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || iw < tw || ih < th {
        return None;
    }

    let n = f64::from(tw) * f64::from(th);
    let tpl: Vec<f64> = template.as_raw().iter().map(|&p| f64::from(p)).collect();
    let tpl_mean = tpl.iter().sum::<f64>() / n;
    let tpl_dev: Vec<f64> = tpl.iter().map(|v| v - tpl_mean).collect();
    let tpl_norm = tpl_dev.iter().map(|v| v * v).sum::<f64>().sqrt();
    if tpl_norm <= f64::EPSILON {
        return None;
    }

    let pixels = image.as_raw();
    let iw_us = iw as usize;
    let tw_us = tw as usize;
    let th_us = th as usize;

    let mut best: Option<(u32, u32, f64)> = None;
    for y in 0..=(ih - th) {
        for x in 0..=(iw - tw) {
            let mut sum = 0.0;
            let mut sum_sq = 0.0;
            let mut cross = 0.0;
            for ty in 0..th_us {
                let row = (y as usize + ty) * iw_us + x as usize;
                let tpl_row = ty * tw_us;
                for tx in 0..tw_us {
                    let p = f64::from(pixels[row + tx]);
                    sum += p;
                    sum_sq += p * p;
                    cross += p * tpl_dev[tpl_row + tx];
                }
            }
            let window_var = sum_sq - sum * sum / n;
            if window_var <= f64::EPSILON {
                continue;
            }
            let score = cross / (window_var.sqrt() * tpl_norm);
            if best.is_none_or(|(.., s)| score > s) {
                best = Some((x, y, score));
            }
        }
    }
    best
}

/// Bounded multiplicative boost/veto from the auxiliary scorer: a score of
/// 0.5 is neutral, 1.0 boosts by 25%, 0.0 vetoes down by 25%. Results stay
/// inside [0, 1].
fn apply_aux(
    frame: &GrayImage,
    candidates: BBoxCollection,
    aux: &dyn AuxiliaryScorer,
) -> BBoxCollection {
    candidates
        .into_iter()
        .map(|mut bbox| {
            if let Some(signal) = aux.score(frame, &bbox) {
                let factor = 0.75 + 0.5 * signal.clamp(0.0, 1.0);
                bbox.score = (bbox.score * factor).clamp(0.0, 1.0);
            }
            bbox
        })
        .collect()
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateLibrary;
    use image::Luma;
    use std::time::Duration;

    fn unit_scale_config() -> Detection {
        Detection {
            scale_min: 1.0,
            scale_max: 1.0,
            ..Detection::default()
        }
    }

    fn checker_template() -> GrayImage {
        GrayImage::from_fn(16, 16, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Luma([230u8])
            } else {
                Luma([25u8])
            }
        })
    }

    fn frame_with_template(template: &GrayImage, at: (u32, u32)) -> GrayImage {
        let mut frame = GrayImage::from_pixel(80, 80, Luma([128u8]));
        imageops::overlay(&mut frame, template, i64::from(at.0), i64::from(at.1));
        frame
    }

    #[test]
    fn exact_match_scores_one() {
        let template = checker_template();
        let frame = frame_with_template(&template, (30, 22));
        let (x, y, score) = best_correlation(&frame, &template).unwrap();
        assert_eq!((x, y), (30, 22));
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flat_template_matches_nothing() {
        let template = GrayImage::from_pixel(16, 16, Luma([128u8]));
        let frame = GrayImage::from_pixel(64, 64, Luma([128u8]));
        assert!(best_correlation(&frame, &template).is_none());
    }

    #[test]
    fn match_rois_finds_planted_pattern() {
        let template = checker_template();
        let frame = frame_with_template(&template, (30, 22));
        let library =
            TemplateLibrary::new(vec![Template::new("checker", template.clone())]).unwrap();
        let matcher = TemplateMatcher::new(unit_scale_config());
        let roi = Roi {
            x: 0,
            y: 0,
            width: 80,
            height: 80,
            score: 6_400.0,
        };

        let outcome = matcher.match_rois(&frame, &[roi], &library, None, None);
        assert!(!outcome.truncated);
        assert_eq!(outcome.candidates.len(), 1);
        let hit = &outcome.candidates.as_slice()[0];
        assert_eq!(hit.pattern, "checker");
        assert_eq!((hit.x, hit.y), (30, 22));
        assert!(hit.score >= 0.99);
    }

    #[test]
    fn below_threshold_candidates_are_dropped() {
        let template = checker_template();
        // Frame without the pattern: weak correlations only.
        let frame = GrayImage::from_fn(80, 80, |x, _| Luma([(x * 3 % 251) as u8]));
        let library = TemplateLibrary::new(vec![Template::new("checker", template)]).unwrap();
        let matcher = TemplateMatcher::new(unit_scale_config());
        let roi = Roi {
            x: 0,
            y: 0,
            width: 80,
            height: 80,
            score: 6_400.0,
        };

        let outcome = matcher.match_rois(&frame, &[roi], &library, None, None);
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn expired_deadline_truncates_without_panicking() {
        let template = checker_template();
        let frame = frame_with_template(&template, (10, 10));
        let library = TemplateLibrary::new(vec![Template::new("checker", template)]).unwrap();
        let matcher = TemplateMatcher::new(unit_scale_config());
        let roi = Roi {
            x: 0,
            y: 0,
            width: 80,
            height: 80,
            score: 6_400.0,
        };

        let expired = Instant::now() - Duration::from_millis(1);
        let outcome = matcher.match_rois(&frame, &[roi], &library, Some(expired), None);
        assert!(outcome.truncated);
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn aux_scorer_boost_is_bounded() {
        struct Always(f64);
        impl AuxiliaryScorer for Always {
            fn score(&self, _frame: &GrayImage, _candidate: &BBox) -> Option<f64> {
                Some(self.0)
            }
            fn name(&self) -> &str {
                "always"
            }
        }

        let template = checker_template();
        let frame = frame_with_template(&template, (30, 22));
        let library = TemplateLibrary::new(vec![Template::new("checker", template)]).unwrap();
        let matcher = TemplateMatcher::new(unit_scale_config());
        let roi = Roi {
            x: 0,
            y: 0,
            width: 80,
            height: 80,
            score: 6_400.0,
        };

        let boosted = matcher.match_rois(&frame, &[roi.clone()], &library, None, Some(&Always(1.0)));
        let vetoed = matcher.match_rois(&frame, &[roi], &library, None, Some(&Always(0.0)));
        let b = boosted.candidates.as_slice()[0].score;
        let v = vetoed.candidates.as_slice()[0].score;
        assert!(b <= 1.0);
        assert!(v < b);
        assert!(v >= 0.70);
    }
}
