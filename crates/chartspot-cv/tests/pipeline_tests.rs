// End-to-end pipeline scenarios over synthetic frames.

use chartspot_core::config::Config;
use chartspot_cv::detection::PatternDetector;
use chartspot_cv::frame::Frame;
use chartspot_cv::template::{Template, TemplateLibrary};
use chartspot_cv::tracker::TemporalTracker;
use image::{GrayImage, Luma, imageops};

/// A 36x36 template with a high-contrast 24x24 block so the ROI proposer
/// sees a gradient contour comfortably above the 20x20 minimum.
fn block_template() -> GrayImage {
    let mut tpl = GrayImage::from_pixel(36, 36, Luma([128u8]));
    for y in 6..30 {
        for x in 6..30 {
            tpl.put_pixel(x, y, Luma([30u8]));
        }
    }
    tpl
}

fn frame_with_pattern(at: (u32, u32), ts: u64) -> Frame {
    let mut img = GrayImage::from_pixel(200, 200, Luma([128u8]));
    imageops::overlay(&mut img, &block_template(), i64::from(at.0), i64::from(at.1));
    Frame::from_gray(img, ts)
}

/// Unit-scale config keeps the correlation test exact; every other value
/// stays at its default.
fn unit_scale_config() -> Config {
    let mut config = Config::default();
    config.detection.scale_min = 1.0;
    config.detection.scale_max = 1.0;
    config
}

fn detector() -> PatternDetector {
    let library =
        TemplateLibrary::new(vec![Template::new("block", block_template())]).unwrap();
    PatternDetector::new(unit_scale_config(), library).unwrap()
}

#[test]
fn planted_pattern_is_detected_once() {
    let mut detector = detector();
    let detections = detector.process(&frame_with_pattern((60, 70), 0)).unwrap();

    assert_eq!(detections.len(), 1);
    let hit = &detections[0];
    assert_eq!(hit.pattern, "block");
    assert!(hit.confidence > 0.0 && hit.confidence <= 1.0);
    assert_eq!((hit.bbox.x, hit.bbox.y), (60, 70));
    assert_eq!((hit.bbox.width, hit.bbox.height), (36, 36));
    assert_eq!(hit.timeframe, "1m");
}

#[test]
fn identical_frame_short_circuits_to_cache() {
    let mut detector = detector();
    let first = detector.process(&frame_with_pattern((60, 70), 0)).unwrap();
    let second = detector.process(&frame_with_pattern((60, 70), 83)).unwrap();

    assert_eq!(first, second);
    let stats = detector.stats();
    assert_eq!(stats.frames, 2);
    // ROI/matcher ran exactly once; the second frame came from the cache.
    assert_eq!(stats.pipeline_runs, 1);
    assert!(detector.cache_hit_rate() > 0.0);
}

#[test]
fn changed_frame_reruns_the_pipeline() {
    let mut detector = detector();
    detector.process(&frame_with_pattern((60, 70), 0)).unwrap();

    // The pattern moves and a dark band appears below it, the way a chart
    // redraw looks; the band flips far more than five hash bits. Its thin
    // edge contour stays under the 20x20 ROI minimum, so the pattern is
    // still the only region matched.
    let mut img = GrayImage::from_pixel(200, 200, Luma([128u8]));
    imageops::overlay(&mut img, &block_template(), 140, 20);
    for y in 150..200 {
        for x in 0..200 {
            img.put_pixel(x, y, Luma([30u8]));
        }
    }
    let moved = detector.process(&Frame::from_gray(img, 83)).unwrap();

    assert_eq!(detector.stats().pipeline_runs, 2);
    assert_eq!(moved.len(), 1);
    assert_eq!((moved[0].bbox.x, moved[0].bbox.y), (140, 20));
}

#[test]
fn repeated_sightings_grow_confidence() {
    let mut detector = detector();
    let mut last = 0.0;
    let mut previous = 0.0;
    for i in 0..6u64 {
        // The pattern stays put while a side band alternates brightness,
        // so every frame flips enough hash bits to defeat the cache. The
        // band's thin edge contour is below the ROI minimum and never
        // becomes a candidate region.
        let mut img = GrayImage::from_pixel(200, 200, Luma([128u8]));
        imageops::overlay(&mut img, &block_template(), 60, 70);
        let band = if i % 2 == 0 { 30u8 } else { 220u8 };
        for y in 0..200 {
            for x in 160..200 {
                img.put_pixel(x, y, Luma([band]));
            }
        }
        let frame = Frame::from_gray(img, i * 83);

        let detections = detector.process(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        previous = last;
        last = detections[0].confidence;
    }
    assert!(last >= previous);
    // Consensus has accumulated beyond the first-sighting confidence.
    assert!(last > 0.3);
}

#[test]
fn absent_pattern_decays_below_threshold_after_three_half_lives() {
    let mut tracker = TemporalTracker::new(7_000, 0.2);
    for i in 0..50 {
        tracker.update("block-60-80", 0.8, i * 83);
    }
    let last_seen = 49 * 83;
    let decayed = tracker.peek("block-60-80", last_seen + 21_000);
    assert!(decayed < 0.15, "decayed confidence {decayed} not below 0.15");
}

#[test]
fn empty_frame_yields_no_detections_and_keeps_session_usable() {
    let mut detector = detector();
    let empty = Frame::from_gray(GrayImage::new(0, 0), 0);
    assert!(detector.process(&empty).unwrap().is_empty());

    // The session is not poisoned: a real frame still detects.
    let detections = detector.process(&frame_with_pattern((60, 70), 83)).unwrap();
    assert_eq!(detections.len(), 1);
}

#[test]
fn reset_clears_cross_frame_state() {
    let mut detector = detector();
    detector.process(&frame_with_pattern((60, 70), 0)).unwrap();
    detector.reset();
    // Same frame again is treated as new after reset.
    detector.process(&frame_with_pattern((60, 70), 83)).unwrap();
    assert_eq!(detector.stats().pipeline_runs, 2);
}

#[test]
fn invalid_configuration_is_rejected_at_construction() {
    let library =
        TemplateLibrary::new(vec![Template::new("block", block_template())]).unwrap();
    let mut config = Config::default();
    config.detection.iou_threshold = 2.0;
    assert!(PatternDetector::new(config, library).is_err());
}
