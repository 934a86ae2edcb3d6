//! Command-line front end: builds the detector and replays a directory of
//! frame images through it as a capture sequence.

use anyhow::{Context, Result, bail};
use chartspot_core::config::Config;
use chartspot_cv::detection::PatternDetector;
use chartspot_cv::frame::Frame;
use chartspot_cv::scorer::EdgeDensityScorer;
use chartspot_cv::template::TemplateLoader;
use std::fs;
use std::path::PathBuf;

pub const USAGE: &str =
    "usage: chartspot --templates <dir> --frames <dir> [--config <file>] [--structural-boost]";

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, Default)]
pub struct Options {
    pub templates: PathBuf,
    pub frames: PathBuf,
    pub config: Option<PathBuf>,
    pub structural_boost: bool,
}

impl Options {
    pub fn parse(args: &[String]) -> Result<Options> {
        let mut options = Options::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--templates" => {
                    options.templates = iter
                        .next()
                        .context("--templates requires a directory")?
                        .into();
                }
                "--frames" => {
                    options.frames = iter.next().context("--frames requires a directory")?.into();
                }
                "--config" => {
                    options.config = Some(iter.next().context("--config requires a file")?.into());
                }
                "--structural-boost" => options.structural_boost = true,
                other => bail!("unknown argument: {other}"),
            }
        }
        if options.templates.as_os_str().is_empty() || options.frames.as_os_str().is_empty() {
            bail!("--templates and --frames are required");
        }
        Ok(options)
    }
}

pub fn run(options: Options) -> Result<()> {
    let config = match &options.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {:?}", path))?;
            Config::from_json_str(&text)?
        }
        None => Config::default(),
    };

    let library = TemplateLoader::new()
        .add_template_dir(&options.templates)
        .load_library()?;

    let mut detector = PatternDetector::new(config.clone(), library)?;
    if options.structural_boost {
        detector = detector.with_scorer(Box::new(EdgeDensityScorer));
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(&options.frames)
        .with_context(|| format!("Failed to read frames directory: {:?}", options.frames))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.as_str()))
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!("no frame images found in {:?}", options.frames);
    }

    let interval = config.performance.frame_interval_ms();
    for (index, path) in paths.iter().enumerate() {
        let img = image::open(path)
            .with_context(|| format!("Failed to load frame: {:?}", path))?
            .to_luma8();
        let frame = Frame::from_gray(img, index as u64 * interval);

        let detections = detector.process(&frame)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        println!("{}: {} detections", name, detections.len());
        if !detections.is_empty() {
            println!("{}", PatternDetector::export_json(&detections)?);
        }
    }

    let stats = detector.stats();
    println!(
        "frames: {}  pipeline runs: {}  cache hit rate: {:.1}%  deadline overruns: {}",
        stats.frames,
        stats.pipeline_runs,
        detector.cache_hit_rate() * 100.0,
        stats.deadline_overruns
    );
    Ok(())
}
