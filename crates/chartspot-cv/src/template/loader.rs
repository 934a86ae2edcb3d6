//! Template loading from disk.

use super::{Template, TemplateLibrary};
use crate::Result;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Loads reference pattern images from one or more directories. The file
/// stem becomes the pattern name. Directory entries are visited in sorted
/// order so the resulting library is identical across runs.
pub struct TemplateLoader {
    template_dirs: Vec<PathBuf>,
    supported_extensions: Vec<String>,
}

impl TemplateLoader {
    pub fn new() -> Self {
        Self {
            template_dirs: Vec::new(),
            supported_extensions: vec![
                "png".to_string(),
                "jpg".to_string(),
                "jpeg".to_string(),
                "bmp".to_string(),
            ],
        }
    }

    pub fn add_template_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.template_dirs.push(dir.as_ref().to_path_buf());
        self
    }

    pub fn add_extension(mut self, ext: String) -> Self {
        self.supported_extensions.push(ext);
        self
    }

    /// Load every readable template. Fails when none are found: the
    /// pipeline cannot start without its reference patterns.
    pub fn load_library(&self) -> Result<TemplateLibrary> {
        let mut templates = Vec::new();

        for dir in &self.template_dirs {
            if !dir.exists() {
                continue;
            }

            let mut entries: Vec<_> = fs::read_dir(dir)
                .with_context(|| format!("Failed to read directory: {:?}", dir))?
                .collect::<std::io::Result<Vec<_>>>()?;
            entries.sort_by_key(|entry| entry.file_name());

            for entry in entries {
                let path = entry.path();
                let Some(extension) = path.extension() else {
                    continue;
                };
                let ext = extension.to_string_lossy().to_lowercase();
                if !self.supported_extensions.contains(&ext) {
                    continue;
                }
                let Some(stem) = path.file_stem() else {
                    continue;
                };

                let image = image::open(&path)
                    .with_context(|| format!("Failed to load template: {:?}", path))?
                    .to_luma8();
                templates.push(Template::new(stem.to_string_lossy().to_string(), image));
            }
        }

        info!(count = templates.len(), "templates loaded");
        TemplateLibrary::new(templates)
    }
}

impl Default for TemplateLoader {
    fn default() -> Self {
        Self::new()
    }
}
