//! Template library for pattern matching.

pub mod loader;
pub mod matcher;

pub use loader::TemplateLoader;
pub use matcher::{MatchOutcome, TemplateMatcher};

use crate::Result;
use image::GrayImage;
use thiserror::Error;

/// The pipeline cannot operate without reference patterns; an empty
/// library is an initialization failure, not an empty result.
#[derive(Debug, Error)]
#[error("template library is empty; detection cannot start")]
pub struct EmptyLibrary;

/// A named reference pattern image. `threshold` overrides the global
/// acceptance threshold for this template when set.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub image: GrayImage,
    pub threshold: Option<f64>,
}

impl Template {
    pub fn new(name: impl Into<String>, image: GrayImage) -> Self {
        Self {
            name: name.into(),
            image,
            threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Immutable template set, loaded once at startup and shared read-only
/// across all frame evaluations for the session.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: Vec<Template>,
}

impl TemplateLibrary {
    pub fn new(templates: Vec<Template>) -> Result<Self> {
        if templates.is_empty() {
            return Err(EmptyLibrary.into());
        }
        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_library_is_fatal() {
        let err = TemplateLibrary::new(Vec::new()).unwrap_err();
        assert!(err.downcast_ref::<EmptyLibrary>().is_some());
    }

    #[test]
    fn lookup_by_name() {
        let library = TemplateLibrary::new(vec![
            Template::new("Double Top", GrayImage::new(16, 16)),
            Template::new("Flag", GrayImage::new(16, 16)).with_threshold(0.8),
        ])
        .unwrap();
        assert_eq!(library.len(), 2);
        assert!(library.get("Double Top").is_some());
        assert_eq!(library.get("Flag").unwrap().threshold, Some(0.8));
        assert!(library.get("Wedge").is_none());
    }
}
