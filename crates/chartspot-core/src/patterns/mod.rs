//! Chart pattern catalog.

pub mod catalog;

pub use catalog::{PatternCatalog, PatternInfo};
