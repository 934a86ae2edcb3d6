//! Chartspot core domain data.
//!
//! Pattern catalog, timeframe estimation and the explicit pipeline
//! configuration shared by the detection crates. Nothing in here touches
//! pixels; that lives in `chartspot-cv`.

pub mod config;
pub mod patterns;
pub mod timeframe;

pub use config::{Config, ConfigError};
pub use patterns::{PatternCatalog, PatternInfo};
pub use timeframe::{Timeframe, TimeframeEstimate};
