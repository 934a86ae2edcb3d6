use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One known chart pattern family.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternInfo {
    pub name: String,
    /// Prior probability that a raw match of this pattern is real,
    /// estimated from historical detection frequency.
    pub prior: f64,
    /// Display color for downstream overlay consumers.
    pub rgb: (u8, u8, u8),
}

/// Immutable set of known patterns keyed by name.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    patterns: Vec<PatternInfo>,
}

/// Prior assumed for patterns the catalog does not know about.
const DEFAULT_PRIOR: f64 = 0.5;

impl PatternCatalog {
    /// The built-in catalog of classical chart patterns.
    pub fn builtin() -> Self {
        let entries: &[(&str, f64, (u8, u8, u8))] = &[
            // High frequency patterns
            ("Head and Shoulders", 0.75, (220, 80, 60)),
            ("Double Top", 0.70, (230, 150, 40)),
            ("Double Bottom", 0.70, (60, 180, 90)),
            ("Triangle", 0.65, (70, 130, 220)),
            ("Flag", 0.60, (160, 90, 200)),
            ("Pennant", 0.60, (200, 100, 160)),
            // Medium frequency patterns
            ("Cup and Handle", 0.55, (120, 170, 60)),
            ("Wedge", 0.55, (210, 190, 60)),
            ("Channel", 0.50, (90, 160, 170)),
            // Lower frequency patterns
            ("Triple Top", 0.40, (180, 60, 110)),
            ("Triple Bottom", 0.40, (60, 110, 180)),
            ("Rounding Bottom", 0.35, (140, 140, 140)),
        ];
        Self {
            patterns: entries
                .iter()
                .map(|&(name, prior, rgb)| PatternInfo {
                    name: name.to_string(),
                    prior,
                    rgb,
                })
                .collect(),
        }
    }

    pub fn from_patterns(patterns: Vec<PatternInfo>) -> Self {
        Self { patterns }
    }

    /// Load a catalog from a text file, one pattern per line in the form
    /// `Name \- prior \- R,G,B`. Malformed lines are skipped with a warning.
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open catalog: {:?}", path))?;
        let reader = BufReader::new(file);

        let mut patterns = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line
                .with_context(|| format!("Failed to read line {} from {:?}", line_num + 1, path))?;

            if line.trim().is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.split(r"\-").map(|s| s.trim()).collect();
            if parts.len() < 3 {
                eprintln!(
                    "Warning: Invalid line format at line {}: '{}' (expected 3 parts separated by \\-)",
                    line_num + 1,
                    line
                );
                continue;
            }

            let prior = parts[1].parse::<f64>().with_context(|| {
                format!("Invalid prior at line {}: '{}'", line_num + 1, parts[1])
            })?;
            if !(0.0..=1.0).contains(&prior) {
                eprintln!(
                    "Warning: prior {} at line {} outside [0,1], skipping",
                    prior,
                    line_num + 1
                );
                continue;
            }

            let rgb_parts: Vec<&str> = parts[2].split(',').map(|s| s.trim()).collect();
            if rgb_parts.len() != 3 {
                eprintln!(
                    "Warning: Invalid color format at line {}: '{}' (expected R,G,B)",
                    line_num + 1,
                    parts[2]
                );
                continue;
            }
            let red = rgb_parts[0].parse::<u8>().with_context(|| {
                format!("Invalid red value at line {}: '{}'", line_num + 1, rgb_parts[0])
            })?;
            let green = rgb_parts[1].parse::<u8>().with_context(|| {
                format!("Invalid green value at line {}: '{}'", line_num + 1, rgb_parts[1])
            })?;
            let blue = rgb_parts[2].parse::<u8>().with_context(|| {
                format!("Invalid blue value at line {}: '{}'", line_num + 1, rgb_parts[2])
            })?;

            patterns.push(PatternInfo {
                name: parts[0].to_string(),
                prior,
                rgb: (red, green, blue),
            });
        }

        Ok(Self { patterns })
    }

    pub fn get(&self, name: &str) -> Option<&PatternInfo> {
        self.patterns.iter().find(|p| p.name == name)
    }

    /// Prior for a pattern name, falling back to 0.5 for unknown patterns.
    pub fn prior_for(&self, name: &str) -> f64 {
        self.get(name).map_or(DEFAULT_PRIOR, |p| p.prior)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatternInfo> {
        self.patterns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_known_priors() {
        let catalog = PatternCatalog::builtin();
        assert_eq!(catalog.prior_for("Head and Shoulders"), 0.75);
        assert_eq!(catalog.prior_for("Rounding Bottom"), 0.35);
    }

    #[test]
    fn unknown_pattern_gets_default_prior() {
        let catalog = PatternCatalog::builtin();
        assert_eq!(catalog.prior_for("Not A Pattern"), 0.5);
    }

    #[test]
    fn loads_catalog_file_and_skips_malformed_lines() {
        let path = std::env::temp_dir().join("chartspot_catalog_test.txt");
        std::fs::write(
            &path,
            "Double Top \\- 0.7 \\- 230,150,40\nbroken line\nFlag \\- 0.6 \\- 160,90,200\n",
        )
        .unwrap();

        let catalog = PatternCatalog::try_load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.prior_for("Flag"), 0.6);
        assert_eq!(catalog.get("Double Top").unwrap().rgb, (230, 150, 40));

        std::fs::remove_file(&path).ok();
    }
}
