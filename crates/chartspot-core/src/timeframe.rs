//! Chart timeframe estimation.
//!
//! Classifies detections by the timeframe of the chart they were found on.
//! The dimension heuristic is coarse; callers that know the source filename
//! get a sharper answer from [`estimate_from_filename`].

/// Standard chart timeframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
    Mn1,
}

impl Timeframe {
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
            Timeframe::Mn1 => "1M",
        }
    }

    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1_440,
            Timeframe::W1 => 10_080,
            Timeframe::Mn1 => 43_200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeframeEstimate {
    pub timeframe: Timeframe,
    pub confidence: f64,
}

/// Estimate from frame dimensions: wider captures tend to show longer
/// timeframes.
pub fn estimate_from_dimensions(width: u32, _height: u32) -> TimeframeEstimate {
    let timeframe = match width {
        w if w < 800 => Timeframe::M1,
        w if w < 1_200 => Timeframe::M5,
        w if w < 1_600 => Timeframe::M15,
        w if w < 2_000 => Timeframe::H1,
        w if w < 2_400 => Timeframe::H4,
        _ => Timeframe::D1,
    };
    TimeframeEstimate {
        timeframe,
        confidence: 0.85,
    }
}

/// Estimate from naming conventions in the source filename.
pub fn estimate_from_filename(filename: &str) -> TimeframeEstimate {
    let lower = filename.to_lowercase();

    let timeframe = if lower.contains("15m") || lower.contains("m15") {
        Timeframe::M15
    } else if lower.contains("30m") || lower.contains("m30") {
        Timeframe::M30
    } else if lower.contains("5m") || lower.contains("m5") {
        Timeframe::M5
    } else if lower.contains("1m") || lower.contains("m1") {
        Timeframe::M1
    } else if lower.contains("4h") || lower.contains("h4") {
        Timeframe::H4
    } else if lower.contains("1h") || lower.contains("h1") {
        Timeframe::H1
    } else if lower.contains("1d") || lower.contains("d1") || lower.contains("daily") {
        Timeframe::D1
    } else if lower.contains("1w") || lower.contains("w1") || lower.contains("weekly") {
        Timeframe::W1
    } else if lower.contains("monthly") {
        Timeframe::Mn1
    } else {
        Timeframe::H1
    };

    let confidence = if timeframe == Timeframe::H1 && !lower.contains("1h") && !lower.contains("h1")
    {
        0.5
    } else {
        0.95
    };

    TimeframeEstimate {
        timeframe,
        confidence,
    }
}
