//! Temporal consensus across frames.
//!
//! Promotes patterns that persist across scans and demotes flickers.
//! Includes an eviction policy to keep the accumulator map bounded.

use std::collections::HashMap;
use tracing::debug;

const MAX_ENTRIES: usize = 10_000;
const EVICTION_CHECK_INTERVAL: u64 = 100;
/// Entries idle this many half-lives have decayed to near zero and can go.
const EVICTION_HALF_LIVES: f64 = 6.0;

#[derive(Debug, Clone, Copy)]
struct State {
    score: f64,
    last_ts: u64,
}

/// Per-key decayed-confidence accumulator.
///
/// Update rule: `decay = 0.5^(dt / half_life)`, evidence weight
/// `w = max(1 - decay, sigma)`, `score <- score * (1 - w) + raw * w`.
/// The sigma floor keeps rapid back-to-back frames from freezing the
/// accumulator. Under sustained constant evidence the score converges to
/// the raw value; with no evidence it halves every half-life. State lives
/// only in memory and is rebuilt fresh on restart.
#[derive(Debug)]
pub struct TemporalTracker {
    half_life_ms: u64,
    sigma: f64,
    states: HashMap<String, State>,
    update_count: u64,
}

impl TemporalTracker {
    pub fn new(half_life_ms: u64, sigma: f64) -> Self {
        Self {
            half_life_ms: half_life_ms.max(1),
            sigma: sigma.clamp(0.0, 1.0),
            states: HashMap::new(),
            update_count: 0,
        }
    }

    /// Fold new evidence into the accumulator for `key` and return the
    /// smoothed confidence. Monotone in `confidence`: stronger instant
    /// evidence never lowers the result.
    pub fn update(&mut self, key: &str, confidence: f64, now_ms: u64) -> f64 {
        let result = {
            let state = self
                .states
                .entry(key.to_string())
                .or_insert(State { score: 0.0, last_ts: now_ms });

            let dt = now_ms.saturating_sub(state.last_ts) as f64;
            let decay = 0.5f64.powf(dt / self.half_life_ms as f64);
            let weight = (1.0 - decay).max(self.sigma);
            state.score = state.score * (1.0 - weight) + confidence * weight;
            state.last_ts = now_ms;
            state.score
        };

        self.update_count += 1;
        if self.update_count % EVICTION_CHECK_INTERVAL == 0 {
            self.evict_stale(now_ms);
        }

        result
    }

    /// Current decayed value for `key` without registering evidence.
    /// Unknown keys read as zero.
    pub fn peek(&self, key: &str, now_ms: u64) -> f64 {
        self.states.get(key).map_or(0.0, |state| {
            let dt = now_ms.saturating_sub(state.last_ts) as f64;
            state.score * 0.5f64.powf(dt / self.half_life_ms as f64)
        })
    }

    fn evict_stale(&mut self, now_ms: u64) {
        let idle_limit = (EVICTION_HALF_LIVES * self.half_life_ms as f64) as u64;
        let cutoff = now_ms.saturating_sub(idle_limit);
        let before = self.states.len();
        self.states.retain(|_, state| state.last_ts >= cutoff);

        // Size-based overflow eviction, oldest first.
        if self.states.len() > MAX_ENTRIES {
            let mut entries: Vec<(String, u64)> = self
                .states
                .iter()
                .map(|(key, state)| (key.clone(), state.last_ts))
                .collect();
            entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            let excess = self.states.len() - MAX_ENTRIES * 3 / 4;
            for (key, _) in entries.into_iter().take(excess) {
                self.states.remove(&key);
            }
        }

        if self.states.len() < before {
            debug!(evicted = before - self.states.len(), "tracker eviction");
        }
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.update_count = 0;
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> TemporalTracker {
        TemporalTracker::new(7_000, 0.2)
    }

    #[test]
    fn no_evidence_never_increases_confidence() {
        let mut t = tracker();
        // Build up some history.
        for i in 0..10 {
            t.update("p", 0.8, i * 80);
        }
        let v1 = t.update("p", 0.0, 1_000);
        let v2 = t.update("p", 0.0, 5_000);
        let v3 = t.update("p", 0.0, 20_000);
        assert!(v2 <= v1);
        assert!(v3 <= v2);
    }

    #[test]
    fn sustained_evidence_converges_to_raw_value() {
        let mut t = tracker();
        let mut last = 0.0;
        for i in 0..200 {
            last = t.update("p", 0.9, i * 83);
        }
        assert!((last - 0.9).abs() < 1e-3);
    }

    #[test]
    fn absent_pattern_decays_below_threshold_after_three_half_lives() {
        let mut t = tracker();
        // Converge near 0.8, then go silent for 3x the half-life.
        for i in 0..100 {
            t.update("p", 0.8, i * 83);
        }
        let silent_from = 99 * 83;
        let decayed = t.peek("p", silent_from + 21_000);
        assert!(decayed < 0.15, "decayed confidence {decayed} not below 0.15");
    }

    #[test]
    fn higher_evidence_never_yields_lower_result() {
        let mut a = tracker();
        let mut b = tracker();
        for i in 0..5 {
            a.update("p", 0.5, i * 100);
            b.update("p", 0.5, i * 100);
        }
        let low = a.update("p", 0.4, 600);
        let high = b.update("p", 0.9, 600);
        assert!(high >= low);
    }

    #[test]
    fn idle_entries_are_evicted() {
        let mut t = tracker();
        t.update("stale", 0.9, 0);
        // Drive updates past the eviction check with a much later clock.
        for i in 0..(EVICTION_CHECK_INTERVAL + 1) {
            t.update("live", 0.5, 100_000 + i);
        }
        assert_eq!(t.peek("stale", 100_000), 0.0);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn unknown_key_reads_zero() {
        let t = tracker();
        assert_eq!(t.peek("nothing", 5_000), 0.0);
    }
}
