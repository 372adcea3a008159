use std::collections::BTreeMap;
use std::time::Duration;

pub const RUNS: &str = "runs";
pub const EVENTS: &str = "events";
pub const TRACKS: &str = "tracks";
pub const STEPS: &str = "steps";
pub const TRACK_TYPE_PREFIX: &str = "track_type.";

/// Counters that depend on the run setup (step limits, production cuts, thread
/// scheduling) rather than on the physics being validated.
pub const RUN_DEPENDENT_COUNTERS: &[&str] = &[STEPS];

/// Counters of one completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    pub counters: BTreeMap<String, u64>,
    pub elapsed: Duration,
    pub threads: usize,
}

impl RunStatistics {
    pub fn new(runs: u64, events: u64, tracks: u64, steps: u64) -> Self {
        let counters = [(RUNS, runs), (EVENTS, events), (TRACKS, tracks), (STEPS, steps)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            counters,
            elapsed: Duration::ZERO,
            threads: 1,
        }
    }

    pub fn from_counters(counters: BTreeMap<String, u64>) -> Self {
        Self {
            counters,
            elapsed: Duration::ZERO,
            threads: 1,
        }
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.counters.get(key).copied()
    }

    pub fn set(&mut self, key: &str, value: u64) {
        self.counters.insert(key.to_string(), value);
    }

    pub fn runs(&self) -> u64 {
        self.get(RUNS).unwrap_or(0)
    }

    pub fn events(&self) -> u64 {
        self.get(EVENTS).unwrap_or(0)
    }

    pub fn tracks(&self) -> u64 {
        self.get(TRACKS).unwrap_or(0)
    }

    pub fn steps(&self) -> u64 {
        self.get(STEPS).unwrap_or(0)
    }

    pub fn add_track_type(&mut self, particle: &str, count: u64) {
        *self
            .counters
            .entry(format!("{TRACK_TYPE_PREFIX}{particle}"))
            .or_insert(0) += count;
    }

    /// Per-particle track counts, keyed by particle name.
    pub fn track_types(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(TRACK_TYPE_PREFIX).map(|p| (p, *v)))
    }

    /// Events per second, `None` when no time was recorded.
    pub fn events_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.events() as f64 / secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_types_are_namespaced_counters() {
        let mut stats = RunStatistics::new(1, 10, 40, 300);
        stats.add_track_type("gamma", 25);
        stats.add_track_type("e-", 15);
        stats.add_track_type("gamma", 5);

        assert_eq!(stats.get("track_type.gamma"), Some(30));
        let types: Vec<_> = stats.track_types().collect();
        assert_eq!(types, vec![("e-", 15), ("gamma", 30)]);
        assert_eq!(stats.tracks(), 40);
    }

    #[test]
    fn events_per_second_requires_elapsed_time() {
        let mut stats = RunStatistics::new(1, 100, 0, 0);
        assert!(stats.events_per_second().is_none());
        stats.elapsed = Duration::from_secs(4);
        assert!((stats.events_per_second().unwrap() - 25.0).abs() < 1e-9);
    }
}
