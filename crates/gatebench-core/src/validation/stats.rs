use super::tolerance::relative_deviation;
use super::verdict::{Check, Verdict};
use crate::core::models::stats::{RUN_DEPENDENT_COUNTERS, RunStatistics};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

/// Which counters to compare and how closely.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsPolicy {
    pub tolerance: f64,
    pub excluded: BTreeSet<String>,
}

impl StatsPolicy {
    /// Compares every reference counter with relative tolerance `tolerance`.
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            excluded: BTreeSet::new(),
        }
    }

    pub fn exclude(mut self, key: &str) -> Self {
        self.excluded.insert(key.to_string());
        self
    }

    /// Excludes counters that depend on the run setup, such as the step count.
    pub fn excluding_run_dependent(mut self) -> Self {
        self.excluded
            .extend(RUN_DEPENDENT_COUNTERS.iter().map(|k| k.to_string()));
        self
    }

    pub fn is_excluded(&self, key: &str) -> bool {
        self.excluded.contains(key)
    }
}

/// Compares every counter of `reference` against `actual`.
///
/// A counter missing from `actual` fails; any other counter fails when its relative
/// deviation exceeds the policy tolerance. Counters only present in `actual` are ignored.
#[instrument(skip_all, name = "compare_stats")]
pub fn compare_stats(actual: &RunStatistics, reference: &RunStatistics, policy: &StatsPolicy) -> Verdict {
    let mut verdict = Verdict::new("run statistics");
    for (key, &expected) in &reference.counters {
        if policy.is_excluded(key) {
            continue;
        }
        let check = match actual.get(key) {
            Some(found) => {
                let (a, r) = (found as f64, expected as f64);
                Check::measured(key, a, r, relative_deviation(a, r), policy.tolerance)
            }
            None => Check {
                reference: Some(expected as f64),
                ..Check::unavailable(key, policy.tolerance, "missing in actual statistics")
            },
        };
        if !check.passed {
            warn!(key = %key, actual = ?check.actual, reference = expected, deviation = ?check.deviation, "Counter out of tolerance.");
        }
        verdict.push(check);
    }
    if let (Some(a), Some(r)) = (actual.events_per_second(), reference.events_per_second()) {
        info!(actual_pps = a, reference_pps = r, speedup = a / r, "Event rate.");
    }
    info!(
        checks = verdict.checks.len(),
        excluded = policy.excluded.len(),
        ok = verdict.ok(),
        "Statistics compared."
    );
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::stats::{EVENTS, STEPS};
    use std::collections::BTreeMap;

    fn record(pairs: &[(&str, u64)]) -> RunStatistics {
        RunStatistics::from_counters(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn a_record_matches_itself_at_any_tolerance() {
        let mut stats = RunStatistics::new(1, 5000, 42318, 251944);
        stats.add_track_type("gamma", 12107);
        for tolerance in [0.0, 0.01, 1.0] {
            assert!(compare_stats(&stats, &stats, &StatsPolicy::new(tolerance)).ok());
        }
    }

    #[test]
    fn excluded_steps_do_not_fail_the_comparison() {
        let actual = record(&[(STEPS, 100), (EVENTS, 1000)]);
        let reference = record(&[(STEPS, 999), (EVENTS, 1000)]);

        let verdict = compare_stats(&actual, &reference, &StatsPolicy::new(0.01));
        assert!(!verdict.ok());
        let steps = verdict.check(STEPS).unwrap();
        assert!((steps.deviation.unwrap() - 899.0 / 999.0).abs() < 1e-12);

        let policy = StatsPolicy::new(0.01).exclude(STEPS);
        assert!(compare_stats(&actual, &reference, &policy).ok());
        let policy = StatsPolicy::new(0.01).excluding_run_dependent();
        assert!(compare_stats(&actual, &reference, &policy).ok());
    }

    #[test]
    fn missing_counter_is_a_failed_check() {
        let actual = record(&[(EVENTS, 1000)]);
        let reference = record(&[(EVENTS, 1000), ("track_type.e-", 30)]);
        let verdict = compare_stats(&actual, &reference, &StatsPolicy::new(0.5));
        let check = verdict.check("track_type.e-").unwrap();
        assert!(!check.passed);
        assert_eq!(check.reference, Some(30.0));
        assert!(check.actual.is_none());
    }

    #[test]
    fn extra_actual_counters_are_ignored() {
        let actual = record(&[(EVENTS, 1005), ("track_type.gamma", 7)]);
        let reference = record(&[(EVENTS, 1000)]);
        let verdict = compare_stats(&actual, &reference, &StatsPolicy::new(0.01));
        assert!(verdict.ok());
        assert_eq!(verdict.checks.len(), 1);
    }
}
