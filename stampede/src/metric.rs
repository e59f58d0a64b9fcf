//! Counters shared by every in-flight request.
use stampede_core::{CheckStatistics, RateSnapshot, Verdict, DEFAULT_THRESHOLD};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Counter based rate metric with a pass/fail threshold.
///
/// Counters only ever increase during a run. The rate is read once, at evaluation time.
#[derive(Debug)]
pub struct RateMetric {
    name: &'static str,
    threshold: f64,
    failures: AtomicU64,
    total: AtomicU64,
}

impl RateMetric {
    pub fn new(name: &'static str, threshold: f64) -> Self {
        Self {
            name,
            threshold,
            failures: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn record(&self, is_failure: bool) {
        if is_failure {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("stampede_http_requests").increment(1);
            if is_failure {
                metrics::counter!("stampede_http_5xx").increment(1);
            }
        }
    }

    pub fn snapshot(&self) -> RateSnapshot {
        // NOTE: Writers may be mid-record; clamp so the rate never exceeds 1.
        let failures = self.failures.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Acquire);
        RateSnapshot {
            failures,
            total: total.max(failures),
        }
    }

    /// `Pass` iff `failures / total < threshold`. An empty metric passes.
    pub fn evaluate(&self) -> Verdict {
        self.evaluate_snapshot(&self.snapshot())
    }

    /// Judge an earlier [`RateMetric::snapshot`] against this metric's threshold.
    pub fn evaluate_snapshot(&self, snapshot: &RateSnapshot) -> Verdict {
        if snapshot.total == 0 || snapshot.rate() < self.threshold {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

impl Default for RateMetric {
    fn default() -> Self {
        Self::new("http_5xx_rate", DEFAULT_THRESHOLD)
    }
}

/// A named assertion on iteration results.
#[derive(Debug)]
pub struct Check {
    name: &'static str,
    passes: AtomicU64,
    fails: AtomicU64,
}

impl Check {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            passes: AtomicU64::new(0),
            fails: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Record the result and hand it back.
    pub fn record(&self, passed: bool) -> bool {
        if passed {
            self.passes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fails.fetch_add(1, Ordering::Relaxed);
        }
        passed
    }

    pub fn statistics(&self) -> CheckStatistics {
        CheckStatistics {
            name: self.name,
            passes: self.passes.load(Ordering::Relaxed),
            fails: self.fails.load(Ordering::Relaxed),
        }
    }
}

/// Registry of checks. Registration takes a lock, recording does not.
#[derive(Debug, Default)]
pub struct Checks {
    checks: RwLock<Vec<Arc<Check>>>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the check called `name`, creating it on first use.
    pub fn register(&self, name: &'static str) -> Arc<Check> {
        {
            let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(check) = checks.iter().find(|c| c.name == name) {
                return check.clone();
            }
        }

        let mut checks = self.checks.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(check) = checks.iter().find(|c| c.name == name) {
            return check.clone();
        }
        trace!("Registering check '{name}'");
        let check = Arc::new(Check::new(name));
        checks.push(check.clone());
        check
    }

    /// Statistics for every check, in registration order.
    pub fn statistics(&self) -> Vec<CheckStatistics> {
        self.checks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.statistics())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_n(metric: &RateMetric, total: usize, failures: usize) {
        for i in 0..total {
            metric.record(i < failures);
        }
    }

    #[test]
    fn empty_metric_passes() {
        let metric = RateMetric::default();
        assert_eq!(metric.evaluate(), Verdict::Pass);
        assert_eq!(metric.snapshot().rate(), 0.);
    }

    #[test]
    fn five_percent_passes() {
        let metric = RateMetric::default();
        record_n(&metric, 1_000, 50);
        assert_eq!(metric.snapshot().rate(), 0.05);
        assert_eq!(metric.evaluate(), Verdict::Pass);
    }

    #[test]
    fn fifteen_percent_fails() {
        let metric = RateMetric::default();
        record_n(&metric, 1_000, 150);
        assert_eq!(metric.snapshot().rate(), 0.15);
        assert_eq!(metric.evaluate(), Verdict::Fail);
    }

    #[test]
    fn threshold_is_exclusive() {
        let metric = RateMetric::new("http_5xx_rate", 0.10);
        record_n(&metric, 100, 10);
        assert_eq!(metric.evaluate(), Verdict::Fail);

        let metric = RateMetric::new("http_5xx_rate", 0.10);
        record_n(&metric, 100, 9);
        assert_eq!(metric.evaluate(), Verdict::Pass);
    }

    #[test]
    fn custom_threshold() {
        let metric = RateMetric::new("http_5xx_rate", 0.5);
        record_n(&metric, 10, 4);
        assert_eq!(metric.evaluate(), Verdict::Pass);
        metric.record(true);
        metric.record(true);
        assert_eq!(metric.evaluate(), Verdict::Fail);
    }

    #[test]
    fn all_failures_fail() {
        let metric = RateMetric::default();
        metric.record(true);
        assert_eq!(metric.evaluate(), Verdict::Fail);
    }

    #[test]
    fn verdict_follows_the_snapshot_it_was_given() {
        let metric = RateMetric::default();
        record_n(&metric, 100, 5);
        let snapshot = metric.snapshot();

        // Late writers move the live counters but not the reported pair.
        record_n(&metric, 10, 10);
        assert_eq!(metric.evaluate(), Verdict::Fail);
        assert_eq!(metric.evaluate_snapshot(&snapshot), Verdict::Pass);
        assert_eq!(
            metric.evaluate_snapshot(&RateSnapshot {
                failures: 15,
                total: 110
            }),
            Verdict::Fail
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_recording() {
        let metric = Arc::new(RateMetric::default());
        let handles: Vec<_> = (0..16)
            .map(|task| {
                let metric = metric.clone();
                tokio::spawn(async move {
                    for i in 0..1_000 {
                        metric.record((task * 1_000 + i) % 20 == 0);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = metric.snapshot();
        assert_eq!(snapshot.total, 16_000);
        assert_eq!(snapshot.failures, 800);
        assert_eq!(metric.evaluate(), Verdict::Pass);
    }

    #[test]
    fn checks_are_shared_by_name() {
        let checks = Checks::new();
        let a = checks.register("login 200");
        let b = checks.register("login 200");
        let c = checks.register("register 201");

        assert!(a.record(true));
        assert!(!b.record(false));
        c.record(true);

        assert_eq!(
            checks.statistics(),
            vec![
                CheckStatistics {
                    name: "login 200",
                    passes: 1,
                    fails: 1
                },
                CheckStatistics {
                    name: "register 201",
                    passes: 1,
                    fails: 0
                },
            ]
        );
    }
}
