use std::fmt;

/// Outcome of the threshold gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Point-in-time read of a rate metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateSnapshot {
    pub failures: u64,
    pub total: u64,
}

impl RateSnapshot {
    /// `failures / total`, or zero when nothing was recorded.
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.
        } else {
            self.failures as f64 / self.total as f64
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PacedStatistics {
    pub iterations: u64,
    pub peak_workers: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArrivalStatistics {
    pub iterations: u64,
    /// Iterations that were due while the worker pool was at its cap.
    pub dropped: u64,
    /// Iterations that found every pre-spawned worker busy and ran on a fresh task.
    pub spawned: u64,
    /// Most iterations in flight at once.
    pub peak_workers: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckStatistics {
    pub name: &'static str,
    pub passes: u64,
    pub fails: u64,
}

/// Summary of one complete run.
#[derive(Clone, Debug)]
pub struct RunStatistics {
    pub verdict: Verdict,
    pub threshold: f64,
    pub server_errors: RateSnapshot,
    pub register: PacedStatistics,
    pub login: ArrivalStatistics,
    pub checks: Vec<CheckStatistics>,
}

impl RunStatistics {
    pub fn server_error_rate(&self) -> f64 {
        self.server_errors.rate()
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: http_5xx_rate={:.4} ({}/{}) threshold=rate<{:.2}",
            self.verdict,
            self.server_error_rate(),
            self.server_errors.failures,
            self.server_errors.total,
            self.threshold,
        )?;
        writeln!(
            f,
            "register: iterations={} peak_workers={}",
            self.register.iterations, self.register.peak_workers
        )?;
        writeln!(
            f,
            "login: iterations={} dropped={} spawned={} peak_workers={}",
            self.login.iterations,
            self.login.dropped,
            self.login.spawned,
            self.login.peak_workers
        )?;
        for check in &self.checks {
            writeln!(
                f,
                "check '{}': passes={} fails={}",
                check.name, check.passes, check.fails
            )?;
        }
        Ok(())
    }
}
