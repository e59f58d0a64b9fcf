/// Fractional iteration budget of one paced worker.
///
/// Held as an exact fraction `accumulated / scale`, where `scale` is the number of ticks in the
/// pacing window, so thirty additions of 1/30 make exactly one iteration. After draining with
/// [`WorkerQuota::try_take`] the remainder is below one and carries over to the next tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerQuota {
    accumulated: u64,
    scale: u64,
}

impl WorkerQuota {
    pub fn new(scale: u64) -> Self {
        Self {
            accumulated: 0,
            scale: scale.max(1),
        }
    }

    /// Add `units / scale` iterations.
    pub fn accrue(&mut self, units: u64) {
        self.accumulated = self.accumulated.saturating_add(units);
    }

    /// Consume one whole iteration if available.
    pub fn try_take(&mut self) -> bool {
        if self.accumulated >= self.scale {
            self.accumulated -= self.scale;
            true
        } else {
            false
        }
    }

    pub fn remainder(&self) -> f64 {
        self.accumulated as f64 / self.scale as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run `ticks` ticks at `units / scale` per tick and count fired iterations.
    fn fire(scale: u64, units: u64, ticks: u64) -> u64 {
        let mut quota = WorkerQuota::new(scale);
        let mut fired = 0;
        for _ in 0..ticks {
            quota.accrue(units);
            while quota.try_take() {
                fired += 1;
            }
            assert!(quota.remainder() < 1.);
        }
        fired
    }

    #[test]
    fn one_per_thirty_ticks() {
        assert_eq!(fire(30, 1, 29), 0);
        assert_eq!(fire(30, 1, 30), 1);
        assert_eq!(fire(30, 1, 90), 3);
        assert_eq!(fire(30, 1, 210), 7);
    }

    #[test]
    fn fired_count_stays_within_one_of_the_ideal() {
        for (scale, units) in [(30, 1), (7, 3), (4, 9), (1, 2), (1_000, 333)] {
            for ticks in [0, 1, 13, 100, 997] {
                let ideal = (ticks * units) as f64 / scale as f64;
                let fired = fire(scale, units, ticks) as f64;
                assert!(
                    fired == ideal.floor() || fired == ideal.floor() + 1.,
                    "scale={scale} units={units} ticks={ticks} fired={fired}"
                );
            }
        }
    }

    #[test]
    fn rate_above_one_fires_several_per_tick() {
        let mut quota = WorkerQuota::new(2);
        quota.accrue(5);
        assert!(quota.try_take());
        assert!(quota.try_take());
        assert!(!quota.try_take());
        assert_eq!(quota.remainder(), 0.5);
    }
}
