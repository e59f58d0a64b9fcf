use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Repeating tick for one paced worker.
pub(crate) struct Timer {
    interval: Interval,
    period: Duration,
}

impl Timer {
    /// The first tick completes immediately.
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        // NOTE: A slow iteration pushes the next tick back rather than bursting to catch up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.period))
    }
}
