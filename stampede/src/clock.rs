//! Run-relative time.
//!
//! A [`RunClock`] is fixed once when load generation begins and is handed to every scheduler,
//! so stage lookups are pure functions of `now - start`.
use stampede_core::Stage;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunClock {
    start: Instant,
}

impl RunClock {
    /// Start a clock now.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn start_instant(&self) -> Instant {
        self.start
    }

    /// Time since start; zero for instants at or before it.
    pub fn elapsed_at(&self, instant: Instant) -> Duration {
        instant.saturating_duration_since(self.start)
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }
}

/// Maps instants onto the stages of one profile.
///
/// Stages may have different durations. Once the schedule is exhausted the final stage persists,
/// so a scheduler that overruns keeps the last target instead of failing.
#[derive(Clone, Debug)]
pub struct StageClock {
    clock: RunClock,
    // Offset from start at which each stage ends.
    ends: Vec<Duration>,
}

impl StageClock {
    pub fn new(clock: RunClock, stages: &[Stage]) -> Self {
        let ends = stages
            .iter()
            .scan(Duration::ZERO, |acc, stage| {
                *acc += stage.duration;
                Some(*acc)
            })
            .collect();

        Self { clock, ends }
    }

    pub fn num_stages(&self) -> usize {
        self.ends.len()
    }

    pub fn total_duration(&self) -> Duration {
        self.ends.last().copied().unwrap_or_default()
    }

    /// Index of the stage running at `instant`, clamped to `[0, num_stages - 1]`.
    ///
    /// Zero-length stages are never reported.
    pub fn stage_index_at(&self, instant: Instant) -> usize {
        let elapsed = self.clock.elapsed_at(instant);
        self.ends
            .iter()
            .position(|end| elapsed < *end)
            .unwrap_or_else(|| self.ends.len().saturating_sub(1))
    }

    pub fn current_stage(&self) -> usize {
        self.stage_index_at(Instant::now())
    }

    pub fn stage_start(&self, index: usize) -> Instant {
        let offset = match index {
            0 => Duration::ZERO,
            i => self.ends.get(i - 1).copied().unwrap_or(self.total_duration()),
        };
        self.clock.start_instant() + offset
    }

    pub fn stage_end(&self, index: usize) -> Instant {
        let offset = self
            .ends
            .get(index)
            .copied()
            .unwrap_or(self.total_duration());
        self.clock.start_instant() + offset
    }

    /// Instant at which the whole schedule is exhausted.
    pub fn end(&self) -> Instant {
        self.clock.start_instant() + self.total_duration()
    }
}
