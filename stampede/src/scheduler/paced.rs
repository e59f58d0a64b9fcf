use super::{quota::WorkerQuota, timer::Timer};
use crate::clock::{RunClock, StageClock};
use stampede_core::{ConfigError, PacedProfile, PacedStatistics, Pacing};
use std::future::Future;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, trace_span, warn, Instrument};

/// Ramping population of paced workers.
///
/// A supervisor walks the stages; at every transition it spawns or aborts workers to match the
/// stage's population target. Each worker ticks on its own timer, accrues the current stage's
/// pacing rate into its [`WorkerQuota`] and runs one task iteration per whole unit of quota.
pub struct PacedScheduler<T> {
    task: T,
    profile: PacedProfile,
    tick: Duration,
    window_ticks: u64,
}

impl<T, F> PacedScheduler<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    pub fn new(task: T, profile: PacedProfile, tick: Duration) -> Result<Self, ConfigError> {
        let window_ticks = profile.pacing.window_ticks(tick)?;
        Ok(Self {
            task,
            profile,
            tick,
            window_ticks,
        })
    }

    /// Drive the profile to completion. Workers still running at the end are aborted.
    #[instrument(name = "paced", skip_all)]
    pub async fn run(self, clock: RunClock) -> PacedStatistics {
        let stages = Arc::new(StageClock::new(clock, &self.profile.stages));
        let pacing = Arc::new(self.profile.pacing.clone());
        let iterations = Arc::new(AtomicU64::new(0));
        let mut workers: Vec<JoinHandle<()>> = vec![];
        let mut peak_workers = 0;

        debug!(
            "Running {} stages for {} with a {} tick",
            stages.num_stages(),
            humantime::format_duration(stages.total_duration()),
            humantime::format_duration(self.tick),
        );

        for (index, stage) in self.profile.stages.iter().enumerate() {
            let end = stages.stage_end(index);
            if Instant::now() >= end {
                trace!("Stage {index} already elapsed.");
                continue;
            }

            let target = stage.target as usize;
            info!("Stage {index}: {} -> {target} workers", workers.len());
            self.set_population(&mut workers, target, &stages, &pacing, &iterations);
            peak_workers = peak_workers.max(workers.len());

            tokio::time::sleep_until(end).await;
        }

        // NOTE: No graceful ramp-down; in-flight iterations are abandoned.
        for handle in workers.drain(..) {
            handle.abort();
        }
        #[cfg(feature = "metrics")]
        metrics::gauge!("stampede_paced_workers").set(0.);

        let iterations = iterations.load(Ordering::Relaxed);
        info!("Paced profile complete: {iterations} iterations");

        PacedStatistics {
            iterations,
            peak_workers,
        }
    }

    fn set_population(
        &self,
        workers: &mut Vec<JoinHandle<()>>,
        target: usize,
        stages: &Arc<StageClock>,
        pacing: &Arc<Pacing>,
        iterations: &Arc<AtomicU64>,
    ) {
        if workers.len() > target {
            for handle in workers.drain(target..) {
                handle.abort();
            }
        } else {
            while workers.len() < target {
                let id = workers.len();
                workers.push(self.spawn_worker(id, stages.clone(), pacing.clone(), iterations.clone()));
            }
        }

        #[cfg(feature = "metrics")]
        metrics::gauge!("stampede_paced_workers").set(workers.len() as f64);
    }

    fn spawn_worker(
        &self,
        id: usize,
        stages: Arc<StageClock>,
        pacing: Arc<Pacing>,
        iterations: Arc<AtomicU64>,
    ) -> JoinHandle<()> {
        let task = self.task.clone();
        let tick = self.tick;
        let mut quota = WorkerQuota::new(self.window_ticks);

        tokio::spawn(
            async move {
                let mut timer = Timer::new(tick);
                trace!("Worker started with a {timer} tick.");
                loop {
                    let now = timer.tick().await;
                    let stage = stages.stage_index_at(now);
                    quota.accrue(pacing.iterations_at(stage) as u64);

                    while quota.try_take() {
                        iterations.fetch_add(1, Ordering::Relaxed);
                        task().await;
                    }
                }
            }
            .instrument(trace_span!("worker", id)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_core::Stage;
    use std::sync::Mutex;

    fn profile(stages: &[(u64, u32)], window_secs: u64, iterations: Vec<u32>) -> PacedProfile {
        PacedProfile {
            stages: stages
                .iter()
                .map(|(secs, target)| Stage::new(Duration::from_secs(*secs), *target))
                .collect(),
            pacing: Pacing {
                window: Duration::from_secs(window_secs),
                iterations,
            },
        }
    }

    fn counting_task(count: Arc<AtomicU64>) -> impl Fn() -> std::future::Ready<()> + Clone {
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tracing_test::traced_test]
    #[tokio::test(start_paused = true)]
    async fn one_per_thirty_seconds_for_ninety_seconds() {
        let clock = RunClock::start();
        let fired_at = Arc::new(Mutex::new(vec![]));

        let task = {
            let fired_at = fired_at.clone();
            move || {
                fired_at.lock().unwrap().push(clock.elapsed());
                std::future::ready(())
            }
        };

        let scheduler = PacedScheduler::new(
            task,
            profile(&[(90, 1)], 30, vec![1]),
            Duration::from_secs(1),
        )
        .unwrap();
        let stats = scheduler.run(clock).await;

        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.peak_workers, 1);

        let fired_at = fired_at.lock().unwrap().clone();
        assert_eq!(
            fired_at,
            vec![
                Duration::from_secs(29),
                Duration::from_secs(59),
                Duration::from_secs(89)
            ]
        );
        assert!(fired_at
            .windows(2)
            .all(|pair| pair[1] - pair[0] >= Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn population_follows_stage_targets() {
        let count = Arc::new(AtomicU64::new(0));
        let scheduler = PacedScheduler::new(
            counting_task(count.clone()),
            profile(&[(2, 2), (2, 4), (2, 1)], 2, vec![1]),
            Duration::from_secs(1),
        )
        .unwrap();

        let stats = scheduler.run(RunClock::start()).await;

        // 2 workers x 1 + 4 workers x 1 + 1 worker x 1
        assert_eq!(stats.iterations, 7);
        assert_eq!(count.load(Ordering::SeqCst), 7);
        assert_eq!(stats.peak_workers, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_rate_can_vary_by_stage() {
        let count = Arc::new(AtomicU64::new(0));
        let mut profile = profile(&[(2, 1)], 1, vec![1, 3]);
        // Ends between ticks so the final tick is unambiguous.
        profile
            .stages
            .push(Stage::new(Duration::from_millis(2_500), 1));

        let scheduler =
            PacedScheduler::new(counting_task(count.clone()), profile, Duration::from_secs(1))
                .unwrap();

        let stats = scheduler.run(RunClock::start()).await;
        // Ticks at 0s and 1s run one iteration each, ticks at 2s, 3s and 4s run three each.
        assert_eq!(stats.iterations, 2 + 9);
    }

    #[tokio::test(start_paused = true)]
    async fn ramp_down_is_immediate() {
        let scheduler = PacedScheduler::new(
            || tokio::time::sleep(Duration::from_secs(100)),
            profile(&[(3, 2)], 1, vec![1]),
            Duration::from_secs(1),
        )
        .unwrap();

        let clock = RunClock::start();
        let stats = scheduler.run(clock).await;

        assert_eq!(clock.elapsed(), Duration::from_secs(3));
        assert_eq!(stats.iterations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_population_runs_nothing() {
        let count = Arc::new(AtomicU64::new(0));
        let scheduler = PacedScheduler::new(
            counting_task(count.clone()),
            profile(&[(5, 0)], 1, vec![1]),
            Duration::from_secs(1),
        )
        .unwrap();

        let stats = scheduler.run(RunClock::start()).await;
        assert_eq!(stats.iterations, 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn window_must_divide_into_ticks() {
        let result = PacedScheduler::new(
            || std::future::ready(()),
            profile(&[(5, 1)], 3, vec![1]),
            Duration::from_secs(2),
        );
        assert!(matches!(
            result,
            Err(ConfigError::WindowNotMultipleOfTick { .. })
        ));
    }
}
