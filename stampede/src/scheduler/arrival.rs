use super::pool::{Dispatch, WorkerPool};
use crate::clock::{RunClock, StageClock};
use stampede_core::{ArrivalProfile, ArrivalStatistics};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Open-loop arrival rate.
///
/// Each stage starts exactly `target` iterations per second at evenly spaced offsets from the
/// stage start, regardless of how long earlier iterations take. Iterations run on a bounded pool
/// of workers, pre-spawned up to `preallocated_workers`; an arrival that finds all
/// `max_workers` busy is dropped and counted.
pub struct ArrivalScheduler<T> {
    task: T,
    profile: ArrivalProfile,
}

impl<T, F> ArrivalScheduler<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    pub fn new(task: T, profile: ArrivalProfile) -> Self {
        Self { task, profile }
    }

    /// Drive the profile to completion. Iterations still in flight at the end are aborted.
    #[instrument(name = "arrival", skip_all)]
    pub async fn run(self, clock: RunClock) -> ArrivalStatistics {
        let stages = StageClock::new(clock, &self.profile.stages);
        let mut in_flight = JoinSet::new();
        let mut pool = WorkerPool::new(
            self.task,
            self.profile.preallocated_workers,
            self.profile.max_workers,
            &mut in_flight,
        );
        let mut iterations = 0u64;
        let mut dropped = 0u64;
        let mut spawned = 0u64;

        debug!(
            "Running {} stages for {} with {}..{} workers",
            stages.num_stages(),
            humantime::format_duration(stages.total_duration()),
            self.profile.preallocated_workers,
            self.profile.max_workers,
        );

        for (index, stage) in self.profile.stages.iter().enumerate() {
            let start = stages.stage_start(index);
            let end = stages.stage_end(index);
            if Instant::now() >= end {
                trace!("Stage {index} already elapsed.");
                continue;
            }

            let rate = stage.target as u64;
            info!("Stage {index}: {rate} iterations/s");

            let mut stage_dropped = 0u64;
            for arrival in 0.. {
                let Some(at) = arrival_offset(arrival, rate).map(|offset| start + offset) else {
                    break;
                };
                if at >= end {
                    break;
                }
                wait_until(at, &mut in_flight).await;

                match pool.dispatch(&mut in_flight) {
                    Dispatch::Warm => iterations += 1,
                    Dispatch::Spawned => {
                        iterations += 1;
                        spawned += 1;
                    }
                    Dispatch::Dropped => {
                        if stage_dropped == 0 {
                            warn!(
                                "Worker pool exhausted at {} workers; dropping iterations.",
                                pool.max()
                            );
                        }
                        stage_dropped += 1;
                        #[cfg(feature = "metrics")]
                        metrics::counter!("stampede_arrival_dropped").increment(1);
                    }
                }

                #[cfg(feature = "metrics")]
                metrics::gauge!("stampede_arrival_busy_workers").set(pool.busy() as f64);
            }

            if stage_dropped > 0 {
                warn!("Stage {index}: dropped {stage_dropped} iterations");
            }
            dropped += stage_dropped;

            wait_until(end, &mut in_flight).await;
        }

        // NOTE: No graceful ramp-down; in-flight iterations are abandoned.
        in_flight.abort_all();
        drop(in_flight);
        #[cfg(feature = "metrics")]
        metrics::gauge!("stampede_arrival_busy_workers").set(0.);

        info!("Arrival profile complete: {iterations} iterations, {dropped} dropped");

        ArrivalStatistics {
            iterations,
            dropped,
            spawned,
            peak_workers: pool.peak(),
        }
    }
}

/// Offset of the `arrival`th start within a stage, `None` for an idle stage.
///
/// Computed from the index rather than accumulated, so a stage of `d` whole seconds starts
/// exactly `rate * d` iterations.
fn arrival_offset(arrival: u64, rate: u64) -> Option<Duration> {
    if rate == 0 {
        return None;
    }
    let nanos = arrival.checked_mul(1_000_000_000)? / rate;
    Some(Duration::from_nanos(nanos))
}

/// Sleep until `deadline`, reaping finished iterations meanwhile.
async fn wait_until(deadline: Instant, in_flight: &mut JoinSet<()>) {
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            biased;
            _ = &mut sleep => return,
            Some(res) = in_flight.join_next() => {
                if let Err(err) = res {
                    if err.is_panic() {
                        error!("Iteration panicked: {err}");
                    }
                }
            }
        }
    }
}
