use async_channel::{bounded, Receiver, Sender};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

/// Where an arrival ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Picked up by an idle pre-spawned worker.
    Warm,
    /// Every pre-spawned worker was busy, so the iteration got a task of its own.
    Spawned,
    /// All `max` slots were taken.
    Dropped,
}

struct Job {
    slot: OwnedSemaphorePermit,
    _idle: OwnedSemaphorePermit,
}

/// Bounded set of workers for arrival-rate iterations.
///
/// Running iterations hold a permit of a [`Semaphore`] with `max` permits; an arrival that cannot
/// get one is dropped. `preallocated` long-lived workers are spawned up front and pull iterations
/// from a channel. Only when none of them is idle does an iteration get a fresh task.
pub(crate) struct WorkerPool<T> {
    task: T,
    max: usize,
    slots: Arc<Semaphore>,
    idle: Arc<Semaphore>,
    jobs: Sender<Job>,
    peak: usize,
}

impl<T, F> WorkerPool<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    /// Spawn the preallocated workers into `tasks`, so they are aborted along with everything else
    /// running there.
    pub fn new(task: T, preallocated: usize, max: usize, tasks: &mut JoinSet<()>) -> Self {
        let preallocated = preallocated.min(max);
        let (jobs, receiver) = bounded(preallocated.max(1));

        for _ in 0..preallocated {
            tasks.spawn(worker(task.clone(), receiver.clone()).in_current_span());
        }
        debug!("Spawned {preallocated} workers, capped at {max}");

        Self {
            task,
            max,
            slots: Arc::new(Semaphore::new(max)),
            idle: Arc::new(Semaphore::new(preallocated)),
            jobs,
            peak: 0,
        }
    }

    /// Start one iteration now, if a slot is free.
    pub fn dispatch(&mut self, tasks: &mut JoinSet<()>) -> Dispatch {
        let Ok(slot) = self.slots.clone().try_acquire_owned() else {
            return Dispatch::Dropped;
        };
        self.peak = self.peak.max(self.busy());

        // Queued jobs never outnumber idle workers, so the channel has room.
        let slot = match self.idle.clone().try_acquire_owned() {
            Ok(idle) => match self.jobs.try_send(Job { slot, _idle: idle }) {
                Ok(()) => return Dispatch::Warm,
                Err(err) => err.into_inner().slot,
            },
            Err(_) => slot,
        };

        let task = self.task.clone();
        tasks.spawn(
            async move {
                let _slot = slot;
                task().await;
            }
            .in_current_span(),
        );
        trace!("Spawned a worker; {} busy", self.busy());
        Dispatch::Spawned
    }

    pub fn busy(&self) -> usize {
        self.max - self.slots.available_permits()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Most iterations ever running at once.
    pub fn peak(&self) -> usize {
        self.peak
    }
}

async fn worker<T, F>(task: T, jobs: Receiver<Job>)
where
    T: Fn() -> F,
    F: Future<Output = ()>,
{
    while let Ok(job) = jobs.recv().await {
        task().await;
        drop(job);
    }
}
