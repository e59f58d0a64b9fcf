//! Load schedulers.
//!
//! [`PacedScheduler`] ramps a population of workers that each run a paced number of iterations
//! per tick. [`ArrivalScheduler`] starts iterations at a target rate regardless of how long they
//! take, on a bounded pool of workers.
mod arrival;
mod paced;
mod pool;
mod quota;
mod timer;

pub use arrival::ArrivalScheduler;
pub use paced::PacedScheduler;
pub use quota::WorkerQuota;
