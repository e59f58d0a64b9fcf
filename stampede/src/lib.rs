#![cfg_attr(docsrs, feature(doc_cfg))]
//! Load harness for an authentication API.
//!
//! Two load profiles run side by side against the same target: a ramping population of paced
//! workers hitting `register`, and an open-loop arrival rate hitting `login`. Every response is
//! folded into a single 5xx rate which gates the run.

pub mod clock;
pub mod coordinator;
pub mod executor;
pub mod identity;
pub mod metric;
pub mod scheduler;

mod error;

pub use error::RunError;

pub mod prelude {
    pub use crate::clock::{RunClock, StageClock};
    pub use crate::coordinator::RunCoordinator;
    pub use crate::executor::{
        LocalTransport, Method, Outcome, Request, RequestExecutor, Response, Transport,
        TransportError,
    };
    pub use crate::metric::{Check, Checks, RateMetric};
    pub use crate::scheduler::{ArrivalScheduler, PacedScheduler};
    pub use crate::RunError;

    pub use stampede_core::{
        ArrivalProfile, FixtureCredential, Pacing, PacedProfile, ProfileFile, RunConfig,
        RunStatistics, Stage, Verdict,
    };
}
