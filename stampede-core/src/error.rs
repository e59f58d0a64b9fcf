use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{profile} profile has no stages")]
    EmptySchedule { profile: &'static str },

    #[error("{profile} profile has a total duration of zero")]
    ZeroDuration { profile: &'static str },

    #[error("stage must set exactly one of `target` or `total`")]
    AmbiguousTarget,

    #[error("stage target must be a finite, non-negative number (got {0})")]
    InvalidTarget(f64),

    #[error("stage target {0} does not fit in a u32")]
    TargetOverflow(f64),

    #[error("pacing lists {found} rates for {stages} stages")]
    PacingLength { found: usize, stages: usize },

    #[error("tick must be greater than zero")]
    ZeroTick,

    #[error("pacing window {window:?} is not a whole multiple of the tick {tick:?}")]
    WindowNotMultipleOfTick { window: Duration, tick: Duration },

    #[error("worker pool bounds are invalid: preallocated={preallocated}, max={max}")]
    PoolBounds { preallocated: usize, max: usize },

    #[error("threshold must be within (0, 1] (got {0})")]
    Threshold(f64),

    #[error("invalid base url `{url}`: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("invalid profile: {0}")]
    Profile(#[from] serde_json::Error),
}
