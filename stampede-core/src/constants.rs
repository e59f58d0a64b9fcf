use std::time::Duration;

/// The default 5xx rate at which a run is reported as failed.
pub const DEFAULT_THRESHOLD: f64 = 0.10;

/// Period of the paced workers' repeating timer.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

pub const DEFAULT_STAGE_DURATION: Duration = Duration::from_secs(30);

/// Window over which a paced worker's per-stage iteration count is spread.
pub const DEFAULT_PACING_WINDOW: Duration = Duration::from_secs(30);

pub const DEFAULT_PREALLOCATED_WORKERS: usize = 1_200;
pub const DEFAULT_MAX_WORKERS: usize = 20_000;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_LOGIN_EMAIL: &str = "k6-login@example.com";
pub const DEFAULT_LOGIN_PASSWORD: &str = "Passw0rd!";

/// Password used for every freshly generated registration identity.
pub const DEFAULT_REGISTER_PASSWORD: &str = "Passw0rd!";
pub const DEFAULT_IDENTITY_DOMAIN: &str = "stampede.local";

/// Live register workers per stage.
pub const DEFAULT_REGISTER_POPULATION: [u32; 7] = [250, 500, 1_000, 2_000, 5_000, 8_000, 10_000];

/// Login requests to spread over each stage. Rates are derived by rounding
/// `total / stage seconds`.
pub const DEFAULT_LOGIN_TOTALS: [u64; 7] =
    [2_500, 12_500, 30_000, 64_000, 165_000, 280_000, 364_000];
