use crate::{
    ConfigError, DEFAULT_BASE_URL, DEFAULT_IDENTITY_DOMAIN, DEFAULT_LOGIN_EMAIL,
    DEFAULT_LOGIN_PASSWORD, DEFAULT_LOGIN_TOTALS, DEFAULT_MAX_WORKERS, DEFAULT_PACING_WINDOW,
    DEFAULT_PREALLOCATED_WORKERS, DEFAULT_REGISTER_PASSWORD, DEFAULT_REGISTER_POPULATION,
    DEFAULT_STAGE_DURATION, DEFAULT_THRESHOLD, DEFAULT_TICK,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single step of a ramp: hold `target` for `duration`.
///
/// Depending on the profile the target is a worker population or an arrival rate
/// (iterations started per second).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }

    /// Build a rate stage out of the total number of requests it should start.
    pub fn from_total(duration: Duration, total: u64) -> Result<Self, ConfigError> {
        let target = round_target(per_second(total as f64, duration))?;
        Ok(Self { duration, target })
    }
}

/// Round a fractional stage target to the integer the schedulers work with.
///
/// Ties round half away from zero (`2.5 -> 3`), which is `f64::round`.
pub fn round_target(value: f64) -> Result<u32, ConfigError> {
    if !value.is_finite() || value < 0. {
        return Err(ConfigError::InvalidTarget(value));
    }

    let rounded = value.round();
    if rounded > u32::MAX as f64 {
        return Err(ConfigError::TargetOverflow(value));
    }

    Ok(rounded as u32)
}

fn per_second(total: f64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs == 0. {
        0.
    } else {
        total / secs
    }
}

/// Stage as written in a profile file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageSpec {
    #[serde(with = "humantime_str")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

impl StageSpec {
    pub fn resolve(&self) -> Result<Stage, ConfigError> {
        let raw = match (self.target, self.total) {
            (Some(target), None) => target,
            (None, Some(total)) => per_second(total, self.duration),
            _ => return Err(ConfigError::AmbiguousTarget),
        };

        Ok(Stage::new(self.duration, round_target(raw)?))
    }
}

/// Per-worker rate of a paced profile: `iterations[stage]` per `window`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    #[serde(with = "humantime_str")]
    pub window: Duration,
    pub iterations: Vec<u32>,
}

impl Pacing {
    /// A rate that is the same for every stage.
    pub fn uniform(window: Duration, iterations: u32) -> Self {
        Self {
            window,
            iterations: vec![iterations],
        }
    }

    pub fn iterations_at(&self, stage: usize) -> u32 {
        match self.iterations.as_slice() {
            [single] => *single,
            list => list
                .get(stage)
                .or(list.last())
                .copied()
                .unwrap_or_default(),
        }
    }

    /// Number of ticks in one window. The window must hold a whole number of ticks.
    pub fn window_ticks(&self, tick: Duration) -> Result<u64, ConfigError> {
        if tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }

        let window = self.window.as_nanos();
        let tick_nanos = tick.as_nanos();
        if window == 0 || window % tick_nanos != 0 {
            return Err(ConfigError::WindowNotMultipleOfTick {
                window: self.window,
                tick,
            });
        }

        Ok((window / tick_nanos) as u64)
    }
}

/// Ramping population of paced workers.
#[derive(Clone, Debug, PartialEq)]
pub struct PacedProfile {
    pub stages: Vec<Stage>,
    pub pacing: Pacing,
}

impl PacedProfile {
    fn validate(&self, tick: Duration) -> Result<(), ConfigError> {
        validate_stages("register", &self.stages)?;

        let found = self.pacing.iterations.len();
        if found != 1 && found != self.stages.len() {
            return Err(ConfigError::PacingLength {
                found,
                stages: self.stages.len(),
            });
        }

        self.pacing.window_ticks(tick)?;
        Ok(())
    }
}

impl Default for PacedProfile {
    fn default() -> Self {
        Self {
            stages: DEFAULT_REGISTER_POPULATION
                .iter()
                .map(|target| Stage::new(DEFAULT_STAGE_DURATION, *target))
                .collect(),
            pacing: Pacing::uniform(DEFAULT_PACING_WINDOW, 1),
        }
    }
}

/// Open-loop arrival rate with a bounded worker pool.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrivalProfile {
    pub stages: Vec<Stage>,
    pub preallocated_workers: usize,
    pub max_workers: usize,
}

impl ArrivalProfile {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_stages("login", &self.stages)?;

        if self.max_workers == 0 || self.preallocated_workers > self.max_workers {
            return Err(ConfigError::PoolBounds {
                preallocated: self.preallocated_workers,
                max: self.max_workers,
            });
        }
        Ok(())
    }
}

impl Default for ArrivalProfile {
    fn default() -> Self {
        Self {
            // An unrepresentable default leaves the schedule empty, which `validate` rejects.
            stages: DEFAULT_LOGIN_TOTALS
                .iter()
                .map(|total| Stage::from_total(DEFAULT_STAGE_DURATION, *total))
                .collect::<Result<_, _>>()
                .unwrap_or_default(),
            preallocated_workers: DEFAULT_PREALLOCATED_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

fn validate_stages(profile: &'static str, stages: &[Stage]) -> Result<(), ConfigError> {
    if stages.is_empty() {
        return Err(ConfigError::EmptySchedule { profile });
    }
    if stages.iter().all(|s| s.duration.is_zero()) {
        return Err(ConfigError::ZeroDuration { profile });
    }
    Ok(())
}

/// The shared login identity, created once during setup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureCredential {
    pub email: String,
    pub password: String,
}

impl FixtureCredential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl Default for FixtureCredential {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_EMAIL, DEFAULT_LOGIN_PASSWORD)
    }
}

/// Everything a single run needs.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub base_url: String,
    pub credential: FixtureCredential,
    pub register_password: String,
    pub identity_domain: String,
    pub threshold: f64,
    pub tick: Duration,
    pub register: PacedProfile,
    pub login: ArrivalProfile,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl RunConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: FixtureCredential::default(),
            register_password: DEFAULT_REGISTER_PASSWORD.to_string(),
            identity_domain: DEFAULT_IDENTITY_DOMAIN.to_string(),
            threshold: DEFAULT_THRESHOLD,
            tick: DEFAULT_TICK,
            register: PacedProfile::default(),
            login: ArrivalProfile::default(),
        }
    }

    pub fn credential(mut self, credential: FixtureCredential) -> Self {
        self.credential = credential;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn register(mut self, register: PacedProfile) -> Self {
        self.register = register;
        self
    }

    pub fn login(mut self, login: ArrivalProfile) -> Self {
        self.login = login;
        self
    }

    /// Full URL for an API path such as `register`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::BaseUrl {
                    url: self.base_url.clone(),
                    reason: format!("unsupported scheme `{}`", url.scheme()),
                })
            }
            Err(err) => {
                return Err(ConfigError::BaseUrl {
                    url: self.base_url.clone(),
                    reason: err.to_string(),
                })
            }
        }

        if !(self.threshold > 0. && self.threshold <= 1.) {
            return Err(ConfigError::Threshold(self.threshold));
        }
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }

        self.register.validate(self.tick)?;
        self.login.validate()?;
        Ok(())
    }
}

/// Declarative stage schedules loaded from a JSON profile file. Every section is
/// optional; missing sections keep the current configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileFile {
    #[serde(default, with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub tick: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register: Option<PacedProfileSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<ArrivalProfileSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PacedProfileSpec {
    pub stages: Vec<StageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing: Option<Pacing>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArrivalProfileSpec {
    pub stages: Vec<StageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preallocated_workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
}

impl ProfileFile {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve every stage (rounding fractional targets) and overlay the result on `config`.
    pub fn apply(self, mut config: RunConfig) -> Result<RunConfig, ConfigError> {
        if let Some(tick) = self.tick {
            config.tick = tick;
        }

        if let Some(register) = self.register {
            config.register.stages = resolve_all(&register.stages)?;
            if let Some(pacing) = register.pacing {
                config.register.pacing = pacing;
            }
        }

        if let Some(login) = self.login {
            config.login.stages = resolve_all(&login.stages)?;
            if let Some(preallocated) = login.preallocated_workers {
                config.login.preallocated_workers = preallocated;
            }
            if let Some(max) = login.max_workers {
                config.login.max_workers = max;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn resolve_all(specs: &[StageSpec]) -> Result<Vec<Stage>, ConfigError> {
    specs.iter().map(StageSpec::resolve).collect()
}

mod humantime_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}

mod humantime_opt {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(duration) => super::humantime_str::serialize(duration, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| humantime::parse_duration(&raw).map_err(D::Error::custom))
            .transpose()
    }
}
