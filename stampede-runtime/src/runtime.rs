//! Default stampede runtime
//!
//! Resolves the run configuration from CLI arguments, environment variables and an optional
//! profile file, runs it against the target API over HTTP and maps the verdict to an exit code.
use crate::{error::RuntimeError, transport::ReqwestTransport};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use stampede::coordinator::RunCoordinator;
use stampede::RunError;
use stampede_core::{
    FixtureCredential, ProfileFile, RunConfig, RunStatistics, DEFAULT_BASE_URL,
    DEFAULT_LOGIN_EMAIL, DEFAULT_LOGIN_PASSWORD, DEFAULT_THRESHOLD,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};

/// Exit status when the run completed but the 5xx rate breached the threshold.
pub const THRESHOLD_BREACH_EXIT: u8 = 99;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(version, about = "Staged register and login load against an auth API.")]
struct StampedeCli {
    /// Base URL of the API, e.g. `http://localhost:8000/api/v1`
    #[arg(short, long, env = "STAMPEDE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, env = "STAMPEDE_LOGIN_EMAIL", default_value = DEFAULT_LOGIN_EMAIL)]
    login_email: String,

    #[arg(
        long,
        env = "STAMPEDE_LOGIN_PASSWORD",
        default_value = DEFAULT_LOGIN_PASSWORD,
        hide_env_values = true,
        hide_default_value = true
    )]
    login_password: String,

    /// Maximum 5xx rate, exclusive
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// JSON file with stage schedules for either profile
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    prometheus: Option<SocketAddr>,

    /// Per-request timeout
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    timeout: Duration,
}

/// Default stampede runtime.
///
/// # Example
///
/// ```no_run
/// use stampede_runtime::StampedeRuntime;
///
/// #[tokio::main]
/// async fn main() -> std::process::ExitCode {
///     StampedeRuntime::new().with_args().run().await
/// }
/// ```
pub struct StampedeRuntime {
    config: RunConfig,
    profile: Option<PathBuf>,
    prometheus: Option<SocketAddr>,
    timeout: Duration,
}

impl Default for StampedeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl StampedeRuntime {
    pub fn new() -> Self {
        StampedeRuntime {
            config: RunConfig::default(),
            profile: None,
            prometheus: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use the default CLI arguments.
    ///
    /// `-b`, `--base-url` (`STAMPEDE_BASE_URL`), `--login-email` (`STAMPEDE_LOGIN_EMAIL`),
    /// `--login-password` (`STAMPEDE_LOGIN_PASSWORD`), `-t`, `--threshold`, `-p`, `--profile`,
    /// `--prometheus` and `--timeout`.
    ///
    /// # Example
    /// ```ignore
    /// $ STAMPEDE_BASE_URL=https://staging.example.com/api/v1 ./stampede -p ramp.json
    /// $ ./stampede --threshold 0.05 --prometheus 0.0.0.0:9000
    /// ```
    pub fn with_args(self) -> Self {
        self.apply_cli(StampedeCli::parse())
    }

    fn apply_cli(mut self, args: StampedeCli) -> Self {
        self.config = RunConfig {
            base_url: args.base_url.trim_end_matches('/').to_string(),
            credential: FixtureCredential::new(args.login_email, args.login_password),
            threshold: args.threshold,
            ..self.config
        };
        self.profile = args.profile;
        self.prometheus = args.prometheus;
        self.timeout = args.timeout;
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn profile(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile = Some(path.into());
        self
    }

    pub fn prometheus(mut self, addr: SocketAddr) -> Self {
        self.prometheus = Some(addr);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run to completion, print the summary and map the outcome to an exit status.
    #[instrument(name = "stampede", skip_all)]
    pub async fn run(self) -> ExitCode {
        let result = self.try_run().await;
        match &result {
            Ok(stats) => println!("{stats}"),
            Err(err) => error!("{err}"),
        }
        ExitCode::from(exit_status(&result))
    }

    /// Like [`StampedeRuntime::run`], but hands back the statistics.
    pub async fn try_run(self) -> Result<RunStatistics, RuntimeError> {
        let config = self.resolve_config().await?;

        if let Some(addr) = self.prometheus {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()?;
            info!("Prometheus metrics on {addr}");
        }

        let transport = ReqwestTransport::new(self.timeout)?;
        let coordinator = RunCoordinator::new(config, transport)?;
        Ok(coordinator.run().await?)
    }

    async fn resolve_config(&self) -> Result<RunConfig, RuntimeError> {
        let Some(path) = &self.profile else {
            self.config.validate()?;
            return Ok(self.config.clone());
        };

        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RuntimeError::ProfileRead {
                path: path.clone(),
                source,
            })?;
        debug!("Loaded profile {path:?}");
        Ok(ProfileFile::from_json(&json)?.apply(self.config.clone())?)
    }
}

/// `0` on a passing run, [`THRESHOLD_BREACH_EXIT`] on a breach, `1` when the run could not
/// start.
pub fn exit_status(result: &Result<RunStatistics, RuntimeError>) -> u8 {
    match result {
        Ok(stats) if stats.verdict.is_pass() => 0,
        Ok(_) => THRESHOLD_BREACH_EXIT,
        Err(RuntimeError::Run(RunError::Setup { status, .. })) => {
            debug!("Setup rejected with {status}");
            1
        }
        Err(_) => 1,
    }
}
