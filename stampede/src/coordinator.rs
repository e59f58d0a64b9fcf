//! One complete run: setup, both load profiles side by side, then the threshold gate.
use crate::clock::RunClock;
use crate::executor::{Outcome, RequestExecutor, Transport};
use crate::identity::{self, Credentials};
use crate::metric::RateMetric;
use crate::scheduler::{ArrivalScheduler, PacedScheduler};
use crate::RunError;
use stampede_core::{FixtureCredential, RunConfig, RunStatistics, Verdict};
use std::sync::Arc;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

pub struct RunCoordinator<C> {
    config: RunConfig,
    executor: RequestExecutor<C>,
}

impl<C> RunCoordinator<C>
where
    C: Transport + Sync + 'static,
{
    /// Validate `config` and bind it to a transport.
    pub fn new(config: RunConfig, transport: C) -> Result<Self, RunError> {
        config.validate()?;
        let metric = RateMetric::new("http_5xx_rate", config.threshold);
        Ok(Self {
            executor: RequestExecutor::new(transport, metric),
            config,
        })
    }

    pub fn executor(&self) -> &RequestExecutor<C> {
        &self.executor
    }

    /// Register the fixture credential used by every login.
    ///
    /// `201 Created` and `409 Conflict` both mean the account exists. Anything else aborts the
    /// run before load starts.
    #[instrument(name = "setup", skip_all)]
    pub async fn setup(&self) -> Result<Arc<FixtureCredential>, RunError> {
        let credential = self.config.credential.clone();
        let check = self.executor.check("setup register");

        let outcome = self
            .executor
            .post_json(&self.config.endpoint("register"), &Credentials::from(&credential))
            .await;

        match outcome {
            Outcome::Response(res) if matches!(res.status, 201 | 409) => {
                check.record(true);
                info!("Fixture {} ready ({})", credential.email, res.status);
                Ok(Arc::new(credential))
            }
            Outcome::Response(res) => {
                check.record(false);
                error!("Setup register returned {}", res.status);
                Err(RunError::Setup {
                    status: res.status,
                    body: res.body,
                })
            }
            Outcome::TransportFailure(err) => {
                check.record(false);
                error!("Setup register failed: {err}");
                Err(RunError::SetupTransport(err))
            }
        }
    }

    /// Run setup, then both profiles to completion, and evaluate the 5xx rate.
    ///
    /// A threshold breach is not an error; it is reported through [`RunStatistics::verdict`].
    #[instrument(name = "run", skip_all)]
    pub async fn run(self) -> Result<RunStatistics, RunError> {
        let credential = self.setup().await?;

        let register = {
            let executor = self.executor.clone();
            let check = executor.check("register 201");
            let url: Arc<str> = self.config.endpoint("register").into();
            let domain: Arc<str> = self.config.identity_domain.as_str().into();
            let password: Arc<str> = self.config.register_password.as_str().into();

            move || {
                let executor = executor.clone();
                let check = check.clone();
                let url = url.clone();
                let password = password.clone();
                let email = identity::unique_email(&domain);
                async move {
                    let body = Credentials {
                        email: &email,
                        password: &password,
                    };
                    let outcome = executor.post_json(&url, &body).await;
                    if !check.record(outcome.has_status(201)) {
                        debug!("register {email}: {outcome}");
                    }
                }
            }
        };

        let login = {
            let executor = self.executor.clone();
            let check = executor.check("login 200");
            let url: Arc<str> = self.config.endpoint("login").into();

            move || {
                let executor = executor.clone();
                let check = check.clone();
                let url = url.clone();
                let credential = credential.clone();
                async move {
                    let outcome = executor
                        .post_json(&url, &Credentials::from(&*credential))
                        .await;
                    if !check.record(outcome.has_status(200)) {
                        debug!("login: {outcome}");
                    }
                }
            }
        };

        let register =
            PacedScheduler::new(register, self.config.register.clone(), self.config.tick)?;
        let login = ArrivalScheduler::new(login, self.config.login.clone());

        let clock = RunClock::start();
        info!("Load started against {}", self.config.base_url);
        let (register, login) = tokio::join!(register.run(clock), login.run(clock));

        let metric = self.executor.metric();
        let server_errors = metric.snapshot();
        let verdict = metric.evaluate_snapshot(&server_errors);
        let stats = RunStatistics {
            verdict,
            threshold: metric.threshold(),
            server_errors,
            register,
            login,
            checks: self.executor.checks().statistics(),
        };

        match verdict {
            Verdict::Pass => info!(
                "{} {:.4} < {}",
                metric.name(),
                stats.server_error_rate(),
                stats.threshold
            ),
            Verdict::Fail => warn!(
                "{} {:.4} breached {}",
                metric.name(),
                stats.server_error_rate(),
                stats.threshold
            ),
        }

        Ok(stats)
    }
}
