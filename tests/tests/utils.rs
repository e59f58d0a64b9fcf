use mock_service::MockConfig;
use stampede_core::{ArrivalProfile, PacedProfile, Pacing, RunConfig, Stage};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("stampede=debug,stampede_runtime=debug,mock_service=debug")
            .try_init();
    });
}

/// Serve the mock auth API on an ephemeral port and return its base URL.
#[allow(unused)]
pub async fn spawn_mock(config: MockConfig) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = mock_service::serve(listener, config).await {
            error!("Mock service stopped: {err}");
        }
    });
    Ok(format!("http://{addr}/api/v1"))
}

/// A two second run: 2 then 4 paced register workers, 20 then 40 logins per second.
#[allow(unused)]
pub fn short_run(base_url: &str) -> RunConfig {
    RunConfig::new(base_url)
        .tick(Duration::from_millis(100))
        .register(PacedProfile {
            stages: vec![
                Stage::new(Duration::from_secs(1), 2),
                Stage::new(Duration::from_secs(1), 4),
            ],
            pacing: Pacing::uniform(Duration::from_millis(500), 1),
        })
        .login(ArrivalProfile {
            stages: vec![
                Stage::new(Duration::from_secs(1), 20),
                Stage::new(Duration::from_secs(1), 40),
            ],
            preallocated_workers: 4,
            max_workers: 200,
        })
}
