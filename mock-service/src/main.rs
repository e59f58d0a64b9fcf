use mock_service::{rps_measure_task, serve, MockConfig};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_service=debug,tower_http=info")
        .init();

    let addr = std::env::var("MOCK_SERVICE_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let config = MockConfig {
        delay: Duration::from_millis(
            std::env::var("MOCK_SERVICE_DELAY_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .unwrap_or(10),
        ),
        max_rps: std::env::var("MOCK_SERVICE_MAX_RPS")
            .ok()
            .and_then(|rps| rps.parse().ok()),
        outage: false,
    };

    tokio::spawn(rps_measure_task());

    let listener = TcpListener::bind(&addr).await?;
    serve(listener, config).await
}
