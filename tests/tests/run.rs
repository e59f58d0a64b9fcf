mod utils;
#[allow(unused)]
use utils::*;

use mock_service::MockConfig;
use stampede::prelude::*;
use stampede_core::CheckStatistics;
use stampede_runtime::{exit_status, ReqwestTransport, StampedeRuntime, THRESHOLD_BREACH_EXIT};
use std::time::Duration;

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(5)).unwrap()
}

fn check<'a>(stats: &'a RunStatistics, name: &str) -> &'a CheckStatistics {
    stats.checks.iter().find(|c| c.name == name).unwrap()
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn healthy_service_passes() {
    init();
    let base_url = spawn_mock(MockConfig::default()).await.unwrap();

    let stats = RunCoordinator::new(short_run(&base_url), transport())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.verdict, Verdict::Pass);
    assert_eq!(stats.server_errors.failures, 0);
    assert_eq!(stats.login.iterations, 20 + 40);
    assert_eq!(stats.login.dropped, 0);
    assert!(stats.register.iterations > 0);
    assert_eq!(stats.register.peak_workers, 4);

    assert_eq!(check(&stats, "setup register").passes, 1);
    assert_eq!(check(&stats, "register 201").fails, 0);
    assert_eq!(check(&stats, "login 200").fails, 0);
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn existing_fixture_is_reused() {
    init();
    let base_url = spawn_mock(MockConfig::default()).await.unwrap();

    for _ in 0..2 {
        let stats = RunCoordinator::new(short_run(&base_url), transport())
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(stats.verdict, Verdict::Pass);
        assert_eq!(check(&stats, "setup register").passes, 1);
        assert_eq!(check(&stats, "login 200").fails, 0);
    }
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn failed_checks_do_not_gate_the_run() {
    init();
    let base_url = spawn_mock(MockConfig::default()).await.unwrap();

    RunCoordinator::new(short_run(&base_url), transport())
        .unwrap()
        .setup()
        .await
        .unwrap();

    // Same email, different password: setup sees 409 and every login is rejected.
    let config = short_run(&base_url).credential(FixtureCredential::new(
        stampede_core::DEFAULT_LOGIN_EMAIL,
        "not-the-password",
    ));
    let stats = RunCoordinator::new(config, transport())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.verdict, Verdict::Pass);
    assert_eq!(check(&stats, "login 200").passes, 0);
    assert!(check(&stats, "login 200").fails > 0);
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn overloaded_service_fails() {
    init();
    let base_url = spawn_mock(MockConfig {
        max_rps: Some(5),
        ..Default::default()
    })
    .await
    .unwrap();

    let stats = RunCoordinator::new(short_run(&base_url), transport())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.verdict, Verdict::Fail);
    assert!(stats.server_error_rate() >= 0.10);
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn outage_aborts_in_setup() {
    init();
    let base_url = spawn_mock(MockConfig {
        outage: true,
        ..Default::default()
    })
    .await
    .unwrap();

    let result = RunCoordinator::new(short_run(&base_url), transport())
        .unwrap()
        .run()
        .await;

    assert!(matches!(result, Err(RunError::Setup { status: 500, .. })));
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn unreachable_service_aborts_in_setup() {
    init();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = RunCoordinator::new(short_run(&format!("http://{addr}/api/v1")), transport())
        .unwrap()
        .run()
        .await;

    assert!(matches!(result, Err(RunError::SetupTransport(_))));
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn runtime_exit_status() {
    init();
    let healthy = spawn_mock(MockConfig::default()).await.unwrap();
    let overloaded = spawn_mock(MockConfig {
        max_rps: Some(5),
        ..Default::default()
    })
    .await
    .unwrap();

    let result = StampedeRuntime::new()
        .config(short_run(&healthy))
        .timeout(Duration::from_secs(5))
        .try_run()
        .await;
    assert_eq!(exit_status(&result), 0);

    let result = StampedeRuntime::new()
        .config(short_run(&overloaded))
        .timeout(Duration::from_secs(5))
        .try_run()
        .await;
    assert_eq!(exit_status(&result), THRESHOLD_BREACH_EXIT);
}
