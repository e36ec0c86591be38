//! The stock 5 → 15 → 20 → 50 → 50 → 0 VU schedule against a local mock
//! shortener.

use std::time::{Duration, Instant};

use redirect_bench::{
    request_url, DriverOptions, LoadDriver, RedirectClient, RedirectScenario, Schedule,
    STATUS_IS_308,
};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_shortener(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("Location", "https://example.com/")
                .set_delay(Duration::from_millis(20)),
        )
        .mount(&server)
        .await;
    server
}

fn scenario(server: &MockServer) -> RedirectScenario {
    let client = RedirectClient::new(Duration::from_secs(60)).unwrap();
    RedirectScenario::new(
        client,
        request_url(&format!("{}/", server.uri()), Some("bench")),
    )
}

/// Test: 100% of checks pass across the whole schedule
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Ignore by default as this is a slow test
async fn test_default_schedule_all_redirects_pass() {
    let server = mock_shortener(308).await;
    let started = Instant::now();

    let summary = LoadDriver::new(scenario(&server), Schedule::default(), DriverOptions::default())
        .run()
        .await
        .unwrap();

    println!("{summary}");

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(7 * 60), "ran for {elapsed:?}");
    assert!(elapsed < Duration::from_secs(8 * 60), "ran for {elapsed:?}");

    let tally = summary.check(STATUS_IS_308).unwrap();
    assert_eq!(tally.fails, 0);
    assert!(tally.passes > 1000);
    assert_eq!(summary.counters.peak_vus, 50);
    assert_eq!(summary.counters.failed_iterations, 0);
}

/// Test: a non-redirecting server fails every check without aborting the run
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Ignore by default as this is a slow test
async fn test_default_schedule_reports_failure_ratio() {
    let server = mock_shortener(200).await;

    let summary = LoadDriver::new(scenario(&server), Schedule::default(), DriverOptions::default())
        .run()
        .await
        .unwrap();

    println!("{summary}");

    let tally = summary.check(STATUS_IS_308).unwrap();
    assert_eq!(tally.passes, 0);
    assert!(tally.fails > 0);
    assert_eq!(summary.check_pass_ratio(), 0.0);
}
