//! Failure tests: unreachable upstream, malformed payloads and alerting

use pretty_assertions::assert_eq;
use tsdb_cardinality_exporter::{CycleOutcome, PollState, poller::FAILURE_THRESHOLD};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

async fn mount_receiver() -> MockServer {
    let receiver = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ALERTS_PATH))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&receiver)
        .await;
    receiver
}

#[tokio::test]
async fn test_server_error_counts_as_failure() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;

    let (mut poller, _) = create_http_poller(&upstream, None);

    assert_eq!(poller.cycle().await, CycleOutcome::Unreachable);
    assert_eq!(poller.context().failures, 1);
}

#[tokio::test]
async fn test_malformed_json_keeps_previous_values() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_status_json(&[("http_requests_total", 42)])),
        )
        .up_to_n_times(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("{invalid json"))
        .mount(&upstream)
        .await;

    let (mut poller, publisher) = create_http_poller(&upstream, None);

    poller.cycle().await;
    let before = publisher.render().unwrap();

    assert_eq!(poller.cycle().await, CycleOutcome::Unparsable);
    assert_eq!(poller.context().failures, 0);
    assert_eq!(publisher.render().unwrap(), before);
}

#[tokio::test]
async fn test_outage_fires_then_recovery_resolves() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(FAILURE_THRESHOLD as u64 + 2)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(create_status_json(&[])))
        .mount(&upstream)
        .await;
    let receiver = mount_receiver().await;

    let (mut poller, _) = create_http_poller(&upstream, Some(&receiver));

    // six failures, then the seventh cycle raises the alert and fails again
    poller.run_cycles(7).await;
    assert_eq!(poller.state(), PollState::Firing);

    let alerts = received_alerts(&receiver).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_name(), Some("Prometheus unresponsible"));
    assert_eq!(alerts[0].generator_url, upstream.uri());
    let fired_until = alerts[0].ends_at;

    poller.run_cycles(3).await;
    assert_eq!(poller.state(), PollState::Healthy);

    let alerts = received_alerts(&receiver).await;
    assert_eq!(alerts.len(), 2);
    assert!(alerts[1].ends_at < fired_until);
    assert_eq!(alerts[1].labels, alerts[0].labels);
}

#[tokio::test]
async fn test_unreachable_receiver_does_not_stop_polling() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstream)
        .await;

    // receiver that accepts nothing
    let receiver = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&receiver)
        .await;

    let (mut poller, _) = create_http_poller(&upstream, Some(&receiver));
    let outcomes = poller.run_cycles(9).await;

    assert!(outcomes.iter().all(|o| *o == CycleOutcome::Unreachable));
    assert_eq!(poller.state(), PollState::Degraded);
    // one attempt per cycle once the threshold is passed
    assert_eq!(receiver.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_status_json(&[]))
                .set_delay(std::time::Duration::from_secs(10)),
        )
        .mount(&upstream)
        .await;

    let (mut poller, _) = create_http_poller(&upstream, None);

    assert_eq!(poller.cycle().await, CycleOutcome::Unreachable);
    assert_eq!(poller.context().failures, 1);
}
