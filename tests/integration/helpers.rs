//! Helper functions for integration tests

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tsdb_cardinality_exporter::{
    Alert, AlertManager, AlertTemplate, Clock, HttpStatusSource, InstrumentKind, MetricsPublisher,
    Poller,
};
use wiremock::MockServer;

pub const STATUS_PATH: &str = "/api/v1/status/tsdb";
pub const ALERTS_PATH: &str = "/api/v1/alerts";

/// Clock whose sleeps return immediately and advance the virtual time.
pub struct InstantClock {
    now: Mutex<DateTime<Utc>>,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }
}

#[async_trait]
impl Clock for InstantClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.now.lock().unwrap() += chrono::Duration::from_std(duration).unwrap();
    }
}

pub type HttpPoller = Poller<HttpStatusSource, AlertManager, InstantClock>;

/// Poller wired to real HTTP clients, optionally alerting to `receiver`.
pub fn create_http_poller(
    upstream: &MockServer,
    receiver: Option<&MockServer>,
) -> (HttpPoller, MetricsPublisher) {
    let publisher = MetricsPublisher::new(InstrumentKind::Gauge);
    let source = HttpStatusSource::new(
        format!("{}{STATUS_PATH}", upstream.uri()),
        Duration::from_secs(2),
    )
    .unwrap();
    let notifier =
        AlertManager::new(receiver.map(|server| format!("{}{ALERTS_PATH}", server.uri())))
            .unwrap();

    let poller = Poller::new(
        source,
        notifier,
        InstantClock::new(),
        publisher.clone(),
        AlertTemplate::new(upstream.uri(), "medium", "prod"),
    );

    (poller, publisher)
}

pub fn create_status_json(series: &[(&str, u64)]) -> serde_json::Value {
    let series: Vec<_> = series
        .iter()
        .map(|(name, value)| serde_json::json!({"name": name, "value": value}))
        .collect();

    serde_json::json!({
        "status": "success",
        "data": {
            "seriesCountByMetricName": series,
            "labelValueCountByLabelName": [{"name": "instance", "value": 3}],
            "memoryInBytesByLabelName": [{"name": "__name__", "value": 4096}],
            "seriesCountByLabelValuePair": [{"name": "job=node", "value": 11}]
        }
    })
}

/// Every alert the receiver got, in arrival order.
pub async fn received_alerts(receiver: &MockServer) -> Vec<Alert> {
    receiver
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .flat_map(|request| serde_json::from_slice::<Vec<Alert>>(&request.body).unwrap())
        .collect()
}
