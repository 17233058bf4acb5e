use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};

use crate::error::NotifyError;

/// Fixed timeout for alert delivery
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

pub const ALERT_NAME: &str = "Prometheus unresponsible";

/// Alert object in the receiver's v1 wire format.
///
/// `ends_at` in the future means firing, `ends_at <= now` means resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    #[serde(rename = "endsAt")]
    pub ends_at: DateTime<Utc>,
}

impl Alert {
    pub fn is_firing_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at > now
    }

    pub fn alert_name(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }
}

/// Builds the single alert this exporter ever sends.
#[derive(Debug, Clone)]
pub struct AlertTemplate {
    labels: BTreeMap<String, String>,
    generator_url: String,
}

impl AlertTemplate {
    pub fn new(generator_url: impl Into<String>, severity: &str, env: &str) -> Self {
        let labels = BTreeMap::from([
            ("alertname".to_string(), ALERT_NAME.to_string()),
            ("severity".to_string(), severity.to_string()),
            ("env".to_string(), env.to_string()),
        ]);

        Self {
            labels,
            generator_url: generator_url.into(),
        }
    }

    /// Alert that stays firing until `ends_at` unless refreshed or resolved
    pub fn firing(&self, now: DateTime<Utc>, ttl: Duration) -> Alert {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1));
        self.with_end(now + ttl)
    }

    pub fn resolved(&self, now: DateTime<Utc>) -> Alert {
        self.with_end(now)
    }

    fn with_end(&self, ends_at: DateTime<Utc>) -> Alert {
        Alert {
            labels: self.labels.clone(),
            annotations: BTreeMap::new(),
            generator_url: self.generator_url.clone(),
            ends_at,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        (**self).notify(alert).await
    }
}

/// Posts alerts to an Alertmanager-compatible receiver.
#[derive(Debug, Clone)]
pub struct AlertManager {
    client: Client,
    url: Option<String>,
}

impl AlertManager {
    /// `url` is the full alerts endpoint; `None` turns every notification into a no-op.
    pub fn new(url: Option<String>) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(NOTIFY_TIMEOUT).build()?,
            url,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

#[async_trait]
impl Notifier for AlertManager {
    #[instrument(skip(self, alert), fields(ends_at = %alert.ends_at))]
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let Some(url) = &self.url else {
            trace!("no alert receiver configured, skipping");
            return Ok(());
        };

        // the receiver expects a list, even for a single alert
        let body = serde_json::to_vec(&[alert])?;

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| NotifyError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        if alert.is_firing_at(Utc::now()) {
            info!("Successfully sent firing alert");
        } else {
            debug!("Successfully sent resolving alert");
        }
        Ok(())
    }
}
