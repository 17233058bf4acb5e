use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use tracing::{trace, warn};

use crate::error::ConfigError;
use crate::publisher::InstrumentKind;
use crate::status::Envelope;

pub const PROMETHEUS: &str = "PROMETHEUS";
pub const PROMETHEUS_TIMEOUT: &str = "PROMETHEUS_TIMEOUT";
pub const PROMETHEUS_ENVELOPE: &str = "PROMETHEUS_ENVELOPE";
pub const ALERTMANAGER: &str = "ALERTMANAGER";
pub const INSTRUMENT_KIND: &str = "INSTRUMENT_KIND";
pub const POLL_INTERVAL: &str = "POLL_INTERVAL";
pub const METRICS_LISTEN: &str = "METRICS_LISTEN";
pub const ALERT_SEVERITY: &str = "ALERT_SEVERITY";
pub const ALERT_ENV: &str = "ALERT_ENV";

/// Anything shorter than this cannot be a usable base URL.
const MIN_URL_LEN: usize = 5;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_INTERVAL_SECS: u64 = 2;
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ADDR: Ipv4Addr = Ipv4Addr::new(0, 0, 0, 0);

pub fn default_listen() -> SocketAddr {
    SocketAddr::from((DEFAULT_ADDR, DEFAULT_PORT))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the upstream status API
    pub prometheus_url: String,
    /// Connect and request timeout for the upstream GET
    pub timeout: Duration,
    /// Base URL of the alert receiver, alerting is disabled when absent
    pub alertmanager_url: Option<String>,
    pub envelope: Envelope,
    pub instrument_kind: InstrumentKind,
    /// Steady-state delay between two successful polls
    pub interval: Duration,
    pub listen: SocketAddr,
    pub alert_severity: String,
    pub alert_env: String,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Only `PROMETHEUS` is required. Malformed optional values are logged and
    /// replaced by their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prometheus_url = match lookup(PROMETHEUS) {
            None => return Err(ConfigError::Missing(PROMETHEUS)),
            Some(value) if value.len() < MIN_URL_LEN => {
                return Err(ConfigError::InvalidUrl {
                    name: PROMETHEUS,
                    value,
                });
            }
            Some(value) => base_url(value),
        };

        let alertmanager_url = lookup(ALERTMANAGER)
            .filter(|value| value.len() >= MIN_URL_LEN)
            .map(base_url);

        let config = Config {
            prometheus_url,
            timeout: Duration::from_secs(positive_secs(
                &lookup,
                PROMETHEUS_TIMEOUT,
                DEFAULT_TIMEOUT_SECS,
            )),
            alertmanager_url,
            envelope: parse_or_default(&lookup, PROMETHEUS_ENVELOPE, Envelope::default()),
            instrument_kind: parse_or_default(&lookup, INSTRUMENT_KIND, InstrumentKind::default()),
            interval: Duration::from_secs(positive_secs(
                &lookup,
                POLL_INTERVAL,
                DEFAULT_INTERVAL_SECS,
            )),
            listen: parse_or_default(&lookup, METRICS_LISTEN, default_listen()),
            alert_severity: lookup(ALERT_SEVERITY).unwrap_or_else(|| "medium".to_string()),
            alert_env: lookup(ALERT_ENV).unwrap_or_else(|| "prod".to_string()),
        };

        trace!("loaded config: {config:?}");
        Ok(config)
    }

    /// Full URL of the upstream cardinality endpoint
    pub fn status_url(&self) -> String {
        format!("{}/api/v1/status/tsdb", self.prometheus_url)
    }

    /// Full URL of the alert receiver endpoint, if alerting is enabled
    pub fn alerts_url(&self) -> Option<String> {
        self.alertmanager_url
            .as_ref()
            .map(|base| format!("{base}/api/v1/alerts"))
    }
}

fn base_url(value: String) -> String {
    value.trim_end_matches('/').to_string()
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };

    raw.trim().parse().unwrap_or_else(|e| {
        warn!("can't parse {key} env {raw:?}: {e}, falling back to default");
        default
    })
}

fn positive_secs<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or_default(lookup, key, default) {
        0 => {
            warn!("{key} must be greater than zero, falling back to {default}s");
            default
        }
        secs => secs,
    }
}
