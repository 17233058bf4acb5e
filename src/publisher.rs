//! Prometheus instruments fed from the status snapshots.
//!
//! Every [`Category`] gets one metric family labeled by the statistic name. The
//! families are internally synchronized, so the scrape handler can encode the
//! registry while the poll loop keeps writing to it.
//!
//! Label series are never expired: a name that disappears upstream keeps
//! exporting its last value until the process restarts.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tracing::trace;

use crate::status::{Category, StatusSnapshot};

/// Content type of the OpenMetrics text produced by [`MetricsPublisher::render`]
pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

type Labels = Vec<(String, String)>;

/// How statistic values are applied to their instruments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Set to the reported value
    #[default]
    Gauge,
    /// Add the reported value; exported with a `_total` suffix
    Counter,
}

impl FromStr for InstrumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gauge" => Ok(InstrumentKind::Gauge),
            "counter" => Ok(InstrumentKind::Counter),
            other => Err(format!(
                "unknown instrument kind {other:?}, expected gauge or counter"
            )),
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentKind::Gauge => write!(f, "gauge"),
            InstrumentKind::Counter => write!(f, "counter"),
        }
    }
}

#[derive(Debug, Clone)]
enum Instrument {
    Gauge(Family<Labels, Gauge>),
    Counter(Family<Labels, Counter>),
}

/// Process-wide instrument registry.
///
/// Cloning is cheap and every clone writes to the same families.
#[derive(Debug, Clone)]
pub struct MetricsPublisher {
    registry: Arc<Registry>,
    instruments: Arc<HashMap<Category, Instrument>>,
}

impl MetricsPublisher {
    /// Register one family per category.
    pub fn new(kind: InstrumentKind) -> Self {
        let mut registry = Registry::default();

        let instruments = Category::ALL
            .into_iter()
            .map(|category| {
                let instrument = match kind {
                    InstrumentKind::Gauge => {
                        let family = Family::<Labels, Gauge>::default();
                        registry.register(category.metric_name(), category.help(), family.clone());
                        Instrument::Gauge(family)
                    }
                    InstrumentKind::Counter => {
                        let family = Family::<Labels, Counter>::default();
                        registry.register(category.metric_name(), category.help(), family.clone());
                        Instrument::Counter(family)
                    }
                };
                (category, instrument)
            })
            .collect();

        Self {
            registry: Arc::new(registry),
            instruments: Arc::new(instruments),
        }
    }

    /// Overwrite (gauge) or add to (counter) the series labeled with `name`.
    pub fn upsert(&self, category: Category, name: &str, value: u64) {
        let Some(instrument) = self.instruments.get(&category) else {
            return;
        };

        let labels = vec![(category.label_key().to_string(), escape_label_value(name))];
        match instrument {
            Instrument::Gauge(family) => {
                family
                    .get_or_create(&labels)
                    .set(i64::try_from(value).unwrap_or(i64::MAX));
            }
            Instrument::Counter(family) => {
                family.get_or_create(&labels).inc_by(value);
            }
        }
    }

    /// Apply every statistic of the snapshot, returning how many were applied.
    pub fn publish(&self, snapshot: &StatusSnapshot) -> usize {
        let mut applied = 0;
        for (category, statistic) in snapshot.iter() {
            self.upsert(category, &statistic.name, statistic.value);
            applied += 1;
        }

        trace!("published {applied} statistics");
        applied
    }

    /// Encode the registry in the OpenMetrics text format.
    pub fn render(&self) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

/// Escape a label value for the text exposition format.
///
/// The encoder writes label values verbatim.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}
