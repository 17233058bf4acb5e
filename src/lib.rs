//! Republishes the cardinality statistics of a Prometheus-compatible TSDB as
//! scrapeable metrics.
//!
//! ```text
//! ┌──────────────┐ GET /api/v1/status/tsdb ┌────────┐ upsert ┌─────────────┐ GET /metrics
//! │  upstream DB │ ──────────────────────> │ Poller │ ─────> │  Publisher  │ <──────────── scraper
//! └──────────────┘                         └───┬────┘        └─────────────┘
//!                                              │ POST /api/v1/alerts (sustained outage)
//!                                              ▼
//!                                       ┌──────────────┐
//!                                       │ Alertmanager │
//!                                       └──────────────┘
//! ```

pub mod alerts;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod poller;
pub mod publisher;
pub mod status;

pub use alerts::{Alert, AlertManager, AlertTemplate, Notifier};
pub use client::{HttpStatusSource, StatusSource};
pub use config::Config;
pub use poller::{Clock, CycleOutcome, PollContext, PollState, Poller, SystemClock};
pub use publisher::{InstrumentKind, MetricsPublisher};
pub use status::{Category, Envelope, Statistic, StatusSnapshot};
