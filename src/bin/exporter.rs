use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::spawn;
use tracing::{error, info, trace};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tsdb_cardinality_exporter::{
    AlertManager, AlertTemplate, Config, HttpStatusSource, MetricsPublisher, Poller, SystemClock,
    http,
};

/// Export TSDB cardinality statistics as Prometheus metrics.
///
/// The upstream and the alert receiver are configured through the environment
/// (PROMETHEUS, PROMETHEUS_TIMEOUT, ALERTMANAGER, ...).
#[derive(Debug, Clone, Parser)]
#[command(name = "cardinality-exporter", version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Scrape endpoint listen address (overrides METRICS_LISTEN)
    #[arg(long)]
    listen: Option<SocketAddr>,
}

fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tsdb_cardinality_exporter={log_level},cardinality_exporter={log_level}"
        ))
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(&args.log_level);
    trace!("started with args: {args:?}");

    let mut config = Config::from_env().inspect_err(|e| error!("{e}"))?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let publisher = MetricsPublisher::new(config.instrument_kind);

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen))?;
    let scrape_publisher = publisher.clone();
    spawn(async move {
        if let Err(e) = http::serve(listener, scrape_publisher).await {
            error!("{e:#}");
        }
    });

    let source = HttpStatusSource::new(config.status_url(), config.timeout)
        .context("Failed to build upstream HTTP client")?;
    let notifier =
        AlertManager::new(config.alerts_url()).context("Failed to build alert HTTP client")?;
    if !notifier.is_enabled() {
        info!("ALERTMANAGER not set, alerting disabled");
    }

    let template = AlertTemplate::new(
        config.prometheus_url.clone(),
        &config.alert_severity,
        &config.alert_env,
    );

    info!(
        upstream = %config.status_url(),
        kind = %config.instrument_kind,
        "starting cardinality exporter"
    );

    Poller::new(source, notifier, SystemClock, publisher, template)
        .with_envelope(config.envelope)
        .with_interval(config.interval)
        .run()
        .await;

    Ok(())
}
