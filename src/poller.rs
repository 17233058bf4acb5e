//! Poll loop - fetches the upstream status, publishes it and drives the alert
//!
//! ## Failure State Machine
//!
//! ```text
//! Healthy   failures <= 5                    → fetch and publish
//! Degraded  failures >  5, no active alert   → send firing alert (endsAt = now + 1h)
//! Firing    alert sent and not yet resolved  → keep polling, no further alerts
//!
//! any successful fetch → failures = 0, send resolving alert (endsAt = now) if Firing
//! ```
//!
//! The resolve is best-effort. When it gets lost the receiver still expires the
//! alert on its own once the forward-dated `endsAt` passes, so an alert can stay
//! firing for up to an hour after the upstream came back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::alerts::{AlertTemplate, Notifier};
use crate::client::StatusSource;
use crate::publisher::MetricsPublisher;
use crate::status::{Envelope, StatusSnapshot};

/// Consecutive failures tolerated before alerting
pub const FAILURE_THRESHOLD: u32 = 5;

/// Delay before retrying an unreachable upstream
pub const BACKOFF: Duration = Duration::from_secs(1);

/// Lifetime of a firing alert at the receiver
pub const ALERT_TTL: Duration = Duration::from_secs(60 * 60);

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Time source of the poll loop, replaceable in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait]
impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Mutable state carried from one cycle to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollContext {
    /// Consecutive transport failures, reset by any successful fetch
    pub failures: u32,
    /// A firing alert was delivered and not resolved yet
    pub alert_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Healthy,
    Degraded,
    Firing,
}

impl PollContext {
    pub fn state(&self) -> PollState {
        if self.alert_active {
            PollState::Firing
        } else if self.failures > FAILURE_THRESHOLD {
            PollState::Degraded
        } else {
            PollState::Healthy
        }
    }
}

/// What a single cycle ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Number of statistics applied to the instruments
    Published(usize),
    /// The fetch failed, nothing was published
    Unreachable,
    /// The body could not be decoded, previous values stay in place
    Unparsable,
}

pub struct Poller<S, N, C> {
    source: S,
    notifier: N,
    clock: C,
    publisher: MetricsPublisher,
    template: AlertTemplate,
    envelope: Envelope,
    interval: Duration,
    context: PollContext,
}

impl<S, N, C> Poller<S, N, C>
where
    S: StatusSource,
    N: Notifier,
    C: Clock,
{
    pub fn new(
        source: S,
        notifier: N,
        clock: C,
        publisher: MetricsPublisher,
        template: AlertTemplate,
    ) -> Self {
        Self {
            source,
            notifier,
            clock,
            publisher,
            template,
            envelope: Envelope::default(),
            interval: DEFAULT_INTERVAL,
            context: PollContext::default(),
        }
    }

    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn context(&self) -> PollContext {
        self.context
    }

    pub fn state(&self) -> PollState {
        self.context.state()
    }

    /// Poll forever. Only process termination stops this.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting poll loop with interval {:?} and envelope {}",
            self.interval, self.envelope
        );

        loop {
            self.step().await;
        }
    }

    /// Run `count` cycles including their trailing sleeps.
    pub async fn run_cycles(&mut self, count: usize) -> Vec<CycleOutcome> {
        let mut outcomes = Vec::with_capacity(count);
        for _ in 0..count {
            outcomes.push(self.step().await);
        }
        outcomes
    }

    async fn step(&mut self) -> CycleOutcome {
        let outcome = self.cycle().await;
        self.clock.sleep(self.delay_after(outcome)).await;
        outcome
    }

    /// How long to wait before the next cycle.
    pub fn delay_after(&self, outcome: CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Unreachable => BACKOFF,
            CycleOutcome::Published(_) | CycleOutcome::Unparsable => self.interval,
        }
    }

    /// Execute one poll cycle without the trailing sleep.
    #[instrument(skip(self), fields(failures = self.context.failures))]
    pub async fn cycle(&mut self) -> CycleOutcome {
        if self.context.failures > FAILURE_THRESHOLD && !self.context.alert_active {
            self.raise_alert().await;
        }

        let body = match self.source.fetch().await {
            Ok(body) => body,
            Err(e) => {
                self.context.failures = self.context.failures.saturating_add(1);
                error!("{e}");
                return CycleOutcome::Unreachable;
            }
        };

        self.context.failures = 0;
        if self.context.alert_active {
            self.resolve_alert().await;
        }

        let snapshot = match StatusSnapshot::parse(&body, self.envelope) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("{e}, keeping previous values");
                return CycleOutcome::Unparsable;
            }
        };

        trace!("decoded {} statistics", snapshot.len());
        CycleOutcome::Published(self.publisher.publish(&snapshot))
    }

    async fn raise_alert(&mut self) {
        let alert = self.template.firing(self.clock.now(), ALERT_TTL);
        match self.notifier.notify(&alert).await {
            Ok(()) => {
                warn!(
                    "upstream unreachable for {} consecutive polls, alert firing",
                    self.context.failures
                );
                self.context.alert_active = true;
            }
            Err(e) => error!("can't raise alert: {e}"),
        }
    }

    async fn resolve_alert(&mut self) {
        let alert = self.template.resolved(self.clock.now());
        match self.notifier.notify(&alert).await {
            Ok(()) => info!("upstream reachable again, alert resolved"),
            Err(e) => error!("can't resolve alert, receiver will expire it: {e}"),
        }
        self.context.alert_active = false;
    }
}
