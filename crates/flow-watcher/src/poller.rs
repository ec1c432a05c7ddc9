//! Per-source polling loop.
//!
//! Each watched fund runs one `SourcePoller` task. A poll either finds nothing
//! new and waits the short interval (`Polling`), or reports a change and
//! waits the long backoff interval (`CoolingDown`) on the assumption that the
//! fund will not publish again soon. Out-of-order reads wait a fixed penalty.

use flow_core::{Observation, SourceAdapter, SourceMetadata};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::gate::NotificationGate;
use crate::state::{PendingChange, SourceStateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    #[default]
    Polling,
    CoolingDown,
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Adapter failed or reported zero.
    NoObservation,
    Unchanged,
    /// Dated before the stored observation; state untouched.
    Stale,
    /// First valid observation since startup; stored without notifying.
    Initialized,
    /// Operator replacement applied without notifying.
    Replaced,
    Reported { delta: f64 },
}

#[derive(Debug, Clone, Copy)]
pub struct PollTimings {
    pub poll_interval: Duration,
    pub backoff_interval: Duration,
    pub stale_penalty: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub outcome: PollOutcome,
    pub phase: PollPhase,
    pub wait: Duration,
}

pub struct SourcePoller {
    metadata: SourceMetadata,
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<SourceStateStore>,
    gate: Arc<NotificationGate>,
    timings: PollTimings,
}

impl SourcePoller {
    pub fn new(
        metadata: SourceMetadata,
        adapter: Arc<dyn SourceAdapter>,
        store: Arc<SourceStateStore>,
        gate: Arc<NotificationGate>,
        timings: PollTimings,
    ) -> Self {
        Self {
            metadata,
            adapter,
            store,
            gate,
            timings,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.metadata.ticker
    }

    /// Poll until `shutdown` is cancelled. Cancellation is observed while waiting.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("{}: polling started", self.ticker());

        while !shutdown.is_cancelled() {
            let tick = self.step().await;
            tracing::debug!(
                "{}: {:?}, next poll in {}s",
                self.ticker(),
                tick.outcome,
                tick.wait.as_secs()
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(tick.wait) => {}
            }
        }

        tracing::info!("{}: polling stopped", self.ticker());
    }

    /// One observe-and-decide iteration. Returns how long to wait before the next.
    pub async fn step(&self) -> Tick {
        let outcome = self.observe_and_decide().await;

        let (phase, wait) = match outcome {
            PollOutcome::Reported { .. } => (PollPhase::CoolingDown, self.timings.backoff_interval),
            PollOutcome::Stale => (PollPhase::Polling, self.timings.stale_penalty),
            _ => (PollPhase::Polling, self.timings.poll_interval),
        };
        self.store.set_phase(self.ticker(), phase);

        Tick {
            outcome,
            phase,
            wait,
        }
    }

    async fn observe_and_decide(&self) -> PollOutcome {
        let ticker = self.ticker();

        let (candidate, override_driven) = match self.store.take_pending(ticker) {
            Some(PendingChange::Replace(observation)) => {
                self.store.set_last(ticker, observation);
                tracing::info!("{}: state replaced: {:?}", ticker, observation);
                return PollOutcome::Replaced;
            }
            Some(PendingChange::Override(observation)) => {
                tracing::info!("{}: using override: {:?}", ticker, observation);
                (Some(observation), true)
            }
            None => match self.adapter.observe().await {
                Ok(observation) => (Some(observation), false),
                Err(e) => {
                    tracing::warn!("{}: fetch failed: {}", ticker, e);
                    (None, false)
                }
            },
        };

        let last = self.store.last(ticker);

        if let (Some(new), Some(current)) = (candidate, last) {
            if new.predates(&current) {
                tracing::warn!(
                    "{} new result before current: {:?} < {:?}",
                    ticker,
                    new,
                    current
                );
                return PollOutcome::Stale;
            }
        }

        let Some(new) = candidate.filter(|o| !o.is_empty()) else {
            return PollOutcome::NoObservation;
        };

        let Some(current) = last else {
            self.store.set_last(ticker, new);
            tracing::info!("Initialize {}: {:?}", ticker, new);
            return PollOutcome::Initialized;
        };

        if new.total_asset == current.total_asset {
            return PollOutcome::Unchanged;
        }

        let delta = new.total_asset - current.total_asset;
        self.report(delta, &new, override_driven).await;
        self.store.set_last(ticker, new);
        tracing::info!("Update {}: {:?}", ticker, new);

        PollOutcome::Reported { delta }
    }

    async fn report(&self, delta: f64, new: &Observation, override_driven: bool) {
        let outcome = self
            .gate
            .evaluate(delta, new, &self.metadata, override_driven)
            .await;
        tracing::info!(
            "{}: change {:+.2} BTC, flow ${:.0} at ${:.2}",
            self.ticker(),
            outcome.report.delta,
            outcome.report.flow,
            outcome.report.reference_price
        );
    }
}
