//! Spot bitcoin ETF flow watcher.
//!
//! Polls each fund's published holdings, turns changes into flow reports
//! priced at the CME reference rate, and posts them to the configured
//! notification channels. An HTTP intake lets an operator stage corrections.

pub mod config;
pub mod gate;
pub mod intake;
pub mod poller;
pub mod registry;
pub mod state;

use anyhow::{Context, Result};
use notification_service::{Alert, ChannelKind, NotificationService};
use reference_rate::{CmeReferenceRateClient, ReferencePriceCache};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub use config::{MaterialityScope, WatcherConfig};
use gate::NotificationGate;
use intake::{intake_routes, IntakeState};
use poller::{PollTimings, SourcePoller};
use registry::SourceRegistry;
use state::SourceStateStore;

const STATUS_STARTED: &str = "Flow watcher started";
const STATUS_STOPPED: &str = "Flow watcher stopped";

/// Run the watcher until `shutdown` is cancelled.
///
/// Fails before any polling starts if the reference price cannot be loaded
/// or the intake address cannot be bound.
pub async fn run(config: WatcherConfig, shutdown: CancellationToken) -> Result<()> {
    let client = fund_sources::build_http_client(config.request_timeout);
    let notifier = Arc::new(NotificationService::new(&config.notifications, client.clone()));

    let registry = Arc::new(
        SourceRegistry::standard().restricted_to(config.watch_tickers.as_deref())?,
    );
    tracing::info!("Watching {} sources", registry.len());

    let max_age = chrono::Duration::from_std(config.reference_max_age)
        .context("REFERENCE_MAX_AGE_SECS is out of range")?;
    let prices = Arc::new(ReferencePriceCache::new(
        Arc::new(CmeReferenceRateClient::new(client.clone())),
        max_age,
    ));
    let initial = prices
        .initialize()
        .await
        .context("CME BRR NY initialization error")?;
    if let Some(latest) = initial.first() {
        tracing::info!("CME BRR NY: ${:.2} as of {}", latest.value, latest.as_of);
    }

    let store = Arc::new(SourceStateStore::new(&registry));
    let gate = Arc::new(NotificationGate::new(
        prices,
        notifier.clone(),
        config.min_reportable_delta,
        config.materiality_scope,
    ));
    let timings = PollTimings {
        poll_interval: config.poll_interval,
        backoff_interval: config.backoff_interval,
        stale_penalty: config.stale_penalty,
    };

    let listener = tokio::net::TcpListener::bind(config.intake_addr)
        .await
        .with_context(|| format!("Failed to bind intake address {}", config.intake_addr))?;
    tracing::info!("Override intake listening on {}", config.intake_addr);

    let app = intake_routes(IntakeState {
        store: store.clone(),
        registry: registry.clone(),
    });
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    let mut pollers = JoinSet::new();
    for adapter in fund_sources::all_sources(&client) {
        let Some(metadata) = registry.get(adapter.ticker()) else {
            continue;
        };
        let poller = SourcePoller::new(
            metadata.clone(),
            adapter,
            store.clone(),
            gate.clone(),
            timings,
        );
        pollers.spawn(poller.run(shutdown.clone()));
    }

    notifier
        .send_alert(ChannelKind::Structured, &Alert::status(STATUS_STARTED))
        .await;
    tracing::info!("{} ({} pollers)", STATUS_STARTED, pollers.len());

    shutdown.cancelled().await;
    tracing::info!("Shutting down");

    while let Some(joined) = pollers.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Polling task failed: {}", e);
        }
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Intake server error: {}", e),
        Err(e) => tracing::error!("Intake server task failed: {}", e),
    }

    notifier
        .send_alert(ChannelKind::Structured, &Alert::status(STATUS_STOPPED))
        .await;
    tracing::info!("{}", STATUS_STOPPED);

    Ok(())
}
