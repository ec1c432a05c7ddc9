use anyhow::Result;
use flow_watcher::WatcherConfig;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting flow watcher");

    let config = WatcherConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Poll interval: {}s", config.poll_interval.as_secs());
    tracing::info!("  Backoff interval: {}s", config.backoff_interval.as_secs());
    tracing::info!("  Stale penalty: {}s", config.stale_penalty.as_secs());
    tracing::info!(
        "  Min reportable change: {} BTC ({:?})",
        config.min_reportable_delta,
        config.materiality_scope
    );
    tracing::info!("  Intake address: {}", config.intake_addr);

    // SIGINT + SIGTERM cancel every task
    let shutdown = CancellationToken::new();
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
        signal_token.cancel();
    });

    flow_watcher::run(config, shutdown).await
}
