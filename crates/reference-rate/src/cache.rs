use chrono::{DateTime, Duration, Utc};
use flow_core::{PriceError, ReferencePricePoint, ReferencePriceProvider};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default freshness window: the benchmark is published once a day.
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// Shared cache of the latest reference price series.
///
/// The lock is held across the refresh, so tasks that observe a stale cache
/// at the same moment wait for a single fetch instead of issuing their own.
pub struct ReferencePriceCache {
    provider: Arc<dyn ReferencePriceProvider>,
    points: Mutex<Vec<ReferencePricePoint>>,
    max_age: Duration,
}

impl ReferencePriceCache {
    pub fn new(provider: Arc<dyn ReferencePriceProvider>, max_age: Duration) -> Self {
        Self {
            provider,
            points: Mutex::new(Vec::new()),
            max_age,
        }
    }

    /// Perform the startup fetch. Any failure here must abort the process.
    pub async fn initialize(&self) -> Result<Vec<ReferencePricePoint>, PriceError> {
        let fetched = self.provider.fetch_reference_prices().await?;
        let latest = fetched.first().ok_or(PriceError::Empty)?;
        if !(latest.value > 0.0) {
            return Err(PriceError::InvalidValue(latest.value));
        }

        tracing::info!(
            "Reference price initialized from {}: ${:.2} as of {}",
            self.provider.name(),
            latest.value,
            latest.as_of
        );

        let mut points = self.points.lock().await;
        *points = fetched.clone();
        Ok(fetched)
    }

    pub async fn get(&self) -> Vec<ReferencePricePoint> {
        self.get_at(Utc::now()).await
    }

    /// Return the cached series, refreshing it when the newest point is older
    /// than the freshness window. A failed refresh keeps the stale series.
    pub async fn get_at(&self, now: DateTime<Utc>) -> Vec<ReferencePricePoint> {
        let mut points = self.points.lock().await;

        if let Some(latest) = points.first() {
            if now - latest.as_of < self.max_age {
                return points.clone();
            }
        }

        match self.provider.fetch_reference_prices().await {
            Ok(fresh) if fresh.first().is_some_and(|p| p.value > 0.0) => {
                if let Some(latest) = fresh.first() {
                    tracing::info!(
                        "Set reference price: ${:.2} as of {}",
                        latest.value,
                        latest.as_of
                    );
                }
                *points = fresh;
            }
            Ok(_) => {
                tracing::warn!(
                    "Reference price refresh from {} returned no usable value, keeping cache",
                    self.provider.name()
                );
            }
            Err(e) => {
                tracing::warn!("Get reference price error: {}", e);
            }
        }

        points.clone()
    }

    /// Price applicable to a fund, honoring the delayed-reporting rule.
    pub async fn price_for(&self, delayed: bool) -> Option<ReferencePricePoint> {
        let points = self.get().await;
        select_price(&points, delayed)
    }
}

/// Delayed funds use the prior point when the series has one.
pub fn select_price(points: &[ReferencePricePoint], delayed: bool) -> Option<ReferencePricePoint> {
    if delayed {
        points.get(1).or_else(|| points.first()).copied()
    } else {
        points.first().copied()
    }
}
