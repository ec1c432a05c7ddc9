use async_trait::async_trait;

use crate::{Observation, PriceError, ReferencePricePoint, SourceError};

/// Capability to read the current holdings of one fund.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn observe(&self) -> Result<Observation, SourceError>;

    fn ticker(&self) -> &str;
}

/// Capability to fetch the benchmark price series, newest point first.
#[async_trait]
pub trait ReferencePriceProvider: Send + Sync {
    async fn fetch_reference_prices(&self) -> Result<Vec<ReferencePricePoint>, PriceError>;

    fn name(&self) -> &str;
}
