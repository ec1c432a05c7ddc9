//! Fund Sources
//!
//! One adapter per tracked fund. Each fetches the issuer's published holdings
//! page or file and extracts the total bitcoin held.

pub mod arkb;
pub mod bitb;
pub mod brrr;
pub mod gbtc;
pub mod ibit;

pub use arkb::ArkbSource;
pub use bitb::BitbSource;
pub use brrr::BrrrSource;
pub use gbtc::GbtcSource;
pub use ibit::IbitSource;

use flow_core::{SourceAdapter, SourceError};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Holdings dates are published as `MM/DD/YYYY`.
pub(crate) const DATE_LAYOUT: &str = "%m/%d/%Y";

/// HTTP client shared by all adapters, with a bounded request timeout.
pub fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Every adapter this crate provides.
pub fn all_sources(client: &Client) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(ArkbSource::new(client.clone())),
        Arc::new(BitbSource::new(client.clone())),
        Arc::new(BrrrSource::new(client.clone())),
        Arc::new(GbtcSource::new(client.clone())),
        Arc::new(IbitSource::new(client.clone())),
    ]
}

pub(crate) async fn fetch_text(client: &Client, url: &str) -> Result<String, SourceError> {
    tracing::debug!("Visiting {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SourceError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    response
        .text()
        .await
        .map_err(|e| SourceError::Request(e.to_string()))
}

pub(crate) fn selector(css: &str) -> Result<scraper::Selector, SourceError> {
    scraper::Selector::parse(css).map_err(|e| SourceError::Parse(format!("selector {css}: {e}")))
}
