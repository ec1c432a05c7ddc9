use anyhow::{bail, Result};
use flow_core::SourceMetadata;

/// Static metadata of every fund the watcher knows how to poll.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceMetadata>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceMetadata>) -> Self {
        Self { sources }
    }

    /// The spot bitcoin funds with an adapter in `fund-sources`.
    pub fn standard() -> Self {
        Self::new(vec![
            SourceMetadata::new(
                "ARKB",
                "Ark 21Shares",
                "ARKB holdings are usually updated 10+ hours after the close of trading",
                false,
            ),
            SourceMetadata::new(
                "BITB",
                "Bitwise",
                "BITB holdings are usually updated 4.5+ hours after the close of trading",
                false,
            ),
            SourceMetadata::new(
                "BRRR",
                "Valkyrie",
                "BRRR holdings are usually updated 10+ hours after the close of trading",
                false,
            ),
            SourceMetadata::new(
                "GBTC",
                "Grayscale",
                "GBTC holdings are usually updated 1 day late",
                true,
            ),
            SourceMetadata::new(
                "IBIT",
                "BlackRock",
                "IBIT holdings are usually updated 13+ hours after the close of trading",
                false,
            ),
        ])
    }

    /// Keep only `tickers`; naming an unregistered ticker is an error.
    pub fn restricted_to(self, tickers: Option<&[String]>) -> Result<Self> {
        let Some(tickers) = tickers else {
            return Ok(self);
        };

        for ticker in tickers {
            if self.get(ticker).is_none() {
                bail!("WATCH_TICKERS names unknown source {}", ticker);
            }
        }

        let sources = self
            .sources
            .into_iter()
            .filter(|s| tickers.iter().any(|t| t == &s.ticker))
            .collect();
        Ok(Self::new(sources))
    }

    pub fn get(&self, ticker: &str) -> Option<&SourceMetadata> {
        self.sources.iter().find(|s| s.ticker == ticker)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceMetadata> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
