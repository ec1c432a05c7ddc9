use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One reading of a source's total holdings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub total_asset: f64,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

impl Observation {
    pub fn new(total_asset: f64, as_of: Option<NaiveDate>) -> Self {
        Self { total_asset, as_of }
    }

    pub fn undated(total_asset: f64) -> Self {
        Self {
            total_asset,
            as_of: None,
        }
    }

    /// Holdings are always a positive finite figure; anything else marks a failed read.
    pub fn is_empty(&self) -> bool {
        !(self.total_asset.is_finite() && self.total_asset > 0.0)
    }

    /// True when both observations are dated and this one predates `other`.
    pub fn predates(&self, other: &Observation) -> bool {
        match (self.as_of, other.as_of) {
            (Some(new), Some(current)) => new < current,
            _ => false,
        }
    }
}

/// A published benchmark price at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePricePoint {
    pub value: f64,
    pub as_of: DateTime<Utc>,
}

/// Static description of a tracked fund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub ticker: String,
    pub display_name: String,
    pub footnote: String,
    /// Holdings lag the benchmark by one day, so the prior price point applies.
    pub delayed: bool,
}

impl SourceMetadata {
    pub fn new(ticker: &str, display_name: &str, footnote: &str, delayed: bool) -> Self {
        Self {
            ticker: ticker.to_string(),
            display_name: display_name.to_string(),
            footnote: footnote.to_string(),
            delayed,
        }
    }
}

/// Parse a `1,234.5` style holdings figure. Rejects negative and non-finite values.
pub fn parse_grouped_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}
