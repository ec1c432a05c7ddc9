use async_trait::async_trait;
use flow_core::{Observation, SourceAdapter, SourceError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::fetch_text;

const HOLDINGS_URL: &str =
    "https://blackrock.com/us/financial-professionals/products/333011/fund/1500962885783.ajax?tab=all&fileType=json";

const TICKER_COLUMN: usize = 0;
const SHARES_COLUMN: usize = 6;

#[derive(Debug, Deserialize)]
struct FundData {
    #[serde(rename = "aaData")]
    aa_data: Vec<Vec<Value>>,
}

/// iShares Bitcoin Trust holdings feed.
pub struct IbitSource {
    client: Client,
    url: String,
}

impl IbitSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: HOLDINGS_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for IbitSource {
    async fn observe(&self) -> Result<Observation, SourceError> {
        let body = fetch_text(&self.client, &self.url).await?;
        parse_holdings(&body)
    }

    fn ticker(&self) -> &str {
        "IBIT"
    }
}

/// The feed may carry a byte-order mark or junk before the JSON document.
pub fn parse_holdings(body: &str) -> Result<Observation, SourceError> {
    let start = body
        .find(|c| c == '{' || c == '[')
        .ok_or_else(|| SourceError::Parse("IBIT: no JSON document".into()))?;
    let data: FundData = serde_json::from_str(&body[start..])?;

    let shares = data
        .aa_data
        .iter()
        .find(|row| row.get(TICKER_COLUMN).and_then(Value::as_str) == Some("BTC"))
        .and_then(|row| row.get(SHARES_COLUMN))
        .and_then(|cell| cell.get("raw"))
        .and_then(Value::as_f64)
        .ok_or_else(|| SourceError::MissingField("BTC shares".into()))?;

    Ok(Observation::undated(shares))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_holdings() {
        let body = "\u{feff}{\"aaData\": [\
            [\"USD\", \"USD CASH\", \"Cash\", \"-\", {}, {}, {\"display\": \"1\", \"raw\": 1.0}],\
            [\"BTC\", \"BITCOIN\", \"Alternative\", \"-\", {}, {}, {\"display\": \"195,865.08\", \"raw\": 195865.0841}]\
        ]}";

        let obs = parse_holdings(body).unwrap();
        assert_eq!(obs.total_asset, 195865.0841);
        assert!(obs.as_of.is_none());
    }

    #[test]
    fn test_parse_holdings_without_btc() {
        let body = r#"{"aaData": [["USD", "USD CASH"]]}"#;
        assert!(matches!(
            parse_holdings(body),
            Err(SourceError::MissingField(_))
        ));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_holdings("<html>maintenance</html>").is_err());
    }
}
