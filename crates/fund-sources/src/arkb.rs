use async_trait::async_trait;
use chrono::NaiveDate;
use flow_core::{parse_grouped_number, Observation, SourceAdapter, SourceError};
use reqwest::Client;

use crate::{fetch_text, DATE_LAYOUT};

const HOLDINGS_URL: &str =
    "https://assets.ark-funds.com/fund-documents/funds-etf-csv/ARK_21SHARES_BITCOIN_ETF_ARKB_HOLDINGS.csv";

const MIN_FIELDS: usize = 6;

/// ARK 21Shares Bitcoin ETF, published as a daily holdings CSV.
pub struct ArkbSource {
    client: Client,
    url: String,
}

impl ArkbSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: HOLDINGS_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for ArkbSource {
    async fn observe(&self) -> Result<Observation, SourceError> {
        let body = fetch_text(&self.client, &self.url).await?;
        parse_holdings(&body)
    }

    fn ticker(&self) -> &str {
        "ARKB"
    }
}

/// The first data row carries the holdings date (column 0) and the share count (column 5).
pub fn parse_holdings(body: &str) -> Result<Observation, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let record = reader
        .records()
        .next()
        .ok_or_else(|| SourceError::MissingField("ARKB holdings row".into()))?
        .map_err(|e| SourceError::Parse(e.to_string()))?;

    if record.len() < MIN_FIELDS {
        return Err(SourceError::Parse(format!(
            "ARKB: invalid record length: expected at least {} fields, got {}",
            MIN_FIELDS,
            record.len()
        )));
    }

    let as_of = NaiveDate::parse_from_str(record[0].trim(), DATE_LAYOUT).ok();
    let total = parse_grouped_number(&record[5])
        .ok_or_else(|| SourceError::Parse(format!("ARKB: bad share count {:?}", &record[5])))?;

    Ok(Observation::new(total, as_of))
}
