use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use flow_core::{PriceError, ReferencePricePoint, ReferencePriceProvider};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

const BASE_URL: &str = "https://www.cmegroup.com/services/cryptocurrencies/reference-rates";
const USER_AGENT: &str = "Mozilla/5.0";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct ReferenceRatesResponse {
    #[serde(rename = "referenceRates")]
    reference_rates: HashMap<String, Vec<RawReferenceRate>>,
}

#[derive(Debug, Deserialize)]
struct RawReferenceRate {
    value: String,
    date: String,
}

/// Client for the CME reference rates service.
#[derive(Clone)]
pub struct CmeReferenceRateClient {
    client: Client,
    url: String,
    series: String,
}

impl CmeReferenceRateClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: BASE_URL.to_string(),
            series: "BRRNY".to_string(),
        }
    }
}

#[async_trait]
impl ReferencePriceProvider for CmeReferenceRateClient {
    async fn fetch_reference_prices(&self) -> Result<Vec<ReferencePricePoint>, PriceError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept-Language", "en-US")
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| PriceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PriceError::Request(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PriceError::Request(e.to_string()))?;

        parse_reference_rates(&body, &self.series)
    }

    fn name(&self) -> &str {
        "cme-brrny"
    }
}

/// Parse a reference rates payload into a series sorted newest first.
pub fn parse_reference_rates(
    body: &str,
    series: &str,
) -> Result<Vec<ReferencePricePoint>, PriceError> {
    let response: ReferenceRatesResponse = serde_json::from_str(body)?;

    let raw = response
        .reference_rates
        .get(series)
        .ok_or_else(|| PriceError::Parse(format!("series {} not in response", series)))?;

    let mut points = raw
        .iter()
        .map(|rate| {
            let value: f64 = rate
                .value
                .trim()
                .parse()
                .map_err(|_| PriceError::Parse(format!("bad value {:?}", rate.value)))?;
            if !value.is_finite() || value <= 0.0 {
                return Err(PriceError::InvalidValue(value));
            }
            let naive = NaiveDateTime::parse_from_str(rate.date.trim(), DATE_FORMAT)
                .map_err(|e| PriceError::Parse(format!("bad date {:?}: {}", rate.date, e)))?;
            Ok(ReferencePricePoint {
                value,
                as_of: Utc.from_utc_datetime(&naive),
            })
        })
        .collect::<Result<Vec<_>, PriceError>>()?;

    if points.is_empty() {
        return Err(PriceError::Empty);
    }

    points.sort_by(|a, b| b.as_of.cmp(&a.as_of));
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_rate() {
        let body = r#"{"referenceRates": {"BRRNY": [{"value": "51840.37", "date": "2024-02-16 21:00:00"}]}}"#;
        let points = parse_reference_rates(body, "BRRNY").unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 51840.37);
        assert_eq!(
            points[0].as_of,
            Utc.with_ymd_and_hms(2024, 2, 16, 21, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_orders_newest_first() {
        let body = r#"{"referenceRates": {"BRRNY": [
            {"value": "50000.00", "date": "2024-02-15 21:00:00"},
            {"value": "51840.37", "date": "2024-02-16 21:00:00"}
        ]}}"#;
        let points = parse_reference_rates(body, "BRRNY").unwrap();

        assert_eq!(points[0].value, 51840.37);
        assert_eq!(points[1].value, 50000.0);
    }

    #[test]
    fn test_parse_rejects_empty_and_zero() {
        let empty = r#"{"referenceRates": {"BRRNY": []}}"#;
        assert!(matches!(
            parse_reference_rates(empty, "BRRNY"),
            Err(PriceError::Empty)
        ));

        let zero = r#"{"referenceRates": {"BRRNY": [{"value": "0", "date": "2024-02-16 21:00:00"}]}}"#;
        assert!(matches!(
            parse_reference_rates(zero, "BRRNY"),
            Err(PriceError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_parse_missing_series() {
        let body = r#"{"referenceRates": {"BRRLDN": []}}"#;
        assert!(parse_reference_rates(body, "BRRNY").is_err());
        assert!(parse_reference_rates("<html>", "BRRNY").is_err());
    }
}
