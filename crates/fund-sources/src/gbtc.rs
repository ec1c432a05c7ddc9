use async_trait::async_trait;
use chrono::NaiveDate;
use flow_core::{parse_grouped_number, Observation, SourceAdapter, SourceError};
use reqwest::Client;
use scraper::Html;
use serde_json::Value;

use crate::{fetch_text, selector, DATE_LAYOUT};

const FUND_URL: &str = "https://etfs.grayscale.com/gbtc";

/// Grayscale Bitcoin Trust. The fund page embeds its data as Next.js page props.
pub struct GbtcSource {
    client: Client,
    url: String,
}

impl GbtcSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: FUND_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for GbtcSource {
    async fn observe(&self) -> Result<Observation, SourceError> {
        let body = fetch_text(&self.client, &self.url).await?;
        parse_page(&body)
    }

    fn ticker(&self) -> &str {
        "GBTC"
    }
}

pub fn parse_page(body: &str) -> Result<Observation, SourceError> {
    let document = Html::parse_document(body);
    let script = selector("#__NEXT_DATA__")?;

    let raw: String = document
        .select(&script)
        .next()
        .ok_or_else(|| SourceError::MissingField("__NEXT_DATA__".into()))?
        .text()
        .collect();

    let data: Value = serde_json::from_str(&raw)?;
    find_in_includes(&data["props"]["pageProps"]["page"]["includes"])
}

/// Searches the page includes for the entry carrying `totalBitcoinInTrust`.
fn find_in_includes(includes: &Value) -> Result<Observation, SourceError> {
    let entries: Vec<&Value> = match includes {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => return Err(SourceError::MissingField("includes".into())),
    };

    for entry in entries {
        let Some(raw_total) = entry.get("totalBitcoinInTrust").and_then(Value::as_str) else {
            continue;
        };

        let total = parse_grouped_number(raw_total)
            .ok_or_else(|| SourceError::Parse(format!("GBTC: bad total {raw_total:?}")))?;
        let as_of = entry
            .get("date")
            .and_then(Value::as_str)
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), DATE_LAYOUT).ok());

        return Ok(Observation::new(total, as_of));
    }

    Err(SourceError::MissingField("totalBitcoinInTrust".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        let body = r#"<html><body>
            <script id="__NEXT_DATA__" type="application/json">
            {"props": {"pageProps": {"page": {"includes": {
                "hero": {"title": "GBTC"},
                "stats": {"totalBitcoinInTrust": "436,532.1234", "date": "02/15/2024"}
            }}}}}
            </script>
        </body></html>"#;

        let obs = parse_page(body).unwrap();
        assert_eq!(obs.total_asset, 436532.1234);
        assert_eq!(obs.as_of, NaiveDate::from_ymd_opt(2024, 2, 15));
    }

    #[test]
    fn test_parse_page_without_script() {
        assert!(matches!(
            parse_page("<html><body></body></html>"),
            Err(SourceError::MissingField(_))
        ));
    }

    #[test]
    fn test_includes_without_total() {
        let includes = serde_json::json!({"hero": {"title": "GBTC"}});
        assert!(find_in_includes(&includes).is_err());
    }
}
