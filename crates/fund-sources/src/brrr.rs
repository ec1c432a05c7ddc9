use async_trait::async_trait;
use flow_core::{parse_grouped_number, Observation, SourceAdapter, SourceError};
use reqwest::Client;
use scraper::Html;

use crate::{fetch_text, selector};

const HOLDINGS_URL: &str = "https://valkyrieinvest.com/brrr-holdings/";
const BITCOIN_ROW: &str = "XBTUSD";

/// Valkyrie Bitcoin Fund holdings table.
pub struct BrrrSource {
    client: Client,
    url: String,
}

impl BrrrSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: HOLDINGS_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for BrrrSource {
    async fn observe(&self) -> Result<Observation, SourceError> {
        let body = fetch_text(&self.client, &self.url).await?;
        parse_table(&body)
    }

    fn ticker(&self) -> &str {
        "BRRR"
    }
}

pub fn parse_table(body: &str) -> Result<Observation, SourceError> {
    let document = Html::parse_document(body);
    let rows = selector("table tbody tr")?;
    let cells = selector("td")?;

    for row in document.select(&rows) {
        let texts: Vec<String> = row
            .select(&cells)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();

        if texts.first().is_some_and(|first| first.contains(BITCOIN_ROW)) {
            let raw = texts
                .get(3)
                .ok_or_else(|| SourceError::MissingField("BRRR quantity column".into()))?;
            let total = parse_grouped_number(raw)
                .ok_or_else(|| SourceError::Parse(format!("BRRR: bad quantity {raw:?}")))?;
            return Ok(Observation::undated(total));
        }
    }

    Err(SourceError::MissingField(format!("{BITCOIN_ROW} row")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        let body = r#"<table><thead><tr><th>Ticker</th></tr></thead><tbody>
            <tr><td>CASH</td><td>Cash</td><td>USD</td><td>1,000.00</td></tr>
            <tr><td> XBTUSD </td><td>Bitcoin</td><td>BTC</td><td>9,012.3456</td></tr>
        </tbody></table>"#;

        let obs = parse_table(body).unwrap();
        assert_eq!(obs.total_asset, 9012.3456);
    }

    #[test]
    fn test_parse_table_missing_row() {
        let body = "<table><tbody><tr><td>CASH</td></tr></tbody></table>";
        assert!(parse_table(body).is_err());
    }

    #[test]
    fn test_parse_table_short_row() {
        let body = "<table><tbody><tr><td>XBTUSD</td><td>Bitcoin</td></tr></tbody></table>";
        assert!(matches!(
            parse_table(body),
            Err(SourceError::MissingField(_))
        ));
    }
}
