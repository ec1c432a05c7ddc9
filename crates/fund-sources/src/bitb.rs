use async_trait::async_trait;
use flow_core::{parse_grouped_number, Observation, SourceAdapter, SourceError};
use reqwest::Client;
use scraper::{ElementRef, Html};

use crate::{fetch_text, selector};

const FUND_URL: &str = "https://bitbetf.com";
const LABEL: &str = "Bitcoin in Trust";

/// Bitwise Bitcoin ETF. The fund page shows the figure next to its label.
pub struct BitbSource {
    client: Client,
    url: String,
}

impl BitbSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: FUND_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for BitbSource {
    async fn observe(&self) -> Result<Observation, SourceError> {
        let body = fetch_text(&self.client, &self.url).await?;
        parse_page(&body)
    }

    fn ticker(&self) -> &str {
        "BITB"
    }
}

/// Finds the innermost `div` labelled "Bitcoin in Trust" and reads the
/// element that follows it.
pub fn parse_page(body: &str) -> Result<Observation, SourceError> {
    let document = Html::parse_document(body);
    let divs = selector("div")?;

    let mut total = None;
    for div in document.select(&divs) {
        let text: String = div.text().collect();
        if !text.contains(LABEL) {
            continue;
        }

        let next = div.next_siblings().find_map(ElementRef::wrap);
        if let Some(value) = next.and_then(|el| parse_grouped_number(&el.text().collect::<String>())) {
            total = Some(value);
        }
    }

    total
        .map(Observation::undated)
        .ok_or_else(|| SourceError::MissingField(LABEL.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        let body = r#"<html><body>
            <div class="layout-base">
              <div class="stats">
                <div>Bitcoin in Trust</div><div>39,603.67</div>
                <div>NAV</div><div>$29.10</div>
              </div>
            </div>
        </body></html>"#;

        let obs = parse_page(body).unwrap();
        assert_eq!(obs.total_asset, 39603.67);
        assert!(obs.as_of.is_none());
    }

    #[test]
    fn test_parse_page_without_label() {
        let body = "<html><body><div>Nothing to see</div></body></html>";
        assert!(matches!(
            parse_page(body),
            Err(SourceError::MissingField(_))
        ));
    }
}
