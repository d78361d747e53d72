//! HTTP adapters for the lookup ports.
//!
//! - `CryptoComparePrices`: `PriceProvider` over the CryptoCompare price API
//! - `GoogleSearch`: `SearchProvider` over the Google Custom Search JSON API

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use jimbot_core::{
    errors::Error,
    ports::{PriceProvider, PriceQuote, SearchProvider},
    Result,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const PRIMARY_ASSET: &str = "BTC";
const MAX_SEARCH_RESULTS: usize = 5;

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::External(format!("http client build error: {e}")))
}

async fn get_json(req: reqwest::RequestBuilder, what: &str) -> Result<serde_json::Value> {
    let resp = req
        .send()
        .await
        .map_err(|e| Error::External(format!("{what} request error: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::External(format!(
            "{what} failed: {status} {}",
            body.chars().take(200).collect::<String>()
        )));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| Error::External(format!("{what} body error: {e}")))?;
    Ok(serde_json::from_str(&body)?)
}

// ============== Prices ==============

#[derive(Clone, Debug)]
pub struct CryptoComparePrices {
    base_url: String,
    http: reqwest::Client,
}

impl CryptoComparePrices {
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://min-api.cryptocompare.com")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }
}

#[async_trait]
impl PriceProvider for CryptoComparePrices {
    async fn quote(&self, symbol: &str, fiat: &str) -> Result<PriceQuote> {
        let symbol = symbol.to_uppercase();
        let fiat = fiat.to_uppercase();
        debug!("quoting {symbol} in {fiat}");

        let tsyms = format!("{fiat},{PRIMARY_ASSET}");
        let req = self
            .http
            .get(format!("{}/data/price", self.base_url))
            .query(&[("fsym", symbol.as_str()), ("tsyms", tsyms.as_str())]);
        let v = get_json(req, "price").await?;
        parse_price(&symbol, &fiat, &v)
    }
}

/// Human-readable asset name; unknown tickers are shown as-is.
pub fn display_name(symbol: &str) -> String {
    match symbol {
        "BTC" => "Bitcoin",
        "XMR" => "Monero",
        "ETH" => "Ethereum",
        "ETC" => "Ethereum Classic",
        "BCH" | "BCC" => "Bitcoin Cash",
        "LTC" => "Litecoin",
        other => other,
    }
    .to_string()
}

/// Parse a `/data/price` payload: `{"USD": 50000.1, "BTC": 1}` or
/// `{"Response": "Error", "Message": "..."}`.
pub fn parse_price(symbol: &str, fiat: &str, v: &serde_json::Value) -> Result<PriceQuote> {
    if v.get("Response").and_then(|r| r.as_str()) == Some("Error") {
        let message = v
            .get("Message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(Error::External(format!("price api: {message}")));
    }

    let field = |key: &str| -> Result<String> {
        match v.get(key) {
            Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            _ => Err(Error::External(format!("price api: no {key} price for {symbol}"))),
        }
    };

    Ok(PriceQuote {
        display_name: display_name(symbol),
        price_in_fiat: field(fiat)?,
        price_in_primary: field(PRIMARY_ASSET)?,
    })
}

// ============== Search ==============

#[derive(Clone, Debug)]
pub struct GoogleSearch {
    api_key: Option<String>,
    engine_id: Option<String>,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
}

impl GoogleSearch {
    pub fn new(api_key: Option<String>, engine_id: Option<String>) -> Result<Self> {
        Ok(Self {
            api_key,
            engine_id,
            base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            http: http_client()?,
        })
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    async fn search(&self, query: &str) -> Result<String> {
        let (Some(key), Some(cx)) = (&self.api_key, &self.engine_id) else {
            return Err(Error::External(
                "search is not configured (SearchApiKey / SearchEngineID)".to_string(),
            ));
        };

        let req = self.http.get(&self.base_url).query(&[
            ("key", key.as_str()),
            ("cx", cx.as_str()),
            ("q", query),
        ]);
        let v = get_json(req, "search").await?;
        render_search(query, v)
    }
}

/// Render the top results as `title\nlink` blocks.
pub fn render_search(query: &str, v: serde_json::Value) -> Result<String> {
    let resp: SearchResponse = serde_json::from_value(v)?;
    if resp.items.is_empty() {
        return Ok(format!("Nothing found for \"{query}\""));
    }

    let out = resp
        .items
        .iter()
        .take(MAX_SEARCH_RESULTS)
        .map(|item| format!("{}\n{}", item.title.trim(), item.link.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_numeric_prices() {
        let q = parse_price("XMR", "USD", &json!({"USD": 150.25, "BTC": 0.0031})).unwrap();
        assert_eq!(q.display_name, "Monero");
        assert_eq!(q.price_in_fiat, "150.25");
        assert_eq!(q.price_in_primary, "0.0031");
    }

    #[test]
    fn api_error_payload_is_an_error() {
        let err = parse_price(
            "NOPE",
            "USD",
            &json!({"Response": "Error", "Message": "There is no data for the symbol NOPE"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no data for the symbol"), "{err}");
    }

    #[test]
    fn missing_currency_is_an_error() {
        assert!(parse_price("ETH", "EUR", &json!({"USD": 3000, "BTC": 0.05})).is_err());
    }

    #[test]
    fn unknown_tickers_keep_their_symbol() {
        assert_eq!(display_name("DOGE"), "DOGE");
        assert_eq!(display_name("BCC"), "Bitcoin Cash");
    }

    #[test]
    fn renders_top_results() {
        let items: Vec<_> = (0..8)
            .map(|i| json!({"title": format!("Result {i}"), "link": format!("https://ex.com/{i}_x")}))
            .collect();
        let out = render_search("rust", json!({ "items": items })).unwrap();
        assert!(out.starts_with("Result 0\nhttps://ex.com/0_x\n\nResult 1"));
        assert!(out.contains("Result 4"));
        assert!(!out.contains("Result 5"));
    }

    #[test]
    fn empty_results_say_so() {
        let out = render_search("zzqx", json!({"kind": "customsearch#search"})).unwrap();
        assert_eq!(out, "Nothing found for \"zzqx\"");
    }

    #[tokio::test]
    async fn unconfigured_search_fails_without_network() {
        let s = GoogleSearch::new(None, Some("cx".to_string())).unwrap();
        let err = s.search("rust").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
