//! CoinMarketCap API client
//!
//! Supplies the raw observations the ingestion path stores and the current
//! reference price used by the synthetic fallback.

use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// TTL for cached current-price lookups
const PRICE_CACHE_TTL_SECS: u64 = 60;

/// Request timeout; the fallback path must not block response generation
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Error types for upstream market-data calls
#[derive(Debug)]
pub enum MarketDataError {
    HttpError(String),
    ApiError(String),
}

impl std::fmt::Display for MarketDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketDataError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            MarketDataError::ApiError(msg) => write!(f, "CoinMarketCap API error: {}", msg),
        }
    }
}

impl std::error::Error for MarketDataError {}

/// One quote block from the API. Everything is optional at this layer;
/// ingestion decides what is malformed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcQuote {
    pub price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub percent_change_30d: Option<f64>,
    pub percent_change_90d: Option<f64>,
}

/// One coin object as returned by the listings/quotes endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcCoinData {
    pub id: Option<i64>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    /// Quote blocks keyed by currency code
    #[serde(default)]
    pub quote: HashMap<String, CmcQuote>,
}

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    #[serde(default)]
    data: Vec<CmcCoinData>,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    data: HashMap<String, CmcCoinData>,
}

#[derive(Clone)]
pub struct CoinMarketCapService {
    client: Client,
    api_key: String,
    base_url: String,
    price_cache: Arc<Cache<String, f64>>,
}

impl CoinMarketCapService {
    pub fn new(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        let price_cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(PRICE_CACHE_TTL_SECS))
            .build();

        Self {
            client,
            api_key,
            base_url,
            price_cache: Arc::new(price_cache),
        }
    }

    /// Fetch the top cryptocurrencies by market cap (the ingestion feed)
    pub async fn get_top_cryptocurrencies(
        &self,
        limit: u32,
        convert: &str,
    ) -> Result<Vec<CmcCoinData>, MarketDataError> {
        let url = format!("{}/v1/cryptocurrency/listings/latest", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .header("Accept", "application/json")
            .query(&[
                ("limit", limit.to_string()),
                ("convert", convert.to_string()),
                ("sort", "market_cap".to_string()),
                ("sort_dir", "desc".to_string()),
            ])
            .send()
            .await
            .map_err(|e| MarketDataError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::ApiError(format!("{}: {}", status, body)));
        }

        let body: ListingsResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::HttpError(e.to_string()))?;

        tracing::debug!(count = body.data.len(), "Fetched listings from CoinMarketCap");

        Ok(body.data)
    }

    /// Fetch the latest quote for a single asset
    pub async fn get_quote(
        &self,
        asset_id: i64,
        convert: &str,
    ) -> Result<CmcCoinData, MarketDataError> {
        let url = format!("{}/v2/cryptocurrency/quotes/latest", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("id", asset_id.to_string()), ("convert", convert.to_string())])
            .send()
            .await
            .map_err(|e| MarketDataError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::ApiError(format!("{}: {}", status, body)));
        }

        let mut body: QuotesResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::HttpError(e.to_string()))?;

        body.data.remove(&asset_id.to_string()).ok_or_else(|| {
            MarketDataError::ApiError(format!("asset {} missing from quotes response", asset_id))
        })
    }

    /// Best-effort current price for an asset, cached briefly. Returns None
    /// on any failure; callers degrade rather than propagate.
    pub async fn latest_price(&self, asset_id: i64, convert: &str) -> Option<f64> {
        let cache_key = format!("{}_{}", asset_id, convert);

        if let Some(price) = self.price_cache.get(&cache_key).await {
            tracing::debug!(asset_id, "Price cache hit");
            return Some(price);
        }

        match self.get_quote(asset_id, convert).await {
            Ok(coin) => {
                let price = coin.quote.get(convert).and_then(|q| q.price)?;
                self.price_cache.insert(cache_key, price).await;
                Some(price)
            }
            Err(e) => {
                tracing::warn!(asset_id, error = %e, "Current price lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MarketDataError::HttpError("timeout".to_string());
        assert!(err.to_string().contains("HTTP error"));

        let err = MarketDataError::ApiError("429".to_string());
        assert!(err.to_string().contains("CoinMarketCap API error"));
    }

    #[test]
    fn test_listings_deserialization() {
        let json = r#"{
            "data": [
                {
                    "id": 1,
                    "symbol": "BTC",
                    "name": "Bitcoin",
                    "quote": {
                        "USD": {
                            "price": 43250.5,
                            "volume_24h": 28000000000.0,
                            "market_cap": 850000000000.0,
                            "percent_change_24h": -1.2
                        }
                    }
                },
                { "id": 2, "symbol": "ETH", "name": "Ethereum" }
            ]
        }"#;

        let body: ListingsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.data.len(), 2);

        let btc = &body.data[0];
        assert_eq!(btc.id, Some(1));
        assert_eq!(btc.symbol.as_deref(), Some("BTC"));
        let usd = btc.quote.get("USD").unwrap();
        assert_eq!(usd.price, Some(43250.5));
        assert_eq!(usd.percent_change_1h, None);

        // Missing quote block deserializes to an empty map
        assert!(body.data[1].quote.is_empty());
    }

    #[test]
    fn test_quotes_deserialization_keyed_by_id() {
        let json = r#"{
            "data": {
                "42": { "id": 42, "symbol": "TST", "name": "Test", "quote": { "USD": { "price": 1.5 } } }
            }
        }"#;

        let body: QuotesResponse = serde_json::from_str(json).unwrap();
        let coin = body.data.get("42").unwrap();
        assert_eq!(coin.quote.get("USD").and_then(|q| q.price), Some(1.5));
    }
}
