use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::PriceSource;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::models::Asset;

// Jupiter Price API v3 / Swap API v1
// Docs: https://dev.jup.ag/docs/price-api/v3 , https://dev.jup.ag/docs/swap-api/get-quote

// Type alias for the rate limiter to simplify signatures
type JupiterRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Client for Jupiter price, quote and swap-building endpoints
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct JupiterClient {
    client: Client,
    price_api: String,
    swap_api: String,
    rate_limiter: Arc<JupiterRateLimiter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceEntry {
    usd_price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    in_amount: String,
    out_amount: String,
    #[serde(default)]
    price_impact_pct: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest<'a> {
    user_public_key: &'a str,
    quote_response: &'a serde_json::Value,
    wrap_and_unwrap_sol: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
}

/// Quote information from Jupiter
#[derive(Debug, Clone)]
pub struct Quote {
    pub in_amount: u64,
    pub out_amount: u64,
    pub price_impact_pct: f64,
    /// The untouched quote; the swap endpoint wants it back verbatim
    pub raw: serde_json::Value,
}

impl JupiterClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        let rpm = NonZeroU32::new(config.requests_per_minute).ok_or_else(|| {
            ProviderError::Parse("requests_per_minute must be > 0".to_string())
        })?;

        Ok(Self {
            client,
            price_api: config.price_api_url.trim_end_matches('/').to_string(),
            swap_api: config.swap_api_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(rpm))),
        })
    }

    /// Get the USD price of a token by mint address
    pub async fn get_price(&self, mint: &str) -> Result<f64, ProviderError> {
        self.rate_limiter.until_ready().await;
        tracing::debug!(mint, "Fetching price");

        let response = self
            .client
            .get(&self.price_api)
            .query(&[("ids", mint)])
            .header("accept", "application/json")
            .send()
            .await?;
        let response = check_status(response).await?;

        let prices: HashMap<String, Option<PriceEntry>> = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("price response: {}", e)))?;

        let price = prices
            .get(mint)
            .and_then(|entry| entry.as_ref())
            .map(|entry| entry.usd_price)
            .ok_or_else(|| ProviderError::PriceNotFound(mint.to_string()))?;

        if !price.is_finite() || price < 0.0 {
            return Err(ProviderError::Parse(format!("invalid price {} for {}", price, mint)));
        }

        Ok(price)
    }

    /// Get a quote for swapping tokens
    ///
    /// # Arguments
    /// * `input_mint` - Input token mint address
    /// * `output_mint` - Output token mint address
    /// * `amount` - Amount in raw units (e.g., lamports for SOL)
    /// * `slippage_bps` - Slippage tolerance in basis points (50 = 0.5%)
    pub async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote, ProviderError> {
        self.rate_limiter.until_ready().await;

        let amount = amount.to_string();
        let slippage = slippage_bps.to_string();
        let response = self
            .client
            .get(format!("{}/quote", self.swap_api))
            .query(&[
                ("inputMint", input_mint),
                ("outputMint", output_mint),
                ("amount", amount.as_str()),
                ("slippageBps", slippage.as_str()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("quote response: {}", e)))?;
        let parsed: QuoteResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::Parse(format!("quote fields: {}", e)))?;

        let quote = Quote {
            in_amount: parse_amount("inAmount", &parsed.in_amount)?,
            out_amount: parse_amount("outAmount", &parsed.out_amount)?,
            price_impact_pct: parsed
                .price_impact_pct
                .and_then(|p| p.parse().ok())
                .unwrap_or(0.0),
            raw,
        };

        tracing::info!(
            "Got swap quote - Input: {} {}, Output: {} {}",
            quote.in_amount,
            input_mint,
            quote.out_amount,
            output_mint
        );

        Ok(quote)
    }

    /// Build an unsigned swap transaction for `quote`. Returns it base64 encoded.
    pub async fn get_swap_transaction(
        &self,
        user_public_key: &str,
        quote: &Quote,
    ) -> Result<String, ProviderError> {
        self.rate_limiter.until_ready().await;

        let request = SwapRequest {
            user_public_key,
            quote_response: &quote.raw,
            wrap_and_unwrap_sol: true,
        };

        let response = self
            .client
            .post(format!("{}/swap", self.swap_api))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let swap: SwapResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("swap response: {}", e)))?;

        Ok(swap.swap_transaction)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        body,
    })
}

fn parse_amount(field: &str, value: &str) -> Result<u64, ProviderError> {
    value
        .parse()
        .map_err(|_| ProviderError::Parse(format!("{} is not an integer: {}", field, value)))
}

/// Price feed for one asset backed by the Jupiter price API
#[derive(Clone)]
pub struct JupiterPriceFeed {
    client: JupiterClient,
    asset: Asset,
}

impl JupiterPriceFeed {
    pub fn new(client: JupiterClient, asset: Asset) -> Self {
        Self { client, asset }
    }
}

#[async_trait]
impl PriceSource for JupiterPriceFeed {
    async fn get_price(&self) -> Result<f64, ProviderError> {
        let price = self.client.get_price(&self.asset.mint_address).await?;
        tracing::debug!(token = %self.asset.symbol, price, "Fetched price");
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SOL_MINT, USDC_MINT};
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> JupiterClient {
        let config = ProviderConfig {
            price_api_url: format!("{}/price/v3", server.url()),
            swap_api_url: format!("{}/swap/v1/", server.url()),
            requests_per_minute: 600,
            ..Default::default()
        };
        JupiterClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_get_price() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/price/v3")
            .match_query(Matcher::UrlEncoded("ids".into(), SOL_MINT.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"{}": {{"usdPrice": 147.25, "blockId": 348004023, "decimals": 9, "priceChange24h": 1.2}}}}"#,
                SOL_MINT
            ))
            .create_async()
            .await;

        let client = client_for(&server);
        let price = client.get_price(SOL_MINT).await.unwrap();

        assert_eq!(price, 147.25);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_price_missing_mint() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/price/v3")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let result = client_for(&server).get_price(SOL_MINT).await;
        assert!(matches!(result, Err(ProviderError::PriceNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_price_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/price/v3")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let result = client_for(&server).get_price(SOL_MINT).await;
        match result {
            Err(ProviderError::Api { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_quote_keeps_raw_response() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(
            r#"{{"inputMint":"{}","inAmount":"1000000000","outputMint":"{}","outAmount":"147250000","otherAmountThreshold":"146513750","swapMode":"ExactIn","slippageBps":50,"priceImpactPct":"0.0012","routePlan":[]}}"#,
            SOL_MINT, USDC_MINT
        );
        let mock = server
            .mock("GET", "/swap/v1/quote")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("inputMint".into(), SOL_MINT.into()),
                Matcher::UrlEncoded("outputMint".into(), USDC_MINT.into()),
                Matcher::UrlEncoded("amount".into(), "1000000000".into()),
                Matcher::UrlEncoded("slippageBps".into(), "50".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let quote = client_for(&server)
            .get_quote(SOL_MINT, USDC_MINT, 1_000_000_000, 50)
            .await
            .unwrap();

        assert_eq!(quote.in_amount, 1_000_000_000);
        assert_eq!(quote.out_amount, 147_250_000);
        assert!((quote.price_impact_pct - 0.0012).abs() < 1e-12);
        assert_eq!(quote.raw["swapMode"], "ExactIn");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_swap_transaction_posts_quote() {
        let mut server = mockito::Server::new_async().await;
        let raw = serde_json::json!({
            "inAmount": "5000000",
            "outAmount": "33000",
            "routePlan": []
        });
        let mock = server
            .mock("POST", "/swap/v1/swap")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "userPublicKey": "Wallet111",
                "wrapAndUnwrapSol": true,
                "quoteResponse": { "inAmount": "5000000" }
            })))
            .with_status(200)
            .with_body(r#"{"swapTransaction":"AQID","lastValidBlockHeight":1}"#)
            .create_async()
            .await;

        let quote = Quote {
            in_amount: 5_000_000,
            out_amount: 33_000,
            price_impact_pct: 0.0,
            raw,
        };
        let tx = client_for(&server)
            .get_swap_transaction("Wallet111", &quote)
            .await
            .unwrap();

        assert_eq!(tx, "AQID");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_price_feed_uses_asset_mint() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/price/v3")
            .match_query(Matcher::UrlEncoded("ids".into(), SOL_MINT.into()))
            .with_status(200)
            .with_body(format!(r#"{{"{}": {{"usdPrice": 99.5}}}}"#, SOL_MINT))
            .create_async()
            .await;

        let feed = JupiterPriceFeed::new(client_for(&server), Asset::sol());
        assert_eq!(feed.get_price().await.unwrap(), 99.5);
    }

    #[tokio::test]
    #[ignore] // Requires live API
    async fn test_get_price_live() {
        let client = JupiterClient::new(&ProviderConfig::default()).unwrap();
        let price = client.get_price(SOL_MINT).await.unwrap();
        assert!(price > 0.0);
    }
}
