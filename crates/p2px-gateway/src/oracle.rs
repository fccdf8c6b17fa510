//! HTTP price oracle.
//!
//! Fiat-per-USD comes from `{fiat_rate_url}/{FIAT}/USD`, which answers
//! `{"rate": n}`. The token's USD price comes from the token registry.

use async_trait::async_trait;
use p2px_core::{TokenRegistry, TokenSpec};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};
use crate::traits::PriceOracle;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_fiat_rate_url")]
    pub fiat_rate_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_fiat_rate_url() -> String {
    "https://api.yadio.io/convert/1".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            fiat_rate_url: default_fiat_rate_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FiatRateResponse {
    rate: Decimal,
}

pub struct HttpPriceOracle {
    client: Client,
    base_url: String,
    tokens: TokenRegistry,
}

impl HttpPriceOracle {
    pub fn new(config: &OracleConfig, tokens: TokenRegistry) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.fiat_rate_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    async fn fetch_fiat_per_usd(&self, fiat_code: &str) -> GatewayResult<Decimal> {
        let url = format!("{}/{}/USD", self.base_url, fiat_code.to_ascii_uppercase());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let body: FiatRateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::HttpClient(format!("Failed to parse response: {e}")))?;
        debug!(fiat = fiat_code, rate = %body.rate, "Fiat rate fetched");
        Ok(body.rate)
    }
}

/// Base units of `token` bought by one fiat unit.
pub fn market_rate(token: &TokenSpec, fiat_per_usd: Decimal) -> GatewayResult<Decimal> {
    let usd_price = token
        .usd_price
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| GatewayError::RateUnavailable(format!("{} has no USD price", token.code)))?;
    if fiat_per_usd <= Decimal::ZERO {
        return Err(GatewayError::RateUnavailable(format!(
            "non-positive fiat rate {fiat_per_usd}"
        )));
    }
    let scale = (0..token.decimals)
        .try_fold(Decimal::ONE, |acc, _| acc.checked_mul(Decimal::TEN))
        .ok_or_else(|| {
            GatewayError::RateUnavailable(format!("decimals {} too large", token.decimals))
        })?;
    scale
        .checked_div(usd_price * fiat_per_usd)
        .ok_or_else(|| GatewayError::RateUnavailable("rate overflow".to_string()))
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn fetch_market_rate(&self, fiat_code: &str, token_code: &str) -> GatewayResult<Decimal> {
        let token = self.tokens.get(token_code)?;
        let fiat_per_usd = self.fetch_fiat_per_usd(fiat_code).await?;
        market_rate(token, fiat_per_usd)
    }
}
