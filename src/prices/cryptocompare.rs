//! CryptoCompare multi-symbol oracle.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::SymbolPriceOracle;

pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";

pub struct CryptoCompareOracle {
    client: reqwest::Client,
    base_url: String,
}

impl CryptoCompareOracle {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for CryptoCompareOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SymbolPriceOracle for CryptoCompareOracle {
    async fn prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        let url = format!(
            "{}/data/pricemulti?fsyms={}&tsyms=USD",
            self.base_url,
            symbols.join(",")
        );
        let body: Value = self
            .client
            .get(&url)
            .send()
            .await
            .context("cryptocompare request failed")?
            .error_for_status()
            .context("cryptocompare returned an error status")?
            .json()
            .await
            .context("cryptocompare response was not valid json")?;

        // Errors come back as 200s with {"Response": "Error", "Message": ...}.
        if body.get("Response").and_then(Value::as_str) == Some("Error") {
            let message = body
                .get("Message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            bail!("cryptocompare error: {message}");
        }

        let mut prices = HashMap::new();
        if let Some(object) = body.as_object() {
            for (symbol, quotes) in object {
                if let Some(usd) = quotes.get("USD").and_then(Value::as_f64) {
                    prices.insert(symbol.clone(), usd);
                }
            }
        }
        Ok(prices)
    }
}
