//! DeFiLlama current-price oracle, keyed by `chain:contract` ids.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::AddressPriceOracle;

pub const DEFAULT_BASE_URL: &str = "https://coins.llama.fi";

pub struct DefiLlamaOracle {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PricesResponse {
    #[serde(default)]
    coins: HashMap<String, Coin>,
}

#[derive(Deserialize)]
struct Coin {
    price: f64,
}

impl DefiLlamaOracle {
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

impl Default for DefiLlamaOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressPriceOracle for DefiLlamaOracle {
    async fn prices(&self, ids: &[String]) -> Result<HashMap<String, f64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = format!("{}/prices/current/{}", self.base_url, ids.join(","));
        let response: PricesResponse = self
            .client
            .get(&url)
            .send()
            .await
            .context("defillama request failed")?
            .error_for_status()
            .context("defillama returned an error status")?
            .json()
            .await
            .context("defillama response was not valid json")?;

        Ok(response
            .coins
            .into_iter()
            .map(|(id, coin)| (id, coin.price))
            .collect())
    }
}
