//! USD foreign-exchange rates for the display currency.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";

/// USD -> display currency conversion rate source.
#[async_trait]
pub trait FxOracle: Send + Sync {
    async fn usd_rate(&self, currency: &str) -> Result<f64>;
}

pub struct FrankfurterOracle {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LatestResponse {
    rates: HashMap<String, f64>,
}

impl FrankfurterOracle {
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

impl Default for FrankfurterOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FxOracle for FrankfurterOracle {
    async fn usd_rate(&self, currency: &str) -> Result<f64> {
        let currency = currency.to_uppercase();
        if currency == "USD" {
            return Ok(1.0);
        }
        let url = format!("{}/latest?from=USD&to={}", self.base_url, currency);
        let response: LatestResponse = self
            .client
            .get(&url)
            .send()
            .await
            .context("frankfurter request failed")?
            .error_for_status()
            .context("frankfurter returned an error status")?
            .json()
            .await
            .context("frankfurter response was not valid json")?;

        response
            .rates
            .get(&currency)
            .copied()
            .ok_or_else(|| anyhow!("no USD rate for {currency}"))
    }
}
