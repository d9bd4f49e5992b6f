//! OKX source adapter.
//!
//! Reads the funding account and the unified trading account and merges
//! balances per currency. OKX splits the same coin across the two
//! accounts, so amounts are summed under one symbol.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::models::{ExchangeAccount, Holding, HoldingKind};

use super::extract::{pluck_f64, pluck_str};
use super::transport::{OkxTransport, SignedTransport, TransportError};
use super::{SourceAdapter, SourceError};

pub struct OkxAdapter {
    name: String,
    transport: Arc<dyn SignedTransport>,
}

impl OkxAdapter {
    pub fn new(account: &ExchangeAccount, clock: Arc<dyn crate::clock::Clock>) -> Self {
        Self {
            name: account.name.clone(),
            transport: Arc::new(OkxTransport::new(account, clock)),
        }
    }

    pub fn with_transport(name: impl Into<String>, transport: Arc<dyn SignedTransport>) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    async fn funding(&self) -> Result<HashMap<String, f64>, TransportError> {
        let body = self.transport.get("/api/v5/asset/balances", &[]).await?;
        let mut amounts = HashMap::new();
        for row in body.get("data").and_then(Value::as_array).into_iter().flatten() {
            let Some(currency) = pluck_str(row, &["ccy"]) else {
                continue;
            };
            if let Some(amount) = pluck_f64(row, &["bal", "availBal"]) {
                *amounts.entry(currency.to_string()).or_insert(0.0) += amount;
            }
        }
        Ok(amounts)
    }

    async fn trading(&self) -> Result<HashMap<String, f64>, TransportError> {
        let body = self.transport.get("/api/v5/account/balance", &[]).await?;
        let mut amounts = HashMap::new();
        // data is a one-element array whose `details` lists per-currency
        // balances of the unified account.
        for account in body.get("data").and_then(Value::as_array).into_iter().flatten() {
            for row in account
                .get("details")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let Some(currency) = pluck_str(row, &["ccy"]) else {
                    continue;
                };
                if let Some(amount) = pluck_f64(row, &["eq", "availEq", "cashBal"]) {
                    *amounts.entry(currency.to_string()).or_insert(0.0) += amount;
                }
            }
        }
        Ok(amounts)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for OkxAdapter {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self) -> Result<Vec<Holding>, SourceError> {
        let (funding, trading) = tokio::join!(self.funding(), self.trading());

        let mut merged: HashMap<String, f64> = HashMap::new();
        let mut auth_failure: Option<String> = None;
        let mut any_succeeded = false;
        let mut first_error: Option<TransportError> = None;
        for (endpoint, result) in [("funding", funding), ("trading", trading)] {
            match result {
                Ok(amounts) => {
                    any_succeeded = true;
                    for (currency, amount) in amounts {
                        *merged.entry(currency).or_insert(0.0) += amount;
                    }
                }
                Err(TransportError::Auth(message)) => {
                    auth_failure.get_or_insert(message);
                }
                Err(err) => {
                    warn!(source = %self.name, endpoint, "okx endpoint failed: {err}");
                    first_error.get_or_insert(err);
                }
            }
        }

        if merged.is_empty() {
            if let Some(message) = auth_failure {
                return Err(SourceError::Auth(message));
            }
            // Both endpoints down is worth surfacing; a genuinely empty
            // account is not.
            if !any_succeeded {
                if let Some(err) = first_error {
                    return Err(SourceError::Other(err.into()));
                }
            }
        } else if let Some(message) = auth_failure {
            warn!(source = %self.name, "okx auth failure on one account: {message}");
        }

        Ok(merged
            .into_iter()
            .filter(|(_, amount)| *amount > 0.0)
            .map(|(currency, amount)| {
                Holding::new(currency, amount, self.name.clone(), HoldingKind::Exchange)
            })
            .collect())
    }
}
