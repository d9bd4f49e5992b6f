//! Binance source adapter.
//!
//! Pulls spot balances plus the earn and staking sub-products and tags
//! each sub-product with a qualifier so the same coin held in different
//! products stays distinguishable. Sub-product endpoints fail soft: a
//! missing permission on the earn API should not hide the spot wallet.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::models::{ExchangeAccount, Holding, HoldingKind};

use super::extract::{field_f64, pluck_f64, pluck_rows, pluck_str};
use super::transport::{BinanceTransport, SignedTransport, TransportError};
use super::{SourceAdapter, SourceError};

pub struct BinanceAdapter {
    name: String,
    transport: Arc<dyn SignedTransport>,
}

impl BinanceAdapter {
    pub fn new(account: &ExchangeAccount, clock: Arc<dyn crate::clock::Clock>) -> Self {
        Self {
            name: account.name.clone(),
            transport: Arc::new(BinanceTransport::new(account, clock)),
        }
    }

    pub fn with_transport(name: impl Into<String>, transport: Arc<dyn SignedTransport>) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    fn holding(&self, symbol: impl Into<String>, amount: f64) -> Holding {
        Holding::new(symbol, amount, self.name.clone(), HoldingKind::Exchange)
    }

    async fn spot(&self) -> Result<Vec<Holding>, TransportError> {
        let body = self.transport.get("/api/v3/account", &[]).await?;
        let mut holdings = Vec::new();
        for row in body
            .get("balances")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let Some(asset) = pluck_str(row, &["asset"]) else {
                continue;
            };
            let free = field_f64(row, "free").unwrap_or(0.0);
            let locked = field_f64(row, "locked").unwrap_or(0.0);
            let total = free + locked;
            if total > 0.0 {
                holdings.push(self.holding(asset, total));
            }
        }
        Ok(holdings)
    }

    async fn flexible_earn(&self) -> Result<Vec<Holding>, TransportError> {
        let body = self
            .transport
            .get(
                "/sapi/v1/simple-earn/flexible/position",
                &[("size", "100")],
            )
            .await?;
        Ok(self.earn_rows(&body, "flexible-earn", &["totalAmount", "amount"]))
    }

    async fn locked_earn(&self) -> Result<Vec<Holding>, TransportError> {
        let body = self
            .transport
            .get("/sapi/v1/simple-earn/locked/position", &[("size", "100")])
            .await?;
        Ok(self.earn_rows(&body, "locked-earn", &["amount", "totalAmount"]))
    }

    fn earn_rows(&self, body: &Value, qualifier: &str, amount_fields: &[&str]) -> Vec<Holding> {
        let mut holdings = Vec::new();
        for row in pluck_rows(body) {
            let Some(asset) = pluck_str(&row, &["asset", "rewardAsset"]) else {
                continue;
            };
            let Some(amount) = pluck_f64(&row, amount_fields) else {
                continue;
            };
            holdings.push(self.holding(format!("{asset} ({qualifier})"), amount));
        }
        holdings
    }

    async fn staking(&self, product: &str, qualifier: &str) -> Result<Vec<Holding>, TransportError> {
        let body = self
            .transport
            .get(
                "/sapi/v1/staking/position",
                &[("product", product), ("size", "100")],
            )
            .await?;
        let mut holdings = Vec::new();
        for row in pluck_rows(&body) {
            let Some(asset) = pluck_str(&row, &["asset"]) else {
                continue;
            };
            let Some(amount) = pluck_f64(&row, &["amount", "totalAmount", "stakingAmount"]) else {
                continue;
            };
            holdings.push(self.holding(format!("{asset} ({qualifier})"), amount));
        }
        Ok(holdings)
    }

    async fn eth_staking(&self) -> Result<Vec<Holding>, TransportError> {
        let body = self
            .transport
            .get("/sapi/v2/eth-staking/account", &[])
            .await?;
        let mut holdings = Vec::new();
        // Two balances live under one account payload: plain staked ETH
        // and the WBETH wrapper.
        if let Some(amount) = pluck_f64(&body, &["holdingInEth", "totalAmountInEth"]) {
            holdings.push(self.holding("ETH (eth-staking)", amount));
        }
        if let Some(wbeth) = pluck_f64(&body, &["wbethAmount", "holdingInWbeth"]) {
            holdings.push(self.holding("WBETH (eth-staking)", wbeth));
        }
        Ok(holdings)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for BinanceAdapter {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self) -> Result<Vec<Holding>, SourceError> {
        let (spot, flexible, locked, staking, defi_flexible, defi_locked, eth) = tokio::join!(
            self.spot(),
            self.flexible_earn(),
            self.locked_earn(),
            self.staking("STAKING", "staking"),
            self.staking("F_DEFI", "flexible-defi"),
            self.staking("L_DEFI", "locked-defi"),
            self.eth_staking(),
        );

        let mut holdings = Vec::new();
        let mut auth_failure: Option<String> = None;
        let mut any_succeeded = false;
        let mut first_error: Option<TransportError> = None;
        let results = [
            ("spot", spot),
            ("flexible earn", flexible),
            ("locked earn", locked),
            ("staking", staking),
            ("flexible defi", defi_flexible),
            ("locked defi", defi_locked),
            ("eth staking", eth),
        ];
        for (endpoint, result) in results {
            match result {
                Ok(mut rows) => {
                    any_succeeded = true;
                    holdings.append(&mut rows);
                }
                Err(TransportError::Auth(message)) => {
                    auth_failure.get_or_insert(message);
                }
                Err(err) => {
                    warn!(source = %self.name, endpoint, "binance endpoint failed: {err}");
                    first_error.get_or_insert(err);
                }
            }
        }

        // A credential problem on one endpoint is only fatal when it left
        // us with nothing at all; otherwise report what we have.
        match auth_failure {
            Some(message) if holdings.is_empty() => Err(SourceError::Auth(message)),
            Some(message) => {
                warn!(source = %self.name, "binance auth failure on a sub-product: {message}");
                Ok(holdings)
            }
            None if !any_succeeded => match first_error {
                Some(err) => Err(SourceError::Other(err.into())),
                None => Ok(holdings),
            },
            None => Ok(holdings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct CannedTransport {
        responses: HashMap<&'static str, Value>,
    }

    #[async_trait::async_trait]
    impl SignedTransport for CannedTransport {
        async fn get(&self, path: &str, _params: &[(&str, &str)]) -> Result<Value, TransportError> {
            match self.responses.get(path) {
                Some(body) => Ok(body.clone()),
                None => Err(TransportError::Http {
                    status: reqwest::StatusCode::NOT_FOUND,
                    body: String::new(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn merges_spot_and_earn_with_qualifiers() {
        let mut responses = HashMap::new();
        responses.insert(
            "/api/v3/account",
            serde_json::json!({"balances": [
                {"asset": "BTC", "free": "0.5", "locked": "0.1"},
                {"asset": "DUST", "free": "0", "locked": "0"},
            ]}),
        );
        responses.insert(
            "/sapi/v1/simple-earn/flexible/position",
            serde_json::json!({"rows": [
                {"asset": "BTC", "totalAmount": "0.25"},
            ]}),
        );

        let adapter = BinanceAdapter::with_transport(
            "main",
            Arc::new(CannedTransport { responses }),
        );
        let mut holdings = adapter.fetch().await.unwrap();
        holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].symbol, "BTC");
        assert_eq!(holdings[0].amount, 0.6);
        assert_eq!(holdings[1].symbol, "BTC (flexible-earn)");
        assert_eq!(holdings[1].amount, 0.25);
        assert_eq!(holdings[1].base_symbol(), "BTC");
    }

    #[tokio::test]
    async fn auth_failure_with_no_holdings_is_fatal() {
        struct AuthFailing;
        #[async_trait::async_trait]
        impl SignedTransport for AuthFailing {
            async fn get(
                &self,
                _path: &str,
                _params: &[(&str, &str)],
            ) -> Result<Value, TransportError> {
                Err(TransportError::Auth("bad key".to_string()))
            }
        }

        let adapter = BinanceAdapter::with_transport("main", Arc::new(AuthFailing));
        let err = adapter.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Auth(_)));
    }

    #[tokio::test]
    async fn auth_failure_on_sub_product_keeps_spot() {
        struct SpotOnly;
        #[async_trait::async_trait]
        impl SignedTransport for SpotOnly {
            async fn get(
                &self,
                path: &str,
                _params: &[(&str, &str)],
            ) -> Result<Value, TransportError> {
                if path == "/api/v3/account" {
                    Ok(serde_json::json!({"balances": [
                        {"asset": "ETH", "free": "2", "locked": "0"},
                    ]}))
                } else {
                    Err(TransportError::Auth("no earn permission".to_string()))
                }
            }
        }

        let adapter = BinanceAdapter::with_transport("main", Arc::new(SpotOnly));
        let holdings = adapter.fetch().await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].symbol, "ETH");
    }
}
