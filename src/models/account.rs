use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exchanges with a built-in source adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Binance,
    Okx,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeKind::Binance => write!(f, "binance"),
            ExchangeKind::Okx => write!(f, "okx"),
        }
    }
}

/// One configured exchange API account.
///
/// Immutable during an aggregation pass; the aggregator takes a read-only
/// snapshot of the config it was handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeAccount {
    #[serde(default = "new_id")]
    pub id: String,
    pub kind: ExchangeKind,
    /// Display name used in source labels and warnings.
    pub name: String,
    pub api_key: String,
    pub secret: String,
    /// Required for OKX, unused elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

/// One configured EVM wallet address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAccount {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    /// 0x-prefixed, 42-character hex address. Validated by the adapter
    /// before any network call.
    pub address: String,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_account_deserializes_without_id() {
        let account: ExchangeAccount = toml::from_str(
            r#"
            kind = "binance"
            name = "main"
            api_key = "key"
            secret = "shh"
            "#,
        )
        .unwrap();

        assert_eq!(account.kind, ExchangeKind::Binance);
        assert!(!account.id.is_empty());
        assert!(account.passphrase.is_none());
    }

    #[test]
    fn okx_account_carries_passphrase() {
        let account: ExchangeAccount = toml::from_str(
            r#"
            kind = "okx"
            name = "okx-main"
            api_key = "key"
            secret = "shh"
            passphrase = "hunter2"
            "#,
        )
        .unwrap();

        assert_eq!(account.kind, ExchangeKind::Okx);
        assert_eq!(account.passphrase.as_deref(), Some("hunter2"));
    }
}
