//! Signed HTTP transports for the exchange APIs.
//!
//! Each transport owns one account's credentials and knows its
//! exchange's request signing scheme. Base URLs are injectable so tests
//! can point a transport at a local mock server.

use base64::Engine;
use chrono::SecondsFormat;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;

use crate::clock::Clock;
use crate::models::ExchangeAccount;

use super::SourceError;

type HmacSha256 = Hmac<Sha256>;

pub const BINANCE_BASE_URL: &str = "https://api.binance.com";
pub const OKX_BASE_URL: &str = "https://www.okx.com";

// Binance error codes that mean the credentials are bad.
const BINANCE_AUTH_CODES: &[i64] = &[-2014, -2015, -1022];
// OKX equivalents: bad passphrase, invalid key, bad signature, unknown key.
const OKX_AUTH_CODES: &[&str] = &["50105", "50111", "50113", "50119"];

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Auth(String),
    #[error("{exchange} api error {code}: {message}")]
    Api {
        exchange: &'static str,
        code: String,
        message: String,
    },
    #[error("http {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

impl From<TransportError> for SourceError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Auth(message) => SourceError::Auth(message),
            other => SourceError::Other(other.into()),
        }
    }
}

/// GET a signed endpoint and return the parsed JSON body.
#[async_trait::async_trait]
pub trait SignedTransport: Send + Sync {
    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError>;
}

fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac_sha256(secret: &str, payload: &str) -> Vec<u8> {
    // HMAC accepts keys of any length, so new_from_slice cannot fail.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

pub struct BinanceTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    secret: SecretString,
    clock: Arc<dyn Clock>,
}

impl BinanceTransport {
    pub fn new(account: &ExchangeAccount, clock: Arc<dyn Clock>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: BINANCE_BASE_URL.to_string(),
            api_key: account.api_key.clone(),
            secret: account.secret.clone().into(),
            clock,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn signed_query(&self, params: &[(&str, &str)]) -> String {
        let timestamp = self.clock.now().timestamp_millis();
        let mut query = encode_query(params);
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!("timestamp={timestamp}"));
        let signature =
            alloy_primitives::hex::encode(hmac_sha256(self.secret.expose_secret(), &query));
        format!("{query}&signature={signature}")
    }
}

#[async_trait::async_trait]
impl SignedTransport for BinanceTransport {
    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));
        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        // Binance reports failures as {code, msg}, sometimes with a 200.
        if let Some(code) = parsed.get("code").and_then(Value::as_i64) {
            if code != 0 {
                let message = parsed
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                if BINANCE_AUTH_CODES.contains(&code) || status == reqwest::StatusCode::UNAUTHORIZED
                {
                    return Err(TransportError::Auth(format!(
                        "binance rejected the api key: {message}"
                    )));
                }
                return Err(TransportError::Api {
                    exchange: "binance",
                    code: code.to_string(),
                    message,
                });
            }
        }

        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(TransportError::Auth(
                    "binance rejected the api key".to_string(),
                ));
            }
            return Err(TransportError::Http { status, body });
        }

        Ok(parsed)
    }
}

pub struct OkxTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    secret: SecretString,
    passphrase: String,
    clock: Arc<dyn Clock>,
}

impl OkxTransport {
    pub fn new(account: &ExchangeAccount, clock: Arc<dyn Clock>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: OKX_BASE_URL.to_string(),
            api_key: account.api_key.clone(),
            secret: account.secret.clone().into(),
            passphrase: account.passphrase.clone().unwrap_or_default(),
            clock,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait::async_trait]
impl SignedTransport for OkxTransport {
    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        // OKX refuses requests without a passphrase; fail before the
        // network round trip with the same message shape it would use.
        if self.passphrase.is_empty() {
            return Err(TransportError::Auth(
                "okx requires an api passphrase".to_string(),
            ));
        }

        let query = encode_query(params);
        let request_path = if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query}")
        };

        let timestamp = self
            .clock
            .now()
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let prehash = format!("{timestamp}GET{request_path}");
        let signature = base64::engine::general_purpose::STANDARD
            .encode(hmac_sha256(self.secret.expose_secret(), &prehash));

        let response = self
            .client
            .get(format!("{}{}", self.base_url, request_path))
            .header("OK-ACCESS-KEY", &self.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", &self.passphrase)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(TransportError::Auth("okx rejected the api key".to_string()));
            }
            return Err(TransportError::Http { status, body });
        }

        let parsed: Value =
            serde_json::from_str(&body).map_err(|err| TransportError::Api {
                exchange: "okx",
                code: "parse".to_string(),
                message: err.to_string(),
            })?;

        // Every OKX body carries a string code; "0" is success.
        let code = parsed.get("code").and_then(Value::as_str).unwrap_or("0");
        if code != "0" {
            let message = parsed
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            if OKX_AUTH_CODES.contains(&code) {
                return Err(TransportError::Auth(format!(
                    "okx rejected the credentials: {message}"
                )));
            }
            return Err(TransportError::Api {
                exchange: "okx",
                code: code.to_string(),
                message,
            });
        }

        Ok(parsed)
    }
}
