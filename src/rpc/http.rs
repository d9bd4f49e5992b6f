//! JSON-RPC over HTTP with endpoint failover.
//!
//! Public endpoints are flaky. Each request walks the chain's endpoint
//! list ordered by a latency moving average, retrying the whole list a
//! few times before giving up. Token balance reads go out as JSON-RPC
//! batches to keep request counts down.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::abi::{parse_hex_bytes, parse_hex_u256};
use super::{ChainSpec, EvmRpc};

const RETRY_COUNT: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const BATCH_SIZE: usize = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct HttpRpc {
    client: reqwest::Client,
    /// Exponential moving average of request latency per endpoint URL,
    /// in milliseconds. Failed endpoints get a large penalty so they
    /// sink to the back of the rotation.
    latency: Mutex<HashMap<String, f64>>,
}

impl HttpRpc {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build rpc client")?;
        Ok(Self {
            client,
            latency: Mutex::new(HashMap::new()),
        })
    }

    fn ranked_urls(&self, chain: &ChainSpec) -> Vec<String> {
        let latency = self.latency.lock().unwrap_or_else(|e| e.into_inner());
        let mut urls = chain.rpc_urls.clone();
        urls.sort_by(|a, b| {
            let la = latency.get(a).copied().unwrap_or(0.0);
            let lb = latency.get(b).copied().unwrap_or(0.0);
            la.total_cmp(&lb)
        });
        urls
    }

    fn record_latency(&self, url: &str, millis: f64) {
        let mut latency = self.latency.lock().unwrap_or_else(|e| e.into_inner());
        let entry = latency.entry(url.to_string()).or_insert(millis);
        *entry = *entry * 0.7 + millis * 0.3;
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let started = Instant::now();
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("rpc endpoint {url} returned {status}");
        }
        let value: Value = response.json().await?;
        self.record_latency(url, started.elapsed().as_secs_f64() * 1000.0);
        Ok(value)
    }

    /// Send a JSON-RPC payload, walking endpoints by rank with retries.
    async fn send(&self, chain: &ChainSpec, body: Value) -> Result<Value> {
        let mut last_error = None;
        for attempt in 0..RETRY_COUNT {
            for url in self.ranked_urls(chain) {
                match self.post(&url, &body).await {
                    Ok(value) => return Ok(value),
                    Err(err) => {
                        debug!(chain = chain.name, %url, attempt, "rpc request failed: {err}");
                        self.record_latency(&url, 60_000.0);
                        last_error = Some(err);
                    }
                }
            }
            if attempt + 1 < RETRY_COUNT {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
        Err(last_error
            .unwrap_or_else(|| anyhow!("no rpc endpoints configured for {}", chain.name)))
    }

    async fn request(&self, chain: &ChainSpec, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self.send(chain, body).await?;
        unwrap_rpc_result(&response)
    }
}

fn unwrap_rpc_result(response: &Value) -> Result<Value> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        bail!("rpc error: {message}");
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| anyhow!("rpc response missing result"))
}

fn result_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| anyhow!("rpc result is not a string"))
}

#[async_trait]
impl EvmRpc for HttpRpc {
    async fn native_balance(&self, chain: &ChainSpec, owner: Address) -> Result<U256> {
        let result = self
            .request(chain, "eth_getBalance", json!([owner.to_string(), "latest"]))
            .await?;
        parse_hex_u256(result_str(&result)?)
    }

    async fn call(&self, chain: &ChainSpec, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let result = self
            .request(
                chain,
                "eth_call",
                json!([
                    { "to": to.to_string(), "data": format!("0x{}", alloy_primitives::hex::encode(data)) },
                    "latest",
                ]),
            )
            .await?;
        parse_hex_bytes(result_str(&result)?)
    }

    async fn call_batch(
        &self,
        chain: &ChainSpec,
        calls: Vec<(Address, Vec<u8>)>,
    ) -> Vec<Result<Vec<u8>>> {
        let mut results: Vec<Result<Vec<u8>>> = Vec::with_capacity(calls.len());
        for chunk in calls.chunks(BATCH_SIZE) {
            let body: Vec<Value> = chunk
                .iter()
                .enumerate()
                .map(|(i, (to, data))| {
                    json!({
                        "jsonrpc": "2.0",
                        "id": i,
                        "method": "eth_call",
                        "params": [
                            { "to": to.to_string(), "data": format!("0x{}", alloy_primitives::hex::encode(data)) },
                            "latest",
                        ],
                    })
                })
                .collect();

            match self.send(chain, Value::Array(body)).await {
                Ok(Value::Array(responses)) => {
                    // Responses may arrive out of order; index them by id.
                    let mut by_id: HashMap<usize, &Value> = HashMap::new();
                    for response in &responses {
                        if let Some(id) = response.get("id").and_then(Value::as_u64) {
                            by_id.insert(id as usize, response);
                        }
                    }
                    for i in 0..chunk.len() {
                        let slot = match by_id.get(&i) {
                            Some(response) => unwrap_rpc_result(response)
                                .and_then(|v| parse_hex_bytes(result_str(&v)?)),
                            None => Err(anyhow!("batch response missing id {i}")),
                        };
                        results.push(slot);
                    }
                }
                Ok(other) => {
                    warn!(chain = chain.name, "unexpected batch response shape");
                    for _ in 0..chunk.len() {
                        results.push(Err(anyhow!("unexpected batch response: {other}")));
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    for _ in 0..chunk.len() {
                        results.push(Err(anyhow!("{message}")));
                    }
                }
            }
        }
        results
    }

    async fn has_code(&self, chain: &ChainSpec, address: Address) -> Result<bool> {
        let result = self
            .request(chain, "eth_getCode", json!([address.to_string(), "latest"]))
            .await?;
        let code = result_str(&result)?;
        Ok(code != "0x" && !code.is_empty())
    }
}
