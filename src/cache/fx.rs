//! Display-currency FX rate cache.
//!
//! FX rates move slowly, so a stale rate is still good enough to render
//! with: an expired entry is returned as-is while a background refresh
//! replaces it. Only a cold cache blocks on the oracle.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::clock::Clock;
use crate::prices::frankfurter::FxOracle;

#[derive(Clone)]
pub struct FxRateCache {
    inner: Arc<Inner>,
}

struct Inner {
    oracle: Arc<dyn FxOracle>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    rates: Mutex<HashMap<String, (f64, DateTime<Utc>)>>,
    refreshing: Mutex<HashSet<String>>,
}

impl FxRateCache {
    pub fn new(oracle: Arc<dyn FxOracle>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                oracle,
                ttl,
                clock,
                rates: Mutex::new(HashMap::new()),
                refreshing: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// USD -> `currency` rate. Serves a stale entry while refreshing it
    /// in the background.
    pub async fn rate(&self, currency: &str) -> Result<f64> {
        let currency = currency.to_uppercase();
        if currency == "USD" {
            return Ok(1.0);
        }

        let cached = {
            let rates = self.inner.rates.lock().unwrap_or_else(|e| e.into_inner());
            rates.get(&currency).copied()
        };
        match cached {
            Some((rate, fetched_at)) => {
                let age = self
                    .inner
                    .clock
                    .now()
                    .signed_duration_since(fetched_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                if age >= self.inner.ttl {
                    self.spawn_refresh(currency);
                }
                Ok(rate)
            }
            None => {
                let rate = self.inner.oracle.usd_rate(&currency).await?;
                self.store(&currency, rate);
                Ok(rate)
            }
        }
    }

    fn store(&self, currency: &str, rate: f64) {
        let now = self.inner.clock.now();
        let mut rates = self.inner.rates.lock().unwrap_or_else(|e| e.into_inner());
        rates.insert(currency.to_string(), (rate, now));
    }

    fn spawn_refresh(&self, currency: String) {
        {
            let mut refreshing = self
                .inner
                .refreshing
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if !refreshing.insert(currency.clone()) {
                return;
            }
        }
        let cache = self.clone();
        tokio::spawn(async move {
            match cache.inner.oracle.usd_rate(&currency).await {
                Ok(rate) => cache.store(&currency, rate),
                Err(err) => warn!(%currency, "fx refresh failed, keeping stale rate: {err}"),
            }
            let mut refreshing = cache
                .inner
                .refreshing
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            refreshing.remove(&currency);
        });
    }
}
