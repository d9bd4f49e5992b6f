//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use coinpanel::aggregator::AdapterFactory;
use coinpanel::clock::FixedClock;
use coinpanel::models::{ExchangeAccount, ExchangeKind, Holding, WalletAccount};
use coinpanel::prices::{AddressPriceOracle, PriceResolver, SymbolPriceOracle};
use coinpanel::sources::{SourceAdapter, SourceError};

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ))
}

pub fn exchange_account(kind: ExchangeKind, name: &str) -> ExchangeAccount {
    ExchangeAccount {
        id: name.to_string(),
        kind,
        name: name.to_string(),
        api_key: "api-key".to_string(),
        secret: "secret".to_string(),
        passphrase: Some("hunter2".to_string()),
    }
}

/// Adapter that returns a fixed set of holdings, or a fixed error, and
/// counts how often it was asked.
pub struct StaticAdapter {
    name: String,
    outcome: Result<Vec<Holding>, String>,
    auth_failure: bool,
    pub fetches: Arc<AtomicUsize>,
}

impl StaticAdapter {
    pub fn ok(name: &str, holdings: Vec<Holding>) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(holdings),
            auth_failure: false,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn auth_failure(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Err(message.to_string()),
            auth_failure: true,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Err(message.to_string()),
            auth_failure: false,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self) -> Result<Vec<Holding>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(holdings) => Ok(holdings.clone()),
            Err(message) if self.auth_failure => Err(SourceError::Auth(message.clone())),
            Err(message) => Err(SourceError::Other(anyhow::anyhow!("{message}"))),
        }
    }
}

/// Factory that hands out pre-built adapters keyed by account name.
#[derive(Default)]
pub struct MockFactory {
    adapters: std::sync::Mutex<HashMap<String, Option<Arc<StaticAdapter>>>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, adapter: StaticAdapter) -> Arc<AtomicUsize> {
        let fetches = adapter.fetches.clone();
        self.adapters
            .lock()
            .unwrap()
            .insert(name.to_string(), Some(Arc::new(adapter)));
        fetches
    }

    fn take(&self, name: &str) -> Box<dyn SourceAdapter> {
        let adapters = self.adapters.lock().unwrap();
        let adapter = adapters
            .get(name)
            .and_then(|slot| slot.clone())
            .unwrap_or_else(|| panic!("no adapter registered for {name}"));
        Box::new(SharedAdapter(adapter))
    }
}

/// Wrapper so one registered adapter can be handed out repeatedly.
struct SharedAdapter(Arc<StaticAdapter>);

#[async_trait]
impl SourceAdapter for SharedAdapter {
    fn name(&self) -> String {
        self.0.name()
    }

    async fn fetch(&self) -> Result<Vec<Holding>, SourceError> {
        self.0.fetch().await
    }
}

impl AdapterFactory for MockFactory {
    fn exchange(&self, account: &ExchangeAccount) -> Box<dyn SourceAdapter> {
        self.take(&account.name)
    }

    fn wallet(&self, wallet: &WalletAccount) -> Box<dyn SourceAdapter> {
        self.take(&wallet.name)
    }
}

/// Address oracle that knows nothing.
pub struct NoAddressOracle;

#[async_trait]
impl AddressPriceOracle for NoAddressOracle {
    async fn prices(&self, _ids: &[String]) -> Result<HashMap<String, f64>> {
        Ok(HashMap::new())
    }
}

/// Symbol oracle backed by a static table.
pub struct TableSymbolOracle(pub HashMap<String, f64>);

#[async_trait]
impl SymbolPriceOracle for TableSymbolOracle {
    async fn prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>> {
        Ok(symbols
            .iter()
            .filter_map(|s| self.0.get(s).map(|p| (s.clone(), *p)))
            .collect())
    }
}

pub fn table_resolver(prices: &[(&str, f64)]) -> Arc<PriceResolver> {
    Arc::new(PriceResolver::new(
        Arc::new(NoAddressOracle),
        Arc::new(TableSymbolOracle(
            prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
        )),
    ))
}
