//! Orchestrates the full pass: fan out to every configured source,
//! price the results, filter and sort, and cache the outcome.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};

use crate::cache::SnapshotCache;
use crate::clock::Clock;
use crate::config::{AppConfig, FilterSettings};
use crate::models::{ExchangeAccount, ExchangeKind, Holding, WalletAccount};
use crate::prices::PriceResolver;
use crate::rpc::{default_chains, EvmRpc, HttpRpc};
use crate::sources::protocols::default_scanners;
use crate::sources::{BinanceAdapter, OkxAdapter, SourceAdapter, SourceError, WalletAdapter};

/// Builds adapters for configured accounts. A trait so tests can hand
/// the aggregator canned sources.
pub trait AdapterFactory: Send + Sync {
    fn exchange(&self, account: &ExchangeAccount) -> Box<dyn SourceAdapter>;
    fn wallet(&self, wallet: &WalletAccount) -> Box<dyn SourceAdapter>;
}

pub struct DefaultAdapterFactory {
    clock: Arc<dyn Clock>,
    rpc: Arc<dyn EvmRpc>,
}

impl DefaultAdapterFactory {
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            clock,
            rpc: Arc::new(HttpRpc::new()?),
        })
    }
}

impl AdapterFactory for DefaultAdapterFactory {
    fn exchange(&self, account: &ExchangeAccount) -> Box<dyn SourceAdapter> {
        match account.kind {
            ExchangeKind::Binance => Box::new(BinanceAdapter::new(account, self.clock.clone())),
            ExchangeKind::Okx => Box::new(OkxAdapter::new(account, self.clock.clone())),
        }
    }

    fn wallet(&self, wallet: &WalletAccount) -> Box<dyn SourceAdapter> {
        Box::new(WalletAdapter::new(
            wallet.clone(),
            self.rpc.clone(),
            default_chains(),
            default_scanners(),
        ))
    }
}

/// A source that failed, reported alongside whatever the other sources
/// returned.
#[derive(Debug, Clone)]
pub struct SourceWarning {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub holdings: Vec<Holding>,
    pub warnings: Vec<SourceWarning>,
    pub from_cache: bool,
    pub timestamp: DateTime<Utc>,
}

pub struct Aggregator {
    factory: Arc<dyn AdapterFactory>,
    resolver: Arc<PriceResolver>,
    cache: SnapshotCache,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(
        factory: Arc<dyn AdapterFactory>,
        resolver: Arc<PriceResolver>,
        cache: SnapshotCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            factory,
            resolver,
            cache,
            clock,
        }
    }

    /// Run one aggregation pass. Serves the cached snapshot when it is
    /// still fresh unless `force_refresh` is set.
    pub async fn aggregate(
        &self,
        config: &AppConfig,
        force_refresh: bool,
    ) -> Result<AggregationOutcome> {
        if force_refresh {
            self.cache.clear().await?;
        } else if let Some(snapshot) = self.cache.get().await? {
            info!(holdings = snapshot.holdings.len(), "serving cached snapshot");
            return Ok(AggregationOutcome {
                holdings: apply_filter_and_sort(snapshot.holdings, &config.filter),
                warnings: Vec::new(),
                from_cache: true,
                timestamp: snapshot.timestamp,
            });
        }

        let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();
        for account in &config.exchanges {
            adapters.push(self.factory.exchange(account));
        }
        for wallet in &config.wallets {
            adapters.push(self.factory.wallet(wallet));
        }
        if adapters.is_empty() {
            return Ok(AggregationOutcome {
                holdings: Vec::new(),
                warnings: Vec::new(),
                from_cache: false,
                timestamp: self.clock.now(),
            });
        }

        let results = join_all(adapters.iter().map(|adapter| async {
            (adapter.name(), adapter.fetch().await)
        }))
        .await;

        let mut holdings = Vec::new();
        let mut warnings = Vec::new();
        for (source, result) in results {
            match result {
                Ok(rows) => {
                    holdings.extend(rows.into_iter().filter(|h| h.amount != 0.0));
                }
                Err(SourceError::Auth(message)) => {
                    warn!(%source, "source auth failure: {message}");
                    warnings.push(SourceWarning { source, message });
                }
                Err(SourceError::Other(err)) => {
                    warn!(%source, "source failed: {err}");
                    warnings.push(SourceWarning {
                        source,
                        message: err.to_string(),
                    });
                }
            }
        }

        let prices = self.resolver.resolve(&holdings).await;
        for holding in &mut holdings {
            holding.set_price(prices.lookup(&holding.symbol).unwrap_or(0.0));
        }

        let snapshot = self.cache.set(holdings).await?;
        info!(
            holdings = snapshot.holdings.len(),
            warnings = warnings.len(),
            "aggregation pass complete"
        );
        Ok(AggregationOutcome {
            holdings: apply_filter_and_sort(snapshot.holdings, &config.filter),
            warnings,
            from_cache: false,
            timestamp: snapshot.timestamp,
        })
    }
}

/// Drop dust if configured, then order by USD value descending. The
/// sort is stable, so equal values keep their fetch order.
pub fn apply_filter_and_sort(mut holdings: Vec<Holding>, filter: &FilterSettings) -> Vec<Holding> {
    if filter.hide_small_assets {
        holdings.retain(|h| h.value_usd >= filter.small_assets_threshold);
    }
    holdings.sort_by(|a, b| b.value_usd.total_cmp(&a.value_usd));
    holdings
}
