//! USD pricing for holdings.
//!
//! Prices resolve through three tiers: a seeded stablecoin table, an
//! address-keyed oracle for on-chain tokens, and a symbol-keyed oracle
//! for everything else. A tier that fails is logged and skipped; an
//! asset no tier can price keeps a price of zero rather than sinking
//! the aggregation.

pub mod cryptocompare;
pub mod frankfurter;
pub mod llama;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::models::{base_symbol, Holding};

pub use cryptocompare::CryptoCompareOracle;
pub use frankfurter::FrankfurterOracle;
pub use llama::DefiLlamaOracle;

/// Stablecoins pinned to 1.0 USD without an oracle round trip.
pub const STABLE_SYMBOLS: &[&str] = &["USDT", "USDC", "DAI", "FDUSD", "BUSD"];

/// Symbol -> USD unit price, seeded with the stablecoin pins.
///
/// Keys are upper-cased. Lookup falls back from the exact (possibly
/// qualified) symbol to its base symbol, so "ETH (eth-staking)" finds a
/// price written under "ETH".
#[derive(Debug, Clone)]
pub struct PriceMap {
    prices: HashMap<String, f64>,
}

impl PriceMap {
    pub fn new() -> Self {
        let prices = STABLE_SYMBOLS
            .iter()
            .map(|s| (s.to_string(), 1.0))
            .collect();
        Self { prices }
    }

    /// Record a price. The stablecoin pins are never overwritten.
    pub fn insert(&mut self, symbol: &str, price: f64) {
        let key = symbol.to_uppercase();
        if STABLE_SYMBOLS.contains(&key.as_str()) {
            return;
        }
        self.prices.insert(key, price);
    }

    /// Record a price only when the symbol has none yet.
    pub fn insert_if_absent(&mut self, symbol: &str, price: f64) {
        let key = symbol.to_uppercase();
        self.prices.entry(key).or_insert(price);
    }

    pub fn lookup(&self, symbol: &str) -> Option<f64> {
        if let Some(price) = self.prices.get(&symbol.to_uppercase()) {
            return Some(*price);
        }
        self.prices.get(&base_symbol(symbol)).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PriceMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Oracle keyed by `chain:contract` ids. Returns whatever subset it
/// knows; missing ids are simply absent.
#[async_trait]
pub trait AddressPriceOracle: Send + Sync {
    async fn prices(&self, ids: &[String]) -> Result<HashMap<String, f64>>;
}

/// Oracle keyed by bare ticker symbols.
#[async_trait]
pub trait SymbolPriceOracle: Send + Sync {
    async fn prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>>;
}

pub struct PriceResolver {
    address_oracle: Arc<dyn AddressPriceOracle>,
    symbol_oracle: Arc<dyn SymbolPriceOracle>,
    /// Exact-symbol overrides consulted before the base symbol is
    /// derived, e.g. "WETH (Eigen)" prices as "ETH".
    remap: HashMap<String, String>,
    /// Derivative contract ids swapped for their underlying before the
    /// address oracle is asked, so a share token tracks its underlying.
    address_remap: HashMap<String, String>,
    /// Base-symbol aliases for wrappers the symbol oracle does not
    /// track directly.
    aliases: HashMap<String, String>,
}

fn default_remap() -> HashMap<String, String> {
    [
        ("stETH (Eigen)", "STETH"),
        ("rETH (Eigen)", "RETH"),
        ("cbETH (Eigen)", "CBETH"),
        ("swETH (Eigen)", "SWETH"),
        ("oETH (Eigen)", "OETH"),
        ("WETH (Eigen)", "ETH"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// EigenLayer strategy share tokens price as the LST they wrap.
fn default_address_remap() -> HashMap<String, String> {
    [
        (
            "ethereum:0x93c4b944d05dfe6df7645a86cd2206016c51564d",
            "ethereum:0xae7ab96520de3a18e5e111b5eaab095312d7fe84", // stETH
        ),
        (
            "ethereum:0x1bee69b7dfffa4e2d53c2a2df135c388ad25dcd2",
            "ethereum:0xae78736cd615f374d3085123a210448e74fc6393", // rETH
        ),
        (
            "ethereum:0x54945180db7943c0ed0fee7edab2bd24620256bc",
            "ethereum:0xbe9895146f7af43049ca1c1ae358b0541ea49704", // cbETH
        ),
        (
            "ethereum:0x0fe4f44bee93503346a3ac9ee5a26b130a5796d6",
            "ethereum:0xf951e335afb289353dc249e82926178eac7ded78", // swETH
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_aliases() -> HashMap<String, String> {
    [
        ("WETH", "ETH"),
        ("WBETH", "ETH"),
        ("CBBTC", "BTC"),
        ("BTCB", "BTC"),
        ("WBTC", "BTC"),
        ("USDBC", "USDC"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl PriceResolver {
    pub fn new(
        address_oracle: Arc<dyn AddressPriceOracle>,
        symbol_oracle: Arc<dyn SymbolPriceOracle>,
    ) -> Self {
        Self {
            address_oracle,
            symbol_oracle,
            remap: default_remap(),
            address_remap: default_address_remap(),
            aliases: default_aliases(),
        }
    }

    /// The ticker the symbol oracle should be asked for.
    fn query_symbol(&self, exact: &str) -> String {
        if let Some(mapped) = self.remap.get(exact) {
            return mapped.clone();
        }
        let base = base_symbol(exact);
        self.aliases.get(&base).cloned().unwrap_or(base)
    }

    fn address_id(holding: &Holding) -> Option<String> {
        let chain = holding.chain_name.as_deref()?;
        let contract = holding.contract_address.as_deref()?;
        Some(format!("{}:{}", chain, contract.to_lowercase()))
    }

    /// Resolve prices for every distinct symbol in `holdings`.
    pub async fn resolve(&self, holdings: &[Holding]) -> PriceMap {
        let mut map = PriceMap::new();

        // Address tier: on-chain holdings that carry a contract.
        let addressed: Vec<(&Holding, String)> = holdings
            .iter()
            .filter(|h| map.lookup(&h.symbol).is_none())
            .filter_map(|h| Self::address_id(h).map(|id| (h, id)))
            .map(|(h, id)| {
                let id = self.address_remap.get(&id).cloned().unwrap_or(id);
                (h, id)
            })
            .collect();
        if !addressed.is_empty() {
            let ids: Vec<String> = {
                let mut ids: Vec<String> =
                    addressed.iter().map(|(_, id)| id.clone()).collect();
                ids.sort();
                ids.dedup();
                ids
            };
            match self.address_oracle.prices(&ids).await {
                Ok(found) => {
                    for (holding, id) in &addressed {
                        if let Some(price) = found.get(id) {
                            map.insert(&holding.symbol, *price);
                            map.insert_if_absent(&holding.base_symbol(), *price);
                        }
                    }
                }
                Err(err) => warn!("address price oracle failed: {err}"),
            }
        }

        // Symbol tier: whatever the earlier tiers left unpriced.
        let mut wanted: HashMap<String, Vec<&Holding>> = HashMap::new();
        for holding in holdings {
            if map.lookup(&holding.symbol).is_some() {
                continue;
            }
            wanted
                .entry(self.query_symbol(&holding.symbol))
                .or_default()
                .push(holding);
        }
        if !wanted.is_empty() {
            let mut symbols: Vec<String> = wanted.keys().cloned().collect();
            symbols.sort();
            match self.symbol_oracle.prices(&symbols).await {
                Ok(found) => {
                    for (query, group) in &wanted {
                        let Some(price) = found.get(query) else {
                            debug!(symbol = %query, "no symbol price available");
                            continue;
                        };
                        for holding in group {
                            map.insert(&holding.symbol, *price);
                            map.insert_if_absent(&holding.base_symbol(), *price);
                        }
                    }
                }
                Err(err) => warn!("symbol price oracle failed: {err}"),
            }
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HoldingKind;

    struct NoAddresses;
    #[async_trait]
    impl AddressPriceOracle for NoAddresses {
        async fn prices(&self, _ids: &[String]) -> Result<HashMap<String, f64>> {
            Ok(HashMap::new())
        }
    }

    struct FixedSymbols(HashMap<String, f64>);
    #[async_trait]
    impl SymbolPriceOracle for FixedSymbols {
        async fn prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>> {
            Ok(symbols
                .iter()
                .filter_map(|s| self.0.get(s).map(|p| (s.clone(), *p)))
                .collect())
        }
    }

    fn resolver(symbol_prices: &[(&str, f64)]) -> PriceResolver {
        PriceResolver::new(
            Arc::new(NoAddresses),
            Arc::new(FixedSymbols(
                symbol_prices
                    .iter()
                    .map(|(s, p)| (s.to_string(), *p))
                    .collect(),
            )),
        )
    }

    #[test]
    fn stables_are_seeded_and_pinned() {
        let mut map = PriceMap::new();
        assert_eq!(map.lookup("USDT"), Some(1.0));
        assert_eq!(map.lookup("USDC (flexible-earn)"), Some(1.0));
        map.insert("USDT", 0.97);
        assert_eq!(map.lookup("USDT"), Some(1.0));
    }

    #[test]
    fn lookup_falls_back_to_base_symbol() {
        let mut map = PriceMap::new();
        map.insert("ETH", 3000.0);
        assert_eq!(map.lookup("ETH (eth-staking)"), Some(3000.0));
        assert_eq!(map.lookup("eth"), Some(3000.0));
        assert_eq!(map.lookup("XYZ"), None);
    }

    #[tokio::test]
    async fn qualified_symbols_share_the_base_price() {
        let resolver = resolver(&[("BTC", 64_000.0)]);
        let holdings = vec![
            Holding::new("BTC", 0.5, "a", HoldingKind::Exchange),
            Holding::new("BTC (locked-earn)", 0.1, "a", HoldingKind::Exchange),
        ];
        let map = resolver.resolve(&holdings).await;
        assert_eq!(map.lookup("BTC"), Some(64_000.0));
        assert_eq!(map.lookup("BTC (locked-earn)"), Some(64_000.0));
    }

    #[tokio::test]
    async fn aliases_route_wrappers_to_the_tracked_ticker() {
        let resolver = resolver(&[("ETH", 3000.0), ("BTC", 64_000.0)]);
        let holdings = vec![
            Holding::new("WETH", 2.0, "w", HoldingKind::Onchain),
            Holding::new("cbBTC", 0.1, "w", HoldingKind::Onchain),
        ];
        let map = resolver.resolve(&holdings).await;
        assert_eq!(map.lookup("WETH"), Some(3000.0));
        assert_eq!(map.lookup("cbBTC"), Some(64_000.0));
    }

    #[tokio::test]
    async fn remap_applies_before_base_stripping() {
        let resolver = resolver(&[("ETH", 3000.0)]);
        let holdings = vec![Holding::new(
            "WETH (Eigen)",
            1.0,
            "w",
            HoldingKind::Onchain,
        )];
        let map = resolver.resolve(&holdings).await;
        assert_eq!(map.lookup("WETH (Eigen)"), Some(3000.0));
    }

    #[tokio::test]
    async fn address_tier_wins_over_symbol_tier() {
        struct OneAddress;
        #[async_trait]
        impl AddressPriceOracle for OneAddress {
            async fn prices(&self, ids: &[String]) -> Result<HashMap<String, f64>> {
                Ok(ids.iter().map(|id| (id.clone(), 1.23)).collect())
            }
        }

        let resolver = PriceResolver::new(
            Arc::new(OneAddress),
            Arc::new(FixedSymbols(
                [("AERO".to_string(), 9.99)].into_iter().collect(),
            )),
        );
        let holdings = vec![Holding::new("AERO", 10.0, "w", HoldingKind::Onchain)
            .on_chain(8453, "base")
            .with_contract("0x940181a94A35A4569E4529A3CDfB74e38FD98631")];
        let map = resolver.resolve(&holdings).await;
        assert_eq!(map.lookup("AERO"), Some(1.23));
    }

    #[tokio::test]
    async fn derivative_contract_prices_as_its_underlying() {
        struct UnderlyingOnly;
        #[async_trait]
        impl AddressPriceOracle for UnderlyingOnly {
            async fn prices(&self, ids: &[String]) -> Result<HashMap<String, f64>> {
                // Only the stETH token itself is known, not the strategy.
                Ok(ids
                    .iter()
                    .filter(|id| {
                        *id == "ethereum:0xae7ab96520de3a18e5e111b5eaab095312d7fe84"
                    })
                    .map(|id| (id.clone(), 3_100.0))
                    .collect())
            }
        }

        let resolver = PriceResolver::new(
            Arc::new(UnderlyingOnly),
            Arc::new(FixedSymbols(HashMap::new())),
        );
        let holdings = vec![Holding::new("stETH (Eigen)", 2.0, "w", HoldingKind::Onchain)
            .on_chain(1, "ethereum")
            .with_contract("0x93c4b944D05dfe6df7645A86cd2206016c51564D")];
        let map = resolver.resolve(&holdings).await;
        assert_eq!(map.lookup("stETH (Eigen)"), Some(3_100.0));
    }

    #[tokio::test]
    async fn unknown_symbols_stay_unpriced() {
        let resolver = resolver(&[]);
        let holdings = vec![Holding::new("OBSCURE", 1.0, "w", HoldingKind::Onchain)];
        let map = resolver.resolve(&holdings).await;
        assert_eq!(map.lookup("OBSCURE"), None);
    }

    #[tokio::test]
    async fn oracle_failure_leaves_stables_priced() {
        struct Failing;
        #[async_trait]
        impl SymbolPriceOracle for Failing {
            async fn prices(&self, _symbols: &[String]) -> Result<HashMap<String, f64>> {
                anyhow::bail!("oracle down")
            }
        }
        let resolver = PriceResolver::new(Arc::new(NoAddresses), Arc::new(Failing));
        let holdings = vec![
            Holding::new("USDT", 10.0, "a", HoldingKind::Exchange),
            Holding::new("BTC", 1.0, "a", HoldingKind::Exchange),
        ];
        let map = resolver.resolve(&holdings).await;
        assert_eq!(map.lookup("USDT"), Some(1.0));
        assert_eq!(map.lookup("BTC"), None);
    }
}
