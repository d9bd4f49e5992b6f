//! EVM JSON-RPC access and the static chain/token tables the wallet
//! scanner walks.

pub mod abi;
pub mod http;

use alloy_primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;

pub use http::HttpRpc;

/// A well-known ERC-20 token tracked on a chain.
#[derive(Debug, Clone)]
pub struct TokenSpec {
    pub symbol: &'static str,
    pub address: &'static str,
    pub decimals: u8,
}

/// An EVM chain the wallet scanner covers.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    pub id: u64,
    pub name: &'static str,
    /// Identifier used by the address price oracle, e.g. `ethereum:0x...`.
    pub slug: &'static str,
    pub native_symbol: &'static str,
    pub native_decimals: u8,
    pub rpc_urls: Vec<String>,
    pub tokens: Vec<TokenSpec>,
}

/// Read-only EVM access. One implementation speaks JSON-RPC over HTTP;
/// tests substitute a canned responder.
#[async_trait]
pub trait EvmRpc: Send + Sync {
    async fn native_balance(&self, chain: &ChainSpec, owner: Address) -> Result<U256>;

    async fn call(&self, chain: &ChainSpec, to: Address, data: Vec<u8>) -> Result<Vec<u8>>;

    /// Issue calls in order and return one result per call. A failed call
    /// must not sink the whole batch.
    async fn call_batch(
        &self,
        chain: &ChainSpec,
        calls: Vec<(Address, Vec<u8>)>,
    ) -> Vec<Result<Vec<u8>>>;

    /// Whether an account has deployed code. Used to skip protocol
    /// contracts on chains where they were never deployed.
    async fn has_code(&self, chain: &ChainSpec, address: Address) -> Result<bool>;
}

fn token(symbol: &'static str, address: &'static str, decimals: u8) -> TokenSpec {
    TokenSpec {
        symbol,
        address,
        decimals,
    }
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

/// The chains scanned by default, with their common-token tables.
pub fn default_chains() -> Vec<ChainSpec> {
    vec![
        ChainSpec {
            id: 1,
            name: "Ethereum",
            slug: "ethereum",
            native_symbol: "ETH",
            native_decimals: 18,
            rpc_urls: urls(&["https://ethereum-rpc.publicnode.com"]),
            tokens: vec![
                token("USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6),
                token("USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6),
                token("DAI", "0x6B175474E89094C44Da98b954EedeAC495271d0F", 18),
                token("WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18),
                token("WBTC", "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", 8),
                token("stETH", "0xae7ab96520DE3A18E5e111B5EaAb095312D7fE84", 18),
                token("rETH", "0xae78736Cd615f374D3085123A210448E74Fc6393", 18),
                token("cbETH", "0xBe9895146f7AF43049ca1c1AE358B0541Ea49704", 18),
            ],
        },
        ChainSpec {
            id: 56,
            name: "BSC",
            slug: "bsc",
            native_symbol: "BNB",
            native_decimals: 18,
            rpc_urls: urls(&["https://bsc-rpc.publicnode.com"]),
            tokens: vec![
                token("USDT", "0x55d398326f99059fF775485246999027B3197955", 18),
                token("USDC", "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d", 18),
                token("ETH", "0x2170Ed0880ac9A755fd29B2688956BD959F933F8", 18),
                token("BTCB", "0x7130d2A12B9BCbFAe4f2634d864A1Ee1Ce3Ead9c", 18),
            ],
        },
        ChainSpec {
            id: 137,
            name: "Polygon",
            slug: "polygon",
            native_symbol: "POL",
            native_decimals: 18,
            rpc_urls: urls(&["https://polygon-bor-rpc.publicnode.com"]),
            tokens: vec![
                token("USDT", "0xc2132D05D31c914a87C6611C10748AEb04B58e8F", 6),
                token("USDC", "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", 6),
                token("WETH", "0x7ceB23fD6bC0adD59E62ac25578270cFf1b9f619", 18),
                token("WBTC", "0x1BFD67037B42Cf73acF2047067bd4F2C47D9BfD6", 8),
            ],
        },
        ChainSpec {
            id: 10,
            name: "Optimism",
            slug: "optimism",
            native_symbol: "ETH",
            native_decimals: 18,
            rpc_urls: urls(&["https://optimism-rpc.publicnode.com"]),
            tokens: vec![
                token("USDT", "0x94b008aA00579c1307B0EF2c499aD98a8ce58e58", 6),
                token("USDC", "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85", 6),
                token("WBTC", "0x68f180fcCe6836688e9084f035309E29Bf0A2095", 8),
                token("OP", "0x4200000000000000000000000000000000000042", 18),
            ],
        },
        ChainSpec {
            id: 42161,
            name: "Arbitrum",
            slug: "arbitrum",
            native_symbol: "ETH",
            native_decimals: 18,
            rpc_urls: urls(&["https://arbitrum-one-rpc.publicnode.com"]),
            tokens: vec![
                token("USDT", "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9", 6),
                token("USDC", "0xaf88d065e77c8cC2239327C5EDb3A432268e5831", 6),
                token("WETH", "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1", 18),
                token("WBTC", "0x2f2a2543B76A4166549F7aaB2e75Bef0aefC5B0f", 8),
                token("ARB", "0x912CE59144191C1204E64559FE8253a0e49E6548", 18),
            ],
        },
        ChainSpec {
            id: 8453,
            name: "Base",
            slug: "base",
            native_symbol: "ETH",
            native_decimals: 18,
            // Base public endpoints rate-limit aggressively; keep a deep
            // fallback list and let latency ranking pick the best one.
            rpc_urls: urls(&[
                "https://base-rpc.publicnode.com",
                "https://mainnet.base.org",
                "https://base.llamarpc.com",
                "https://base.drpc.org",
                "https://1rpc.io/base",
                "https://base.meowrpc.com",
            ]),
            tokens: vec![
                token("USDC", "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", 6),
                token("USDbC", "0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA", 6),
                token("WETH", "0x4200000000000000000000000000000000000006", 18),
                token("cbBTC", "0xcbB7C0000aB88B473b1f5aFd9ef808440eed33Bf", 8),
                token("cbETH", "0x2Ae3F1Ec7F1F5012CFEab0185bfc7aa3cf0DEc22", 18),
                token("AERO", "0x940181a94A35A4569E4529A3CDfB74e38FD98631", 18),
            ],
        },
        ChainSpec {
            id: 324,
            name: "zkSync",
            slug: "era",
            native_symbol: "ETH",
            native_decimals: 18,
            rpc_urls: urls(&["https://mainnet.era.zksync.io"]),
            tokens: vec![
                token("USDT", "0x493257fD37EDB34451f62EDf8D2a0C418852bA4C", 6),
                token("USDC", "0x1d17CBcF0D6D143135aE902365D2E5e2A16538D4", 6),
                token("WETH", "0x5AEa5775959fBC2557Cc8789bC1bf90A239D9a91", 18),
            ],
        },
        ChainSpec {
            id: 196,
            name: "X Layer",
            slug: "xlayer",
            native_symbol: "OKB",
            native_decimals: 18,
            rpc_urls: urls(&["https://rpc.xlayer.tech"]),
            tokens: vec![
                token("USDT", "0x1E4a5963aBFD975d8c9021ce480b42188849D41d", 6),
                token("USDC", "0x74b7F16337b8972027F6196A17a631aC6dE26d22", 6),
                token("WETH", "0x5A77f1443D16ee5761d310e38b62f77f726bC71c", 18),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids_are_unique() {
        let chains = default_chains();
        let mut ids: Vec<u64> = chains.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), chains.len());
    }

    #[test]
    fn token_addresses_parse() {
        for chain in default_chains() {
            assert!(!chain.rpc_urls.is_empty(), "{} has no endpoints", chain.name);
            for t in &chain.tokens {
                let parsed: Result<Address, _> = t.address.parse();
                assert!(parsed.is_ok(), "bad address for {} on {}", t.symbol, chain.name);
            }
        }
    }

    #[test]
    fn base_has_fallback_endpoints() {
        let chains = default_chains();
        let base = chains.iter().find(|c| c.id == 8453).unwrap();
        assert!(base.rpc_urls.len() >= 3);
    }
}
