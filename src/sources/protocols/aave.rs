//! Aave v3 supply and borrow positions.
//!
//! For every chain with a deployed Pool, asks the pool for each common
//! token's reserve, then reads the wallet's aToken and variable debt
//! balances. Borrows carry the `(Aave Borrow)` qualifier and a positive
//! amount like every other row.

use std::time::Duration;

use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::models::{Holding, HoldingKind};
use crate::rpc::abi::{decode_address, decode_u256, encode_call, format_units, Word};
use crate::rpc::{ChainSpec, EvmRpc, TokenSpec};

use super::ProtocolScanner;

// Aave v3 Pool per chain id.
const POOLS: &[(u64, &str)] = &[
    (1, "0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2"),
    (137, "0x794a61358D6845594F94dc1DB02A252b5b4814aD"),
    (42161, "0x794a61358D6845594F94dc1DB02A252b5b4814aD"),
    (10, "0x794a61358D6845594F94dc1DB02A252b5b4814aD"),
    (8453, "0xA238Dd80C259a72e81d7e4664a9801593F98d1c5"),
    (56, "0x6807dc923806fE8Fd134338EABCA509979a7e0cB"),
    (324, "0x78e30497a3c7527d953c6B1E3541b021A98Ac43c"),
];

// Pause between reserve lookups; public endpoints throttle bursts.
const RESERVE_DELAY: Duration = Duration::from_millis(200);

pub struct AaveScanner;

impl AaveScanner {
    async fn scan_reserve(
        &self,
        rpc: &dyn EvmRpc,
        chain: &ChainSpec,
        pool: Address,
        token: &TokenSpec,
        owner: Address,
    ) -> Result<Vec<Holding>> {
        let asset: Address = match token.address.parse() {
            Ok(address) => address,
            Err(_) => return Ok(Vec::new()),
        };
        let reserve = rpc
            .call(
                chain,
                pool,
                encode_call("getReserveData(address)", &[Word::Addr(asset)]),
            )
            .await?;
        // ReserveData words: 8 = aToken, 10 = variable debt token.
        let (Some(a_token), Some(debt_token)) =
            (decode_address(&reserve, 8), decode_address(&reserve, 10))
        else {
            return Ok(Vec::new());
        };
        if a_token == Address::ZERO {
            return Ok(Vec::new());
        }

        let balance_call = encode_call("balanceOf(address)", &[Word::Addr(owner)]);
        let results = rpc
            .call_batch(
                chain,
                vec![(a_token, balance_call.clone()), (debt_token, balance_call)],
            )
            .await;

        let mut holdings = Vec::new();
        let mut results = results.into_iter();
        if let Some(raw) = results.next().and_then(|r| r.ok()).and_then(|d| decode_u256(&d, 0)) {
            let supplied = format_units(raw, token.decimals);
            if supplied > 0.0 {
                holdings.push(
                    Holding::new(
                        format!("{} (Aave Supply)", token.symbol),
                        supplied,
                        self.name(),
                        HoldingKind::Onchain,
                    )
                    .on_chain(chain.id, chain.slug)
                    .with_contract(token.address),
                );
            }
        }
        if let Some(raw) = results.next().and_then(|r| r.ok()).and_then(|d| decode_u256(&d, 0)) {
            let borrowed = format_units(raw, token.decimals);
            if borrowed > 0.0 {
                holdings.push(
                    Holding::new(
                        format!("{} (Aave Borrow)", token.symbol),
                        borrowed,
                        self.name(),
                        HoldingKind::Onchain,
                    )
                    .on_chain(chain.id, chain.slug)
                    .with_contract(token.address),
                );
            }
        }
        Ok(holdings)
    }
}

#[async_trait]
impl ProtocolScanner for AaveScanner {
    fn name(&self) -> &'static str {
        "Aave"
    }

    async fn scan(
        &self,
        rpc: &dyn EvmRpc,
        chains: &[ChainSpec],
        owner: Address,
    ) -> Result<Vec<Holding>> {
        let mut holdings = Vec::new();
        for chain in chains {
            let Some(pool) = POOLS
                .iter()
                .find(|(id, _)| *id == chain.id)
                .and_then(|(_, addr)| addr.parse::<Address>().ok())
            else {
                continue;
            };
            // Cheap probe before walking every reserve.
            match rpc.has_code(chain, pool).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    debug!(chain = chain.name, "aave pool probe failed: {err}");
                    continue;
                }
            }

            for token in &chain.tokens {
                match self.scan_reserve(rpc, chain, pool, token, owner).await {
                    Ok(mut rows) => holdings.append(&mut rows),
                    Err(err) => {
                        debug!(chain = chain.name, token = token.symbol, "aave reserve read failed: {err}");
                    }
                }
                tokio::time::sleep(RESERVE_DELAY).await;
            }
        }
        Ok(holdings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::abi::selector;
    use alloy_primitives::U256;

    const A_TOKEN: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const DEBT_TOKEN: &str = "0xdddddddddddddddddddddddddddddddddddddddd";

    struct FakeRpc;

    #[async_trait]
    impl EvmRpc for FakeRpc {
        async fn native_balance(&self, _chain: &ChainSpec, _owner: Address) -> Result<U256> {
            Ok(U256::ZERO)
        }

        async fn call(&self, _chain: &ChainSpec, _to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
            assert_eq!(&data[..4], &selector("getReserveData(address)"));
            let mut out = vec![0u8; 32 * 12];
            let a: Address = A_TOKEN.parse().unwrap();
            let d: Address = DEBT_TOKEN.parse().unwrap();
            out[8 * 32 + 12..9 * 32].copy_from_slice(a.as_slice());
            out[10 * 32 + 12..11 * 32].copy_from_slice(d.as_slice());
            Ok(out)
        }

        async fn call_batch(
            &self,
            _chain: &ChainSpec,
            calls: Vec<(Address, Vec<u8>)>,
        ) -> Vec<Result<Vec<u8>>> {
            calls
                .into_iter()
                .map(|(to, _)| {
                    let balance = if to == A_TOKEN.parse::<Address>().unwrap() {
                        U256::from(5_000_000u64) // 5.0 with 6 decimals
                    } else {
                        U256::from(1_000_000u64) // 1.0 borrowed
                    };
                    Ok(balance.to_be_bytes::<32>().to_vec())
                })
                .collect()
        }

        async fn has_code(&self, _chain: &ChainSpec, _address: Address) -> Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn reports_supply_and_borrow_as_separate_rows() {
        let chains = vec![ChainSpec {
            id: 8453,
            name: "Base",
            slug: "base",
            native_symbol: "ETH",
            native_decimals: 18,
            rpc_urls: vec!["http://unused".to_string()],
            tokens: vec![TokenSpec {
                symbol: "USDC",
                address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                decimals: 6,
            }],
        }];
        let owner: Address = "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap();

        let holdings = AaveScanner.scan(&FakeRpc, &chains, owner).await.unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].symbol, "USDC (Aave Supply)");
        assert_eq!(holdings[0].amount, 5.0);
        assert_eq!(holdings[1].symbol, "USDC (Aave Borrow)");
        assert_eq!(holdings[1].amount, 1.0);
    }

    #[tokio::test]
    async fn skips_chains_without_a_pool() {
        let chains = vec![ChainSpec {
            id: 196,
            name: "X Layer",
            slug: "xlayer",
            native_symbol: "OKB",
            native_decimals: 18,
            rpc_urls: vec!["http://unused".to_string()],
            tokens: Vec::new(),
        }];
        let owner: Address = "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap();
        let holdings = AaveScanner.scan(&FakeRpc, &chains, owner).await.unwrap();
        assert!(holdings.is_empty());
    }
}
