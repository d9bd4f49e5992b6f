//! EigenLayer restaking positions (mainnet only).
//!
//! Reads the StrategyManager's deposit list and maps each strategy back
//! to its underlying liquid staking token. Shares are treated as 1:1
//! with the underlying for valuation, which is the convention the
//! strategies themselves start from.

use alloy_primitives::Address;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::models::{Holding, HoldingKind};
use crate::rpc::abi::{decode_address_u256_arrays, decode_u256, encode_call, format_units, Word};
use crate::rpc::{ChainSpec, EvmRpc};

use super::ProtocolScanner;

const STRATEGY_MANAGER: &str = "0x858646372CC42E1A627fcE94aa7A7033e7CF075A";

// Strategy contract -> underlying symbol. Qualified with "(Eigen)" so a
// restaked balance never merges with a wallet balance of the same LST.
const KNOWN_STRATEGIES: &[(&str, &str)] = &[
    ("0x93c4b944D05dfe6df7645A86cd2206016c51564D", "stETH (Eigen)"),
    ("0x1BeE69b7dFFfA4E2d53C2a2Df135C388AD25dCD2", "rETH (Eigen)"),
    ("0x54945180dB7943c0ed0FEE7EdaB2Bd24620256bc", "cbETH (Eigen)"),
    ("0x0Fe4F44beE93503346A3Ac9EE5A26b130a5796d6", "swETH (Eigen)"),
    ("0xa4C637e0F704745D182e4D38cAb7E7485321d059", "oETH (Eigen)"),
];

pub struct EigenLayerScanner;

impl EigenLayerScanner {
    /// Known strategies map to their underlying LST; anything else keeps
    /// a truncated-address label so the deposit still shows up.
    fn strategy_symbol(strategy: Address) -> String {
        KNOWN_STRATEGIES
            .iter()
            .find_map(|(addr, symbol)| {
                let known: Address = addr.parse().ok()?;
                (known == strategy).then_some(symbol.to_string())
            })
            .unwrap_or_else(|| {
                format!(
                    "Unknown Strategy (0x{}...)",
                    alloy_primitives::hex::encode(&strategy.as_slice()[..2])
                )
            })
    }

    async fn deposits(
        &self,
        rpc: &dyn EvmRpc,
        chain: &ChainSpec,
        manager: Address,
        owner: Address,
    ) -> Result<Vec<(Address, f64)>> {
        let data = rpc
            .call(
                chain,
                manager,
                encode_call("getDeposits(address)", &[Word::Addr(owner)]),
            )
            .await?;
        let (strategies, shares) = decode_address_u256_arrays(&data)
            .ok_or_else(|| anyhow!("malformed getDeposits response"))?;
        Ok(strategies
            .into_iter()
            .zip(shares)
            .map(|(strategy, raw)| (strategy, format_units(raw, 18)))
            .collect())
    }

    /// Per-strategy reads for when the aggregate call is unavailable.
    async fn deposits_fallback(
        &self,
        rpc: &dyn EvmRpc,
        chain: &ChainSpec,
        manager: Address,
        owner: Address,
    ) -> Vec<(Address, f64)> {
        let strategies: Vec<Address> = KNOWN_STRATEGIES
            .iter()
            .filter_map(|(addr, _)| addr.parse().ok())
            .collect();
        let calls = strategies
            .iter()
            .map(|strategy| {
                (
                    manager,
                    encode_call(
                        "stakerStrategyShares(address,address)",
                        &[Word::Addr(owner), Word::Addr(*strategy)],
                    ),
                )
            })
            .collect();

        strategies
            .into_iter()
            .zip(rpc.call_batch(chain, calls).await)
            .filter_map(|(strategy, result)| {
                let raw = decode_u256(&result.ok()?, 0)?;
                Some((strategy, format_units(raw, 18)))
            })
            .collect()
    }
}

#[async_trait]
impl ProtocolScanner for EigenLayerScanner {
    fn name(&self) -> &'static str {
        "EigenLayer"
    }

    async fn scan(
        &self,
        rpc: &dyn EvmRpc,
        chains: &[ChainSpec],
        owner: Address,
    ) -> Result<Vec<Holding>> {
        let Some(chain) = chains.iter().find(|c| c.id == 1) else {
            return Ok(Vec::new());
        };
        let manager: Address = STRATEGY_MANAGER
            .parse()
            .map_err(|_| anyhow!("bad strategy manager address"))?;

        let deposits = match self.deposits(rpc, chain, manager, owner).await {
            Ok(deposits) => deposits,
            Err(err) => {
                debug!("getDeposits failed, reading per strategy: {err}");
                self.deposits_fallback(rpc, chain, manager, owner).await
            }
        };

        Ok(deposits
            .into_iter()
            .filter(|(_, amount)| *amount > 0.0)
            .map(|(strategy, amount)| {
                let symbol = Self::strategy_symbol(strategy);
                Holding::new(symbol, amount, self.name(), HoldingKind::Onchain)
                    .on_chain(chain.id, chain.slug)
                    .with_contract(strategy.to_string())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::abi::selector;
    use alloy_primitives::U256;

    struct FakeRpc {
        deposits_works: bool,
        strategy: &'static str,
    }

    fn fake(deposits_works: bool) -> FakeRpc {
        FakeRpc {
            deposits_works,
            strategy: "0x93c4b944D05dfe6df7645A86cd2206016c51564D",
        }
    }

    #[async_trait]
    impl EvmRpc for FakeRpc {
        async fn native_balance(&self, _chain: &ChainSpec, _owner: Address) -> Result<U256> {
            Ok(U256::ZERO)
        }

        async fn call(&self, _chain: &ChainSpec, _to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
            if !self.deposits_works {
                anyhow::bail!("execution reverted");
            }
            assert_eq!(&data[..4], &selector("getDeposits(address)"));
            // One strategy with 2e18 shares.
            let strategy: Address = self.strategy.parse().unwrap();
            let mut out = vec![0u8; 32 * 6];
            out[31] = 0x40;
            out[63] = 0x80;
            out[95] = 1;
            out[108..128].copy_from_slice(strategy.as_slice());
            out[159] = 1;
            let shares = U256::from(2u64) * U256::from(10u64).pow(U256::from(18u64));
            out[160..192].copy_from_slice(&shares.to_be_bytes::<32>());
            Ok(out)
        }

        async fn call_batch(
            &self,
            _chain: &ChainSpec,
            calls: Vec<(Address, Vec<u8>)>,
        ) -> Vec<Result<Vec<u8>>> {
            // First strategy holds 1e18 shares, the rest nothing.
            calls
                .into_iter()
                .enumerate()
                .map(|(i, _)| {
                    let shares = if i == 0 {
                        U256::from(10u64).pow(U256::from(18u64))
                    } else {
                        U256::ZERO
                    };
                    Ok(shares.to_be_bytes::<32>().to_vec())
                })
                .collect()
        }

        async fn has_code(&self, _chain: &ChainSpec, _address: Address) -> Result<bool> {
            Ok(true)
        }
    }

    fn mainnet() -> Vec<ChainSpec> {
        crate::rpc::default_chains()
            .into_iter()
            .filter(|c| c.id == 1)
            .collect()
    }

    #[tokio::test]
    async fn maps_strategies_to_qualified_symbols() {
        let owner: Address = "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap();
        let holdings = EigenLayerScanner
            .scan(&fake(true), &mainnet(), owner)
            .await
            .unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].symbol, "stETH (Eigen)");
        assert_eq!(holdings[0].amount, 2.0);
        assert_eq!(holdings[0].base_symbol(), "STETH");
    }

    #[tokio::test]
    async fn unrecognized_strategy_keeps_a_truncated_address_label() {
        let owner: Address = "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap();
        let rpc = FakeRpc {
            deposits_works: true,
            strategy: "0xdEaDbeefdeadbeefdeAdbeefdeadbeefDeadbEEf",
        };
        let holdings = EigenLayerScanner.scan(&rpc, &mainnet(), owner).await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].symbol, "Unknown Strategy (0xdead...)");
        assert_eq!(holdings[0].amount, 2.0);
    }

    #[tokio::test]
    async fn falls_back_to_per_strategy_reads() {
        let owner: Address = "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap();
        let holdings = EigenLayerScanner
            .scan(&fake(false), &mainnet(), owner)
            .await
            .unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].amount, 1.0);
    }

    #[tokio::test]
    async fn no_mainnet_means_no_scan() {
        let owner: Address = "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap();
        let holdings = EigenLayerScanner
            .scan(&fake(true), &[], owner)
            .await
            .unwrap();
        assert!(holdings.is_empty());
    }
}
