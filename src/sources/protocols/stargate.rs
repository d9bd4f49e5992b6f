//! Stargate LP farm positions.
//!
//! Walks the LPStaking farm on each chain that has one, reading the
//! wallet's staked amount per pool id and resolving the pool's LP token
//! symbol back to the underlying asset.

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::models::{Holding, HoldingKind};
use crate::rpc::abi::{decode_address, decode_string, decode_u256, encode_call, format_units, Word};
use crate::rpc::{ChainSpec, EvmRpc};

use super::ProtocolScanner;

// LPStaking farm per chain id.
const FARMS: &[(u64, &str)] = &[
    (1, "0xB0D502E938ed5f4df2E681fE6E419ff29631d62b"),
    (56, "0x3052A0F6ab15b4AE1df39962d5DdEFacA86DaB47"),
    (137, "0x8731d54E9D02c286767d56ac03e8037C07e01e98"),
    (42161, "0xeA8DfEE1898a7e0a59f7527F076106d7e44c2176"),
    (10, "0x4DeA9e918c6289a52cd469cAC652727B7b412Cd2"),
    (8453, "0x06Eb48763f117c7Be887296CDcdfad2E4092739C"),
];

// Used when poolLength() itself is unreadable.
const DEFAULT_POOL_COUNT: usize = 15;

pub struct StargateScanner;

impl StargateScanner {
    async fn pool_count(&self, rpc: &dyn EvmRpc, chain: &ChainSpec, farm: Address) -> usize {
        match rpc.call(chain, farm, encode_call("poolLength()", &[])).await {
            Ok(data) => decode_u256(&data, 0)
                .and_then(|v| v.try_into().ok())
                .unwrap_or(DEFAULT_POOL_COUNT),
            Err(err) => {
                debug!(chain = chain.name, "poolLength failed, assuming {DEFAULT_POOL_COUNT}: {err}");
                DEFAULT_POOL_COUNT
            }
        }
    }

    async fn lp_holding(
        &self,
        rpc: &dyn EvmRpc,
        chain: &ChainSpec,
        farm: Address,
        pid: usize,
        staked: U256,
    ) -> Result<Holding> {
        let pool_data = rpc
            .call(
                chain,
                farm,
                encode_call("poolInfo(uint256)", &[Word::Uint(U256::from(pid))]),
            )
            .await?;
        let lp_token =
            decode_address(&pool_data, 0).ok_or_else(|| anyhow!("malformed poolInfo response"))?;

        let decimals = match rpc.call(chain, lp_token, encode_call("decimals()", &[])).await {
            Ok(data) => decode_u256(&data, 0)
                .and_then(|v| u8::try_from(v).ok())
                .unwrap_or(6),
            Err(_) => 6,
        };
        let symbol = match rpc.call(chain, lp_token, encode_call("symbol()", &[])).await {
            Ok(data) => decode_string(&data).unwrap_or_else(|| "STG-LP".to_string()),
            Err(_) => "STG-LP".to_string(),
        };
        // Stargate LP symbols look like "S*USDC"; the underlying ticker
        // is what the price oracles know.
        let underlying = symbol.strip_prefix("S*").unwrap_or(&symbol);

        Ok(Holding::new(
            format!("{underlying} (Stargate)"),
            format_units(staked, decimals),
            self.name(),
            HoldingKind::Onchain,
        )
        .on_chain(chain.id, chain.slug))
    }
}

#[async_trait]
impl ProtocolScanner for StargateScanner {
    fn name(&self) -> &'static str {
        "Stargate"
    }

    async fn scan(
        &self,
        rpc: &dyn EvmRpc,
        chains: &[ChainSpec],
        owner: Address,
    ) -> Result<Vec<Holding>> {
        let mut holdings = Vec::new();
        for chain in chains {
            let Some(farm) = FARMS
                .iter()
                .find(|(id, _)| *id == chain.id)
                .and_then(|(_, addr)| addr.parse::<Address>().ok())
            else {
                continue;
            };
            match rpc.has_code(chain, farm).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    debug!(chain = chain.name, "stargate farm probe failed: {err}");
                    continue;
                }
            }

            let count = self.pool_count(rpc, chain, farm).await;
            let user_calls = (0..count)
                .map(|pid| {
                    (
                        farm,
                        encode_call(
                            "userInfo(uint256,address)",
                            &[Word::Uint(U256::from(pid)), Word::Addr(owner)],
                        ),
                    )
                })
                .collect();
            for (pid, result) in rpc.call_batch(chain, user_calls).await.into_iter().enumerate() {
                // UserInfo word 0 is the staked LP amount.
                let Some(staked) = result.ok().and_then(|d| decode_u256(&d, 0)) else {
                    continue;
                };
                if staked.is_zero() {
                    continue;
                }
                match self.lp_holding(rpc, chain, farm, pid, staked).await {
                    Ok(holding) => holdings.push(holding),
                    Err(err) => {
                        debug!(chain = chain.name, pid, "stargate pool read failed: {err}");
                    }
                }
            }
        }
        Ok(holdings)
    }
}
