//! Aerodrome positions on Base: veAERO locks and staked LP gauges.
//!
//! The voter's pool list runs into the thousands, so the gauge scan is
//! capped and paced. Staked LP rows keep the pool's own symbol, which
//! usually has no oracle price; they still show up with their amounts.

use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::models::{Holding, HoldingKind};
use crate::rpc::abi::{decode_string, decode_u256, encode_call, format_units, Word};
use crate::rpc::{ChainSpec, EvmRpc};

use super::ProtocolScanner;

const VOTER: &str = "0x16613524e02ad97eDfeF371bC883F2F5d6C480A5";
const VOTING_ESCROW: &str = "0xeBf418Fe2512e7E6bd9b87a8F0f294aCDC67e6B4";

const POOL_BATCH: usize = 5;
const MAX_POOLS: usize = 30;
const BATCH_DELAY: Duration = Duration::from_millis(800);

pub struct AerodromeScanner;

impl AerodromeScanner {
    async fn ve_locks(
        &self,
        rpc: &dyn EvmRpc,
        chain: &ChainSpec,
        escrow: Address,
        owner: Address,
    ) -> Result<f64> {
        let count_data = rpc
            .call(
                chain,
                escrow,
                encode_call("balanceOf(address)", &[Word::Addr(owner)]),
            )
            .await?;
        let count: usize = decode_u256(&count_data, 0)
            .ok_or_else(|| anyhow!("malformed balanceOf response"))?
            .try_into()
            .unwrap_or(0);

        let mut total = 0.0;
        for index in 0..count {
            let id_data = rpc
                .call(
                    chain,
                    escrow,
                    encode_call(
                        "tokenOfOwnerByIndex(address,uint256)",
                        &[Word::Addr(owner), Word::Uint(alloy_primitives::U256::from(index))],
                    ),
                )
                .await?;
            let Some(token_id) = decode_u256(&id_data, 0) else {
                continue;
            };
            let locked_data = rpc
                .call(
                    chain,
                    escrow,
                    encode_call("locked(uint256)", &[Word::Uint(token_id)]),
                )
                .await?;
            // LockedBalance is (int128 amount, uint256 end); word 0 holds
            // the amount.
            if let Some(raw) = decode_u256(&locked_data, 0) {
                total += format_units(raw, 18);
            }
        }
        Ok(total)
    }

    async fn staked_gauges(
        &self,
        rpc: &dyn EvmRpc,
        chain: &ChainSpec,
        voter: Address,
        owner: Address,
    ) -> Result<Vec<Holding>> {
        let length_data = rpc.call(chain, voter, encode_call("length()", &[])).await?;
        let pool_count: usize = decode_u256(&length_data, 0)
            .ok_or_else(|| anyhow!("malformed length response"))?
            .try_into()
            .unwrap_or(0);
        let limit = pool_count.min(MAX_POOLS);

        let mut holdings = Vec::new();
        let mut batch_start = 0;
        while batch_start < limit {
            let indices: Vec<usize> = (batch_start..(batch_start + POOL_BATCH).min(limit)).collect();

            let pool_calls = indices
                .iter()
                .map(|i| {
                    (
                        voter,
                        encode_call(
                            "pools(uint256)",
                            &[Word::Uint(alloy_primitives::U256::from(*i))],
                        ),
                    )
                })
                .collect();
            let pools: Vec<Address> = rpc
                .call_batch(chain, pool_calls)
                .await
                .into_iter()
                .filter_map(|r| crate::rpc::abi::decode_address(&r.ok()?, 0))
                .filter(|a| *a != Address::ZERO)
                .collect();

            let gauge_calls = pools
                .iter()
                .map(|pool| (voter, encode_call("gauges(address)", &[Word::Addr(*pool)])))
                .collect();
            let gauges: Vec<(Address, Address)> = pools
                .iter()
                .zip(rpc.call_batch(chain, gauge_calls).await)
                .filter_map(|(pool, r)| {
                    let gauge = crate::rpc::abi::decode_address(&r.ok()?, 0)?;
                    (gauge != Address::ZERO).then_some((*pool, gauge))
                })
                .collect();

            let balance_calls = gauges
                .iter()
                .map(|(_, gauge)| {
                    (
                        *gauge,
                        encode_call("balanceOf(address)", &[Word::Addr(owner)]),
                    )
                })
                .collect();
            for ((pool, _), result) in gauges.iter().zip(rpc.call_batch(chain, balance_calls).await)
            {
                let Some(raw) = result.ok().and_then(|d| decode_u256(&d, 0)) else {
                    continue;
                };
                let staked = format_units(raw, 18);
                if staked <= 0.0 {
                    continue;
                }
                let symbol = match rpc.call(chain, *pool, encode_call("symbol()", &[])).await {
                    Ok(data) => decode_string(&data).unwrap_or_else(|| "AERO-LP".to_string()),
                    Err(err) => {
                        debug!(pool = %pool, "pool symbol read failed: {err}");
                        "AERO-LP".to_string()
                    }
                };
                holdings.push(
                    Holding::new(
                        format!("{symbol} (Staked)"),
                        staked,
                        self.name(),
                        HoldingKind::Onchain,
                    )
                    .on_chain(chain.id, chain.slug)
                    .with_contract(pool.to_string()),
                );
            }

            batch_start += POOL_BATCH;
            if batch_start < limit {
                tokio::time::sleep(BATCH_DELAY).await;
            }
        }
        Ok(holdings)
    }
}

#[async_trait]
impl ProtocolScanner for AerodromeScanner {
    fn name(&self) -> &'static str {
        "Aerodrome"
    }

    async fn scan(
        &self,
        rpc: &dyn EvmRpc,
        chains: &[ChainSpec],
        owner: Address,
    ) -> Result<Vec<Holding>> {
        let Some(chain) = chains.iter().find(|c| c.id == 8453) else {
            return Ok(Vec::new());
        };
        let voter: Address = VOTER.parse().map_err(|_| anyhow!("bad voter address"))?;
        let escrow: Address = VOTING_ESCROW
            .parse()
            .map_err(|_| anyhow!("bad voting escrow address"))?;

        let mut holdings = Vec::new();
        match self.ve_locks(rpc, chain, escrow, owner).await {
            Ok(locked) if locked > 0.0 => {
                holdings.push(
                    Holding::new("AERO (veAERO)", locked, self.name(), HoldingKind::Onchain)
                        .on_chain(chain.id, chain.slug),
                );
            }
            Ok(_) => {}
            Err(err) => debug!("veAERO scan failed: {err}"),
        }
        match self.staked_gauges(rpc, chain, voter, owner).await {
            Ok(mut staked) => holdings.append(&mut staked),
            Err(err) => debug!("gauge scan failed: {err}"),
        }
        Ok(holdings)
    }
}
