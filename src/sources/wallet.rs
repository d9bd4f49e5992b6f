//! On-chain wallet adapter.
//!
//! Walks every configured chain for native and common-token balances,
//! then runs the protocol scanners. Chains are scanned concurrently and
//! a dead chain only costs its own balances.

use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{bail, Result};
use futures::future::join_all;
use tracing::warn;

use crate::models::{Holding, HoldingKind, WalletAccount};
use crate::rpc::abi::{decode_u256, encode_call, format_units, Word};
use crate::rpc::{ChainSpec, EvmRpc};

use super::protocols::ProtocolScanner;
use super::{SourceAdapter, SourceError};

/// Validate and parse a wallet address before any network traffic.
pub fn parse_wallet_address(raw: &str) -> Result<Address> {
    let trimmed = raw.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        bail!("invalid wallet address {raw:?}: expected 0x followed by 40 hex characters");
    }
    trimmed
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid wallet address {raw:?}: not valid hex"))
}

pub struct WalletAdapter {
    wallet: WalletAccount,
    rpc: Arc<dyn EvmRpc>,
    chains: Vec<ChainSpec>,
    protocols: Vec<Box<dyn ProtocolScanner>>,
}

impl WalletAdapter {
    pub fn new(
        wallet: WalletAccount,
        rpc: Arc<dyn EvmRpc>,
        chains: Vec<ChainSpec>,
        protocols: Vec<Box<dyn ProtocolScanner>>,
    ) -> Self {
        Self {
            wallet,
            rpc,
            chains,
            protocols,
        }
    }

    async fn scan_chain(&self, chain: &ChainSpec, owner: Address) -> Result<Vec<Holding>> {
        let mut holdings = Vec::new();
        // Balance rows name their chain, e.g. "vault (Base)", so the
        // same token across chains stays distinguishable.
        let source = format!("{} ({})", self.wallet.name, chain.name);

        let native = self.rpc.native_balance(chain, owner).await?;
        let amount = format_units(native, chain.native_decimals);
        if amount > 0.0 {
            holdings.push(
                Holding::new(
                    chain.native_symbol,
                    amount,
                    source.clone(),
                    HoldingKind::Onchain,
                )
                .on_chain(chain.id, chain.slug),
            );
        }

        let calls: Vec<(Address, Vec<u8>)> = chain
            .tokens
            .iter()
            .filter_map(|t| t.address.parse().ok())
            .map(|token: Address| (token, encode_call("balanceOf(address)", &[Word::Addr(owner)])))
            .collect();
        for (token, result) in chain.tokens.iter().zip(self.rpc.call_batch(chain, calls).await) {
            let data = match result {
                Ok(data) => data,
                Err(err) => {
                    warn!(chain = chain.name, token = token.symbol, "balance call failed: {err}");
                    continue;
                }
            };
            let Some(raw) = decode_u256(&data, 0) else {
                continue;
            };
            let amount = format_units(raw, token.decimals);
            if amount > 0.0 {
                holdings.push(
                    Holding::new(
                        token.symbol,
                        amount,
                        source.clone(),
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

#[async_trait::async_trait]
impl SourceAdapter for WalletAdapter {
    fn name(&self) -> String {
        self.wallet.name.clone()
    }

    async fn fetch(&self) -> Result<Vec<Holding>, SourceError> {
        // Malformed addresses produce an empty result without any network
        // traffic; the config was simply never valid for this wallet.
        let owner = match parse_wallet_address(&self.wallet.address) {
            Ok(owner) => owner,
            Err(err) => {
                warn!(wallet = %self.wallet.name, "{err}");
                return Ok(Vec::new());
            }
        };

        let chain_scans = join_all(
            self.chains
                .iter()
                .map(|chain| async move { (chain, self.scan_chain(chain, owner).await) }),
        );
        let protocol_scans = join_all(self.protocols.iter().map(|scanner| async move {
            (
                scanner.name(),
                scanner.scan(self.rpc.as_ref(), &self.chains, owner).await,
            )
        }));
        let (chain_results, protocol_results) = tokio::join!(chain_scans, protocol_scans);

        let mut holdings = Vec::new();
        for (chain, result) in chain_results {
            match result {
                Ok(mut rows) => holdings.append(&mut rows),
                Err(err) => {
                    warn!(wallet = %self.wallet.name, chain = chain.name, "chain scan failed: {err}");
                }
            }
        }
        for (protocol, result) in protocol_results {
            match result {
                Ok(rows) => {
                    // Protocol holdings keep the wallet label but note the
                    // protocol so the row reads "wallet (EigenLayer)".
                    for mut holding in rows {
                        holding.source = format!("{} ({})", self.wallet.name, holding.source);
                        holdings.push(holding);
                    }
                }
                Err(err) => {
                    warn!(wallet = %self.wallet.name, protocol, "protocol scan failed: {err}");
                }
            }
        }

        Ok(holdings)
    }
}
