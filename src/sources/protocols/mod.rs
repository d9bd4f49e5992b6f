//! DeFi protocol position scanners.
//!
//! Each scanner knows one protocol's contracts and reads a wallet's
//! positions out of them. Scanners pick the chains they cover from the
//! chain list they are handed and label holdings with a qualifier so a
//! staked or supplied balance never collides with the wallet balance of
//! the same coin.

pub mod aave;
pub mod aerodrome;
pub mod eigenlayer;
pub mod stargate;

use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;

use crate::models::Holding;
use crate::rpc::{ChainSpec, EvmRpc};

pub use aave::AaveScanner;
pub use aerodrome::AerodromeScanner;
pub use eigenlayer::EigenLayerScanner;
pub use stargate::StargateScanner;

#[async_trait]
pub trait ProtocolScanner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Scan `owner`'s positions. Scanners return only non-zero holdings
    /// and skip chains where their contracts are absent.
    async fn scan(
        &self,
        rpc: &dyn EvmRpc,
        chains: &[ChainSpec],
        owner: Address,
    ) -> Result<Vec<Holding>>;
}

/// The scanners enabled by default for every wallet.
pub fn default_scanners() -> Vec<Box<dyn ProtocolScanner>> {
    vec![
        Box::new(EigenLayerScanner),
        Box::new(AaveScanner),
        Box::new(AerodromeScanner),
        Box::new(StargateScanner),
    ]
}
