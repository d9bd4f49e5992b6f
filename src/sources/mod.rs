//! Holding sources: exchange accounts and on-chain wallets.
//!
//! Every source implements [`SourceAdapter`]. Adapters are expected to
//! swallow partial failures internally and return whatever they could
//! fetch; the only error that crosses the boundary as a distinct case is
//! an authentication failure, which the aggregator surfaces as a
//! per-source warning.

pub mod binance;
pub mod extract;
pub mod okx;
pub mod protocols;
pub mod transport;
pub mod wallet;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Holding;

pub use binance::BinanceAdapter;
pub use okx::OkxAdapter;
pub use wallet::{parse_wallet_address, WalletAdapter};

#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials were rejected. Carries an operator-facing message.
    #[error("{0}")]
    Auth(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A provider of holdings for one configured account.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Label attached to every holding this adapter emits, and used in
    /// warnings when the adapter fails.
    fn name(&self) -> String;

    /// Fetch current holdings. Implementations drop zero-amount rows and
    /// keep going past recoverable failures.
    async fn fetch(&self) -> Result<Vec<Holding>, SourceError>;
}
