mod account;
mod holding;

pub use account::{ExchangeAccount, ExchangeKind, WalletAccount};
pub use holding::{base_symbol, Holding, HoldingKind};
