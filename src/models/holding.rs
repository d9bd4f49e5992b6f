use serde::{Deserialize, Serialize};

/// Where a holding was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingKind {
    Exchange,
    Onchain,
}

/// One row of asset amount + valuation from one source.
///
/// `value_usd` is always `amount * price`; a price of zero means the asset
/// has not been priced (or could not be), not that it is worthless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub amount: f64,
    pub price: f64,
    pub value_usd: f64,
    /// Human-readable origin label, e.g. "Binance - spot" or "main (Base)".
    pub source: String,
    pub kind: HoldingKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    /// Chain slug used by address-keyed price oracles, e.g. "base".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
}

impl Holding {
    pub fn new(
        symbol: impl Into<String>,
        amount: f64,
        source: impl Into<String>,
        kind: HoldingKind,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            amount,
            price: 0.0,
            value_usd: 0.0,
            source: source.into(),
            kind,
            chain_id: None,
            contract_address: None,
            chain_name: None,
        }
    }

    pub fn on_chain(mut self, chain_id: u64, chain_name: impl Into<String>) -> Self {
        self.chain_id = Some(chain_id);
        self.chain_name = Some(chain_name.into());
        self
    }

    pub fn with_contract(mut self, address: impl Into<String>) -> Self {
        self.contract_address = Some(address.into());
        self
    }

    /// Set the unit price and recompute `value_usd`.
    pub fn set_price(&mut self, price: f64) {
        self.price = price;
        self.value_usd = self.amount * price;
    }

    /// Symbol with any parenthetical qualifier stripped, upper-cased.
    pub fn base_symbol(&self) -> String {
        base_symbol(&self.symbol)
    }
}

/// Extract the bare token ticker from a possibly qualified symbol.
///
/// `"ETH (locked-staking)"` becomes `"ETH"`; an unqualified symbol is
/// returned upper-cased as-is.
pub fn base_symbol(symbol: &str) -> String {
    let base = match symbol.split_once(" (") {
        Some((head, _)) => head,
        None => symbol,
    };
    base.trim().to_uppercase()
}
