// src/models.rs
use serde::{Deserialize, Serialize};

/// Position in one ticker symbol. `purchase_price` is the price of the most
/// recent executed trade for the symbol, not an averaged cost basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub purchase_price: f64,
}

impl Holding {
    /// Implicit empty position for a symbol that has never been traded.
    pub fn flat(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity: 0.0,
            purchase_price: 0.0,
        }
    }
}

/// The single pool of free cash. Exactly one record exists once seeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub amount: f64,
}

/// Display view over the ledger: open positions plus free cash.
/// Assembled on demand, never persisted.
#[derive(Debug, Serialize)]
pub struct Portfolio {
    pub balance: Balance,
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn assemble(balance: Balance, mut holdings: Vec<Holding>) -> Self {
        holdings.retain(|h| h.quantity > 0.0);
        holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Self { balance, holdings }
    }
}

/// Raw buy/sell order form. Quantity stays a string here so a bad value
/// surfaces as a trade rejection instead of a body error.
#[derive(Debug, Deserialize)]
pub struct TradeForm {
    pub symbol: String,
    pub quantity: String,
}

#[derive(Debug, Serialize)]
pub struct TradeReply {
    pub message: String,
    pub category: String,
}

impl TradeReply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: "success".to_string(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: "danger".to_string(),
        }
    }
}
