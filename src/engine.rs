// src/engine.rs
use crate::error::TradeError;
use crate::models::{Balance, Holding, Portfolio};
use crate::store::LedgerStore;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The new ledger state produced by an executed trade. Both records are
/// persisted together or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub balance: Balance,
    pub holding: Holding,
}

/// Trims and upper-cases a raw symbol. Anything that is not purely
/// alphabetic after normalization is rejected before it reaches the engine.
pub fn normalize_symbol(raw: &str) -> Result<String, TradeError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(TradeError::InvalidSymbol);
    }
    Ok(symbol)
}

/// Order quantities must be positive whole numbers of shares.
pub fn parse_quantity(raw: &str) -> Result<u32, TradeError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(TradeError::InvalidQuantity),
    }
}

fn known_price(symbol: &str, price: f64) -> Result<(), TradeError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(TradeError::PriceUnavailable(symbol.to_string()))
    }
}

/// Settles a buy against the current ledger state. A missing holding is an
/// empty position. Returns the new state; the inputs are never mutated, so
/// a rejection leaves the ledger exactly as it was.
pub fn settle_buy(
    balance: &Balance,
    holding: Option<&Holding>,
    symbol: &str,
    quantity: u32,
    price: f64,
) -> Result<Settlement, TradeError> {
    known_price(symbol, price)?;
    let holding = holding.cloned().unwrap_or_else(|| Holding::flat(symbol));
    let total_cost = quantity as f64 * price;
    if total_cost > balance.amount {
        return Err(TradeError::InsufficientFunds);
    }
    Ok(Settlement {
        balance: Balance {
            amount: balance.amount - total_cost,
        },
        holding: Holding {
            symbol: holding.symbol,
            quantity: holding.quantity + quantity as f64,
            // Last transaction price, deliberately not a cost-basis average.
            purchase_price: price,
        },
    })
}

/// Settles a sell. The symbol must already be held and the position must
/// cover the requested quantity.
pub fn settle_sell(
    balance: &Balance,
    holding: Option<&Holding>,
    symbol: &str,
    quantity: u32,
    price: f64,
) -> Result<Settlement, TradeError> {
    known_price(symbol, price)?;
    let holding = holding.ok_or_else(|| TradeError::UnknownSymbol(symbol.to_string()))?;
    if holding.quantity < quantity as f64 {
        return Err(TradeError::InsufficientShares);
    }
    let proceeds = quantity as f64 * price;
    Ok(Settlement {
        balance: Balance {
            amount: balance.amount + proceeds,
        },
        holding: Holding {
            symbol: holding.symbol.clone(),
            quantity: holding.quantity - quantity as f64,
            purchase_price: price,
        },
    })
}

/// Handle to the persisted ledger. All mutations go through here, one at a
/// time: the mutex guards the whole load-settle-persist sequence for every
/// symbol. Prices are fetched by the caller before the lock is taken, so a
/// slow quote never blocks settlement of other requests; the fetched price
/// may be stale by the time the lock is held, which is accepted.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    settle: Mutex<()>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            settle: Mutex::new(()),
        }
    }

    pub async fn buy(
        &self,
        symbol: &str,
        quantity: u32,
        price: f64,
    ) -> Result<Settlement, TradeError> {
        let _guard = self.settle.lock().await;
        let balance = self.load_balance().await?;
        let prior = self.store.get_holding(symbol).await?;
        let settled = settle_buy(&balance, prior.as_ref(), symbol, quantity, price)?;
        let restore = prior.unwrap_or_else(|| Holding::flat(symbol));
        self.commit(&settled, &restore).await?;
        info!("Settled buy of {} x {} at {:.2}", quantity, symbol, price);
        Ok(settled)
    }

    pub async fn sell(
        &self,
        symbol: &str,
        quantity: u32,
        price: f64,
    ) -> Result<Settlement, TradeError> {
        let _guard = self.settle.lock().await;
        let balance = self.load_balance().await?;
        let prior = self.store.get_holding(symbol).await?;
        let settled = settle_sell(&balance, prior.as_ref(), symbol, quantity, price)?;
        let restore = prior.unwrap_or_else(|| Holding::flat(symbol));
        self.commit(&settled, &restore).await?;
        info!("Settled sell of {} x {} at {:.2}", quantity, symbol, price);
        Ok(settled)
    }

    /// Read-only view, taken without the settlement lock.
    pub async fn portfolio(&self) -> Result<Portfolio, TradeError> {
        let balance = self.load_balance().await?;
        let holdings = self.store.list_holdings().await?;
        Ok(Portfolio::assemble(balance, holdings))
    }

    async fn load_balance(&self) -> Result<Balance, TradeError> {
        match self.store.get_balance().await? {
            Some(balance) => Ok(balance),
            None => Err(TradeError::Store(
                crate::store::StoreError::MissingBalance,
            )),
        }
    }

    /// Persists a settlement. The holding is written first; if the balance
    /// write then fails, the prior holding is written back so the store
    /// never holds half a trade.
    async fn commit(&self, settled: &Settlement, restore: &Holding) -> Result<(), TradeError> {
        self.store.upsert_holding(&settled.holding).await?;
        if let Err(e) = self.store.set_balance(&settled.balance).await {
            if let Err(rollback) = self.store.upsert_holding(restore).await {
                error!(
                    "Rollback of holding {} failed after balance write error: {}",
                    restore.symbol, rollback
                );
            }
            return Err(e.into());
        }
        Ok(())
    }
}
