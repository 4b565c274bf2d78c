// src/store.rs
use crate::models::{Balance, Holding};
use async_trait::async_trait;
use chrono::Utc;
use log::{error, info};
use scylla::{query::Query, Session, SessionBuilder};
use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
pub enum StoreError {
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
    #[error("ledger store returned a malformed row")]
    MalformedRow,
    #[error("balance record has not been initialized")]
    MissingBalance,
}

fn unavailable<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Durable storage for the single balance record and the holdings keyed by
/// symbol. A write made by a completed settlement must be visible to the
/// next read.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// `None` only on a store that has never been seeded.
    async fn get_balance(&self) -> Result<Option<Balance>, StoreError>;
    async fn set_balance(&self, balance: &Balance) -> Result<(), StoreError>;
    async fn get_holding(&self, symbol: &str) -> Result<Option<Holding>, StoreError>;
    async fn upsert_holding(&self, holding: &Holding) -> Result<(), StoreError>;
    async fn list_holdings(&self) -> Result<Vec<Holding>, StoreError>;
}

pub struct ScyllaStore {
    session: Session,
}

impl ScyllaStore {
    pub async fn connect(node: &str) -> Result<Self, StoreError> {
        let session = SessionBuilder::new()
            .known_node(node)
            .build()
            .await
            .map_err(unavailable)?;

        // Create keyspace and tables if they don't exist. The balance table
        // holds its singleton row at id = 0.
        session.query("CREATE KEYSPACE IF NOT EXISTS paper_trader WITH REPLICATION = {'class': 'SimpleStrategy', 'replication_factor': 1}", &[]).await.map_err(unavailable)?;
        session
            .query(
                "CREATE TABLE IF NOT EXISTS paper_trader.balance (id INT PRIMARY KEY, amount DOUBLE)",
                &[],
            )
            .await
            .map_err(unavailable)?;
        session
            .query(
                "CREATE TABLE IF NOT EXISTS paper_trader.holdings (symbol TEXT PRIMARY KEY, quantity DOUBLE, purchase_price DOUBLE, updated_at TIMESTAMP)",
                &[],
            )
            .await
            .map_err(unavailable)?;

        info!("Successfully connected to ScyllaDB.");
        Ok(Self { session })
    }
}

#[async_trait]
impl LedgerStore for ScyllaStore {
    async fn get_balance(&self) -> Result<Option<Balance>, StoreError> {
        let query = Query::new("SELECT amount FROM paper_trader.balance WHERE id = 0");
        let result = self.session.query(query, &[]).await.map_err(unavailable)?;
        let row = match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => row,
            None => return Ok(None),
        };
        let amount = row
            .columns
            .first()
            .and_then(|c| c.as_ref())
            .and_then(|v| v.as_double())
            .ok_or(StoreError::MalformedRow)?;
        Ok(Some(Balance { amount }))
    }

    async fn set_balance(&self, balance: &Balance) -> Result<(), StoreError> {
        let query = Query::new("INSERT INTO paper_trader.balance (id, amount) VALUES (0, ?)");
        self.session
            .query(query, (balance.amount,))
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn get_holding(&self, symbol: &str) -> Result<Option<Holding>, StoreError> {
        let query = Query::new(
            "SELECT quantity, purchase_price FROM paper_trader.holdings WHERE symbol = ?",
        );
        let result = self
            .session
            .query(query, (symbol,))
            .await
            .map_err(unavailable)?;
        let row = match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => row,
            None => return Ok(None),
        };
        let quantity = row
            .columns
            .first()
            .and_then(|c| c.as_ref())
            .and_then(|v| v.as_double())
            .ok_or(StoreError::MalformedRow)?;
        let purchase_price = row
            .columns
            .get(1)
            .and_then(|c| c.as_ref())
            .and_then(|v| v.as_double())
            .ok_or(StoreError::MalformedRow)?;
        Ok(Some(Holding {
            symbol: symbol.to_string(),
            quantity,
            purchase_price,
        }))
    }

    async fn upsert_holding(&self, holding: &Holding) -> Result<(), StoreError> {
        let query = Query::new("INSERT INTO paper_trader.holdings (symbol, quantity, purchase_price, updated_at) VALUES (?, ?, ?, ?)");
        let updated_at = Utc::now().timestamp_millis();
        self.session
            .query(
                query,
                (
                    holding.symbol.as_str(),
                    holding.quantity,
                    holding.purchase_price,
                    updated_at,
                ),
            )
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn list_holdings(&self) -> Result<Vec<Holding>, StoreError> {
        let query = Query::new("SELECT symbol, quantity, purchase_price FROM paper_trader.holdings");
        let result = self.session.query(query, &[]).await.map_err(unavailable)?;
        let rows = result.rows.unwrap_or_default();
        let holdings = rows
            .into_iter()
            .filter_map(|row| {
                let symbol = row
                    .columns
                    .first()
                    .and_then(|c| c.as_ref())
                    .and_then(|v| v.as_text())
                    .map(|s| s.to_string());
                let quantity = row
                    .columns
                    .get(1)
                    .and_then(|c| c.as_ref())
                    .and_then(|v| v.as_double());
                let purchase_price = row
                    .columns
                    .get(2)
                    .and_then(|c| c.as_ref())
                    .and_then(|v| v.as_double());
                match (symbol, quantity, purchase_price) {
                    (Some(symbol), Some(quantity), Some(purchase_price)) => Some(Holding {
                        symbol,
                        quantity,
                        purchase_price,
                    }),
                    _ => {
                        error!("Skipping malformed holding row");
                        None
                    }
                }
            })
            .collect();
        Ok(holdings)
    }
}
