// src/main.rs
mod config;
mod engine;
mod error;
mod models;
mod quotes;
mod routes;
mod store;

use crate::config::Config;
use crate::engine::Ledger;
use crate::models::{Balance, Holding};
use crate::quotes::{AlphaVantageClient, QuoteProvider};
use crate::store::{LedgerStore, ScyllaStore, StoreError};
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use std::sync::Arc;
use warp::Filter;

/// First-boot initialization: one balance record at the configured starting
/// amount, plus one share of the seed symbol if its quote resolves. A quote
/// outage during seeding is logged and skipped, never fatal.
async fn seed_ledger(
    store: &dyn LedgerStore,
    quotes: &dyn QuoteProvider,
    config: &Config,
) -> Result<(), StoreError> {
    if store.get_balance().await?.is_some() {
        return Ok(());
    }

    store
        .set_balance(&Balance {
            amount: config.starting_balance,
        })
        .await?;
    info!("Seeded balance with {:.2}", config.starting_balance);

    match quotes.get_price(&config.seed_symbol).await {
        Ok(price) => {
            store
                .upsert_holding(&Holding {
                    symbol: config.seed_symbol.clone(),
                    quantity: 1.0,
                    purchase_price: price,
                })
                .await?;
            info!("Seeded 1 share of {} at {:.2}", config.seed_symbol, price);
        }
        Err(e) => {
            warn!(
                "Could not fetch a seed price for {}: {}. Starting without a seeded holding.",
                config.seed_symbol, e
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    Builder::new()
        .filter_level(LevelFilter::Debug)
        .format_timestamp_secs()
        .init();

    let config = Config::from_env();

    let store: Arc<dyn LedgerStore> = match ScyllaStore::connect(&config.db_node).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to initialize ledger store: {}", e);
            return;
        }
    };
    info!("Connected to database...");

    let quotes: Arc<dyn QuoteProvider> = Arc::new(AlphaVantageClient::new(
        &config.quote_base_url,
        &config.api_key,
    ));

    if let Err(e) = seed_ledger(store.as_ref(), quotes.as_ref(), &config).await {
        error!("Failed to seed the ledger: {}", e);
        return;
    }

    let ledger = Arc::new(Ledger::new(store));

    info!("Starting the paper trader application...");
    let api = routes::routes(ledger, quotes).recover(error::handle_rejection);

    info!("Server running on http://127.0.0.1:{}", config.port);
    warp::serve(api).run(([127, 0, 0, 1], config.port)).await;
}
