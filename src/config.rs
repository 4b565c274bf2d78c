// src/config.rs
use crate::quotes::ALPHA_VANTAGE_URL;
use log::warn;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Runtime settings, read once from the environment at startup. Every value
/// has a development default so a bare `cargo run` comes up against a local
/// ScyllaDB and the provider's demo key.
pub struct Config {
    pub port: u16,
    pub db_node: String,
    pub api_key: String,
    pub quote_base_url: String,
    pub starting_balance: f64,
    pub seed_symbol: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: parse_or("PORT", 3030),
            db_node: env::var("SCYLLA_NODE").unwrap_or_else(|_| "127.0.0.1:9042".to_string()),
            api_key: env::var("STOCK_API_KEY").unwrap_or_else(|_| "demo".to_string()),
            quote_base_url: env::var("QUOTE_BASE_URL")
                .unwrap_or_else(|_| ALPHA_VANTAGE_URL.to_string()),
            starting_balance: parse_or("STARTING_BALANCE", 10000.00),
            seed_symbol: env::var("SEED_SYMBOL").unwrap_or_else(|_| "AAPL".to_string()),
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring malformed {}={:?}, using {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
