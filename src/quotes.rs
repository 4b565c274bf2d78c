// src/quotes.rs
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

pub const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("quote request failed: {0}")]
    Http(String),
    #[error("quote provider returned HTTP {0}")]
    Status(u16),
    #[error("quote response was malformed: {0}")]
    Malformed(String),
    #[error("quote response carried no price")]
    MissingPrice,
}

/// Source of the current market price for a symbol. Every failure mode is an
/// error, never a zero price, so an outage can't be mistaken for a quote.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<f64, QuoteError>;
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: String,
}

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

fn parse_quote_body(body: &str) -> Result<f64, QuoteError> {
    let parsed: GlobalQuoteResponse =
        serde_json::from_str(body).map_err(|e| QuoteError::Malformed(e.to_string()))?;
    let quote = parsed.global_quote.ok_or(QuoteError::MissingPrice)?;
    let price: f64 = quote
        .price
        .trim()
        .parse()
        .map_err(|_| QuoteError::Malformed(format!("unparsable price {:?}", quote.price)))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(QuoteError::Malformed(format!(
            "non-positive price {}",
            price
        )));
    }
    Ok(price)
}

pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageClient {
    async fn get_price(&self, symbol: &str) -> Result<f64, QuoteError> {
        let url = format!(
            "{}?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            self.base_url, symbol, self.api_key
        );
        debug!("Fetching quote for {} from provider", symbol);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QuoteError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(QuoteError::Status(response.status().as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(|e| QuoteError::Http(e.to_string()))?;
        parse_quote_body(&body)
    }
}
