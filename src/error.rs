// src/error.rs
use crate::models::TradeReply;
use crate::store::StoreError;
use log::error;
use std::convert::Infallible;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Rejection, Reply};

/// Every way a buy or sell request can be turned down. Business rejections
/// carry their user-facing message in the `Display` impl; `Store` hides the
/// underlying fault behind a generic message and keeps the detail as the
/// error source for logging.
#[derive(Debug, PartialEq, Error)]
pub enum TradeError {
    #[error("Invalid symbol. Ticker symbols are letters only.")]
    InvalidSymbol,
    #[error("Invalid quantity. Enter a positive whole number of shares.")]
    InvalidQuantity,
    #[error("Failed to fetch price for stock {0}. Please try again.")]
    PriceUnavailable(String),
    #[error("Not enough money to buy!")]
    InsufficientFunds,
    #[error("Not enough shares to sell!")]
    InsufficientShares,
    #[error("Stock {0} not found in portfolio!")]
    UnknownSymbol(String),
    #[error("Something went wrong on our side. Please try again.")]
    Store(#[from] StoreError),
}

impl TradeError {
    pub fn status(&self) -> StatusCode {
        match self {
            TradeError::InvalidSymbol | TradeError::InvalidQuantity => StatusCode::BAD_REQUEST,
            TradeError::UnknownSymbol(_) => StatusCode::NOT_FOUND,
            TradeError::InsufficientFunds | TradeError::InsufficientShares => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            TradeError::PriceUnavailable(_) => StatusCode::BAD_GATEWAY,
            TradeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Reject for TradeError {}

/// Turns every rejection into exactly one human-readable danger message.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(trade) = err.find::<TradeError>() {
        (trade.status(), trade.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found.".to_string())
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (
            StatusCode::BAD_REQUEST,
            "Invalid request body.".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed.".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong on our side. Please try again.".to_string(),
        )
    };

    let reply = warp::reply::json(&TradeReply::danger(message));
    Ok(warp::reply::with_status(reply, status))
}
