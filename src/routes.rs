// src/routes.rs
use crate::engine::{normalize_symbol, parse_quantity, Ledger};
use crate::error::TradeError;
use crate::models::{TradeForm, TradeReply};
use crate::quotes::QuoteProvider;
use log::{error, info};
use serde_json::json;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

pub fn routes(
    ledger: Arc<Ledger>,
    quotes: Arc<dyn QuoteProvider>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let portfolio = warp::path("portfolio")
        .and(warp::get())
        .and(with_ledger(ledger.clone()))
        .and_then(portfolio_handler);

    let stock = warp::path!("stock" / String)
        .and(warp::get())
        .and(with_quotes(quotes.clone()))
        .and_then(stock_handler);

    let buy = warp::path("buy")
        .and(warp::post())
        .and(with_quotes(quotes.clone()))
        .and(with_ledger(ledger.clone()))
        .and(warp::body::form())
        .and_then(buy_handler);

    let sell = warp::path("sell")
        .and(warp::post())
        .and(with_quotes(quotes))
        .and(with_ledger(ledger))
        .and(warp::body::form())
        .and_then(sell_handler);

    portfolio.or(stock).or(buy).or(sell)
}

fn with_ledger(
    ledger: Arc<Ledger>,
) -> impl Filter<Extract = (Arc<Ledger>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || ledger.clone())
}

fn with_quotes(
    quotes: Arc<dyn QuoteProvider>,
) -> impl Filter<Extract = (Arc<dyn QuoteProvider>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || quotes.clone())
}

async fn portfolio_handler(ledger: Arc<Ledger>) -> Result<impl Reply, Rejection> {
    match ledger.portfolio().await {
        Ok(portfolio) => {
            info!("Portfolio retrieved successfully.");
            Ok(warp::reply::json(&portfolio))
        }
        Err(e) => {
            error!("Failed to retrieve portfolio: {}", e);
            Err(warp::reject::custom(e))
        }
    }
}

async fn stock_handler(
    symbol: String,
    quotes: Arc<dyn QuoteProvider>,
) -> Result<impl Reply, Rejection> {
    let symbol = normalize_symbol(&symbol).map_err(warp::reject::custom)?;
    match quotes.get_price(&symbol).await {
        Ok(price) => {
            info!("Quoted {} at {:.2}", symbol, price);
            Ok(warp::reply::json(&json!({
                "symbol": symbol,
                "price": price,
            })))
        }
        Err(e) => {
            error!("Failed to fetch price for {}: {}", symbol, e);
            Err(warp::reject::custom(TradeError::PriceUnavailable(symbol)))
        }
    }
}

async fn buy_handler(
    quotes: Arc<dyn QuoteProvider>,
    ledger: Arc<Ledger>,
    form: TradeForm,
) -> Result<impl Reply, Rejection> {
    // Validation comes first so a bad order never costs a quote request.
    let symbol = normalize_symbol(&form.symbol).map_err(warp::reject::custom)?;
    let quantity = parse_quantity(&form.quantity).map_err(warp::reject::custom)?;
    let price = match quotes.get_price(&symbol).await {
        Ok(price) => price,
        Err(e) => {
            error!("Failed to fetch price for {}: {}", symbol, e);
            return Err(warp::reject::custom(TradeError::PriceUnavailable(symbol)));
        }
    };

    match ledger.buy(&symbol, quantity, price).await {
        Ok(_) => {
            info!("Bought {} shares of {} at {:.2}", quantity, symbol, price);
            Ok(warp::reply::json(&TradeReply::success(format!(
                "Bought {} shares of {}!",
                quantity, symbol
            ))))
        }
        Err(e) => {
            error!("Buy of {} x {} rejected: {}", quantity, symbol, e);
            Err(warp::reject::custom(e))
        }
    }
}

async fn sell_handler(
    quotes: Arc<dyn QuoteProvider>,
    ledger: Arc<Ledger>,
    form: TradeForm,
) -> Result<impl Reply, Rejection> {
    let symbol = normalize_symbol(&form.symbol).map_err(warp::reject::custom)?;
    let quantity = parse_quantity(&form.quantity).map_err(warp::reject::custom)?;
    let price = match quotes.get_price(&symbol).await {
        Ok(price) => price,
        Err(e) => {
            error!("Failed to fetch price for {}: {}", symbol, e);
            return Err(warp::reject::custom(TradeError::PriceUnavailable(symbol)));
        }
    };

    match ledger.sell(&symbol, quantity, price).await {
        Ok(_) => {
            info!("Sold {} shares of {} at {:.2}", quantity, symbol, price);
            Ok(warp::reply::json(&TradeReply::success(format!(
                "Sold {} shares of {}!",
                quantity, symbol
            ))))
        }
        Err(e) => {
            error!("Sell of {} x {} rejected: {}", quantity, symbol, e);
            Err(warp::reject::custom(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::handle_rejection;
    use crate::models::Holding;
    use crate::quotes::QuoteError;
    use crate::store::mem::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedQuotes {
        price: Option<f64>,
        calls: AtomicUsize,
    }

    impl ScriptedQuotes {
        fn priced(price: f64) -> Arc<Self> {
            Arc::new(Self {
                price: Some(price),
                calls: AtomicUsize::new(0),
            })
        }

        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                price: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteProvider for ScriptedQuotes {
        async fn get_price(&self, _symbol: &str) -> Result<f64, QuoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.price
                .ok_or_else(|| QuoteError::Http("connection refused".to_string()))
        }
    }

    fn holding(symbol: &str, quantity: f64, purchase_price: f64) -> Holding {
        Holding {
            symbol: symbol.to_string(),
            quantity,
            purchase_price,
        }
    }

    // Applies the rejection recovery the server installs at serve time. The
    // filter type is left to inference so tests see the full reply pipeline.
    macro_rules! api {
        ($store:expr, $quotes:expr) => {
            routes(Arc::new(Ledger::new($store)), $quotes).recover(handle_rejection)
        };
    }

    fn form(body: &'static str) -> warp::test::RequestBuilder {
        warp::test::request()
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)
    }

    #[tokio::test]
    async fn buy_executes_and_persists() {
        let store = Arc::new(MemoryStore::seeded(10000.0, vec![]));
        let quotes = ScriptedQuotes::priced(150.0);
        let filter = api!(store.clone(), quotes);

        let resp = form("symbol=aapl+&quantity=10").path("/buy").reply(&filter).await;

        assert_eq!(resp.status(), 200);
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert!(body.contains("Bought 10 shares of AAPL!"));
        assert!(body.contains("success"));
        assert_eq!(store.balance_amount().await, 8500.0);
        assert_eq!(
            store.holding("AAPL").await.unwrap(),
            holding("AAPL", 10.0, 150.0)
        );
    }

    #[tokio::test]
    async fn buy_with_insufficient_funds_is_a_danger_reply() {
        let store = Arc::new(MemoryStore::seeded(100.0, vec![]));
        let quotes = ScriptedQuotes::priced(150.0);
        let filter = api!(store.clone(), quotes);

        let resp = form("symbol=AAPL&quantity=10").path("/buy").reply(&filter).await;

        assert_eq!(resp.status(), 422);
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert!(body.contains("Not enough money to buy!"));
        assert!(body.contains("danger"));
        assert_eq!(store.balance_amount().await, 100.0);
        assert!(store.holding("AAPL").await.is_none());
    }

    #[tokio::test]
    async fn invalid_quantity_is_rejected_before_any_quote_fetch() {
        let store = Arc::new(MemoryStore::seeded(10000.0, vec![]));
        let quotes = ScriptedQuotes::priced(150.0);
        let filter = api!(store.clone(), quotes.clone());

        let resp = form("symbol=aapl+&quantity=-3").path("/buy").reply(&filter).await;

        assert_eq!(resp.status(), 400);
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert!(body.contains("Invalid quantity"));
        assert_eq!(quotes.call_count(), 0);
        assert_eq!(store.balance_amount().await, 10000.0);
    }

    #[tokio::test]
    async fn invalid_symbol_is_rejected_at_the_boundary() {
        let store = Arc::new(MemoryStore::seeded(10000.0, vec![]));
        let quotes = ScriptedQuotes::priced(150.0);
        let filter = api!(store, quotes.clone());

        let resp = form("symbol=12AAPL&quantity=5").path("/buy").reply(&filter).await;

        assert_eq!(resp.status(), 400);
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert!(body.contains("Invalid symbol"));
        assert_eq!(quotes.call_count(), 0);
    }

    #[tokio::test]
    async fn sell_executes_and_persists() {
        let store = Arc::new(MemoryStore::seeded(
            8500.0,
            vec![holding("AAPL", 10.0, 150.0)],
        ));
        let quotes = ScriptedQuotes::priced(200.0);
        let filter = api!(store.clone(), quotes);

        let resp = form("symbol=AAPL&quantity=4").path("/sell").reply(&filter).await;

        assert_eq!(resp.status(), 200);
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert!(body.contains("Sold 4 shares of AAPL!"));
        assert_eq!(store.balance_amount().await, 9300.0);
        assert_eq!(
            store.holding("AAPL").await.unwrap(),
            holding("AAPL", 6.0, 200.0)
        );
    }

    #[tokio::test]
    async fn selling_a_symbol_never_held_is_not_found() {
        let store = Arc::new(MemoryStore::seeded(1000.0, vec![]));
        let quotes = ScriptedQuotes::priced(150.0);
        let filter = api!(store, quotes);

        let resp = form("symbol=AAPL&quantity=1").path("/sell").reply(&filter).await;

        assert_eq!(resp.status(), 404);
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert!(body.contains("Stock AAPL not found in portfolio!"));
    }

    #[tokio::test]
    async fn overselling_leaves_the_position_alone() {
        let store = Arc::new(MemoryStore::seeded(100.0, vec![holding("AAPL", 5.0, 150.0)]));
        let quotes = ScriptedQuotes::priced(150.0);
        let filter = api!(store.clone(), quotes);

        let resp = form("symbol=AAPL&quantity=10").path("/sell").reply(&filter).await;

        assert_eq!(resp.status(), 422);
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert!(body.contains("Not enough shares to sell!"));
        assert_eq!(
            store.holding("AAPL").await.unwrap(),
            holding("AAPL", 5.0, 150.0)
        );
        assert_eq!(store.balance_amount().await, 100.0);
    }

    #[tokio::test]
    async fn a_quote_outage_rejects_both_buy_and_sell_without_mutation() {
        let store = Arc::new(MemoryStore::seeded(10000.0, vec![holding("AAPL", 5.0, 150.0)]));
        let quotes = ScriptedQuotes::unavailable();
        let filter = api!(store.clone(), quotes);

        for path in ["/buy", "/sell"] {
            let resp = form("symbol=AAPL&quantity=1").path(path).reply(&filter).await;
            assert_eq!(resp.status(), 502);
            let body = String::from_utf8_lossy(resp.body()).to_string();
            assert!(body.contains("Failed to fetch price for stock AAPL"));
        }
        assert_eq!(store.balance_amount().await, 10000.0);
        assert_eq!(
            store.holding("AAPL").await.unwrap(),
            holding("AAPL", 5.0, 150.0)
        );
    }

    #[tokio::test]
    async fn portfolio_lists_only_open_positions() {
        let store = Arc::new(MemoryStore::seeded(
            500.0,
            vec![holding("AAPL", 10.0, 150.0), holding("MSFT", 0.0, 90.0)],
        ));
        let quotes = ScriptedQuotes::priced(150.0);
        let filter = api!(store, quotes);

        let resp = warp::test::request().path("/portfolio").reply(&filter).await;

        assert_eq!(resp.status(), 200);
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert!(body.contains("AAPL"));
        assert!(!body.contains("MSFT"));
        assert!(body.contains("500"));
    }

    #[tokio::test]
    async fn stock_details_return_the_quoted_price() {
        let store = Arc::new(MemoryStore::seeded(500.0, vec![]));
        let quotes = ScriptedQuotes::priced(150.25);
        let filter = api!(store, quotes);

        let resp = warp::test::request().path("/stock/aapl").reply(&filter).await;

        assert_eq!(resp.status(), 200);
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert!(body.contains("\"symbol\":\"AAPL\""));
        assert!(body.contains("150.25"));
    }

    #[tokio::test]
    async fn stock_details_surface_a_quote_outage() {
        let store = Arc::new(MemoryStore::seeded(500.0, vec![]));
        let quotes = ScriptedQuotes::unavailable();
        let filter = api!(store, quotes);

        let resp = warp::test::request().path("/stock/AAPL").reply(&filter).await;

        assert_eq!(resp.status(), 502);
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert!(body.contains("danger"));
    }
}
