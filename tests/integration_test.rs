//! Live exchange integration tests.
//!
//! These hit the real public REST endpoints and require network access.
//! Run with: `cargo test --features integration-tests`

#![cfg(feature = "integration-tests")]

use vantage::config::ExchangeConfig;
use vantage::credentials::ExchangeCredentials;
use vantage::exchange::{ExchangeClient, MarketSource};

fn public_client() -> ExchangeClient {
    // Unsigned endpoints ignore the key material entirely.
    let config = ExchangeConfig {
        rest_url: "https://api.binance.com".to_string(),
        testnet_rest_url: "https://testnet.binance.vision".to_string(),
        recv_window_ms: 5_000,
    };
    let credentials = ExchangeCredentials::new("unused", "unused", false, None);
    ExchangeClient::new(&config, &credentials).expect("failed to build client")
}

#[tokio::test]
async fn fetches_a_live_ticker_price() {
    let client = public_client();
    let quote = client
        .get_ticker_price("BTCUSDT")
        .await
        .expect("failed to fetch BTCUSDT price");

    assert_eq!(quote.symbol, "BTCUSDT");
    assert!(quote.price > 0.0);
}

#[tokio::test]
async fn fetches_a_live_price_batch() {
    let client = public_client();
    let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
    let quotes = client
        .get_ticker_prices(Some(&symbols))
        .await
        .expect("failed to fetch price batch");

    assert_eq!(quotes.len(), 2);
    assert!(quotes.iter().all(|q| q.price > 0.0));
}

#[tokio::test]
async fn fetches_live_klines_in_time_order() {
    let client = public_client();
    let klines = client
        .get_klines("BTCUSDT", "1h", 24)
        .await
        .expect("failed to fetch klines");

    assert_eq!(klines.len(), 24);
    assert!(klines.windows(2).all(|w| w[0].close_time < w[1].close_time));
    assert!(klines.iter().all(|k| k.close_price > 0.0));
}

#[tokio::test]
async fn unknown_symbols_classify_as_such() {
    let client = public_client();
    let err = client
        .get_ticker_price("DEFINITELYNOTASYMBOL")
        .await
        .expect_err("bogus symbol should not price");

    assert_eq!(err.kind, vantage::exchange::ApiErrorKind::UnknownSymbol);
}
