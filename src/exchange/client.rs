//! Signed REST client for the exchange.
//!
//! Signed requests append a millisecond timestamp and a receive window to
//! the query, HMAC-SHA256 the exact query string with the API secret, and
//! append the hex signature as the final parameter. A client-side deadline
//! is enforced around every call, independent of the transport's own
//! timeouts, so that deadline expiry is observable as a distinct error
//! kind rather than a generic network failure.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use super::error::ApiError;
use crate::config::ExchangeConfig;
use crate::credentials::ExchangeCredentials;
use crate::models::{AccountSnapshot, Kline, PriceQuote};

/// Client-side deadline applied to every exchange call.
pub const REQUEST_DEADLINE: Duration = Duration::from_secs(15);

/// Transport-level connect timeout; kept below [`REQUEST_DEADLINE`] so a
/// dead host surfaces as a connect failure, not a deadline expiry.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Rate-limit usage parsed from exchange response headers.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    /// Request weight consumed in the current one-minute window.
    pub used_weight_1m: Option<u32>,
    /// Delay requested by the exchange, in milliseconds.
    pub retry_after_ms: Option<u64>,
}

/// Account snapshot together with the rate-limit usage reported with it.
#[derive(Debug, Clone)]
pub struct AccountInformation {
    pub snapshot: AccountSnapshot,
    pub rate_limit: RateLimitInfo,
}

/// Market data operations the aggregators depend on.
///
/// Implemented by [`ExchangeClient`] for production and by scripted
/// sources in tests.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Signed account snapshot fetch.
    async fn get_account_information(&self) -> Result<AccountInformation, ApiError>;

    /// Batch ticker price fetch. `None` returns every traded symbol;
    /// callers must keep explicit batches within the exchange's per-call
    /// symbol ceiling.
    async fn get_ticker_prices(
        &self,
        symbols: Option<&[String]>,
    ) -> Result<Vec<PriceQuote>, ApiError>;

    /// Single-symbol ticker price fetch, used by the per-symbol fallback
    /// tier when a batch contains an untraded symbol.
    async fn get_ticker_price(&self, symbol: &str) -> Result<PriceQuote, ApiError>;

    /// Time-ordered candlestick fetch.
    async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, ApiError>;
}

/// Error body shape the exchange uses for non-2xx responses.
#[derive(serde::Deserialize)]
struct ErrorBody {
    code: Option<i64>,
    msg: Option<String>,
}

/// REST client bound to one user's credentials for one request.
pub struct ExchangeClient {
    http: reqwest::Client,
    base_url: String,
    recv_window_ms: u64,
    api_key: Zeroizing<String>,
    api_secret: Zeroizing<String>,
}

impl ExchangeClient {
    /// Builds a client for `credentials`, selecting the testnet endpoint
    /// when the credentials ask for it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the underlying HTTP client cannot be built.
    pub fn new(
        config: &ExchangeConfig,
        credentials: &ExchangeCredentials,
    ) -> Result<Self, ApiError> {
        let base_url = if credentials.use_testnet {
            config.testnet_rest_url.clone()
        } else {
            config.rest_url.clone()
        };

        let http = reqwest::Client::builder()
            .use_preconfigured_tls(crate::tls::build_tls_config())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            recv_window_ms: config.recv_window_ms,
            api_key: Zeroizing::new(credentials.api_key.to_string()),
            api_secret: Zeroizing::new(credentials.api_secret.to_string()),
        })
    }

    /// Appends `timestamp` and `recvWindow`, signs the exact query string,
    /// and appends the signature as the final parameter.
    fn signed_query(&self, mut query: String) -> Result<String, ApiError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_millis();

        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "timestamp={timestamp}&recvWindow={}",
            self.recv_window_ms
        ));

        let signature = sign(&self.api_secret, &query)?;
        query.push_str("&signature=");
        query.push_str(&signature);
        Ok(query)
    }

    /// Issues one GET and decodes the response, enforcing the client-side
    /// deadline around the whole exchange round-trip.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
        signed: bool,
    ) -> Result<(T, RateLimitInfo), ApiError> {
        let url = if query.is_empty() {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}{path}?{query}", self.base_url)
        };

        let mut request = self.http.get(&url);
        if signed {
            request = request.header("X-MBX-APIKEY", self.api_key.as_str());
        }

        debug!(%path, signed, "exchange request");
        let round_trip = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, body))
        };

        let (status, headers, body) = tokio::time::timeout(REQUEST_DEADLINE, round_trip)
            .await
            .map_err(|_| ApiError::timeout())?
            .map_err(map_transport_error)?;

        let rate_limit = parse_rate_limit(&headers);

        if !status.is_success() {
            let parsed: Option<ErrorBody> = serde_json::from_slice(&body).ok();
            let (code, msg) = match parsed {
                Some(e) => (e.code, e.msg),
                None => (None, None),
            };
            let message =
                msg.unwrap_or_else(|| String::from_utf8_lossy(&body).trim().to_string());
            return Err(ApiError::from_response(
                status.as_u16(),
                code,
                message,
                rate_limit.retry_after_ms,
            ));
        }

        let decoded = serde_json::from_slice(&body)
            .map_err(|e| ApiError::malformed(format!("unexpected {path} response: {e}")))?;
        Ok((decoded, rate_limit))
    }
}

#[async_trait]
impl MarketSource for ExchangeClient {
    async fn get_account_information(&self) -> Result<AccountInformation, ApiError> {
        let query = self.signed_query(String::new())?;
        let (snapshot, rate_limit) = self.get_json("/api/v3/account", &query, true).await?;
        Ok(AccountInformation {
            snapshot,
            rate_limit,
        })
    }

    async fn get_ticker_prices(
        &self,
        symbols: Option<&[String]>,
    ) -> Result<Vec<PriceQuote>, ApiError> {
        let query = match symbols {
            None => String::new(),
            Some(batch) => {
                let json = serde_json::to_string(batch)
                    .map_err(|e| ApiError::malformed(format!("unencodable symbol batch: {e}")))?;
                format!("symbols={}", urlencoding::encode(&json))
            }
        };
        let (prices, _) = self.get_json("/api/v3/ticker/price", &query, false).await?;
        Ok(prices)
    }

    async fn get_ticker_price(&self, symbol: &str) -> Result<PriceQuote, ApiError> {
        let query = format!("symbol={symbol}");
        let (price, _) = self.get_json("/api/v3/ticker/price", &query, false).await?;
        Ok(price)
    }

    async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, ApiError> {
        let query = format!("symbol={symbol}&interval={interval}&limit={limit}");
        let (rows, _): (Vec<serde_json::Value>, _) =
            self.get_json("/api/v3/klines", &query, false).await?;

        rows.iter()
            .map(|row| {
                Kline::from_row(row).ok_or_else(|| {
                    ApiError::malformed(format!("malformed kline row for {symbol}"))
                })
            })
            .collect()
    }
}

/// Computes the hex-encoded HMAC-SHA256 signature over `payload`.
fn sign(api_secret: &str, payload: &str) -> Result<String, ApiError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(api_secret.as_bytes())
        .map_err(|e| ApiError::malformed(format!("invalid HMAC key: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Maps a reqwest failure into the taxonomy, keeping connect failures
/// distinct from other transport errors.
fn map_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_connect() {
        ApiError::connect_timeout(format!("connection failed: {e}"))
    } else if e.is_timeout() {
        ApiError::timeout()
    } else {
        ApiError::transport(e.to_string())
    }
}

/// Parses the rate-limit usage headers the exchange attaches to responses.
fn parse_rate_limit(headers: &reqwest::header::HeaderMap) -> RateLimitInfo {
    let used_weight_1m = headers
        .get("x-mbx-used-weight-1m")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    let retry_after_ms = headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|secs| secs * 1_000);

    RateLimitInfo {
        used_weight_1m,
        retry_after_ms,
    }
}
