//! Typed errors for the exchange REST boundary.
//!
//! Every transport and application failure is normalized into one
//! [`ApiError`] carrying enough structure (status, exchange code, kind,
//! retry hint) for callers to pick the correct retry policy and for the
//! HTTP layer to pick the correct response status.

/// Classified failure cause.
///
/// Callers apply different backoff policy per kind, so the client must
/// never collapse these into a generic network failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// HTTP 418/429 from the exchange. Retryable after the hinted delay.
    RateLimited,
    /// The signed request's timestamp fell outside the receive window
    /// (client clock skew). Retryable after a short delay.
    TimestampSkew,
    /// The client-side request deadline expired.
    Timeout,
    /// The connection could not be established.
    ConnectTimeout,
    /// The exchange does not trade the requested symbol.
    UnknownSymbol,
    /// The API key was missing, malformed, or rejected.
    Auth,
    /// Any other error reported by the exchange.
    Upstream,
    /// Transport-level failure (DNS, TLS, reset) before a response arrived.
    Transport,
    /// A response arrived but did not match the expected wire format.
    Malformed,
}

/// Error returned by every exchange client operation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Application error code from the exchange response body.
    pub code: Option<i64>,
    pub message: String,
    /// Retry hint parsed from a `Retry-After` header, in milliseconds.
    pub retry_after_ms: Option<u64>,
}

/// Exchange code for a request timestamp outside the receive window.
const CODE_TIMESTAMP_SKEW: i64 = -1021;

/// Exchange code for an untraded symbol.
const CODE_UNKNOWN_SYMBOL: i64 = -1121;

/// Exchange codes for rejected API keys.
const CODE_KEY_FORMAT: i64 = -2014;
const CODE_KEY_REJECTED: i64 = -2015;

impl ApiError {
    /// Classifies a non-2xx exchange response.
    pub fn from_response(
        status: u16,
        code: Option<i64>,
        message: String,
        retry_after_ms: Option<u64>,
    ) -> Self {
        let lowered = message.to_lowercase();
        let kind = if status == 418 || status == 429 {
            ApiErrorKind::RateLimited
        } else if code == Some(CODE_TIMESTAMP_SKEW)
            || lowered.contains("timestamp")
            || lowered.contains("recvwindow")
        {
            ApiErrorKind::TimestampSkew
        } else if code == Some(CODE_UNKNOWN_SYMBOL) {
            ApiErrorKind::UnknownSymbol
        } else if code == Some(CODE_KEY_FORMAT) || code == Some(CODE_KEY_REJECTED) || status == 401
        {
            ApiErrorKind::Auth
        } else {
            ApiErrorKind::Upstream
        };

        Self {
            kind,
            status: Some(status),
            code,
            message,
            retry_after_ms,
        }
    }

    /// The client-side deadline expired before a response arrived.
    pub fn timeout() -> Self {
        Self {
            kind: ApiErrorKind::Timeout,
            status: None,
            code: None,
            message: "request deadline exceeded".to_string(),
            retry_after_ms: None,
        }
    }

    /// The connection to the exchange could not be established.
    pub fn connect_timeout(message: String) -> Self {
        Self {
            kind: ApiErrorKind::ConnectTimeout,
            status: None,
            code: None,
            message,
            retry_after_ms: None,
        }
    }

    /// Transport failed before a response arrived.
    pub fn transport(message: String) -> Self {
        Self {
            kind: ApiErrorKind::Transport,
            status: None,
            code: None,
            message,
            retry_after_ms: None,
        }
    }

    /// A response arrived but could not be decoded.
    pub fn malformed(message: String) -> Self {
        Self {
            kind: ApiErrorKind::Malformed,
            status: None,
            code: None,
            message,
            retry_after_ms: None,
        }
    }

    /// Whether this error came from the exchange's rate limiter.
    pub fn is_rate_limit(&self) -> bool {
        self.kind == ApiErrorKind::RateLimited
    }

    /// Whether this error is a clock-skew / receive-window rejection.
    pub fn is_timestamp_error(&self) -> bool {
        self.kind == ApiErrorKind::TimestampSkew
    }

    /// Whether this error is a client-side or connection timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Timeout | ApiErrorKind::ConnectTimeout)
    }
}
