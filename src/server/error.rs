//! HTTP error mapping.
//!
//! Every failure the portfolio endpoints can hit maps to one wire error
//! object and one status out of 400/401/404/408/429/500, chosen by the
//! failure kind so callers can apply the correct backoff.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::credentials::StoreError;
use crate::exchange::{ApiError, ApiErrorKind};

/// Suggested client retry delay after a clock-skew rejection.
const TIMESTAMP_RETRY_MS: u64 = 1_000;

/// Wire error object.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "is_false")]
    pub is_rate_limit: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_timestamp_error: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_timeout_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(v: &bool) -> bool {
    !v
}

impl ErrorBody {
    fn new(error: String, code: &'static str) -> Self {
        Self {
            error,
            code,
            is_rate_limit: false,
            is_timestamp_error: false,
            is_timeout_error: false,
            retry_after_ms: None,
        }
    }
}

/// Failure of a portal endpoint, paired with its response status.
#[derive(Debug)]
pub enum PortalError {
    /// Missing, malformed, or unknown session token.
    Unauthorized,
    /// The authenticated user has no stored exchange credentials.
    NoCredentials,
    /// The credential store failed (including undecryptable records).
    Store(StoreError),
    /// The exchange call failed.
    Exchange(ApiError),
}

impl From<StoreError> for PortalError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<ApiError> for PortalError {
    fn from(e: ApiError) -> Self {
        Self::Exchange(e)
    }
}

impl PortalError {
    /// Maps this failure to its response status and wire body.
    pub fn to_response_parts(&self) -> (StatusCode, ErrorBody) {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new("missing or invalid session".to_string(), "UNAUTHORIZED"),
            ),
            Self::NoCredentials => (
                StatusCode::NOT_FOUND,
                ErrorBody::new(
                    "no exchange credentials configured for this account".to_string(),
                    "NO_CREDENTIALS",
                ),
            ),
            Self::Store(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(
                    format!("credential store failure: {e}"),
                    match e {
                        StoreError::Decrypt { .. } => "CREDENTIALS_UNREADABLE",
                        _ => "STORE",
                    },
                ),
            ),
            Self::Exchange(e) => exchange_response_parts(e),
        }
    }
}

fn exchange_response_parts(e: &ApiError) -> (StatusCode, ErrorBody) {
    match e.kind {
        ApiErrorKind::RateLimited => {
            let mut body = ErrorBody::new(
                "exchange rate limit exceeded".to_string(),
                "RATE_LIMITED",
            );
            body.is_rate_limit = true;
            body.retry_after_ms = e.retry_after_ms;
            (StatusCode::TOO_MANY_REQUESTS, body)
        }
        ApiErrorKind::TimestampSkew => {
            let mut body = ErrorBody::new(
                "request timestamp outside the exchange receive window".to_string(),
                "TIMESTAMP_SKEW",
            );
            body.is_timestamp_error = true;
            body.retry_after_ms = Some(TIMESTAMP_RETRY_MS);
            (StatusCode::BAD_REQUEST, body)
        }
        ApiErrorKind::Timeout => {
            let mut body = ErrorBody::new("exchange request timed out".to_string(), "TIMEOUT");
            body.is_timeout_error = true;
            (StatusCode::REQUEST_TIMEOUT, body)
        }
        ApiErrorKind::ConnectTimeout => {
            let mut body = ErrorBody::new(
                "could not connect to the exchange".to_string(),
                "CONNECTION_TIMEOUT",
            );
            body.is_timeout_error = true;
            (StatusCode::REQUEST_TIMEOUT, body)
        }
        ApiErrorKind::Auth => (
            StatusCode::UNAUTHORIZED,
            ErrorBody::new(
                "exchange rejected the stored API key".to_string(),
                "EXCHANGE_AUTH",
            ),
        ),
        ApiErrorKind::UnknownSymbol
        | ApiErrorKind::Upstream
        | ApiErrorKind::Transport
        | ApiErrorKind::Malformed => {
            let detail = match (e.status, e.code) {
                (Some(s), Some(c)) => format!(" (status {s}, code {c})"),
                (Some(s), None) => format!(" (status {s})"),
                (None, Some(c)) => format!(" (code {c})"),
                (None, None) => String::new(),
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(format!("exchange error{detail}: {}", e.message), "UPSTREAM"),
            )
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_response_parts();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_maps_to_429_with_hint() {
        let e = ApiError::from_response(429, None, "busy".into(), Some(30_000));
        let (status, body) = PortalError::Exchange(e).to_response_parts();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body.is_rate_limit);
        assert_eq!(body.retry_after_ms, Some(30_000));
    }

    #[test]
    fn timestamp_skew_maps_to_400_with_short_retry() {
        let e = ApiError::from_response(400, Some(-1021), "timestamp".into(), None);
        let (status, body) = PortalError::Exchange(e).to_response_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.is_timestamp_error);
        assert_eq!(body.retry_after_ms, Some(TIMESTAMP_RETRY_MS));
    }

    #[test]
    fn timeouts_map_to_408_with_distinct_codes() {
        let (status, body) = PortalError::Exchange(ApiError::timeout()).to_response_parts();
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body.code, "TIMEOUT");
        assert!(body.is_timeout_error);

        let (_, body) =
            PortalError::Exchange(ApiError::connect_timeout("refused".into())).to_response_parts();
        assert_eq!(body.code, "CONNECTION_TIMEOUT");
    }

    #[test]
    fn missing_credentials_map_to_404() {
        let (status, body) = PortalError::NoCredentials.to_response_parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "NO_CREDENTIALS");
    }

    #[test]
    fn undecryptable_credentials_map_to_500() {
        let e = StoreError::Decrypt {
            user: "alice".into(),
            reason: "authentication failed".into(),
        };
        let (status, body) = PortalError::Store(e).to_response_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "CREDENTIALS_UNREADABLE");
    }

    #[test]
    fn flags_absent_when_false() {
        let (_, body) = PortalError::Unauthorized.to_response_parts();
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("isRateLimit").is_none());
        assert!(json.get("retryAfterMs").is_none());
        assert_eq!(json["code"], "UNAUTHORIZED");
    }
}
