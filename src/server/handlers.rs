//! Portfolio endpoint handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::auth::authenticate;
use super::error::PortalError;
use super::AppState;
use crate::credentials::CredentialsMetadata;
use crate::exchange::RateLimitInfo;
use crate::portfolio::{
    ChartDatum, ChartRange, Holding, HistoryMetadata, HoldingsSummary, aggregate_balances,
    build_history,
};

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

/// Body of a successful balances response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub holdings: Vec<Holding>,
    pub summary: HoldingsSummary,
    pub credentials_metadata: CredentialsMetadata,
    pub rate_limit: RateLimitInfo,
}

/// `GET /api/portfolio/balances`
///
/// Fails loudly: any unrecoverable failure maps to a non-200 status via
/// [`PortalError`].
pub async fn get_balances(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BalancesResponse>, PortalError> {
    let user = authenticate(state.sessions.as_ref(), &headers).await?;

    let credentials = state
        .store
        .get(&user)?
        .ok_or(PortalError::NoCredentials)?;
    let metadata = credentials.metadata();

    let source = state.clients.for_credentials(&credentials)?;
    let aggregated = aggregate_balances(source.as_ref()).await?;

    Ok(Json(BalancesResponse {
        holdings: aggregated.holdings,
        summary: aggregated.summary,
        credentials_metadata: metadata,
        rate_limit: aggregated.rate_limit,
    }))
}

/// Query parameters of the history endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub range: Option<String>,
    pub current_value: Option<f64>,
}

/// Body of a history response. `data` is empty and `error` set when the
/// series could not be built.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub data: Vec<ChartDatum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HistoryMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /api/portfolio/history?range=&currentValue=`
///
/// Fails soft: the session is required (401 without one), but once
/// authenticated every failure degrades to HTTP 200 with an empty series
/// and an explanatory message — the chart is a non-critical enhancement
/// and must not error the page.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, PortalError> {
    let user = authenticate(state.sessions.as_ref(), &headers).await?;

    match history_series(&state, &user, &query).await {
        Ok((data, metadata)) => Ok(Json(HistoryResponse {
            data,
            metadata: Some(metadata),
            error: None,
        })),
        Err(message) => {
            warn!(user = %user, error = %message, "history degraded to empty series");
            Ok(Json(HistoryResponse {
                data: Vec::new(),
                metadata: None,
                error: Some(message),
            }))
        }
    }
}

/// Everything after authentication, with failures reduced to a message.
async fn history_series(
    state: &AppState,
    user: &str,
    query: &HistoryQuery,
) -> Result<(Vec<ChartDatum>, HistoryMetadata), String> {
    let range = match query.range.as_deref() {
        None => ChartRange::Day,
        Some(raw) => ChartRange::parse(raw).ok_or_else(|| format!("unknown range {raw:?}"))?,
    };

    let credentials = state
        .store
        .get(user)
        .map_err(|e| format!("credential store failure: {e}"))?
        .ok_or_else(|| "no exchange credentials configured for this account".to_string())?;

    let source = state
        .clients
        .for_credentials(&credentials)
        .map_err(|e| format!("exchange client failure: {e}"))?;

    let report = build_history(source.as_ref(), range, query.current_value)
        .await
        .map_err(|e| format!("could not load chart data: {e}"))?;

    Ok((report.data, report.metadata))
}
