//! Read-only gas price endpoints backed by the polling store.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::headers::conditional_json;
use super::AppState;
use crate::store::GasSnapshot;
use crate::types::ChainId;

const GAS_LATEST_MAX_AGE: u32 = 5;
const GAS_LATEST_SWR: u32 = 10;
const GAS_HISTORY_MAX_AGE: u32 = 15;
const GAS_HISTORY_SWR: u32 = 30;

const DEFAULT_HISTORY_LIMIT: usize = 100;
const MAX_HISTORY_LIMIT: usize = 1_000;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

fn serialize<T: Serialize>(payload: &T) -> Result<Vec<u8>, ApiError> {
    serde_json::to_vec(payload).map_err(|err| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize gas prices: {}", err),
        )
    })
}

/// `GET /gas/:chain_id`: latest aggregated snapshot of the chain.
pub async fn latest_gas_price(
    State(state): State<AppState>,
    Path(chain_id): Path<ChainId>,
    request_headers: HeaderMap,
) -> Result<Response, ApiError> {
    let snapshot = {
        let store = state.store.read().await;
        store.latest(chain_id).cloned()
    };
    let snapshot = snapshot.ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("No gas prices recorded for chain {}", chain_id),
        )
    })?;

    let body = serialize(&snapshot)?;
    Ok(conditional_json(
        &request_headers,
        body,
        snapshot.fetched_at,
        GAS_LATEST_MAX_AGE,
        GAS_LATEST_SWR,
    ))
}

#[derive(Debug, Deserialize)]
pub struct GasHistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct GasHistoryResponse {
    pub chain_id: ChainId,
    pub data_points: usize,
    pub snapshots: Vec<GasSnapshot>,
}

/// `GET /gas/:chain_id/history?limit=N`: most recent snapshots, oldest first.
pub async fn gas_price_history(
    State(state): State<AppState>,
    Path(chain_id): Path<ChainId>,
    Query(params): Query<GasHistoryQuery>,
    request_headers: HeaderMap,
) -> Result<Response, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("limit must be between 1 and {}", MAX_HISTORY_LIMIT),
        ));
    }

    let snapshots = {
        let store = state.store.read().await;
        store.get_last_n(chain_id, limit)
    };
    let Some(last_modified) = snapshots.last().map(|snapshot| snapshot.fetched_at) else {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No gas prices recorded for chain {}", chain_id),
        ));
    };

    let payload = GasHistoryResponse {
        chain_id,
        data_points: snapshots.len(),
        snapshots,
    };
    let body = serialize(&payload)?;
    Ok(conditional_json(
        &request_headers,
        body,
        last_modified,
        GAS_HISTORY_MAX_AGE,
        GAS_HISTORY_SWR,
    ))
}
