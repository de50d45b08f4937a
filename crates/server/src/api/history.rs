//! Run history API handler.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use curator_core::{HistoryFilter, RunHistoryRecord};

use super::{error_response, ErrorResponse};
use crate::state::AppState;

/// Maximum allowed limit for history queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for history queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for run history
#[derive(Debug, Deserialize)]
pub struct HistoryQueryParams {
    pub item_id: Option<String>,
    pub overall_success: Option<bool>,
    /// Start of time range (RFC 3339)
    pub from: Option<DateTime<Utc>>,
    /// End of time range (RFC 3339)
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<RunHistoryRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query run history, newest first
pub async fn query_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQueryParams>,
) -> Result<Json<HistoryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = HistoryFilter::new().with_limit(limit).with_offset(offset);
    if let Some(item_id) = params.item_id {
        filter = filter.with_item_id(item_id);
    }
    if let Some(success) = params.overall_success {
        filter = filter.with_overall_success(success);
    }
    if params.from.is_some() || params.to.is_some() {
        filter = filter.with_time_range(params.from, params.to);
    }

    let store = state.history_store().clone();
    let result = tokio::task::spawn_blocking(move || {
        let records = store.query(&filter)?;
        let total = store.count(&filter)?;
        Ok::<_, curator_core::HistoryError>((records, total))
    })
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match result {
        Ok((records, total)) => Ok(Json(HistoryResponse {
            records,
            total,
            limit,
            offset,
        })),
        Err(e) => {
            error!("Failed to query run history: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ))
        }
    }
}
