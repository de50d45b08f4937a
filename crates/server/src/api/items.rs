//! Item listing with classification.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use curator_core::{
    classify, AssetBucket, Classification, ClassificationCounts, ReachabilityBucket, RunSelection,
    WorkItem,
};

use super::{error_response, ErrorResponse};
use crate::state::AppState;

/// Query parameters for listing items
#[derive(Debug, Default, Deserialize)]
pub struct ListItemsParams {
    /// Comma-separated reachability buckets, e.g. `success-2xx,redirect-3xx`
    pub reachability: Option<String>,
    /// Comma-separated asset buckets, e.g. `missing-asset`
    pub asset: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    #[serde(flatten)]
    pub item: WorkItem,
    pub classification: Classification,
}

#[derive(Debug, Serialize)]
pub struct ListItemsResponse {
    pub items: Vec<ItemResponse>,
    /// Bucket counts over all stored items, before filtering.
    pub counts: ClassificationCounts,
}

/// Builds a selection from bucket query parameters. Absent parameters keep
/// every bucket of that dimension.
pub fn selection_from_params(params: &ListItemsParams) -> Result<RunSelection, String> {
    let mut selection = RunSelection::all();

    if let Some(ref raw) = params.reachability {
        let buckets = parse_list(raw, ReachabilityBucket::parse)
            .map_err(|b| format!("unknown reachability bucket: {}", b))?;
        selection = selection.with_reachability(buckets);
    }
    if let Some(ref raw) = params.asset {
        let buckets = parse_list(raw, AssetBucket::parse)
            .map_err(|b| format!("unknown asset bucket: {}", b))?;
        selection = selection.with_assets(buckets);
    }

    Ok(selection)
}

fn parse_list<T>(raw: &str, parse: fn(&str) -> Option<T>) -> Result<Vec<T>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse(s).ok_or_else(|| s.to_string()))
        .collect()
}

/// List stored items, optionally filtered by classification buckets
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListItemsParams>,
) -> Result<Json<ListItemsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let selection = selection_from_params(&params)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))?;

    let store = state.item_store().clone();
    let items = tokio::task::spawn_blocking(move || store.list_work_items())
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            error!("Failed to list items: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    let counts = ClassificationCounts::tally(&items);
    let items = items
        .into_iter()
        .filter(|item| selection.accepts(item))
        .map(|item| ItemResponse {
            classification: classify(&item),
            item,
        })
        .collect();

    Ok(Json(ListItemsResponse { items, counts }))
}
