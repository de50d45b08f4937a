//! Batch API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use curator_core::{
    classify, select, BatchMode, BatchProgress, BatchScheduler, BatchSummary, Classification,
    EnrichmentProcessor, ItemArena, ItemStatus, RunSelection,
};

use super::{error_response, ErrorResponse};
use crate::state::{AppState, BatchHandle};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a batch
#[derive(Debug, Deserialize)]
pub struct CreateBatchBody {
    /// Classification buckets to include. Defaults to every bucket.
    #[serde(default = "RunSelection::all")]
    pub selection: RunSelection,
    /// Restrict the batch to these item ids
    pub ids: Option<Vec<String>>,
    #[serde(default)]
    pub mode: BatchMode,
    /// Overrides `[batch] concurrency_limit`
    pub concurrency_limit: Option<usize>,
    /// Overrides `[batch] session_cap`
    pub session_cap: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CreateBatchResponse {
    pub batch_id: String,
    /// Number of selected items queued for the batch
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchItemResponse {
    pub id: String,
    pub status: ItemStatus,
    pub classification: Classification,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub batch_id: String,
    pub mode: BatchMode,
    pub created_at: String,
    pub progress: BatchProgress,
    pub items: Vec<BatchItemResponse>,
    /// Present once the batch has finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BatchSummary>,
    /// Operator notice when the session cap stopped the batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a batch over the selected items
pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBatchBody>,
) -> Result<(StatusCode, Json<CreateBatchResponse>), (StatusCode, Json<ErrorResponse>)> {
    let mut config = state.config().batch.clone();
    if let Some(limit) = body.concurrency_limit {
        config.concurrency_limit = limit;
    }
    if let Some(cap) = body.session_cap {
        config.session_cap = cap;
    }
    if config.concurrency_limit == 0 || config.session_cap == 0 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "concurrency_limit and session_cap must be greater than 0",
        ));
    }

    let mut selection = body.selection;
    if let Some(ids) = body.ids {
        selection = selection.with_ids(ids);
    }

    let store = state.item_store().clone();
    let items = tokio::task::spawn_blocking(move || store.list_work_items())
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            error!("Failed to load items for batch: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    let ids = select(&items, &selection)
        .map_err(|e| error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let total = ids.len();

    let arena = Arc::new(ItemArena::from_items(items));
    let scheduler = BatchScheduler::new(config, arena.clone());
    let batch_id = Uuid::new_v4().to_string();
    let handle = Arc::new(BatchHandle::new(
        batch_id.clone(),
        body.mode,
        arena,
        scheduler.tracker(),
    ));
    state.batches().insert(handle.clone()).await;

    let processor = Arc::new(EnrichmentProcessor::new(state.runner().clone(), body.mode));
    info!("Batch {} queued with {} items ({:?})", batch_id, total, body.mode);

    let registry_state = state.clone();
    tokio::spawn(async move {
        let summary = scheduler.run(ids, processor).await;
        if let Some(notice) = summary.notice() {
            info!("Batch {}: {}", handle.id, notice);
        }
        drop(scheduler);
        handle.finish(summary).await;
        registry_state.batches().prune().await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateBatchResponse { batch_id, total }),
    ))
}

/// Progress and per-item state of a batch
pub async fn get_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BatchResponse>, (StatusCode, Json<ErrorResponse>)> {
    let handle = state.batches().get(&id).await.ok_or_else(|| {
        error_response(StatusCode::NOT_FOUND, format!("Batch not found: {}", id))
    })?;

    let items = handle
        .touched_items()
        .await
        .into_iter()
        .map(|item| BatchItemResponse {
            classification: classify(&item),
            status: item.status,
            id: item.id,
        })
        .collect();

    let summary = handle.summary().await;
    let notice = summary.as_ref().and_then(BatchSummary::notice);

    Ok(Json(BatchResponse {
        batch_id: handle.id.clone(),
        mode: handle.mode,
        created_at: handle.created_at.to_rfc3339(),
        progress: handle.tracker.snapshot(),
        items,
        summary,
        notice,
    }))
}
