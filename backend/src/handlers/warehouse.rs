//! HTTP handlers for warehouse stock availability

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{BatchAvailability, ProductAvailability};
use crate::services::AvailabilityService;
use crate::AppState;

/// Batch-tracked stock that can be put on a new transfer
pub async fn get_available_batches(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<BatchAvailability>>> {
    let service = AvailabilityService::new(state.db);
    let batches = service.get_available_batches(warehouse_id).await?;
    Ok(Json(batches))
}

/// Generic stock that can be put on a new transfer
pub async fn get_warehouse_inventory(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProductAvailability>>> {
    let service = AvailabilityService::new(state.db);
    let inventory = service.get_warehouse_inventory(warehouse_id).await?;
    Ok(Json(inventory))
}
