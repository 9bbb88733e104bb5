//! HTTP handlers for transfer endpoints

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::models::{Transfer, TransferDetail};
use crate::services::transfer::{
    CancelTransferInput, DispatchTransferInput, InitiateReturnInput, InitiateTransferInput,
    ReceiveTransferInput, TransferFilter,
};
use crate::services::TransferService;
use crate::AppState;

fn service(state: &AppState) -> TransferService {
    TransferService::new(state.db.clone(), state.config.transfers.clone())
}

/// Parse a JSON body that may be left out entirely
fn optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::ValidationError(format!("Invalid request body: {}", e)))
}

/// List transfers
pub async fn list_transfers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<TransferFilter>,
) -> AppResult<Json<Vec<Transfer>>> {
    let transfers = service(&state).list_transfers(filter).await?;
    Ok(Json(transfers))
}

/// Get a transfer with its items and history
pub async fn get_transfer_detail(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<TransferDetail>> {
    let detail = service(&state).get_transfer_detail(transfer_id).await?;
    Ok(Json(detail))
}

/// Initiate a transfer
pub async fn initiate_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<InitiateTransferInput>,
) -> AppResult<Json<Transfer>> {
    let transfer = service(&state)
        .initiate_transfer(&current_user.0, input)
        .await?;
    Ok(Json(transfer))
}

/// Dispatch an initiated transfer
pub async fn dispatch_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Transfer>> {
    let input: DispatchTransferInput = optional_body(&body)?;
    let transfer = service(&state)
        .dispatch_transfer(&current_user.0, transfer_id, input)
        .await?;
    Ok(Json(transfer))
}

/// Receive an in-transit transfer
pub async fn receive_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
    Json(input): Json<ReceiveTransferInput>,
) -> AppResult<Json<Transfer>> {
    let transfer = service(&state)
        .receive_transfer(&current_user.0, transfer_id, input)
        .await?;
    Ok(Json(transfer))
}

/// Cancel an in-flight transfer
pub async fn cancel_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
    Json(input): Json<CancelTransferInput>,
) -> AppResult<Json<Transfer>> {
    let transfer = service(&state)
        .cancel_transfer(&current_user.0, transfer_id, input)
        .await?;
    Ok(Json(transfer))
}

/// Return rejected items to the source warehouse
pub async fn initiate_return(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Transfer>> {
    let input: InitiateReturnInput = optional_body(&body)?;
    let transfer = service(&state)
        .initiate_return(&current_user.0, transfer_id, input)
        .await?;
    Ok(Json(transfer))
}
