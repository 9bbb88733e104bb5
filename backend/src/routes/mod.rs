//! Route definitions for the warehouse transfer backend

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - transfer lifecycle
        .nest("/transfers", transfer_routes(state.clone()))
        // Protected routes - warehouse availability
        .nest("/warehouses", warehouse_routes(state))
}

/// Transfer routes (protected)
fn transfer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_transfers).post(handlers::initiate_transfer),
        )
        .route("/:transfer_id", get(handlers::get_transfer_detail))
        .route("/:transfer_id/dispatch", post(handlers::dispatch_transfer))
        .route("/:transfer_id/receive", post(handlers::receive_transfer))
        .route("/:transfer_id/cancel", post(handlers::cancel_transfer))
        .route("/:transfer_id/return", post(handlers::initiate_return))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Warehouse availability routes (protected)
fn warehouse_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/:warehouse_id/batches",
            get(handlers::get_available_batches),
        )
        .route(
            "/:warehouse_id/inventory",
            get(handlers::get_warehouse_inventory),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
