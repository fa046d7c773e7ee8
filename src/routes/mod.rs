pub mod error;
pub mod health;
pub mod metrics;
pub mod products;
pub mod tasks;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::app_state::AppState;

/// Operator API and health check. `/metrics` is mounted separately since it
/// carries its own state.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/TTS/monitor/products", get(products::list_products))
        .route("/TTS/monitor/products/add", post(products::add_products))
        .route("/TTS/monitor/products/count", get(products::count_products))
        .route("/TTS/monitor/products/{product_id}", delete(products::delete_product))
        .route(
            "/TTS/monitor/products/{product_id}/confirm",
            post(products::confirm_product),
        )
        .route("/TTS/monitor/task/execute", post(tasks::execute_check))
        .with_state(state)
}
