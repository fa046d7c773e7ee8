use axum::extract::{Path, Query, State};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::product::{PageResult, ProductAddRequest, ProductQuery, ProductRecord};
use crate::models::response::ApiResponse;
use crate::services::product_service::ProductError;

/// GET /TTS/monitor/products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<PageResult<ProductRecord>>>, ProductError> {
    let page = state.products.list(&query).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// POST /TTS/monitor/products/add
pub async fn add_products(
    State(state): State<AppState>,
    Json(request): Json<ProductAddRequest>,
) -> Result<Json<ApiResponse<u64>>, ProductError> {
    request
        .validate()
        .map_err(|e| ProductError::Validation(e.to_string()))?;

    let inserted = state.products.add(&request.product_ids).await?;
    Ok(Json(ApiResponse::with_message(
        format!("成功新增 {inserted} 个商品"),
        inserted,
    )))
}

/// DELETE /TTS/monitor/products/{product_id}
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ProductError> {
    state.products.delete(&product_id).await?;
    Ok(Json(ApiResponse::empty()))
}

/// POST /TTS/monitor/products/{product_id}/confirm
pub async fn confirm_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ProductError> {
    state.products.confirm(&product_id).await?;
    Ok(Json(ApiResponse::empty()))
}

/// GET /TTS/monitor/products/count
pub async fn count_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<u64>>, ProductError> {
    let total = state.products.count().await?;
    Ok(Json(ApiResponse::success(total)))
}
