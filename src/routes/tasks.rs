use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::models::response::ApiResponse;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
    pub message: String,
}

/// POST /TTS/monitor/task/execute
///
/// Starts a reconciliation in the background and answers immediately. The
/// outcome shows up in logs, metrics and the product table. When a run is
/// already in flight nothing is started and the status is `skipped`.
pub async fn execute_check(State(state): State<AppState>) -> Json<ApiResponse<TriggerResponse>> {
    if state.job.is_running() {
        tracing::info!("Manual product check ignored, a run is in progress");
        return Json(ApiResponse::success(TriggerResponse {
            status: "skipped",
            message: "商品校验任务正在执行中，本次触发已跳过".to_string(),
        }));
    }

    tracing::info!("Manual product check triggered");
    state.job.trigger();

    Json(ApiResponse::success(TriggerResponse {
        status: "started",
        message: "商品校验任务已开始执行，请稍后查看结果".to_string(),
    }))
}
