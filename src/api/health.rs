use axum::{Json, extract::State};
use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct HealthReport {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stages: Option<&'static str>,
}

/// 外部サービスは呼び出さない。
pub(crate) async fn ready(State(state): State<AppState>) -> Json<HealthReport> {
    state.telemetry().record_ready_probe();
    Json(HealthReport {
        status: "ready",
        stages: Some(state.pipeline().policy().as_str()),
    })
}

pub(crate) async fn live(State(state): State<AppState>) -> Json<HealthReport> {
    state.telemetry().record_live_probe();
    Json(HealthReport {
        status: "live",
        stages: None,
    })
}
