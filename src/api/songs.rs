use std::collections::BTreeMap;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    app::AppState,
    pipeline::{Category, CategoryInput, PipelineResult, RunContext, Selections, StagePolicy, aggregate},
};

#[derive(Debug, Serialize)]
pub(crate) struct CategoryView {
    category: Category,
    label: &'static str,
    options: &'static [&'static str],
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSongRequest {
    #[serde(default)]
    selections: BTreeMap<Category, CategoryInput>,
    #[serde(default)]
    stages: Option<StagePolicy>,
}

#[derive(Debug, Serialize)]
struct CreateSongResponse {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    selections: Selections,
    #[serde(flatten)]
    result: PipelineResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub(crate) async fn categories() -> Json<Vec<CategoryView>> {
    Json(
        Category::ALL
            .into_iter()
            .map(|category| CategoryView {
                category,
                label: category.label(),
                options: category.preset_options(),
            })
            .collect(),
    )
}

/// 選択内容から一曲生成し、結果を同期的に返す。
///
/// lyrics/theme ステージの失敗は 502、部分的な結果は 200 で返す。
pub(crate) async fn create_song(
    State(state): State<AppState>,
    Json(payload): Json<CreateSongRequest>,
) -> impl IntoResponse {
    let selections = aggregate(&payload.selections);
    if selections.is_empty() {
        let body = Json(ErrorResponse {
            error: "at least one category must have a selected or custom entry".into(),
        });
        return (StatusCode::BAD_REQUEST, body).into_response();
    }

    let pipeline = state.pipeline();
    let policy = payload.stages.unwrap_or_else(|| pipeline.policy());
    let run = RunContext::generate();
    info!(run_id = %run.run_id, %policy, "song generation requested");

    let result = pipeline.run_with_policy(&run, &selections, policy).await;
    let status = if result.is_failed() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };

    let body = Json(CreateSongResponse {
        run_id: run.run_id,
        started_at: run.started_at,
        finished_at: Utc::now(),
        selections,
        result,
    });
    (status, body).into_response()
}
