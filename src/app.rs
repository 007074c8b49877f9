use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;

use crate::{
    api,
    clients::{MusicGenerator, OpenAiClient, SunoClient, TextGenerator},
    config::Config,
    observability::Telemetry,
    pipeline::PipelineOrchestrator,
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    telemetry: Telemetry,
    pipeline: Arc<PipelineOrchestrator>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn pipeline(&self) -> Arc<PipelineOrchestrator> {
        Arc::clone(&self.registry.pipeline)
    }
}

impl ComponentRegistry {
    /// 構成情報から HTTP クライアントとパイプラインを初期化し、共有レジストリを構築する。
    ///
    /// # Errors
    /// Telemetry の初期化や HTTP クライアント構築が失敗した場合はエラーを返す。
    pub fn build(config: &Config) -> Result<Self> {
        let telemetry = Telemetry::new(&config.tracing())?;
        let text: Arc<dyn TextGenerator> = Arc::new(
            OpenAiClient::new(config.openai()).context("failed to create text generation client")?,
        );
        let music: Arc<dyn MusicGenerator> = Arc::new(
            SunoClient::new(config.suno()).context("failed to create music generation client")?,
        );
        let pipeline = PipelineOrchestrator::new(
            text,
            music,
            &config.pipeline(),
            Some(Arc::clone(telemetry.metrics())),
        );

        Ok(Self::from_parts(telemetry, pipeline))
    }

    /// 構築済みの部品からレジストリを組み立てる。
    #[must_use]
    pub fn from_parts(telemetry: Telemetry, pipeline: PipelineOrchestrator) -> Self {
        Self {
            telemetry,
            pipeline: Arc::new(pipeline),
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> Arc<PipelineOrchestrator> {
        Arc::clone(&self.pipeline)
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::{ENV_MUTEX, reset_test_env};

    fn registry() -> ComponentRegistry {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_test_env();
        // SAFETY: test code adjusts deterministic environment state sequentially.
        unsafe {
            std::env::set_var("OPENAI_API_KEY", "sk-test-key");
            std::env::set_var("SUNO_COOKIE", "session=abc123");
            std::env::set_var("OPENAI_BASE_URL", "http://localhost:18001/");
            std::env::set_var("SUNO_BASE_URL", "http://localhost:18002/");
        }
        let config = Config::from_env().expect("config should load");
        ComponentRegistry::build(&config).expect("registry should build")
    }

    #[tokio::test]
    async fn component_registry_builds() {
        let registry = registry();

        assert_eq!(
            registry.pipeline().policy(),
            crate::pipeline::StagePolicy::Full
        );
    }

    #[tokio::test]
    async fn health_and_metrics_routes_respond() {
        let router = build_router(registry());

        let live = router
            .clone()
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).expect("request"))
            .await
            .expect("live response");
        assert_eq!(live.status(), StatusCode::OK);

        let ready = router
            .clone()
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).expect("request"))
            .await
            .expect("ready response");
        assert_eq!(ready.status(), StatusCode::OK);
        let body = to_bytes(ready.into_body(), usize::MAX).await.expect("body");
        let body: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["status"], "ready");
        assert_eq!(body["stages"], "full");

        let metrics = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("metrics response");
        assert_eq!(metrics.status(), StatusCode::OK);
        let body = to_bytes(metrics.into_body(), usize::MAX).await.expect("body");
        let text = String::from_utf8(body.to_vec()).expect("utf8");
        assert!(text.contains("song_runs_complete_total"));
    }
}
