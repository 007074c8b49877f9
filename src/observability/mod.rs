pub mod metrics;
pub mod tracing;

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};

use self::metrics::Metrics;
use self::tracing::TracingSettings;

/// Telemetry（メトリクスとトレーシング）を管理する構造体。
#[derive(Debug, Clone)]
pub struct Telemetry {
    registry: Registry,
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// 新しいTelemetryインスタンスを作成し、トレーシングとメトリクスを初期化する。
    pub fn new(tracing_settings: &TracingSettings) -> Result<Self> {
        tracing::init(tracing_settings)?;
        Self::without_tracing()
    }

    /// トレーシングを初期化せずにメトリクスだけを用意する。
    pub fn without_tracing() -> Result<Self> {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).context("failed to register metrics")?;
        Ok(Self {
            registry,
            metrics: Arc::new(metrics),
        })
    }

    /// メトリクスへのアクセスを提供する。
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// 準備完了プローブを記録する。
    pub fn record_ready_probe(&self) {
        ::tracing::debug!("service ready probe");
    }

    /// ライブプローブを記録する。
    pub fn record_live_probe(&self) {
        ::tracing::debug!("service live probe");
    }

    /// Prometheusメトリクスをレンダリングする。
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(error) = encoder.encode(&metric_families, &mut buffer) {
            ::tracing::warn!(error = %error, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
