use anyhow::{Context, Error, Result};
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracer, SdkTracerProvider},
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "song-worker";

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// トレーシングの設定。値は `Config` で検証済みのものを渡す。
#[derive(Debug, Clone, PartialEq)]
pub struct TracingSettings {
    /// 設定されている場合のみ OTLP エクスポーターを有効にする
    pub otlp_endpoint: Option<String>,
    /// 0.0〜1.0 のトレースサンプリング比率
    pub sampling_ratio: f64,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            sampling_ratio: 1.0,
        }
    }
}

/// Tracing サブスクライバを一度だけ初期化する。
///
/// `otlp_endpoint` が設定されている場合は OTLP エクスポーターも有効にする。
/// エクスポーターの初期化に失敗した場合は JSON ログのみで続行する。
///
/// # Errors
/// サブスクライバの初期化に失敗した場合はエラーを返す。
pub fn init(settings: &TracingSettings) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).json();

        let otel_endpoint = settings.otlp_endpoint.as_deref();

        let (otel_layer, otel_error) = match otel_endpoint
            .map(|endpoint| init_tracer(endpoint, settings.sampling_ratio))
        {
            Some(Ok(tracer)) => (
                Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                None,
            ),
            Some(Err(error)) => (None, Some(error)),
            None => (None, None),
        };
        let otel_enabled = otel_layer.is_some();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()
            .map_err(|e: tracing_subscriber::util::TryInitError| Error::msg(e.to_string()))?;

        match otel_error {
            Some(error) => info!(
                otel_enabled,
                error = %error,
                "tracing initialized without OpenTelemetry (init failed)"
            ),
            None => info!(
                otel_enabled,
                endpoint = otel_endpoint.unwrap_or(""),
                sampling_ratio = settings.sampling_ratio,
                "tracing initialized"
            ),
        }

        Ok::<(), Error>(())
    })?;
    Ok(())
}

/// OTLPエクスポーター経由でOpenTelemetryトレーサーを初期化する。
///
/// サンプリング比率は1.0で全トレースを送信する。
fn init_tracer(endpoint: &str, sampling_ratio: f64) -> Result<SdkTracer> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::TraceIdRatioBased(sampling_ratio))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = tracer_provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(tracer_provider.clone());
    // シャットダウン時にフラッシュするため保持する
    let _ = TRACER_PROVIDER.set(tracer_provider);

    Ok(tracer)
}

/// 未送信のスパンをフラッシュしてトレーサープロバイダーを停止する。
///
/// OTLPが無効な場合は何もしない。
pub fn shutdown() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(error) = provider.shutdown() {
            eprintln!("failed to shut down tracer provider: {error}");
        }
    }
}
