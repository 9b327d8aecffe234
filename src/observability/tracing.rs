use anyhow::{Context, Error, Result};
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracer, SdkTracerProvider},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Tracing サブスクライバを一度だけ初期化する。
///
/// `LOG_FORMAT=json` の場合はJSON形式、それ以外は人間向けの形式で出力します。
/// `OTEL_EXPORTER_OTLP_ENDPOINT` が設定されている場合はOTLPエクスポーターも追加し、
/// 初期化に失敗した場合は通常のログ出力のみで続行します。
///
/// # Errors
/// サブスクライバの初期化に失敗した場合はエラーを返す。
pub fn init() -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let json = std::env::var("LOG_FORMAT").is_ok_and(|value| value.eq_ignore_ascii_case("json"));
        let json_layer = json.then(|| tracing_subscriber::fmt::layer().with_target(false).json());
        let plain_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_target(false));

        let otel_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
        let (tracer, otel_error) = match otel_endpoint.as_deref().map(init_tracer) {
            Some(Ok(tracer)) => (Some(tracer), None),
            Some(Err(error)) => (None, Some(error)),
            None => (None, None),
        };
        let otel_enabled = tracer.is_some();
        let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .with(plain_layer)
            .with(otel_layer)
            .try_init()
            .map_err(|e: tracing_subscriber::util::TryInitError| Error::msg(e.to_string()))?;

        if let Some(error) = otel_error {
            warn!(
                otel_enabled,
                error = %error,
                "tracing initialized without OpenTelemetry (init failed)"
            );
        } else {
            info!(otel_enabled, "tracing initialized");
        }

        Ok::<(), Error>(())
    })?;
    Ok(())
}

/// OTLPエクスポーター経由でOpenTelemetryトレーサーを初期化する。
///
/// サンプリング比率は `OTEL_SAMPLING_RATIO` で制御（デフォルト1.0）。
fn init_tracer(endpoint: &str) -> Result<SdkTracer> {
    let sampling_ratio = std::env::var("OTEL_SAMPLING_RATIO")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(1.0);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::TraceIdRatioBased(sampling_ratio))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = tracer_provider.tracer(env!("CARGO_PKG_NAME"));

    global::set_tracer_provider(tracer_provider.clone());
    // 終了時のフラッシュ用に保持する
    let _ = TRACER_PROVIDER.set(tracer_provider);

    Ok(tracer)
}

/// 未送信のスパンをフラッシュしてトレーサープロバイダーを停止する。
///
/// バッチ実行の終了時に呼び出す。OTLPが無効な場合は何もしない。
pub fn shutdown() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(error) = provider.shutdown() {
            warn!(error = %error, "failed to shut down tracer provider");
        }
    }
}
