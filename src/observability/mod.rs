pub mod metrics;
pub mod tracing;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};

use self::metrics::Metrics;

/// Telemetry（メトリクスとトレーシング）を管理する構造体。
#[derive(Debug, Clone)]
pub struct Telemetry {
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// トレーシングとメトリクスを初期化する。
    ///
    /// # Errors
    /// サブスクライバの初期化またはメトリクス登録に失敗した場合はエラーを返す。
    pub fn new() -> Result<Self> {
        tracing::init()?;
        Self::metrics_only()
    }

    /// トレーシングを初期化せずにメトリクスだけを用意する。
    ///
    /// # Errors
    /// メトリクス登録に失敗した場合はエラーを返す。
    pub fn metrics_only() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry).context("failed to register metrics")?);
        Ok(Self { registry, metrics })
    }

    /// メトリクスへのアクセスを提供する。
    #[must_use]
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Prometheusテキスト形式でメトリクスをレンダリングする。
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// node_exporter の textfile collector 向けにメトリクスをファイルへ書き出す。
    ///
    /// # Errors
    /// ディレクトリ作成または書き込みに失敗した場合はエラーを返す。
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.render_prometheus())
            .with_context(|| format!("failed to write metrics to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_counters() {
        let telemetry = Telemetry::metrics_only().expect("telemetry");
        telemetry.metrics().search_requests.inc_by(4);

        let rendered = telemetry.render_prometheus();

        assert!(rendered.contains("collector_search_requests_total 4"));
        assert!(rendered.contains("classifier_videos_tagged_total 0"));
    }

    #[test]
    fn write_textfile_creates_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metrics").join("collector.prom");
        let telemetry = Telemetry::metrics_only().expect("telemetry");

        telemetry.write_textfile(&path).expect("write metrics");

        let contents = std::fs::read_to_string(path).expect("read metrics");
        assert!(contents.contains("collector_videos_fetched_total"));
    }
}
