//! Prometheusメトリクス定義。
use prometheus::{
    Histogram, IntCounter, Registry, register_histogram_with_registry,
    register_int_counter_with_registry,
};
use std::sync::Arc;

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub search_requests: IntCounter,
    pub detail_requests: IntCounter,
    pub video_ids_collected: IntCounter,
    pub videos_fetched: IntCounter,
    pub videos_tagged: IntCounter,
    pub videos_untagged: IntCounter,
    pub modelling_rows_retained: IntCounter,

    // ヒストグラム
    pub collector_duration: Histogram,
    pub classifier_duration: Histogram,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成し、`registry` に登録する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録されている場合はエラーを返す。
    pub fn new(registry: &Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            search_requests: register_int_counter_with_registry!(
                "collector_search_requests_total",
                "Total number of search endpoint requests",
                registry
            )?,
            detail_requests: register_int_counter_with_registry!(
                "collector_detail_requests_total",
                "Total number of details endpoint requests",
                registry
            )?,
            video_ids_collected: register_int_counter_with_registry!(
                "collector_video_ids_total",
                "Unique video identifiers collected across all queries",
                registry
            )?,
            videos_fetched: register_int_counter_with_registry!(
                "collector_videos_fetched_total",
                "Video records returned by the details endpoint",
                registry
            )?,
            videos_tagged: register_int_counter_with_registry!(
                "classifier_videos_tagged_total",
                "Videos with at least one matched genre",
                registry
            )?,
            videos_untagged: register_int_counter_with_registry!(
                "classifier_videos_untagged_total",
                "Videos without any matched genre",
                registry
            )?,
            modelling_rows_retained: register_int_counter_with_registry!(
                "modelling_rows_retained_total",
                "Rows kept after the minimum-sample genre filter",
                registry
            )?,
            collector_duration: register_histogram_with_registry!(
                "collector_duration_seconds",
                "Time spent searching and fetching video details",
                vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0],
                registry
            )?,
            classifier_duration: register_histogram_with_registry!(
                "classifier_duration_seconds",
                "Time spent tagging and filtering records",
                vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0],
                registry
            )?,
        })
    }

    /// テストやスタブ用に専用レジストリ付きで作成する。
    ///
    /// # Panics
    /// 新しいレジストリへの登録は衝突しないため、実際にはパニックしない。
    #[must_use]
    pub fn unregistered() -> Self {
        let registry = Arc::new(Registry::new());
        Self::new(&registry).expect("fresh registry has no conflicting metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_on_same_registry_fails() {
        let registry = Arc::new(Registry::new());
        Metrics::new(&registry).expect("first registration");
        assert!(Metrics::new(&registry).is_err());
    }

    #[test]
    fn counters_start_at_zero() {
        let metrics = Metrics::unregistered();
        assert_eq!(metrics.search_requests.get(), 0);
        metrics.videos_fetched.inc_by(3);
        assert_eq!(metrics.videos_fetched.get(), 3);
    }
}
