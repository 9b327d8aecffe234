//! 収集からスナップショット保存までを順に実行する。
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::collect::{VideoSource, collect_ids};
use super::genre::GenreClassifier;
use super::modelling::{filter_for_modelling, genre_counts};
use crate::clients::youtube::PublishWindow;
use crate::observability::metrics::Metrics;
use crate::store::snapshot::{RAW_COLUMNS, SnapshotWriter};

/// 1回の実行に必要なパラメータ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub queries: Vec<String>,
    pub max_results_per_query: usize,
    pub window_days: u32,
    pub min_samples: usize,
    pub raw_dir: PathBuf,
    pub preprocessed_dir: PathBuf,
}

/// 完了した実行の集計。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub unique_video_ids: usize,
    pub raw_rows: usize,
    pub tagged_rows: usize,
    pub model_ready_rows: usize,
    pub retained_genres: Vec<String>,
    pub raw_path: PathBuf,
    pub with_genre_path: PathBuf,
    pub preprocessed_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// どのクエリでも動画IDが見つからなかった。ファイルは書き出さない。
    NoVideos,
    Completed(PipelineSummary),
}

/// パイプライン全体を実行する。
///
/// 公開期間は `[now - window_days, now)`。
///
/// # Errors
/// 収集・保存のいずれかが失敗した時点でエラーを返す。途中までの成果は保存されない場合がある。
pub async fn run_pipeline(
    source: &dyn VideoSource,
    classifier: &GenreClassifier,
    options: &PipelineOptions,
    metrics: &Metrics,
    now: DateTime<Utc>,
) -> Result<PipelineOutcome> {
    let window = PublishWindow::trailing_days(now, options.window_days).with_context(|| {
        format!(
            "publish window of {} days before {now} is out of range",
            options.window_days
        )
    })?;
    let writer = SnapshotWriter::new(&options.raw_dir, &options.preprocessed_dir);

    info!(
        queries = options.queries.len(),
        max_results_per_query = options.max_results_per_query,
        window_days = options.window_days,
        "starting collection"
    );

    let collect_timer = metrics.collector_duration.start_timer();
    let ids = collect_ids(
        source,
        &options.queries,
        options.max_results_per_query,
        &window,
    )
    .await?;
    metrics.video_ids_collected.inc_by(ids.len() as u64);

    if ids.is_empty() {
        collect_timer.observe_duration();
        warn!("no video ids found for any query; skipping snapshots");
        return Ok(PipelineOutcome::NoVideos);
    }

    let records = source.fetch_details(&ids).await?;
    collect_timer.observe_duration();
    metrics.videos_fetched.inc_by(records.len() as u64);
    info!(
        requested = ids.len(),
        rows = records.len(),
        columns = RAW_COLUMNS.len(),
        "fetched video details"
    );

    let raw_path = writer.save_raw(&records)?;
    let raw_rows = records.len();

    let classify_timer = metrics.classifier_duration.start_timer();
    let tagged = classifier.classify(records);
    let tagged_count = tagged.iter().filter(|t| t.primary_genre.is_some()).count();
    metrics.videos_tagged.inc_by(tagged_count as u64);
    metrics
        .videos_untagged
        .inc_by((tagged.len() - tagged_count) as u64);
    info!(
        tagged = tagged_count,
        untagged = tagged.len() - tagged_count,
        counts = ?genre_counts(&tagged),
        "classified videos"
    );

    let with_genre_path = writer.save_with_genre(&tagged)?;
    let tagged_rows = tagged.len();

    let model_ready = filter_for_modelling(tagged, options.min_samples);
    classify_timer.observe_duration();
    metrics
        .modelling_rows_retained
        .inc_by(model_ready.len() as u64);

    let preprocessed_path = writer.save_preprocessed(&model_ready)?;

    let mut retained_genres: Vec<String> = Vec::new();
    for genre in model_ready
        .iter()
        .filter_map(|row| row.tagged.primary_genre.as_ref())
    {
        if !retained_genres.contains(genre) {
            retained_genres.push(genre.clone());
        }
    }

    let summary = PipelineSummary {
        unique_video_ids: ids.len(),
        raw_rows,
        tagged_rows,
        model_ready_rows: model_ready.len(),
        retained_genres,
        raw_path,
        with_genre_path,
        preprocessed_path,
    };
    info!(
        model_ready_rows = summary.model_ready_rows,
        genres = ?summary.retained_genres,
        "pipeline completed"
    );

    Ok(PipelineOutcome::Completed(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::collect::VideoRecord;
    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// クエリごとの固定結果を返すスタブ。
    #[derive(Default)]
    struct StubSource {
        results: HashMap<String, Vec<String>>,
        titles: HashMap<String, String>,
        windows: Mutex<Vec<PublishWindow>>,
        fail_details: bool,
    }

    impl StubSource {
        fn with_query(mut self, query: &str, ids: &[(&str, &str)]) -> Self {
            self.results.insert(
                query.to_string(),
                ids.iter().map(|(id, _)| (*id).to_string()).collect(),
            );
            for (id, title) in ids {
                self.titles.insert((*id).to_string(), (*title).to_string());
            }
            self
        }
    }

    #[async_trait]
    impl VideoSource for StubSource {
        async fn search(
            &self,
            query: &str,
            max_results: usize,
            window: &PublishWindow,
        ) -> Result<Vec<String>> {
            self.windows.lock().unwrap().push(*window);
            Ok(self
                .results
                .get(query)
                .map(|ids| ids.iter().take(max_results).cloned().collect())
                .unwrap_or_default())
        }

        async fn fetch_details(&self, ids: &[String]) -> Result<Vec<VideoRecord>> {
            if self.fail_details {
                bail!("details endpoint unavailable");
            }
            Ok(ids
                .iter()
                .map(|id| VideoRecord {
                    video_id: id.clone(),
                    title: self.titles.get(id).cloned(),
                    description: Some(String::new()),
                    tags: String::new(),
                    channel_id: None,
                    channel_title: None,
                    published_at: None,
                    view_count: 10,
                    like_count: 1,
                    comment_count: 0,
                    duration: Some("PT1M".to_string()),
                })
                .collect())
        }
    }

    fn options(dir: &std::path::Path, queries: &[&str], min_samples: usize) -> PipelineOptions {
        PipelineOptions {
            queries: queries.iter().map(|q| (*q).to_string()).collect(),
            max_results_per_query: 10,
            window_days: 90,
            min_samples,
            raw_dir: dir.join("data"),
            preprocessed_dir: dir.join("pre"),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_search_returns_no_videos_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource::default();
        let metrics = Metrics::unregistered();

        let outcome = run_pipeline(
            &source,
            &GenreClassifier::default(),
            &options(dir.path(), &["game indonesia"], 2),
            &metrics,
            now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, PipelineOutcome::NoVideos);
        assert!(!dir.path().join("data").exists());
        assert!(!dir.path().join("pre").exists());
    }

    #[tokio::test]
    async fn completed_run_writes_three_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource::default()
            .with_query(
                "a",
                &[("v1", "Valorant clutch"), ("v2", "vlog"), ("v3", "valorant ace")],
            )
            .with_query("b", &[("v3", "valorant ace"), ("v4", "Minecraft build")]);
        let metrics = Metrics::unregistered();

        let outcome = run_pipeline(
            &source,
            &GenreClassifier::default(),
            &options(dir.path(), &["a", "b"], 2),
            &metrics,
            now(),
        )
        .await
        .unwrap();

        let PipelineOutcome::Completed(summary) = outcome else {
            panic!("expected completed run");
        };
        assert_eq!(summary.unique_video_ids, 4);
        assert_eq!(summary.raw_rows, 4);
        assert_eq!(summary.tagged_rows, 4);
        assert_eq!(summary.model_ready_rows, 2);
        assert_eq!(summary.retained_genres, vec!["FPS"]);
        assert!(summary.raw_path.exists());
        assert!(summary.with_genre_path.exists());
        assert_eq!(
            summary.preprocessed_path,
            dir.path().join("pre").join("videos_preprocessed.csv")
        );

        let preprocessed = std::fs::read_to_string(&summary.preprocessed_path).unwrap();
        assert_eq!(preprocessed.lines().count(), 3);

        assert_eq!(metrics.video_ids_collected.get(), 4);
        assert_eq!(metrics.videos_fetched.get(), 4);
        assert_eq!(metrics.videos_tagged.get(), 3);
        assert_eq!(metrics.videos_untagged.get(), 1);
        assert_eq!(metrics.modelling_rows_retained.get(), 2);
    }

    #[tokio::test]
    async fn window_spans_requested_days() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource::default();
        let metrics = Metrics::unregistered();

        run_pipeline(
            &source,
            &GenreClassifier::default(),
            &options(dir.path(), &["a"], 20),
            &metrics,
            now(),
        )
        .await
        .unwrap();

        let windows = source.windows.lock().unwrap();
        assert_eq!(
            windows[0],
            PublishWindow {
                after: Some(Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap()),
                before: Some(now()),
            }
        );
    }

    #[tokio::test]
    async fn oversized_window_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource::default().with_query("a", &[("v1", "valorant")]);
        let metrics = Metrics::unregistered();
        let mut opts = options(dir.path(), &["a"], 1);
        opts.window_days = u32::MAX;

        let error = run_pipeline(&source, &GenreClassifier::default(), &opts, &metrics, now())
            .await
            .expect_err("window cannot be represented");

        assert!(error.to_string().contains("out of range"));
        assert!(source.windows.lock().unwrap().is_empty());
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn detail_failure_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            fail_details: true,
            ..StubSource::default()
        }
        .with_query("a", &[("v1", "valorant")]);
        let metrics = Metrics::unregistered();

        let result = run_pipeline(
            &source,
            &GenreClassifier::default(),
            &options(dir.path(), &["a"], 1),
            &metrics,
            now(),
        )
        .await;

        assert!(result.is_err());
        assert!(!dir.path().join("data").exists());
    }
}
