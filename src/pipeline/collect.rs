use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::clients::youtube::{
    CountValue, MAX_PAGE_SIZE, PublishWindow, VideoItem, YouTubeApiError, YouTubeClient,
    YouTubeConfig,
};
use crate::observability::metrics::Metrics;

/// 詳細エンドポイントから組み立てた動画1件分のレコード。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// `|` 区切りで連結したタグ。タグが無ければ空文字列。
    pub tags: String,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    /// ISO 8601 形式の再生時間（例: `PT12M3S`）。
    pub duration: Option<String>,
}

/// 動画IDの検索と詳細取得を行うデータソース。
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// `query` の検索結果から動画IDを最大 `max_results` 件取得する。
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        window: &PublishWindow,
    ) -> Result<Vec<String>>;

    /// 動画IDごとの詳細レコードを取得する。
    async fn fetch_details(&self, ids: &[String]) -> Result<Vec<VideoRecord>>;
}

/// YouTube Data API を使うコレクター。
///
/// リクエストは逐次的に行い、ページ／チャンクの間に固定の待機を挟む。
#[derive(Debug, Clone)]
pub struct YouTubeCollector {
    client: YouTubeClient,
    request_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl YouTubeCollector {
    /// # Errors
    /// HTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: &YouTubeConfig) -> Result<Self> {
        Ok(Self {
            client: YouTubeClient::new(config)?,
            request_interval: config.request_interval,
            metrics: None,
        })
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn pause(&self) {
        if !self.request_interval.is_zero() {
            tokio::time::sleep(self.request_interval).await;
        }
    }
}

#[async_trait]
impl VideoSource for YouTubeCollector {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        window: &PublishWindow,
    ) -> Result<Vec<String>> {
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;
        let mut fetched = 0usize;

        while fetched < max_results {
            let page_size = MAX_PAGE_SIZE.min(max_results - fetched);
            let page = self
                .client
                .search_page(query, page_size, window, page_token.as_deref())
                .await
                .with_context(|| format!("search failed for query {query:?}"))?;

            if let Some(metrics) = &self.metrics {
                metrics.search_requests.inc();
            }

            // 要求した件数を超えて返ってきた分は捨てる
            let items = page.items.len().min(page_size);
            video_ids.extend(
                page.items
                    .into_iter()
                    .take(page_size)
                    .filter_map(|item| item.id.video_id),
            );
            fetched += items;

            debug!(query, page_items = items, fetched, "fetched search page");

            // 空ページで次トークンだけ返るケースでは打ち切る
            if items == 0 {
                break;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }

            self.pause().await;
        }

        Ok(dedup_preserving_order(video_ids))
    }

    async fn fetch_details(&self, ids: &[String]) -> Result<Vec<VideoRecord>> {
        let mut records = Vec::with_capacity(ids.len());

        for (index, chunk) in ids.chunks(MAX_PAGE_SIZE).enumerate() {
            let page = self
                .client
                .videos_page(chunk)
                .await
                .with_context(|| format!("video details request failed for chunk {index}"))?;

            if let Some(metrics) = &self.metrics {
                metrics.detail_requests.inc();
            }

            debug!(
                chunk = index,
                requested = chunk.len(),
                returned = page.items.len(),
                "fetched video details"
            );

            for item in page.items {
                records.push(into_record(item)?);
            }

            self.pause().await;
        }

        Ok(records)
    }
}

/// 全クエリを順に検索し、初出順を保ったまま重複を除いた動画IDを返す。
///
/// # Errors
/// いずれかの検索が失敗した時点でエラーを返す（部分結果は返さない）。
pub async fn collect_ids(
    source: &dyn VideoSource,
    queries: &[String],
    max_results: usize,
    window: &PublishWindow,
) -> Result<Vec<String>> {
    let mut all_ids = Vec::new();

    for query in queries {
        info!(query = %query, "searching videos");
        let ids = source.search(query, max_results, window).await?;
        info!(query = %query, video_ids = ids.len(), "search finished");
        all_ids.extend(ids);
    }

    let unique = dedup_preserving_order(all_ids);
    info!(unique_video_ids = unique.len(), "collected unique video ids");
    Ok(unique)
}

/// 最初に出現したものを残して重複を取り除く。順序は保持される。
#[must_use]
pub fn dedup_preserving_order<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn into_record(item: VideoItem) -> Result<VideoRecord> {
    let VideoItem {
        id,
        snippet,
        statistics,
        content_details,
    } = item;

    let view_count = count(statistics.view_count.as_ref(), "viewCount")?;
    let like_count = count(statistics.like_count.as_ref(), "likeCount")?;
    let comment_count = count(statistics.comment_count.as_ref(), "commentCount")?;

    Ok(VideoRecord {
        video_id: id,
        title: snippet.title,
        description: snippet.description,
        tags: join_tags(snippet.tags.as_ref()),
        channel_id: snippet.channel_id,
        channel_title: snippet.channel_title,
        published_at: snippet.published_at,
        view_count,
        like_count,
        comment_count,
        duration: content_details.duration,
    })
}

/// 統計値が無ければ0として扱う。
fn count(value: Option<&CountValue>, field: &'static str) -> Result<u64, YouTubeApiError> {
    value.map_or(Ok(0), |v| v.parse(field))
}

/// タグ配列を `|` で連結する。配列でなければ空文字列。
fn join_tags(tags: Option<&serde_json::Value>) -> String {
    match tags {
        Some(serde_json::Value::Array(values)) => values
            .iter()
            .filter_map(serde_json::Value::as_str)
            .collect::<Vec<_>>()
            .join("|"),
        _ => String::new(),
    }
}
