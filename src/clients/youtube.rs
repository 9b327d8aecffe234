//! YouTube Data API v3 の search / videos エンドポイント用クライアント。
//!
//! 1リクエスト分の送受信のみを担当し、ページングや待機はコレクター側で行います。
//! 再試行は行いません。非成功ステータスは即座にエラーになります。
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::util::redact::redact;

/// search / videos ともに1リクエストあたりの上限件数。
pub const MAX_PAGE_SIZE: usize = 50;

const SEARCH_ENDPOINT: &str = "search";
const VIDEOS_ENDPOINT: &str = "videos";
const SEARCH_ORDER: &str = "viewCount";
const VIDEO_PARTS: &str = "snippet,statistics,contentDetails";
const ERROR_BODY_LIMIT: usize = 512;

/// APIキー。`Debug` では伏せ字になる。
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", redact(&self.0))
    }
}

/// エンドポイントが非成功ステータスを返したことを表すエラー。
#[derive(Debug, Error)]
pub enum YouTubeApiError {
    #[error("{endpoint} endpoint returned error status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("invalid {field} value {value:?} in {endpoint} response")]
    InvalidCounter {
        endpoint: &'static str,
        field: &'static str,
        value: String,
    },
}

/// 公開日時の絞り込み範囲 `[after, before)`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishWindow {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl PublishWindow {
    /// `now` から遡って `days` 日分の範囲を作る。
    ///
    /// 開始日時が chrono の表現範囲を外れる場合は `None` を返す。
    #[must_use]
    pub fn trailing_days(now: DateTime<Utc>, days: u32) -> Option<Self> {
        let span = ChronoDuration::try_days(i64::from(days))?;
        Some(Self {
            after: Some(now.checked_sub_signed(span)?),
            before: Some(now),
        })
    }
}

/// YouTubeクライアントの設定。
#[derive(Debug, Clone, PartialEq)]
pub struct YouTubeConfig {
    pub base_url: String,
    pub api_key: ApiKey,
    pub region_code: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
    pub request_interval: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchPage {
    #[serde(default)]
    pub(crate) items: Vec<SearchItem>,
    pub(crate) next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchItem {
    #[serde(default)]
    pub(crate) id: SearchItemId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchItemId {
    pub(crate) video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoListPage {
    #[serde(default)]
    pub(crate) items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoItem {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) snippet: VideoSnippet,
    #[serde(default)]
    pub(crate) statistics: VideoStatistics,
    #[serde(default)]
    pub(crate) content_details: VideoContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoSnippet {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    /// 配列以外が来ることもあるので生のJSONで受ける。
    pub(crate) tags: Option<serde_json::Value>,
    pub(crate) channel_id: Option<String>,
    pub(crate) channel_title: Option<String>,
    pub(crate) published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoStatistics {
    pub(crate) view_count: Option<CountValue>,
    pub(crate) like_count: Option<CountValue>,
    pub(crate) comment_count: Option<CountValue>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VideoContentDetails {
    pub(crate) duration: Option<String>,
}

/// 統計値。APIは10進文字列で返すが数値も受け付ける。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum CountValue {
    Number(u64),
    Text(String),
}

impl CountValue {
    pub(crate) fn parse(&self, field: &'static str) -> Result<u64, YouTubeApiError> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Text(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| YouTubeApiError::InvalidCounter {
                    endpoint: VIDEOS_ENDPOINT,
                    field,
                    value: raw.clone(),
                }),
        }
    }
}

/// search / videos エンドポイントと通信するクライアント。
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    client: Client,
    base_url: Url,
    api_key: ApiKey,
    region_code: String,
}

impl YouTubeClient {
    /// 新しいクライアントを作成する。
    ///
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: &YouTubeConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build YouTube HTTP client")?;

        // join() は末尾スラッシュが無いと最後のセグメントを置き換えてしまう
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).context("invalid YouTube API base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            region_code: config.region_code.clone(),
        })
    }

    /// 検索結果を1ページ取得する。
    pub(crate) async fn search_page(
        &self,
        query: &str,
        page_size: usize,
        window: &PublishWindow,
        page_token: Option<&str>,
    ) -> Result<SearchPage> {
        let mut url = self
            .base_url
            .join(SEARCH_ENDPOINT)
            .context("failed to build search URL")?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("key", self.api_key.expose());
            pairs.append_pair("part", "snippet");
            pairs.append_pair("type", "video");
            pairs.append_pair("q", query);
            pairs.append_pair("maxResults", &page_size.to_string());
            pairs.append_pair("order", SEARCH_ORDER);
            pairs.append_pair("regionCode", &self.region_code);

            if let Some(after) = window.after {
                pairs.append_pair("publishedAfter", &format_timestamp(after));
            }
            if let Some(before) = window.before {
                pairs.append_pair("publishedBefore", &format_timestamp(before));
            }
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }

        debug!(query, page_size, page_token = ?page_token, "requesting search page");
        self.get_json(SEARCH_ENDPOINT, url).await
    }

    /// 最大50件の動画IDについて詳細情報を取得する。
    pub(crate) async fn videos_page(&self, ids: &[String]) -> Result<VideoListPage> {
        let mut url = self
            .base_url
            .join(VIDEOS_ENDPOINT)
            .context("failed to build videos URL")?;

        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose())
            .append_pair("part", VIDEO_PARTS)
            .append_pair("id", &ids.join(","));

        debug!(ids = ids.len(), "requesting video details");
        self.get_json(VIDEOS_ENDPOINT, url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str, url: Url) -> Result<T> {
        // URLにAPIキーが含まれるため、reqwestのエラーからはURLを落とす
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("YouTube {endpoint} request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(YouTubeApiError::Status {
                endpoint,
                status,
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            }
            .into());
        }

        response
            .json::<T>()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("failed to deserialize YouTube {endpoint} response"))
    }
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}
