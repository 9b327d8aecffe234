use std::{
    env,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;

use crate::clients::youtube::{ApiKey, YouTubeConfig};
use crate::pipeline::modelling::DEFAULT_MIN_SAMPLES;
use crate::pipeline::orchestrator::PipelineOptions;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

/// 公開期間の上限日数（100年）。
pub const MAX_WINDOW_DAYS: u32 = 36_500;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";
const DEFAULT_QUERIES: &str =
    "game indonesia,gaming indonesia,mobile game indonesia,pc game indonesia";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    api_key: ApiKey,
    youtube_base_url: String,
    region_code: String,
    connect_timeout: Duration,
    total_timeout: Duration,
    request_interval: Duration,
    queries: Vec<String>,
    max_results_per_query: NonZeroUsize,
    window_days: u32,
    min_samples: usize,
    raw_output_dir: PathBuf,
    preprocessed_output_dir: PathBuf,
    genre_keywords_path: Option<PathBuf>,
    metrics_textfile_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to load env file {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// キー・値形式のファイルから環境変数を読み込む。
///
/// 既に設定済みの環境変数は上書きしない。ファイルが無ければ何もせず `false` を返す。
///
/// # Errors
/// ファイルは存在するが読み込みや解析に失敗した場合は [`ConfigError::EnvFile`] を返す。
pub fn load_env_file(path: &Path) -> Result<bool, ConfigError> {
    if !path.is_file() {
        return Ok(false);
    }
    dotenvy::from_path(path).map_err(|source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

impl Config {
    /// 環境変数から収集パイプラインの設定値を読み込み、検証する。
    ///
    /// ネットワークアクセスの前に呼び出し、APIキーが無ければここで失敗させる。
    ///
    /// # Errors
    /// `YOUTUBE_API_KEY` が未設定または空、もしくは各種値のパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = ApiKey::new(env_var("YOUTUBE_API_KEY")?);
        let youtube_base_url =
            env::var("YOUTUBE_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let region_code = env::var("YOUTUBE_REGION_CODE").unwrap_or_else(|_| "ID".to_string());
        let connect_timeout = parse_duration_ms("YOUTUBE_CONNECT_TIMEOUT_MS", 3_000)?;
        let total_timeout = parse_duration_ms("YOUTUBE_TOTAL_TIMEOUT_MS", 30_000)?;
        let request_interval = parse_duration_ms("COLLECTOR_REQUEST_INTERVAL_MS", 200)?;
        let queries = parse_csv("COLLECTOR_QUERIES", DEFAULT_QUERIES);
        let max_results_per_query = parse_non_zero_usize("COLLECTOR_MAX_RESULTS_PER_QUERY", 200)?;
        let window_days = parse_window_days("COLLECTOR_WINDOW_DAYS", 90)?;
        let min_samples = parse_usize("MODEL_MIN_SAMPLES", DEFAULT_MIN_SAMPLES)?;
        let raw_output_dir = parse_path("RAW_OUTPUT_DIR", "data");
        let preprocessed_output_dir =
            parse_path("PREPROCESSED_OUTPUT_DIR", "preprocessing/data_preprocessing");
        let genre_keywords_path = optional_path("GENRE_KEYWORDS_PATH");
        let metrics_textfile_path = optional_path("METRICS_TEXTFILE_PATH");

        if queries.is_empty() {
            return Err(ConfigError::Invalid {
                name: "COLLECTOR_QUERIES",
                source: anyhow::anyhow!("at least one query is required"),
            });
        }

        Ok(Self {
            api_key,
            youtube_base_url,
            region_code,
            connect_timeout,
            total_timeout,
            request_interval,
            queries,
            max_results_per_query,
            window_days,
            min_samples,
            raw_output_dir,
            preprocessed_output_dir,
            genre_keywords_path,
            metrics_textfile_path,
        })
    }

    #[must_use]
    pub fn genre_keywords_path(&self) -> Option<&Path> {
        self.genre_keywords_path.as_deref()
    }

    #[must_use]
    pub fn metrics_textfile_path(&self) -> Option<&Path> {
        self.metrics_textfile_path.as_deref()
    }

    #[must_use]
    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        self.queries = queries;
        self
    }

    #[must_use]
    pub fn with_max_results_per_query(mut self, max_results: NonZeroUsize) -> Self {
        self.max_results_per_query = max_results;
        self
    }

    #[must_use]
    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    #[must_use]
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    #[must_use]
    pub fn with_raw_output_dir(mut self, dir: PathBuf) -> Self {
        self.raw_output_dir = dir;
        self
    }

    #[must_use]
    pub fn with_preprocessed_output_dir(mut self, dir: PathBuf) -> Self {
        self.preprocessed_output_dir = dir;
        self
    }

    /// HTTPクライアント用の設定を組み立てる。
    #[must_use]
    pub fn collector_config(&self) -> YouTubeConfig {
        YouTubeConfig {
            base_url: self.youtube_base_url.clone(),
            api_key: self.api_key.clone(),
            region_code: self.region_code.clone(),
            connect_timeout: self.connect_timeout,
            total_timeout: self.total_timeout,
            request_interval: self.request_interval,
        }
    }

    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            queries: self.queries.clone(),
            max_results_per_query: self.max_results_per_query.get(),
            window_days: self.window_days,
            min_samples: self.min_samples,
            raw_dir: self.raw_output_dir.clone(),
            preprocessed_dir: self.preprocessed_output_dir.clone(),
        }
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let parsed = parse_usize(name, default)?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default_ms.to_string());
    let ms = raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    Ok(Duration::from_millis(ms))
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_window_days(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let days = raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    if days > MAX_WINDOW_DAYS {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must be at most {MAX_WINDOW_DAYS} days"),
        });
    }
    Ok(days)
}

fn parse_csv(name: &'static str, default: &str) -> Vec<String> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_path(name: &'static str, default: &str) -> PathBuf {
    env::var_os(name).map_or_else(|| PathBuf::from(default), PathBuf::from)
}

fn optional_path(name: &'static str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
