//! パイプライン各段階のCSVスナップショット。
//!
//! 3つのファイルは列が段階的に増える構成で、ヘッダー行は0件でも必ず書き出す。
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::pipeline::collect::VideoRecord;
use crate::pipeline::genre::TaggedRecord;
use crate::pipeline::modelling::ModelReadyRecord;

pub const RAW_FILE_NAME: &str = "videos_raw.csv";
pub const WITH_GENRE_FILE_NAME: &str = "videos_with_genre.csv";
pub const PREPROCESSED_FILE_NAME: &str = "videos_preprocessed.csv";

pub const RAW_COLUMNS: [&str; 11] = [
    "video_id",
    "title",
    "description",
    "tags",
    "channel_id",
    "channel_title",
    "published_at",
    "view_count",
    "like_count",
    "comment_count",
    "duration",
];

pub const GENRE_COLUMNS: [&str; 2] = ["genres_list", "primary_genre"];

pub const TEXT_COLUMN: &str = "text";

/// 生データの行を書き出す。
///
/// # Errors
/// シリアライズまたは書き込みに失敗した場合はエラーを返す。
pub fn write_raw<W: io::Write>(writer: W, records: &[VideoRecord]) -> Result<W> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(RAW_COLUMNS)
        .context("failed to write raw header")?;
    for record in records {
        csv.write_record(raw_fields(record))
            .with_context(|| format!("failed to write raw row for {}", record.video_id))?;
    }
    finish(csv)
}

/// ジャンル列を追加した行を書き出す。
///
/// # Errors
/// シリアライズまたは書き込みに失敗した場合はエラーを返す。
pub fn write_with_genre<W: io::Write>(writer: W, records: &[TaggedRecord]) -> Result<W> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(RAW_COLUMNS.iter().chain(GENRE_COLUMNS.iter()))
        .context("failed to write genre header")?;
    for tagged in records {
        csv.write_record(tagged_fields(tagged)?)
            .with_context(|| format!("failed to write genre row for {}", tagged.record.video_id))?;
    }
    finish(csv)
}

/// 学習用の行を書き出す。
///
/// # Errors
/// シリアライズまたは書き込みに失敗した場合はエラーを返す。
pub fn write_preprocessed<W: io::Write>(writer: W, records: &[ModelReadyRecord]) -> Result<W> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(
        RAW_COLUMNS
            .iter()
            .chain(GENRE_COLUMNS.iter())
            .chain(std::iter::once(&TEXT_COLUMN)),
    )
    .context("failed to write preprocessed header")?;
    for row in records {
        let mut fields = tagged_fields(&row.tagged)?;
        fields.push(row.text.clone());
        csv.write_record(fields).with_context(|| {
            format!(
                "failed to write preprocessed row for {}",
                row.tagged.record.video_id
            )
        })?;
    }
    finish(csv)
}

/// 出力先ディレクトリを保持し、各スナップショットをファイルへ保存する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotWriter {
    raw_dir: PathBuf,
    preprocessed_dir: PathBuf,
}

impl SnapshotWriter {
    #[must_use]
    pub fn new(raw_dir: impl Into<PathBuf>, preprocessed_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            preprocessed_dir: preprocessed_dir.into(),
        }
    }

    #[must_use]
    pub fn raw_path(&self) -> PathBuf {
        self.raw_dir.join(RAW_FILE_NAME)
    }

    #[must_use]
    pub fn with_genre_path(&self) -> PathBuf {
        self.raw_dir.join(WITH_GENRE_FILE_NAME)
    }

    #[must_use]
    pub fn preprocessed_path(&self) -> PathBuf {
        self.preprocessed_dir.join(PREPROCESSED_FILE_NAME)
    }

    /// # Errors
    /// ディレクトリ作成または書き込みに失敗した場合はエラーを返す。
    pub fn save_raw(&self, records: &[VideoRecord]) -> Result<PathBuf> {
        let path = self.raw_path();
        write_raw(create(&path)?, records)?;
        info!(path = %path.display(), rows = records.len(), "saved raw snapshot");
        Ok(path)
    }

    /// # Errors
    /// ディレクトリ作成または書き込みに失敗した場合はエラーを返す。
    pub fn save_with_genre(&self, records: &[TaggedRecord]) -> Result<PathBuf> {
        let path = self.with_genre_path();
        write_with_genre(create(&path)?, records)?;
        info!(path = %path.display(), rows = records.len(), "saved genre snapshot");
        Ok(path)
    }

    /// # Errors
    /// ディレクトリ作成または書き込みに失敗した場合はエラーを返す。
    pub fn save_preprocessed(&self, records: &[ModelReadyRecord]) -> Result<PathBuf> {
        let path = self.preprocessed_path();
        write_preprocessed(create(&path)?, records)?;
        info!(path = %path.display(), rows = records.len(), "saved preprocessed snapshot");
        Ok(path)
    }
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

fn finish<W: io::Write>(csv: csv::Writer<W>) -> Result<W> {
    csv.into_inner()
        .map_err(|err| anyhow!("failed to flush csv output: {}", err.error()))
}

fn raw_fields(record: &VideoRecord) -> Vec<String> {
    vec![
        record.video_id.clone(),
        record.title.clone().unwrap_or_default(),
        record.description.clone().unwrap_or_default(),
        record.tags.clone(),
        record.channel_id.clone().unwrap_or_default(),
        record.channel_title.clone().unwrap_or_default(),
        record.published_at.map(format_timestamp).unwrap_or_default(),
        record.view_count.to_string(),
        record.like_count.to_string(),
        record.comment_count.to_string(),
        record.duration.clone().unwrap_or_default(),
    ]
}

fn tagged_fields(tagged: &TaggedRecord) -> Result<Vec<String>> {
    let mut fields = raw_fields(&tagged.record);
    fields.push(
        serde_json::to_string(&tagged.genres_list).context("failed to encode genres_list")?,
    );
    fields.push(tagged.primary_genre.clone().unwrap_or_default());
    Ok(fields)
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}
