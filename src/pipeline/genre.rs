//! キーワードの部分一致によるジャンル付与。
//!
//! トークン化やステミングは行わず、小文字化したテキストへの単純な部分文字列検索のみ。
//! そのため "ml" のような短いキーワードは無関係な単語の一部にも一致する。
use tracing::debug;

use super::collect::VideoRecord;
use super::genre_keywords::GenreKeywords;

/// ジャンル情報を付与したレコード。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedRecord {
    pub record: VideoRecord,
    /// 一致したジャンル（テーブルの宣言順、重複なし）。
    pub genres_list: Vec<String>,
    /// `genres_list` の先頭要素。一致なしなら `None`。
    pub primary_genre: Option<String>,
}

/// 小文字化済みキーワードを保持する分類器。
#[derive(Debug, Clone)]
pub struct GenreClassifier {
    table: Vec<(String, Vec<String>)>,
}

impl GenreClassifier {
    #[must_use]
    pub fn new(keywords: &GenreKeywords) -> Self {
        let table = keywords
            .entries()
            .iter()
            .map(|entry| {
                (
                    entry.genre.clone(),
                    entry.keywords.iter().map(|kw| kw.to_lowercase()).collect(),
                )
            })
            .collect();
        Self { table }
    }

    /// タイトル・説明・タグから一致するジャンルを検出する。
    ///
    /// 空でないフィールドだけを空白1つで連結して小文字化し、
    /// ジャンルごとに最初に一致したキーワードで次のジャンルへ進む。
    #[must_use]
    pub fn detect_genres(
        &self,
        title: Option<&str>,
        description: Option<&str>,
        tags: Option<&str>,
    ) -> Vec<String> {
        let parts: Vec<&str> = [title, description, tags]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            return Vec::new();
        }

        let text = parts.join(" ").to_lowercase();

        self.table
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw.as_str())))
            .map(|(genre, _)| genre.clone())
            .collect()
    }

    /// 1件のレコードにジャンル情報を付与する。
    #[must_use]
    pub fn tag(&self, record: VideoRecord) -> TaggedRecord {
        let genres_list = self.detect_genres(
            record.title.as_deref(),
            record.description.as_deref(),
            Some(record.tags.as_str()),
        );
        let primary_genre = genres_list.first().cloned();

        debug!(
            video_id = %record.video_id,
            genres = ?genres_list,
            "tagged video"
        );

        TaggedRecord {
            record,
            genres_list,
            primary_genre,
        }
    }

    /// 全レコードにジャンル情報を付与する。入力順は保持される。
    #[must_use]
    pub fn classify(&self, records: Vec<VideoRecord>) -> Vec<TaggedRecord> {
        records.into_iter().map(|record| self.tag(record)).collect()
    }
}

impl Default for GenreClassifier {
    fn default() -> Self {
        Self::new(&GenreKeywords::default_keywords())
    }
}
