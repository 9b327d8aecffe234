//! ジャンル分類用キーワードテーブル。
//!
//! ジャンル名とキーワード列の対応を宣言順のまま保持します。
//! 構築後は変更されず、分類結果のジャンル順もこの宣言順に従います。
use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

/// 1ジャンル分のキーワード定義。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenreEntry {
    pub genre: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenreTableError {
    #[error("genre table must contain at least one genre")]
    Empty,
    #[error("genre {0:?} is declared more than once")]
    DuplicateGenre(String),
    #[error("genre {genre:?} contains an empty keyword")]
    EmptyKeyword { genre: String },
}

/// ジャンル → キーワード列のテーブル。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreKeywords {
    entries: Vec<GenreEntry>,
}

impl GenreKeywords {
    /// エントリ列からテーブルを構築する。
    ///
    /// # Errors
    /// 空のテーブル、重複したジャンル名、空文字のキーワードを含む場合はエラーを返す。
    pub fn new(entries: Vec<GenreEntry>) -> Result<Self, GenreTableError> {
        if entries.is_empty() {
            return Err(GenreTableError::Empty);
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.genre.as_str()) {
                return Err(GenreTableError::DuplicateGenre(entry.genre.clone()));
            }
            // 空キーワードは全テキストに部分一致してしまう
            if entry.keywords.iter().any(|kw| kw.trim().is_empty()) {
                return Err(GenreTableError::EmptyKeyword {
                    genre: entry.genre.clone(),
                });
            }
        }

        Ok(Self { entries })
    }

    /// 組み込みのキーワードテーブルを構築する。
    #[must_use]
    pub fn default_keywords() -> Self {
        let entries = vec![
            entry(
                "MOBA",
                &[
                    "mobile legends",
                    "mlbb",
                    "arena of valor",
                    "aov",
                    "league of legends",
                    "lol pc",
                    "wild rift",
                    "dota 2",
                    "ml",
                    "dota",
                ],
            ),
            entry(
                "FPS",
                &[
                    "valorant",
                    "csgo",
                    "counter strike",
                    "cs2",
                    "call of duty",
                    "codm",
                    "apex legends",
                    "overwatch",
                    "valo",
                    "delta force",
                ],
            ),
            entry(
                "Battle Royale",
                &["pubg", "pubg mobile", "free fire", "ff", "fortnite", "warzone"],
            ),
            entry(
                "RPG",
                &[
                    "genshin impact",
                    "honkai star rail",
                    "star rail",
                    "zenless zone zero",
                    "zzz",
                    "elden ring",
                    "final fantasy",
                    "persona",
                    "rpg",
                ],
            ),
            entry(
                "Horror",
                &[
                    "outlast",
                    "amnesia",
                    "phasmophobia",
                    "poppy playtime",
                    "fnaf",
                    "five nights at freddy",
                    "horror game",
                    "game horror",
                ],
            ),
            entry("Sandbox", &["minecraft", "roblox", "terraria", "sandbox"]),
            entry(
                "Sports",
                &["fifa", "ea fc", "pes", "efootball", "nba 2k", "football manager"],
            ),
            entry(
                "Racing",
                &[
                    "forza",
                    "gran turismo",
                    "need for speed",
                    "nfs",
                    "f1 23",
                    "f1 24",
                    "assetto corsa",
                ],
            ),
            entry(
                "Strategy",
                &[
                    "age of empires",
                    "civilization",
                    "clash of clans",
                    "coc",
                    "clash royale",
                    "strategy game",
                ],
            ),
            entry(
                "Casual/Party",
                &["stumble guys", "fall guys", "party game", "jackbox"],
            ),
            entry(
                "Simulation",
                &[
                    "bus simulator",
                    "truck simulator",
                    "ets2",
                    "euro truck",
                    "simulator",
                    "driving simulator",
                    "farming simulator",
                    "train simulator",
                    "flight simulator",
                ],
            ),
        ];

        Self { entries }
    }

    /// YAML文字列からテーブルを読み込む。
    ///
    /// 形式は `- genre: MOBA\n  keywords: [mlbb, dota]` のようなシーケンス。
    ///
    /// # Errors
    /// YAMLのパースまたは検証に失敗した場合はエラーを返す。
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let entries: Vec<GenreEntry> =
            serde_yaml::from_str(raw).context("failed to parse genre keyword YAML")?;
        Ok(Self::new(entries)?)
    }

    /// YAMLファイルからテーブルを読み込む。
    ///
    /// # Errors
    /// ファイルの読み込み、パース、検証のいずれかに失敗した場合はエラーを返す。
    pub fn from_yaml_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read genre keywords from {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("invalid genre keyword table in {}", path.display()))
    }

    #[must_use]
    pub fn entries(&self) -> &[GenreEntry] {
        &self.entries
    }

    /// ジャンル名を宣言順に返す。
    pub fn genres(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.genre.as_str())
    }
}

impl Default for GenreKeywords {
    fn default() -> Self {
        Self::default_keywords()
    }
}

fn entry(genre: &str, keywords: &[&str]) -> GenreEntry {
    GenreEntry {
        genre: genre.to_string(),
        keywords: keywords.iter().map(|kw| (*kw).to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords_for<'a>(table: &'a GenreKeywords, genre: &str) -> Option<&'a [String]> {
        table
            .entries()
            .iter()
            .find(|entry| entry.genre == genre)
            .map(|entry| entry.keywords.as_slice())
    }

    #[test]
    fn default_table_follows_declared_genre_order() {
        let table = GenreKeywords::default_keywords();
        assert_eq!(
            table.genres().collect::<Vec<_>>(),
            vec![
                "MOBA",
                "FPS",
                "Battle Royale",
                "RPG",
                "Horror",
                "Sandbox",
                "Sports",
                "Racing",
                "Strategy",
                "Casual/Party",
                "Simulation",
            ]
        );
    }

    #[test]
    fn default_table_passes_validation() {
        let table = GenreKeywords::default_keywords();
        let rebuilt = GenreKeywords::new(table.entries().to_vec()).expect("valid table");
        assert_eq!(rebuilt, table);
    }

    #[test]
    fn keywords_for_returns_declared_list() {
        let table = GenreKeywords::default_keywords();
        assert_eq!(
            keywords_for(&table, "Sandbox"),
            Some(
                &[
                    "minecraft".to_string(),
                    "roblox".to_string(),
                    "terraria".to_string(),
                    "sandbox".to_string()
                ][..]
            )
        );
        assert!(keywords_for(&table, "Puzzle").is_none());
    }

    #[test]
    fn yaml_table_preserves_order() {
        let table = GenreKeywords::from_yaml_str(
            r"
- genre: Racing
  keywords: [forza]
- genre: MOBA
  keywords: [mlbb, dota]
",
        )
        .expect("yaml table");

        assert_eq!(table.genres().collect::<Vec<_>>(), vec!["Racing", "MOBA"]);
        assert_eq!(keywords_for(&table, "MOBA").map(<[String]>::len), Some(2));
    }

    #[test]
    fn rejects_duplicate_and_empty_entries() {
        assert_eq!(GenreKeywords::new(Vec::new()), Err(GenreTableError::Empty));
        assert_eq!(
            GenreKeywords::new(vec![entry("FPS", &["valorant"]), entry("FPS", &["cs2"])]),
            Err(GenreTableError::DuplicateGenre("FPS".to_string()))
        );
        assert_eq!(
            GenreKeywords::new(vec![entry("FPS", &["valorant", " "])]),
            Err(GenreTableError::EmptyKeyword {
                genre: "FPS".to_string()
            })
        );
    }

    #[test]
    fn yaml_path_reports_missing_file() {
        let error = GenreKeywords::from_yaml_path(Path::new("/nonexistent/genres.yaml"))
            .expect_err("missing file");
        assert!(error.to_string().contains("failed to read genre keywords"));
    }
}
