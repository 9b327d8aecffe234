use std::collections::HashMap;

use tracing::info;

use super::collect::VideoRecord;
use super::genre::TaggedRecord;

/// ジャンルごとの最小サンプル数の既定値。
pub const DEFAULT_MIN_SAMPLES: usize = 20;

/// 学習用に残したレコード。`text` はタイトル・説明・タグの連結。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReadyRecord {
    pub tagged: TaggedRecord,
    pub text: String,
}

/// `primary_genre` ごとの件数。件数の降順、同数ならジャンル名の昇順。
#[must_use]
pub fn genre_counts(records: &[TaggedRecord]) -> Vec<(String, usize)> {
    count_primary(records)
}

fn count_primary<'a>(records: impl IntoIterator<Item = &'a TaggedRecord>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for genre in records
        .into_iter()
        .filter_map(|r| r.primary_genre.as_deref())
    {
        *counts.entry(genre).or_insert(0) += 1;
    }

    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(genre, count)| (genre.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// 学習用データを作る。
///
/// 1. `primary_genre` が無い行を落とす
/// 2. 件数が `min_samples` 未満のジャンルの行を落とす
/// 3. `text` 列を付与する
#[must_use]
pub fn filter_for_modelling(records: Vec<TaggedRecord>, min_samples: usize) -> Vec<ModelReadyRecord> {
    let before = records.len();
    let tagged: Vec<TaggedRecord> = records
        .into_iter()
        .filter(|r| r.primary_genre.is_some())
        .collect();

    info!(before, after = tagged.len(), "dropped rows without genre");

    let counts = genre_counts(&tagged);
    let valid: Vec<&str> = counts
        .iter()
        .filter(|(_, count)| *count >= min_samples)
        .map(|(genre, _)| genre.as_str())
        .collect();

    info!(min_samples, genres = ?valid, "selected genres for modelling");

    let retained: Vec<ModelReadyRecord> = tagged
        .into_iter()
        .filter(|r| {
            r.primary_genre
                .as_deref()
                .is_some_and(|genre| valid.contains(&genre))
        })
        .map(|tagged| {
            let text = combine_text(&tagged.record);
            ModelReadyRecord { tagged, text }
        })
        .collect();

    let retained_counts = count_primary(retained.iter().map(|r| &r.tagged));
    info!(
        rows = retained.len(),
        counts = ?retained_counts,
        "model-ready rows prepared"
    );

    retained
}

/// タイトル・説明・タグを空白1つで連結する。
///
/// 値が無いフィールドは飛ばすが、空文字列はそのまま含める。
#[must_use]
pub fn combine_text(record: &VideoRecord) -> String {
    [
        record.title.as_deref(),
        record.description.as_deref(),
        Some(record.tags.as_str()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(id: &str, primary: Option<&str>) -> TaggedRecord {
        TaggedRecord {
            record: VideoRecord {
                video_id: id.to_string(),
                title: Some(format!("title {id}")),
                description: None,
                tags: String::new(),
                channel_id: None,
                channel_title: None,
                published_at: None,
                view_count: 0,
                like_count: 0,
                comment_count: 0,
                duration: None,
            },
            genres_list: primary.map(|g| vec![g.to_string()]).unwrap_or_default(),
            primary_genre: primary.map(String::from),
        }
    }

    fn corpus(counts: &[(&str, usize)], untagged: usize) -> Vec<TaggedRecord> {
        let mut records = Vec::new();
        for (genre, n) in counts {
            for i in 0..*n {
                records.push(tagged(&format!("{genre}-{i}"), Some(genre)));
            }
        }
        for i in 0..untagged {
            records.push(tagged(&format!("none-{i}"), None));
        }
        records
    }

    #[test]
    fn genre_with_nineteen_rows_is_excluded_at_twenty() {
        let records = corpus(&[("FPS", 19), ("MOBA", 25)], 3);

        let at_twenty = filter_for_modelling(records.clone(), 20);
        assert_eq!(at_twenty.len(), 25);
        assert!(
            at_twenty
                .iter()
                .all(|r| r.tagged.primary_genre.as_deref() == Some("MOBA"))
        );

        let at_nineteen = filter_for_modelling(records, 19);
        assert_eq!(at_nineteen.len(), 44);
    }

    #[test]
    fn untagged_rows_are_always_dropped() {
        let records = corpus(&[], 5);
        assert!(filter_for_modelling(records.clone(), 0).is_empty());
        assert!(filter_for_modelling(records, 20).is_empty());
    }

    #[test]
    fn raising_threshold_never_grows_output() {
        let records = corpus(&[("FPS", 3), ("MOBA", 7), ("RPG", 12), ("Horror", 1)], 4);
        let mut previous = usize::MAX;
        for min_samples in 0..15 {
            let rows = filter_for_modelling(records.clone(), min_samples).len();
            assert!(rows <= previous, "min_samples={min_samples}");
            previous = rows;
        }
    }

    #[test]
    fn filtering_keeps_input_order() {
        let mut records = corpus(&[("FPS", 2)], 0);
        records.insert(1, tagged("moba-0", Some("MOBA")));

        let ids: Vec<String> = filter_for_modelling(records, 1)
            .into_iter()
            .map(|r| r.tagged.record.video_id)
            .collect();

        assert_eq!(ids, vec!["FPS-0", "moba-0", "FPS-1"]);
    }

    #[test]
    fn genre_counts_sorted_by_count_then_name() {
        let records = corpus(&[("RPG", 2), ("FPS", 3), ("MOBA", 2)], 1);
        assert_eq!(
            genre_counts(&records),
            vec![
                ("FPS".to_string(), 3),
                ("MOBA".to_string(), 2),
                ("RPG".to_string(), 2)
            ]
        );
    }

    #[test]
    fn combine_text_skips_absent_fields_only() {
        let mut record = tagged("x", Some("FPS")).record;
        record.title = Some("Valorant".to_string());
        record.description = None;
        record.tags = "valorant|fps".to_string();
        assert_eq!(combine_text(&record), "Valorant valorant|fps");

        record.description = Some(String::new());
        record.tags = String::new();
        assert_eq!(combine_text(&record), "Valorant  ");
    }

    #[test]
    fn model_ready_rows_carry_text() {
        let records = corpus(&[("FPS", 1)], 0);
        let rows = filter_for_modelling(records, 1);
        assert_eq!(rows[0].text, "title FPS-0 ");
    }
}
