use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, MAX_WINDOW_DAYS};

/// 環境変数による設定をコマンドラインで上書きする。
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about = "Collect gaming videos and tag them by genre", long_about = None)]
pub struct Cli {
    /// Key-value file loaded into the environment before configuration is read
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// Search query (repeatable, replaces COLLECTOR_QUERIES)
    #[arg(long = "query", value_name = "QUERY")]
    pub queries: Vec<String>,

    /// Maximum video ids fetched per query
    #[arg(long)]
    pub max_results: Option<NonZeroUsize>,

    /// Publish window in days, counted back from now
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_WINDOW_DAYS)))]
    pub window_days: Option<u32>,

    /// Minimum rows a genre needs to stay in the model-ready snapshot
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Directory for the raw and genre-tagged snapshots
    #[arg(long)]
    pub raw_dir: Option<PathBuf>,

    /// Directory for the model-ready snapshot
    #[arg(long)]
    pub preprocessed_dir: Option<PathBuf>,
}

impl Cli {
    /// 指定されたオプションだけを `config` に反映する。
    #[must_use]
    pub fn apply(&self, mut config: Config) -> Config {
        if !self.queries.is_empty() {
            config = config.with_queries(self.queries.clone());
        }
        if let Some(max_results) = self.max_results {
            config = config.with_max_results_per_query(max_results);
        }
        if let Some(days) = self.window_days {
            config = config.with_window_days(days);
        }
        if let Some(min_samples) = self.min_samples {
            config = config.with_min_samples(min_samples);
        }
        if let Some(dir) = &self.raw_dir {
            config = config.with_raw_output_dir(dir.clone());
        }
        if let Some(dir) = &self.preprocessed_dir {
            config = config.with_preprocessed_output_dir(dir.clone());
        }
        config
    }
}
