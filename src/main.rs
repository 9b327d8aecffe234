use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

use gaming_genre_collector::{
    cli::Cli,
    config::{Config, load_env_file},
    observability::{self, Telemetry},
    pipeline::{GenreClassifier, GenreKeywords, PipelineOutcome, YouTubeCollector, run_pipeline},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            error!(
                thread = thread_name,
                message, "panic occurred without location information"
            );
        }
    }));

    let cli = Cli::parse();
    // LOG_FORMAT などもファイルから読めるよう、トレーシング初期化より先に読み込む
    let env_file_loaded = load_env_file(&cli.env_file)?;

    let telemetry = Telemetry::new().context("failed to initialize telemetry")?;
    info!(
        env_file = %cli.env_file.display(),
        loaded = env_file_loaded,
        "environment prepared"
    );

    let config = cli.apply(Config::from_env().context("failed to load configuration")?);

    let keywords = match config.genre_keywords_path() {
        Some(path) => GenreKeywords::from_yaml_path(path)?,
        None => GenreKeywords::default_keywords(),
    };
    info!(
        genres = ?keywords.genres().collect::<Vec<_>>(),
        custom = config.genre_keywords_path().is_some(),
        "genre table loaded"
    );
    let classifier = GenreClassifier::new(&keywords);

    let collector = YouTubeCollector::new(&config.collector_config())
        .context("failed to build YouTube collector")?
        .with_metrics(telemetry.metrics());

    let result = run_pipeline(
        &collector,
        &classifier,
        &config.pipeline_options(),
        &telemetry.metrics(),
        Utc::now(),
    )
    .await;

    if let Some(path) = config.metrics_textfile_path() {
        if let Err(error) = telemetry.write_textfile(path) {
            warn!(error = %error, "failed to write metrics textfile");
        }
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(error) => {
            error!(error = ?error, "pipeline failed");
            observability::tracing::shutdown();
            return Err(error);
        }
    };

    match outcome {
        PipelineOutcome::NoVideos => warn!("no videos collected; nothing was written"),
        PipelineOutcome::Completed(summary) => info!(
            unique_video_ids = summary.unique_video_ids,
            raw_rows = summary.raw_rows,
            model_ready_rows = summary.model_ready_rows,
            raw = %summary.raw_path.display(),
            with_genre = %summary.with_genre_path.display(),
            preprocessed = %summary.preprocessed_path.display(),
            "collection finished"
        ),
    }

    observability::tracing::shutdown();
    Ok(())
}
