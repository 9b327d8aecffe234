pub mod collect;
pub mod genre;
pub mod genre_keywords;
pub mod modelling;
pub mod orchestrator;

pub use collect::{VideoRecord, VideoSource, YouTubeCollector};
pub use genre::{GenreClassifier, TaggedRecord};
pub use genre_keywords::GenreKeywords;
pub use modelling::{ModelReadyRecord, filter_for_modelling};
pub use orchestrator::{PipelineOptions, PipelineOutcome, PipelineSummary, run_pipeline};
