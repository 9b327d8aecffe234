pub mod youtube;

pub use youtube::{ApiKey, PublishWindow, YouTubeApiError, YouTubeClient, YouTubeConfig};
