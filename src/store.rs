pub mod snapshot;

pub use snapshot::{
    PREPROCESSED_FILE_NAME, RAW_FILE_NAME, SnapshotWriter, WITH_GENRE_FILE_NAME,
};
