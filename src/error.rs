use std::path::PathBuf;

/// Failure to produce a track, cliff set, sprite placement or catalog.
///
/// None of these are fatal: the loader falls back to the previous track,
/// flat cliffs or an empty sprite list and keeps the simulation running.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Unable to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("Unable to decode image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },
    #[error("Track description produced no segments")]
    EmptyTrack,
    #[error("Unknown sprite '{0}'")]
    UnknownSprite(String),
    #[error("Load ticket {0} was superseded by a newer request")]
    Stale(u64),
}
