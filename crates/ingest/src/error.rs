use formats::payload::PayloadError;
use streaming::io::FetchError;
use thiserror::Error;

/// Failures that abort a whole build. Everything below the payload level is
/// isolated per record and reported in the build result instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("fetching payload {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("payload {url} could not be parsed: {source}")]
    Parse {
        url: String,
        #[source]
        source: PayloadError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
