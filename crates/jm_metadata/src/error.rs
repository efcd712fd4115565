use std::io;
use std::path::PathBuf;
use thiserror::Error;
use zip::result::ZipError;

/// Failure while reading an archive or class directory.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error while reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ZIP error while reading {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
}

/// Failure that aborts a single metadata artifact.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to write metadata to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize metadata: {0}")]
    Json(#[from] serde_json::Error),
}
