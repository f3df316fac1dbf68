use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json parse error in {path}: {details}")]
    JsonParse { path: PathBuf, details: String },

    #[error("unexpected top-level json shape in {path}: expected object or array, got {found}")]
    UnexpectedShape { path: PathBuf, found: String },

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("collection provisioning failed: {0}")]
    Provisioning(#[source] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store request failed: {0}")]
    Request(String),

    #[error("store not available yet: {0}")]
    NotReady(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
