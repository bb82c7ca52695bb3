pub mod config;
pub mod hawkeye;
pub mod metrics;
pub mod receiver;
pub mod server;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{endpoint} response is missing `{field}`")]
    MissingField {
        endpoint: String,
        field: &'static str,
    },
    #[error("Project not found: {0}")]
    ProjectNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn missing_field(endpoint: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            endpoint: endpoint.into(),
            field,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
