use joysense_core::config::ConfigError;
use joysense_core::source::FetchError;
use joysense_core::views::ReportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Invalid dashboard config: {0}")]
    Dashboard(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request failed: {0}")]
    Request(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

pub type ClientResult<T> = Result<T, ClientError>;
