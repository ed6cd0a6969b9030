use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Remote API error: {0}")]
    Remote(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExporterError {
    /// Errors that end the process instead of a single account's fetch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExporterError::Authentication(_)
                | ExporterError::InvalidConfig(_)
                | ExporterError::Bind { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
