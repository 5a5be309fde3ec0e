use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("insight endpoint returned status {status}")]
    Status { status: u16 },

    #[error("insight response parse error: {0}")]
    Deserialize(#[from] serde_json::Error),
}
