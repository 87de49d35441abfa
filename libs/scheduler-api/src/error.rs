use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("scheduler returned malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}
