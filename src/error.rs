use thiserror::Error;

pub type Result<T> = std::result::Result<T, WidgetError>;

#[derive(Debug, Error)]
pub enum WidgetError {
    /// Token issuance failed; refresh activity halts until a successful reconnect.
    #[error("auth failed: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request {0} timed out")]
    Timeout(String),
    #[error("channel is not connected")]
    Disconnected,
    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl WidgetError {
    pub fn is_auth(&self) -> bool {
        matches!(self, WidgetError::Auth(_))
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        WidgetError::Transport(message.into())
    }
}
