/// Why a poll request produced nothing usable. Every variant is absorbed by
/// the poll adapter; the window simply keeps its last state.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("endpoint returned HTTP {0}")]
    Status(u16),
    #[error("endpoint reported an error: {0}")]
    Upstream(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}
