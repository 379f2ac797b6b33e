use thiserror::Error;

/// Failure reported by a document backend while appending.
///
/// The `Display` output is the backend's raw diagnostic and is shown to the
/// chat user as-is.
#[derive(Debug, Error)]
pub enum AppendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{status} {message}")]
    Api { status: u16, message: String },

    /// The write carried a stale version token and was rejected.
    #[error("version conflict: {0}")]
    Conflict(String),

    #[error("invalid document payload: {0}")]
    Decode(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

/// Outcome of an append command that did not succeed.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Neither arguments nor a replied-to message supplied any text.
    #[error("no text to append")]
    MissingInput,

    #[error(transparent)]
    Append(#[from] AppendError),
}

impl AppendError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppendError::Conflict(_))
    }
}
