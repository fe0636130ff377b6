use thiserror::Error;

/// Conditions that end a generation attempt and that the caller reacts to
/// individually. Plumbing failures travel as plain `anyhow` errors.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("{0}")]
    MissingDependency(String),

    #[error("no API key configured. Run `aicommit setup` or `aicommit config set api-key <key>`")]
    MissingCredential,

    #[error("API error: {0}")]
    RemoteApi(String),

    #[error("no commit message generated")]
    NoMessageGenerated,

    #[error("the API rejected the configured key: {0}")]
    InvalidCredential(String),

    #[error("cancelled")]
    Cancelled,

    #[error("no changes found to generate a commit message for")]
    NoChanges,
}

impl CommitError {
    /// Cancellation is an ordinary outcome, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CommitError::Cancelled)
    }
}
