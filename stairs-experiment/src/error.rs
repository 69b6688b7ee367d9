use crate::store::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The session reached the staircase phase but carries no difficulty
    /// state. This is a caller bug and is never papered over with a default.
    #[error("session {session} is in the staircase phase without a difficulty state")]
    MissingDifficultyState { session: SessionId },

    #[error("session {session} is finished but has no stored result")]
    MissingFinalResult { session: SessionId },

    #[error("unknown session {session}")]
    UnknownSession { session: SessionId },

    #[error("session {session} has no presented trial awaiting a response")]
    NoPendingTrial { session: SessionId },

    #[error("invalid task configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read task configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse JSON task configuration: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error("failed to parse TOML task configuration: {0}")]
    ConfigToml(#[from] toml::de::Error),

    #[error("storage backend failure: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
