use thiserror::Error;

/// Failures surfaced by the interaction engine and the flows built on it
#[derive(Debug, Error)]
pub enum EngineError {
    /// No spec of a locator chain matched within budget
    #[error("no match for '{chain}' ({tried} locator(s) tried)")]
    NotFound { chain: String, tried: usize },

    #[error("{what} timed out after {after_ms}ms")]
    Timeout { what: String, after_ms: u64 },

    /// Per-candidate skip signal, not a failure of the run
    #[error("job already applied")]
    AlreadyApplied,

    #[error("verification failed: {what}")]
    VerificationFailed { what: String },

    #[error("CAPTCHA was not solved within {waited_secs}s")]
    CaptchaTimeout { waited_secs: u64 },

    /// The browser session is unusable; aborts the run
    #[error("session failure: {0}")]
    SessionFailure(String),

    /// A state machine was asked for a move its table does not allow
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid site profile: {0}")]
    InvalidProfile(String),

    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

impl EngineError {
    /// True for errors that must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::SessionFailure(_) | EngineError::InvalidProfile(_)
        )
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
