/// Braid Error Types
#[derive(Debug, thiserror::Error)]
pub enum BraidError {
    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Branch management errors
    #[error("Branch error: {0}")]
    Branch(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A rebase stopped on conflicts and was left open for manual resolution
    #[error("Rebase conflict on '{branch}': {message}")]
    Conflict { branch: String, message: String },

    /// Both the structured rebase and the squash fallback conflicted
    #[error("Rebase and squash fallback both conflicted on '{branch}': {message}")]
    SquashFallback { branch: String, message: String },

    /// A graph mutation would make a branch its own (transitive) upstream
    #[error("Cyclic upstream: {0}")]
    Cycle(String),

    /// Thaw could not find the expected freeze commits at the branch tip
    #[error("Thaw error: {0}")]
    Thaw(String),

    /// Validation errors (bad caller input, rejected before any mutation)
    #[error("Validation error: {0}")]
    Validation(String),
}

impl BraidError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        BraidError::Config(msg.into())
    }

    pub fn branch<S: Into<String>>(msg: S) -> Self {
        BraidError::Branch(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        BraidError::Validation(msg.into())
    }

    pub fn cycle<S: Into<String>>(msg: S) -> Self {
        BraidError::Cycle(msg.into())
    }

    pub fn thaw<S: Into<String>>(msg: S) -> Self {
        BraidError::Thaw(msg.into())
    }

    pub fn conflict<B: Into<String>, M: Into<String>>(branch: B, message: M) -> Self {
        BraidError::Conflict {
            branch: branch.into(),
            message: message.into(),
        }
    }

    pub fn squash_fallback<B: Into<String>, M: Into<String>>(branch: B, message: M) -> Self {
        BraidError::SquashFallback {
            branch: branch.into(),
            message: message.into(),
        }
    }

    /// Whether the repository was left in a resumable mid-rebase state.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            BraidError::Conflict { .. } | BraidError::SquashFallback { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BraidError>;
