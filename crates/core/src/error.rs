#![forbid(unsafe_code)]

/// Failure taxonomy shared by every collaborator and by the mutation engine.
///
/// Reconciliation never produces one of these: stale overlay references degrade silently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShelfError {
    /// The id is absent from the authoritative snapshot at mutation time.
    NotFound(String),
    /// Moving a top-level container, moving a node into its own descendant, and similar.
    InvalidOperation(String),
    /// A persistence or authoritative store call failed.
    StoreUnavailable(String),
}

impl ShelfError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(message)
            | Self::InvalidOperation(message)
            | Self::StoreUnavailable(message) => message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn not_found(id: &str) -> Self {
        Self::NotFound(format!("unknown id: {id}"))
    }
}

impl std::fmt::Display for ShelfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::InvalidOperation(message) => write!(f, "invalid operation: {message}"),
            Self::StoreUnavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl std::error::Error for ShelfError {}
