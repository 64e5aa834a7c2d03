use thiserror::Error;

pub type Result<T> = std::result::Result<T, AniCacheError>;

/// Every failure the cache engine can report.
///
/// Per-genome and per-pair kinds carry plain strings so that one unreadable
/// genome can be reported against every pair that touches it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AniCacheError {
    #[error("Can't read genome '{label}': {reason}")]
    UnreadableGenome { label: String, reason: String },

    #[error("ANI computation failed for '{query}' vs '{reference}': {reason}")]
    ComputationFailed {
        query: String,
        reference: String,
        reason: String,
    },

    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Cache store schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: u32, found: String },

    #[error("Invalid cache record: {0}")]
    InvalidRecord(String),

    #[error("Invalid comparison config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl AniCacheError {
    /// Store level failures abort a run; everything else is reported per pair.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AniCacheError::StoreUnavailable(_) | AniCacheError::SchemaVersionMismatch { .. }
        )
    }
}

impl From<std::io::Error> for AniCacheError {
    fn from(err: std::io::Error) -> Self {
        AniCacheError::Io(err.to_string())
    }
}
