//! Error types for the repair ledger.

use std::fmt;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the repair ledger.
///
/// Every controller operation returns `Result<T>`. Callers only need to
/// distinguish three classes (see [`ErrorKind`]); the finer variants exist so
/// logs and snapshot failures stay diagnosable.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed or missing caller input.
    ///
    /// Raised when:
    /// - A required registration field is blank
    /// - The car year is not a plausible integer
    /// - A payment is not a finite number
    ///
    /// **Recovery:** Never retried automatically. Surface to the caller as-is.
    ValidationError(String),

    /// A referenced owner, car or job does not exist.
    ///
    /// Also returned when a job is deleted twice.
    NotFound {
        /// Record table name (`"owner"`, `"car"`, `"job"`)
        entity: &'static str,
        /// Identifier that was looked up
        id: u64,
    },

    /// Persistence failure: I/O, transaction or timeout.
    ///
    /// The transaction that raised it has been rolled back.
    ///
    /// **Recovery:** The caller may retry with backoff. The controller never
    /// retries on its own because `add_component` is not idempotent.
    StoreError(String),

    /// Snapshot encoding failed.
    SerializationError(String),

    /// Snapshot payload could not be decoded.
    DeserializationError(String),

    /// Snapshot file does not carry the `RKIT` envelope.
    InvalidSnapshot(String),

    /// Snapshot was written by a different schema version.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from the snapshot file)
        found: u32,
    },

    /// Invalid configuration value.
    ConfigError(String),
}

/// Coarse error classes used at the request/response boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Store,
}

impl Error {
    /// Shorthand for a missing record.
    pub fn not_found(entity: &'static str, id: impl Into<u64>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Classify the error for status mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ValidationError(_) => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::StoreError(_)
            | Error::SerializationError(_)
            | Error::DeserializationError(_)
            | Error::InvalidSnapshot(_)
            | Error::VersionMismatch { .. }
            | Error::ConfigError(_) => ErrorKind::Store,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::NotFound { entity, id } => write!(f, "Not found: {} {}", entity, id),
            Error::StoreError(msg) => write!(f, "Store error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidSnapshot(msg) => write!(f, "Invalid snapshot: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Snapshot version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StoreError(e.to_string())
    }
}

impl From<postcard::Error> for Error {
    fn from(e: postcard::Error) -> Self {
        Error::DeserializationError(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Error::StoreError(format!("operation timed out: {}", e))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::StoreError(format!("snapshot task failed: {}", e))
    }
}
