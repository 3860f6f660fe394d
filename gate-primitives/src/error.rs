//! Shared error definitions for gate primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the governance gate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided identifier could not be parsed.
    #[error("invalid identifier: {source}")]
    InvalidId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Risk level string was not recognised.
    #[error("unknown risk level `{0}`")]
    UnknownRiskLevel(String),

    /// A descriptor field carried a value of the wrong shape.
    #[error("malformed action descriptor field `{field}`: {reason}")]
    MalformedDescriptor {
        /// Offending field name.
        field: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Evidence failed validation.
    #[error("invalid evidence: {reason}")]
    InvalidEvidence {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
