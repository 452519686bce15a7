//! Error types for admission decisions.
//!
//! Validation rules produce a [`Violation`]. At the entry-point boundary every
//! violation is normalized into [`Error::Invalid`], the only rejection shape
//! the admission server needs to understand. [`Error::TypeMismatch`] is kept
//! separate: it signals a routing defect, not a user mistake.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Fields that must be set on every accepted InstanceManager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequiredField {
    Labels,
    OwnerReferences,
    Type,
    DataEngine,
}

impl RequiredField {
    /// JSON path of the field on the resource.
    pub fn path(&self) -> &'static str {
        match self {
            RequiredField::Labels => "metadata.labels",
            RequiredField::OwnerReferences => "metadata.ownerReferences",
            RequiredField::Type => "spec.type",
            RequiredField::DataEngine => "spec.dataEngine",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequiredField::Labels => "labels",
            RequiredField::OwnerReferences => "ownerReferences",
            RequiredField::Type => "type",
            RequiredField::DataEngine => "data engine",
        })
    }
}

/// A broken InstanceManager invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A required field is absent or empty
    #[error("{field} for instanceManager {name} is not set")]
    MissingField { field: RequiredField, name: String },

    /// The CPU mask was rejected by the checker; carries the checker's text verbatim
    #[error("{0}")]
    InvalidFormat(String),

    /// The CPU mask checker did not answer in time
    #[error("timed out after {timeout:?} validating CPU mask {mask} for instanceManager {name}")]
    CpuMaskCheckTimedOut {
        mask: String,
        name: String,
        timeout: Duration,
    },

    /// The CPU mask checker task died before answering
    #[error("failed to validate CPU mask {mask} for instanceManager {name}: {reason}")]
    CpuMaskCheckAborted {
        mask: String,
        name: String,
        reason: String,
    },
}

impl Violation {
    pub(crate) fn missing(field: RequiredField, name: &str) -> Self {
        Violation::MissingField {
            field,
            name: name.to_string(),
        }
    }
}

/// Error surfaced by the admission entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The object is not acceptable; the message is shown to the requester
    #[error("{message}")]
    Invalid { message: String, reason: String },

    /// The object handed to the validator is not an InstanceManager
    #[error("{0} is not an InstanceManager")]
    TypeMismatch(String),
}

impl Error {
    /// Create an invalid-request error
    pub fn invalid(message: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Invalid {
            message: message.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error indicates a wiring defect rather than a user error
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::TypeMismatch(_))
    }

    /// Machine-readable reason code (empty when none was given)
    pub fn reason(&self) -> &str {
        match self {
            Error::Invalid { reason, .. } => reason,
            Error::TypeMismatch(_) => "TypeMismatch",
        }
    }
}

impl From<Violation> for Error {
    fn from(violation: Violation) -> Self {
        Error::invalid(violation.to_string(), "")
    }
}

/// Result type alias for admission entry points
pub type Result<T> = std::result::Result<T, Error>;
