//! The error taxonomy shared by every layer of the engine.
//!
//! Low-level failures (storage, serialization) are wrapped with operator or
//! circuit context as they propagate up through `Step`/`Start`. Invariant
//! violations and weight overflow are programmer errors and are reported
//! immediately rather than retried.

use std::fmt::{self, Debug, Display, Formatter};
use std::io;
use std::path::PathBuf;

/// The full error taxonomy for the engine (see spec §7).
#[derive(Debug)]
pub enum DbspError {
    /// A ZSet/IndexedZSet operation produced a zero-weight entry that
    /// escaped into a result. Always a programmer bug.
    InvariantViolation { message: String },
    /// Weight arithmetic saturated i64 range while accumulating `key`.
    WeightOverflow { key: String },
    /// Circuit graph validation found a cycle with no integrate/differentiate
    /// mediator breaking it.
    CycleWithoutMediator { description: String },
    /// Two handles or operators were declared under the same name.
    DuplicateName { name: String },
    /// An output binding's declared type disagreed with its source.
    TypeMismatch { expected: String, found: String },
    /// A user operator's step function failed; the circuit is poisoned.
    OperatorStepFailed {
        node: String,
        cause: Box<DbspError>,
    },
    /// A storage operation failed; the underlying trace remains consistent
    /// (writes are atomic per batch).
    StorageIo {
        path: Option<PathBuf>,
        cause: String,
    },
    /// Encoding or decoding a persisted value failed.
    SerializationFailed { cause: String },
}

impl DbspError {
    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn weight_overflow(key: impl Debug) -> Self {
        Self::WeightOverflow {
            key: format!("{key:?}"),
        }
    }

    pub fn storage_io(path: Option<PathBuf>, cause: impl Display) -> Self {
        Self::StorageIo {
            path,
            cause: cause.to_string(),
        }
    }
}

impl Display for DbspError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvariantViolation { message } => {
                write!(f, "invariant violation: {message}")
            }
            Self::WeightOverflow { key } => {
                write!(f, "weight overflow accumulating key {key}")
            }
            Self::CycleWithoutMediator { description } => {
                write!(f, "cycle without mediator: {description}")
            }
            Self::DuplicateName { name } => write!(f, "duplicate name: {name}"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Self::OperatorStepFailed { node, cause } => {
                write!(f, "operator {node} failed: {cause}")
            }
            Self::StorageIo { path, cause } => match path {
                Some(path) => write!(f, "storage I/O error at {}: {cause}", path.display()),
                None => write!(f, "storage I/O error: {cause}"),
            },
            Self::SerializationFailed { cause } => write!(f, "serialization failed: {cause}"),
        }
    }
}

impl std::error::Error for DbspError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OperatorStepFailed { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for DbspError {
    fn from(err: io::Error) -> Self {
        Self::StorageIo {
            path: None,
            cause: err.to_string(),
        }
    }
}

impl From<bincode::Error> for DbspError {
    fn from(err: bincode::Error) -> Self {
        Self::SerializationFailed {
            cause: err.to_string(),
        }
    }
}

pub type DbspResult<T> = Result<T, DbspError>;
