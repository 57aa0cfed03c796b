use super::loan::LoanStatus;
use super::state::StateError;
use std::fmt;

/// The kind of failure an operation reported, independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    InvalidState,
    Authorization,
    Storage,
}

#[derive(thiserror::Error, Debug)]
pub enum LendingError {
    #[error("{field} {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("loan {0} does not exist")]
    NotFound(String),
    #[error("loan {0} already exists")]
    AlreadyExists(String),
    #[error("loan {loan_id} is {status}: {reason}")]
    InvalidState {
        loan_id: String,
        status: LoanStatus,
        reason: &'static str,
    },
    #[error("{caller} may not {action}")]
    Authorization { caller: String, action: &'static str },
    #[error("world state failure: {0}")]
    Storage(#[from] StateError),
    #[error("loan {key} could not be (de)serialised: {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LendingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LendingError::Validation { .. } => ErrorKind::Validation,
            LendingError::NotFound(_) => ErrorKind::NotFound,
            LendingError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            LendingError::InvalidState { .. } => ErrorKind::InvalidState,
            LendingError::Authorization { .. } => ErrorKind::Authorization,
            LendingError::Storage(_) | LendingError::CorruptRecord { .. } => ErrorKind::Storage,
        }
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        LendingError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::AlreadyExists => "AlreadyExistsError",
            ErrorKind::InvalidState => "InvalidStateError",
            ErrorKind::Authorization => "AuthorizationError",
            ErrorKind::Storage => "StorageError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
