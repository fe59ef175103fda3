use thiserror::Error;

/// Failure taxonomy exposed to callers of the ledger engine.
///
/// Every exposed operation returns either a success payload or exactly one of
/// these variants; callers must treat a failure as final (there is no partial
/// success state).
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("duplicate operation: {0}")]
    DuplicateOperation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    /// Write-write conflict detected by the store. Transactions are retried on
    /// this internally; it only escapes when the retry budget is exhausted.
    #[error("storage conflict")]
    Conflict,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        match e.kind() {
            rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TryAgain => LedgerError::Conflict,
            _ => LedgerError::Internal(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Internal(format!("serialization error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
