use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Diagnostic, Debug)]
pub enum LedgerError {
    #[error("Invalid split input: {0}")]
    #[diagnostic(code(split_ledger::invalid_input))]
    InvalidSplitInput(String),
    #[error("Access denied: {0}")]
    #[diagnostic(code(split_ledger::access_denied))]
    AccessDenied(String),
    #[error("Not found: {0}")]
    #[diagnostic(code(split_ledger::not_found))]
    NotFound(String),
    #[error("Share already paid")]
    #[diagnostic(code(split_ledger::already_paid))]
    AlreadyPaid,
    #[error("Conflict: {0}")]
    #[diagnostic(code(split_ledger::conflict))]
    Conflict(String),
    #[error("Reconciliation failed for {failed} of {total} pending participants")]
    #[diagnostic(code(split_ledger::reconciliation))]
    ReconciliationPartialFailure { failed: usize, total: usize },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidSplitInput(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(Box::new(std::io::Error::other(msg.into())))
    }

    /// HTTP-style status for an outer request surface.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSplitInput(_) | Self::AlreadyPaid | Self::CsvError(_) => 400,
            Self::AccessDenied(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::ReconciliationPartialFailure { .. } | Self::IoError(_) | Self::InternalError(_) => {
                500
            }
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}
