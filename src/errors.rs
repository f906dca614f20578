use thiserror::Error;

use crate::types::{LoanId, OwnerId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoanError {
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("access denied: loan {loan_id} does not belong to owner {owner_id}")]
    Forbidden {
        loan_id: LoanId,
        owner_id: OwnerId,
    },

    #[error("bad request: {message}")]
    BadRequest {
        message: String,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("write conflict on loan {loan_id} after {attempts} attempts")]
    WriteConflict {
        loan_id: LoanId,
        attempts: u32,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("storage failure: {message}")]
    Storage {
        message: String,
    },
}

impl LoanError {
    pub fn loan_not_found(id: LoanId) -> Self {
        LoanError::NotFound {
            entity: "loan",
            id: id.to_string(),
        }
    }

    pub fn owner_not_found(id: OwnerId) -> Self {
        LoanError::NotFound {
            entity: "owner",
            id: id.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        LoanError::BadRequest {
            message: message.into(),
        }
    }

    /// an amount left the range a loan can carry
    pub fn amount_out_of_range(loan_id: LoanId, what: &str) -> Self {
        LoanError::BadRequest {
            message: format!("{} on loan {} is out of range", what, loan_id),
        }
    }

    /// transient failures a caller may retry after re-reading state
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoanError::Storage { .. } | LoanError::WriteConflict { .. })
    }
}

impl From<serde_json::Error> for LoanError {
    fn from(e: serde_json::Error) -> Self {
        LoanError::InvalidConfiguration {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
