use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::LoanError;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for the user owning a loan
pub type OwnerId = Uuid;

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// open, money still out
    Active,
    /// settled or closed by the owner
    Finished,
}

impl LoanStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, LoanStatus::Active)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanStatus::Active => write!(f, "active"),
            LoanStatus::Finished => write!(f, "finished"),
        }
    }
}

/// what the borrower paid when renewing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// interest only, the loan rolls over one month
    InterestOnly,
    /// principal plus interest, the loan closes
    Full,
}

impl FromStr for PaymentType {
    type Err = LoanError;

    /// accepts both the english names and the legacy client values
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interest_only" | "juros" => Ok(PaymentType::InterestOnly),
            "full" | "total" => Ok(PaymentType::Full),
            other => Err(LoanError::bad_request(format!("unknown payment type: {}", other))),
        }
    }
}

/// registered user that can own loans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
    pub email: String,
}

/// confirmation returned by a hard delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Removal {
    pub loan_id: LoanId,
    pub message: String,
}
