pub mod memory;

use std::sync::Arc;

use crate::errors::Result;
use crate::loan::Loan;
use crate::types::{LoanId, Owner, OwnerId};

pub use memory::{InMemoryLoanStore, InMemoryOwnerDirectory};

/// result of a conditional write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// stored; carries the record as persisted, version bumped
    Written(Loan),
    /// someone else wrote first
    Conflict { current_version: u64 },
    /// the loan no longer exists
    Missing,
}

/// Persistence for loan records.
///
/// Every successful write must bump `Loan::version`; `update_if_version` is
/// the only update path and must compare and write atomically.
pub trait LoanStore: Send + Sync {
    fn insert(&self, loan: Loan) -> Result<Loan>;
    fn get(&self, id: LoanId) -> Result<Option<Loan>>;
    /// all loans of an owner, in no particular order
    fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Loan>>;
    /// active loans of an owner, earliest due date first
    fn list_active_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Loan>>;
    fn update_if_version(&self, loan: &Loan, expected_version: u64) -> Result<WriteOutcome>;
    /// hard delete; false when nothing was stored under `id`
    fn delete(&self, id: LoanId) -> Result<bool>;
}

/// Lookup of registered users.
pub trait OwnerDirectory: Send + Sync {
    fn find_owner(&self, id: OwnerId) -> Result<Option<Owner>>;
}

impl<T: LoanStore + ?Sized> LoanStore for Arc<T> {
    fn insert(&self, loan: Loan) -> Result<Loan> {
        (**self).insert(loan)
    }

    fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        (**self).get(id)
    }

    fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Loan>> {
        (**self).list_by_owner(owner_id)
    }

    fn list_active_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Loan>> {
        (**self).list_active_by_owner(owner_id)
    }

    fn update_if_version(&self, loan: &Loan, expected_version: u64) -> Result<WriteOutcome> {
        (**self).update_if_version(loan, expected_version)
    }

    fn delete(&self, id: LoanId) -> Result<bool> {
        (**self).delete(id)
    }
}

impl<T: OwnerDirectory + ?Sized> OwnerDirectory for Arc<T> {
    fn find_owner(&self, id: OwnerId) -> Result<Option<Owner>> {
        (**self).find_owner(id)
    }
}
