use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;
use uuid::Uuid;

use crate::errors::{LoanError, Result};
use crate::loan::Loan;
use crate::storage::{LoanStore, OwnerDirectory, WriteOutcome};
use crate::types::{LoanId, Owner, OwnerId};

fn poisoned() -> LoanError {
    LoanError::Storage {
        message: "loan table lock poisoned".to_string(),
    }
}

/// loan store kept in a process-local map
#[derive(Debug, Default)]
pub struct InMemoryLoanStore {
    loans: RwLock<HashMap<LoanId, Loan>>,
    fail_writes: AtomicBool,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// make every subsequent write fail with a storage error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.read().map(|loans| loans.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<LoanId, Loan>>> {
        self.loans.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<LoanId, Loan>>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LoanError::Storage {
                message: "write rejected by store".to_string(),
            });
        }
        self.loans.write().map_err(|_| poisoned())
    }
}

impl LoanStore for InMemoryLoanStore {
    fn insert(&self, loan: Loan) -> Result<Loan> {
        let mut loans = self.write()?;
        if loans.contains_key(&loan.id) {
            return Err(LoanError::Storage {
                message: format!("duplicate loan id {}", loan.id),
            });
        }
        loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Loan>> {
        Ok(self
            .read()?
            .values()
            .filter(|loan| loan.owner_id == owner_id)
            .cloned()
            .collect())
    }

    fn list_active_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Loan>> {
        let mut active: Vec<Loan> = self
            .read()?
            .values()
            .filter(|loan| loan.owner_id == owner_id && loan.status.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.created_at.cmp(&b.created_at)));
        Ok(active)
    }

    fn update_if_version(&self, loan: &Loan, expected_version: u64) -> Result<WriteOutcome> {
        let mut loans = self.write()?;
        let stored = match loans.get_mut(&loan.id) {
            Some(stored) => stored,
            None => return Ok(WriteOutcome::Missing),
        };

        if stored.version != expected_version {
            debug!(
                loan_id = %loan.id,
                expected_version,
                current_version = stored.version,
                "conditional write rejected"
            );
            return Ok(WriteOutcome::Conflict {
                current_version: stored.version,
            });
        }

        let mut next = loan.clone();
        next.version = expected_version + 1;
        *stored = next.clone();
        Ok(WriteOutcome::Written(next))
    }

    fn delete(&self, id: LoanId) -> Result<bool> {
        Ok(self.write()?.remove(&id).is_some())
    }
}

/// owner directory kept in a process-local map
#[derive(Debug, Default)]
pub struct InMemoryOwnerDirectory {
    owners: RwLock<HashMap<OwnerId, Owner>>,
}

impl InMemoryOwnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// add a user with a fresh id
    pub fn register(&self, name: impl Into<String>, email: impl Into<String>) -> Result<Owner> {
        let owner = Owner {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
        };
        self.owners
            .write()
            .map_err(|_| poisoned())?
            .insert(owner.id, owner.clone());
        Ok(owner)
    }
}

impl OwnerDirectory for InMemoryOwnerDirectory {
    fn find_owner(&self, id: OwnerId) -> Result<Option<Owner>> {
        Ok(self.owners.read().map_err(|_| poisoned())?.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::loan::NewLoan;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn loan_for(owner_id: OwnerId, due: (i32, u32, u32)) -> Loan {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let due = NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap();
        Loan::open(Uuid::new_v4(), owner_id, NewLoan::new(Money::from_major(100), due), now)
    }

    #[test]
    fn test_conditional_write() {
        let store = InMemoryLoanStore::new();
        let loan = store.insert(loan_for(Uuid::new_v4(), (2024, 2, 1))).unwrap();

        let mut edited = loan.clone();
        edited.contact.notes = Some("first".to_string());
        let written = match store.update_if_version(&edited, 1).unwrap() {
            WriteOutcome::Written(l) => l,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(written.version, 2);

        // stale writer loses
        let mut stale = loan.clone();
        stale.contact.notes = Some("second".to_string());
        assert_eq!(
            store.update_if_version(&stale, 1).unwrap(),
            WriteOutcome::Conflict { current_version: 2 }
        );
        assert_eq!(store.get(loan.id).unwrap().unwrap().contact.notes.as_deref(), Some("first"));
    }

    #[test]
    fn test_missing_and_delete() {
        let store = InMemoryLoanStore::new();
        let loan = loan_for(Uuid::new_v4(), (2024, 2, 1));
        assert_eq!(store.update_if_version(&loan, 1).unwrap(), WriteOutcome::Missing);

        store.insert(loan.clone()).unwrap();
        assert!(store.insert(loan.clone()).is_err());
        assert!(store.delete(loan.id).unwrap());
        assert!(!store.delete(loan.id).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_active_listing_is_scoped_and_ordered() {
        let store = InMemoryLoanStore::new();
        let owner = Uuid::new_v4();
        store.insert(loan_for(owner, (2024, 3, 1))).unwrap();
        store.insert(loan_for(owner, (2024, 1, 15))).unwrap();
        let mut done = loan_for(owner, (2023, 12, 1));
        done.close();
        store.insert(done).unwrap();
        store.insert(loan_for(Uuid::new_v4(), (2023, 1, 1))).unwrap();

        let active = store.list_active_by_owner(owner).unwrap();
        let dues: Vec<String> = active.iter().map(|l| l.due_date.to_string()).collect();
        assert_eq!(dues, ["2024-01-15", "2024-03-01"]);
        assert_eq!(store.list_by_owner(owner).unwrap().len(), 3);
    }

    #[test]
    fn test_write_failures_surface() {
        let store = InMemoryLoanStore::new();
        store.set_fail_writes(true);
        let err = store.insert(loan_for(Uuid::new_v4(), (2024, 2, 1))).unwrap_err();
        assert!(matches!(err, LoanError::Storage { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_owner_directory() {
        let directory = InMemoryOwnerDirectory::new();
        let owner = directory.register("Ana", "ana@example.com").unwrap();
        assert_eq!(directory.find_owner(owner.id).unwrap(), Some(owner));
        assert_eq!(directory.find_owner(Uuid::new_v4()).unwrap(), None);
    }
}
