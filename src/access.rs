//! Ownership checks shared by every loan operation.

use tracing::warn;

use crate::errors::{LoanError, Result};
use crate::loan::Loan;
use crate::storage::LoanStore;
use crate::types::{LoanId, OwnerId};

/// fail with `Forbidden` unless `owner_id` owns the loan
pub fn ensure_owner(loan: &Loan, owner_id: OwnerId) -> Result<()> {
    if loan.owner_id != owner_id {
        warn!(loan_id = %loan.id, %owner_id, "loan access denied");
        return Err(LoanError::Forbidden {
            loan_id: loan.id,
            owner_id,
        });
    }
    Ok(())
}

/// fetch a loan and check it belongs to `owner_id`
pub fn load_owned<S: LoanStore + ?Sized>(
    store: &S,
    loan_id: LoanId,
    owner_id: OwnerId,
) -> Result<Loan> {
    let loan = store
        .get(loan_id)?
        .ok_or_else(|| LoanError::loan_not_found(loan_id))?;
    ensure_owner(&loan, owner_id)?;
    Ok(loan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::loan::NewLoan;
    use crate::storage::InMemoryLoanStore;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    #[test]
    fn test_load_owned() {
        let store = InMemoryLoanStore::new();
        let owner = Uuid::new_v4();
        let due = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let loan = store
            .insert(Loan::open(
                Uuid::new_v4(),
                owner,
                NewLoan::new(Money::from_major(10), due),
                Utc::now(),
            ))
            .unwrap();

        assert_eq!(load_owned(&store, loan.id, owner).unwrap().id, loan.id);
        assert!(matches!(
            load_owned(&store, loan.id, Uuid::new_v4()),
            Err(LoanError::Forbidden { .. })
        ));
        assert!(matches!(
            load_owned(&store, Uuid::new_v4(), owner),
            Err(LoanError::NotFound { entity: "loan", .. })
        ));
    }
}
