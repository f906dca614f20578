use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::types::{LoanId, LoanStatus, OwnerId};

/// borrower details carried along with a loan; never interpreted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// loan record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    // identification
    pub id: LoanId,
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub contact: Contact,

    // terms; nullable because stored records predate validation
    pub principal: Option<Money>,
    pub interest_rate_percent: Option<Rate>,
    pub due_date: NaiveDate,

    // payment tracking
    pub payment_date: Option<NaiveDate>,
    pub interest_paid_total: Option<Money>,
    pub total_paid_amount: Option<Money>,

    pub status: LoanStatus,

    // engine-managed
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Loan {
    /// open a new active loan
    pub fn open(id: LoanId, owner_id: OwnerId, input: NewLoan, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id,
            contact: input.contact,
            principal: Some(input.principal),
            interest_rate_percent: input.interest_rate_percent,
            due_date: input.due_date,
            payment_date: None,
            interest_paid_total: None,
            total_paid_amount: None,
            status: LoanStatus::Active,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// principal and rate, when both are set; a 0% rate is a valid term
    pub fn interest_terms(&self) -> Option<(Money, Rate)> {
        match (self.principal, self.interest_rate_percent) {
            (Some(principal), Some(rate)) => Some((principal, rate)),
            _ => None,
        }
    }

    /// interest for one period
    pub fn interest_due(&self) -> Result<Option<Money>> {
        self.interest_terms()
            .map(|(principal, rate)| {
                principal
                    .interest_at(rate)
                    .ok_or_else(|| LoanError::amount_out_of_range(self.id, "interest"))
            })
            .transpose()
    }

    /// principal plus one period of interest
    pub fn settlement_amount(&self) -> Result<Option<Money>> {
        let Some((principal, _)) = self.interest_terms() else {
            return Ok(None);
        };
        self.interest_due()?
            .and_then(|interest| principal.checked_add(interest))
            .map(Some)
            .ok_or_else(|| LoanError::amount_out_of_range(self.id, "settlement"))
    }

    /// book an interest-only payment and roll the due date
    pub fn record_interest_payment(
        &mut self,
        amount: Money,
        paid_on: NaiveDate,
        next_due: NaiveDate,
    ) -> Result<()> {
        let total = self
            .interest_paid_total
            .unwrap_or(Money::ZERO)
            .checked_add(amount)
            .ok_or_else(|| LoanError::amount_out_of_range(self.id, "interest paid total"))?;
        self.interest_paid_total = Some(total);
        self.payment_date = Some(paid_on);
        self.due_date = next_due;
        self.status = LoanStatus::Active;
        Ok(())
    }

    /// book a full settlement; the due date is left alone
    pub fn record_settlement(&mut self, amount: Money, paid_on: NaiveDate) -> Result<()> {
        let total = self
            .total_paid_amount
            .unwrap_or(Money::ZERO)
            .checked_add(amount)
            .ok_or_else(|| LoanError::amount_out_of_range(self.id, "total paid amount"))?;
        self.total_paid_amount = Some(total);
        self.payment_date = Some(paid_on);
        Ok(())
    }

    pub fn close(&mut self) {
        self.status = LoanStatus::Finished;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// merge the provided fields of a validated patch
    pub fn apply_patch(&mut self, patch: &LoanPatch) {
        if let Some(name) = &patch.name {
            self.contact.name = Some(name.clone());
        }
        if let Some(phone) = &patch.phone {
            self.contact.phone = Some(phone.clone());
        }
        if let Some(address) = &patch.address {
            self.contact.address = Some(address.clone());
        }
        if let Some(notes) = &patch.notes {
            self.contact.notes = Some(notes.clone());
        }
        if let Some(principal) = patch.principal {
            self.principal = Some(principal);
        }
        if let Some(rate) = patch.interest_rate_percent {
            self.interest_rate_percent = Some(rate);
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
    }

    /// what this loan has brought in: settlements win over interest, never both
    pub fn amount_received(&self) -> Money {
        let nonzero = |m: Option<Money>| m.filter(|m| !m.is_zero());
        nonzero(self.total_paid_amount)
            .or_else(|| nonzero(self.interest_paid_total))
            .unwrap_or(Money::ZERO)
    }

    pub fn is_fully_paid(&self) -> bool {
        self.total_paid_amount.map_or(false, |m| !m.is_zero())
    }

    /// active, never paid, and past its due date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status.is_active()
            && self.payment_date.is_none()
            && crate::calendar::is_overdue(self.due_date, today)
    }

    /// day used to place the loan in the monthly history
    pub fn reference_date(&self) -> NaiveDate {
        match (self.payment_date, self.status) {
            (Some(paid_on), _) => paid_on,
            (None, LoanStatus::Finished) => self.updated_at.date_naive(),
            (None, LoanStatus::Active) => self.created_at.date_naive(),
        }
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// input for opening a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLoan {
    #[serde(flatten)]
    pub contact: Contact,
    pub principal: Money,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub interest_rate_percent: Option<Rate>,
}

impl NewLoan {
    pub fn new(principal: Money, due_date: NaiveDate) -> Self {
        Self {
            contact: Contact::default(),
            principal,
            due_date,
            interest_rate_percent: None,
        }
    }

    pub fn rate(mut self, rate: Rate) -> Self {
        self.interest_rate_percent = Some(rate);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.contact.name = Some(name.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.contact.phone = Some(phone.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.contact.address = Some(address.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.contact.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_principal(self.principal)?;
        if let Some(rate) = self.interest_rate_percent {
            validate_rate(rate)?;
        }
        Ok(())
    }
}

/// fields an owner may change on an existing loan
///
/// Status, payment dates, paid totals and timestamps are managed by the
/// engine and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoanPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub principal: Option<Money>,
    pub interest_rate_percent: Option<Rate>,
    pub due_date: Option<NaiveDate>,
}

impl LoanPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn principal(mut self, principal: Money) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn rate(mut self, rate: Rate) -> Self {
        self.interest_rate_percent = Some(rate);
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(principal) = self.principal {
            validate_principal(principal)?;
        }
        if let Some(rate) = self.interest_rate_percent {
            validate_rate(rate)?;
        }
        Ok(())
    }
}

/// largest principal a loan may carry, the range of a `DECIMAL(10,2)` column
pub fn max_principal() -> Money {
    Money::from_minor(9_999_999_999)
}

/// largest rate in percent, the range of a `DECIMAL(5,2)` column
pub fn max_rate() -> Rate {
    Rate::from_percentage(Decimal::new(99_999, 2))
}

fn validate_principal(principal: Money) -> Result<()> {
    if !principal.is_positive() {
        return Err(LoanError::bad_request(format!(
            "principal must be greater than zero, got {}",
            principal
        )));
    }
    if principal > max_principal() {
        return Err(LoanError::bad_request(format!(
            "principal cannot exceed {}, got {}",
            max_principal(),
            principal
        )));
    }
    Ok(())
}

fn validate_rate(rate: Rate) -> Result<()> {
    if rate.is_negative() {
        return Err(LoanError::bad_request(format!(
            "interest rate cannot be negative, got {}",
            rate
        )));
    }
    if rate > max_rate() {
        return Err(LoanError::bad_request(format!(
            "interest rate cannot exceed {}, got {}",
            max_rate(),
            rate
        )));
    }
    Ok(())
}
