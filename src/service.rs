use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;
use hourglass_rs::{SafeTimeProvider, TimeSource};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::access::{ensure_owner, load_owned};
use crate::calendar::{self, Clock};
use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::loan::{Loan, LoanPatch, NewLoan};
use crate::stats::{LoanStats, ReportEngine};
use crate::storage::{LoanStore, OwnerDirectory, WriteOutcome};
use crate::types::{LoanId, LoanStatus, OwnerId, PaymentType, Removal};

/// loan lifecycle engine
///
/// Every operation is scoped to the owner supplied by the caller. Writes go
/// through `LoanStore::update_if_version`; a lost race re-reads the loan and
/// recomputes, so concurrent renewals add up instead of overwriting each
/// other.
pub struct LoanService<S, D, C = SafeTimeProvider> {
    store: S,
    owners: D,
    time: C,
    config: EngineConfig,
    events: Mutex<EventStore>,
}

impl<S: LoanStore, D: OwnerDirectory> LoanService<S, D, SafeTimeProvider> {
    /// create a service on the system clock with legacy configuration
    pub fn with_system_time(store: S, owners: D) -> Result<Self> {
        Self::new(
            store,
            owners,
            SafeTimeProvider::new(TimeSource::System),
            EngineConfig::default(),
        )
    }
}

impl<S: LoanStore, D: OwnerDirectory, C: Clock> LoanService<S, D, C> {
    /// create a service with an explicit clock and configuration
    pub fn new(store: S, owners: D, time: C, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let events = Mutex::new(EventStore::with_capacity(config.event_log_capacity));
        Ok(Self {
            store,
            owners,
            time,
            config,
            events,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// today's date according to the injected clock
    pub fn today(&self) -> NaiveDate {
        self.time.today()
    }

    /// open a loan for an existing owner
    pub fn create(&self, owner_id: OwnerId, input: NewLoan) -> Result<Loan> {
        input.validate()?;
        self.owners
            .find_owner(owner_id)?
            .ok_or_else(|| LoanError::owner_not_found(owner_id))?;

        let now = self.time.now();
        let loan = self.store.insert(Loan::open(Uuid::new_v4(), owner_id, input, now))?;

        info!(
            loan_id = %loan.id,
            %owner_id,
            principal = ?loan.principal,
            due_date = %loan.due_date,
            "loan created"
        );
        self.emit(vec![Event::LoanCreated {
            loan_id: loan.id,
            owner_id,
            principal: loan.principal.unwrap_or(Money::ZERO),
            due_date: loan.due_date,
            timestamp: now,
        }]);

        Ok(loan)
    }

    pub fn find_one(&self, loan_id: LoanId, owner_id: OwnerId) -> Result<Loan> {
        debug!(%loan_id, %owner_id, "loading loan");
        load_owned(&self.store, loan_id, owner_id)
    }

    /// all loans of the owner, newest first
    pub fn find_by_user(&self, owner_id: OwnerId) -> Result<Vec<Loan>> {
        let mut loans = self.store.list_by_owner(owner_id)?;
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(%owner_id, count = loans.len(), "listed loans");
        Ok(loans)
    }

    /// active loans of the owner, earliest due date first
    pub fn find_active_by_user(&self, owner_id: OwnerId) -> Result<Vec<Loan>> {
        let loans = self.store.list_active_by_owner(owner_id)?;
        debug!(%owner_id, count = loans.len(), "listed active loans");
        Ok(loans)
    }

    /// change owner-editable fields; nothing derived is recomputed
    pub fn update(&self, loan_id: LoanId, owner_id: OwnerId, patch: &LoanPatch) -> Result<Loan> {
        if patch.is_empty() {
            return self.find_one(loan_id, owner_id);
        }

        let now = self.time.now();
        let loan = self.write_with_retry(loan_id, owner_id, |loan| {
            patch.validate()?;
            loan.apply_patch(patch);
            Ok(vec![Event::LoanUpdated {
                loan_id,
                fields: patched_fields(patch),
                timestamp: now,
            }])
        })?;

        info!(%loan_id, %owner_id, version = loan.version, "loan updated");
        Ok(loan)
    }

    /// settle principal plus interest and close the loan
    ///
    /// A loan without interest terms is closed without any payment being
    /// recorded.
    pub fn finish(&self, loan_id: LoanId, owner_id: OwnerId) -> Result<Loan> {
        let today = self.today();
        let now = self.time.now();

        let loan = self.write_with_retry(loan_id, owner_id, |loan| {
            let mut events = Vec::new();
            let old_status = loan.status;

            let payment_recorded = match loan.settlement_amount()? {
                Some(settlement) => {
                    loan.record_settlement(settlement, today)?;
                    events.push(Event::LoanSettled {
                        loan_id,
                        settlement_amount: settlement,
                        total_paid_amount: loan.total_paid_amount.unwrap_or(Money::ZERO),
                        payment_date: today,
                    });
                    true
                }
                None => {
                    warn!(%loan_id, "finishing loan without interest terms, no payment recorded");
                    false
                }
            };

            loan.close();
            events.push(Event::LoanFinished {
                loan_id,
                old_status,
                payment_recorded,
                timestamp: now,
            });
            Ok(events)
        })?;

        info!(
            %loan_id,
            %owner_id,
            total_paid_amount = ?loan.total_paid_amount,
            "loan finished"
        );
        Ok(loan)
    }

    /// record a renewal payment
    ///
    /// `InterestOnly` books one period of interest and moves the due date to
    /// `new_due_date`, or one month past the current due date when none is
    /// given. `Full` books principal plus interest and closes the loan.
    pub fn renew(
        &self,
        loan_id: LoanId,
        owner_id: OwnerId,
        payment: PaymentType,
        new_due_date: Option<NaiveDate>,
    ) -> Result<Loan> {
        let today = self.today();
        let now = self.time.now();
        let policy = self.config.rollover_policy;

        let saved = self.write_with_retry(loan_id, owner_id, |loan| {
            let (principal, rate) = loan.interest_terms().ok_or_else(|| {
                LoanError::bad_request("loan has no interest rate or principal set")
            })?;
            let interest = principal
                .interest_at(rate)
                .ok_or_else(|| LoanError::amount_out_of_range(loan_id, "interest"))?;
            debug!(%loan_id, %interest, ?payment, "renewing loan");

            match payment {
                PaymentType::InterestOnly => {
                    if loan.status == LoanStatus::Finished {
                        return Err(LoanError::bad_request("a finished loan cannot be rolled over"));
                    }

                    let old_due_date = loan.due_date;
                    let next_due = match new_due_date {
                        Some(date) => date,
                        None => calendar::add_one_month(old_due_date, policy)?,
                    };
                    loan.record_interest_payment(interest, today, next_due)?;

                    Ok(vec![
                        Event::InterestPaid {
                            loan_id,
                            amount: interest,
                            interest_paid_total: loan.interest_paid_total.unwrap_or(Money::ZERO),
                            payment_date: today,
                        },
                        Event::DueDateRolled {
                            loan_id,
                            old_due_date,
                            new_due_date: next_due,
                            supplied_by_caller: new_due_date.is_some(),
                        },
                    ])
                }
                PaymentType::Full => {
                    let old_status = loan.status;
                    let settlement = principal
                        .checked_add(interest)
                        .ok_or_else(|| LoanError::amount_out_of_range(loan_id, "settlement"))?;
                    loan.record_settlement(settlement, today)?;
                    loan.close();

                    Ok(vec![
                        Event::LoanSettled {
                            loan_id,
                            settlement_amount: settlement,
                            total_paid_amount: loan.total_paid_amount.unwrap_or(Money::ZERO),
                            payment_date: today,
                        },
                        Event::LoanFinished {
                            loan_id,
                            old_status,
                            payment_recorded: true,
                            timestamp: now,
                        },
                    ])
                }
            }
        })?;

        // hand back what the store holds now, not our copy
        let loan = match self.store.get(loan_id)? {
            Some(reloaded) => reloaded,
            None => saved,
        };
        ensure_owner(&loan, owner_id)?;

        info!(
            %loan_id,
            %owner_id,
            ?payment,
            due_date = %loan.due_date,
            status = %loan.status,
            "loan renewed"
        );
        Ok(loan)
    }

    /// hard delete
    pub fn remove(&self, loan_id: LoanId, owner_id: OwnerId) -> Result<Removal> {
        load_owned(&self.store, loan_id, owner_id)?;

        if !self.store.delete(loan_id)? {
            return Err(LoanError::loan_not_found(loan_id));
        }

        info!(%loan_id, %owner_id, "loan removed");
        self.emit(vec![Event::LoanRemoved {
            loan_id,
            owner_id,
            timestamp: self.time.now(),
        }]);

        Ok(Removal {
            loan_id,
            message: "loan removed".to_string(),
        })
    }

    /// dashboard figures over every loan of the owner
    pub fn get_stats(&self, owner_id: OwnerId) -> Result<LoanStats> {
        let loans = self.store.list_by_owner(owner_id)?;
        let today = self.today();
        let stats = ReportEngine::from_config(&self.config).compute(&loans, today)?;

        debug!(
            %owner_id,
            %today,
            total_loans = stats.total_loans,
            overdue_count = stats.overdue_count,
            "computed stats"
        );
        Ok(stats)
    }

    /// drain events collected since the last call, oldest first; at most
    /// `EngineConfig::event_log_capacity` are kept between calls
    pub fn take_events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_events()
    }

    /// read, mutate and conditionally write a loan, retrying lost races
    ///
    /// `mutate` runs against a fresh copy on every attempt and returns the
    /// events to publish once the write lands.
    fn write_with_retry<F>(&self, loan_id: LoanId, owner_id: OwnerId, mut mutate: F) -> Result<Loan>
    where
        F: FnMut(&mut Loan) -> Result<Vec<Event>>,
    {
        let attempts = self.config.max_write_attempts;

        for attempt in 1..=attempts {
            let mut loan = load_owned(&self.store, loan_id, owner_id)?;
            let expected_version = loan.version;

            let events = mutate(&mut loan)?;
            loan.touch(self.time.now());

            match self.store.update_if_version(&loan, expected_version)? {
                WriteOutcome::Written(saved) => {
                    self.emit(events);
                    return Ok(saved);
                }
                WriteOutcome::Conflict { current_version } => {
                    warn!(
                        %loan_id,
                        attempt,
                        expected_version,
                        current_version,
                        "concurrent write detected, retrying"
                    );
                }
                WriteOutcome::Missing => return Err(LoanError::loan_not_found(loan_id)),
            }
        }

        Err(LoanError::WriteConflict { loan_id, attempts })
    }

    fn emit(&self, events: Vec<Event>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .emit_all(events);
    }
}

fn patched_fields(patch: &LoanPatch) -> Vec<String> {
    [
        ("name", patch.name.is_some()),
        ("phone", patch.phone.is_some()),
        ("address", patch.address.is_some()),
        ("notes", patch.notes.is_some()),
        ("principal", patch.principal.is_some()),
        ("interestRatePercent", patch.interest_rate_percent.is_some()),
        ("dueDate", patch.due_date.is_some()),
    ]
    .iter()
    .filter(|(_, set)| *set)
    .map(|(name, _)| name.to_string())
    .collect()
}
