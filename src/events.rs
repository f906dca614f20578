use std::collections::VecDeque;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{LoanId, LoanStatus, OwnerId};

const DEFAULT_CAPACITY: usize = 256;

/// all events that can be emitted by the lifecycle engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    LoanCreated {
        loan_id: LoanId,
        owner_id: OwnerId,
        principal: Money,
        due_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    LoanUpdated {
        loan_id: LoanId,
        fields: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    InterestPaid {
        loan_id: LoanId,
        amount: Money,
        interest_paid_total: Money,
        payment_date: NaiveDate,
    },
    DueDateRolled {
        loan_id: LoanId,
        old_due_date: NaiveDate,
        new_due_date: NaiveDate,
        supplied_by_caller: bool,
    },
    LoanSettled {
        loan_id: LoanId,
        settlement_amount: Money,
        total_paid_amount: Money,
        payment_date: NaiveDate,
    },
    LoanFinished {
        loan_id: LoanId,
        old_status: LoanStatus,
        payment_recorded: bool,
        timestamp: DateTime<Utc>,
    },
    LoanRemoved {
        loan_id: LoanId,
        owner_id: OwnerId,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn loan_id(&self) -> LoanId {
        match self {
            Event::LoanCreated { loan_id, .. }
            | Event::LoanUpdated { loan_id, .. }
            | Event::InterestPaid { loan_id, .. }
            | Event::DueDateRolled { loan_id, .. }
            | Event::LoanSettled { loan_id, .. }
            | Event::LoanFinished { loan_id, .. }
            | Event::LoanRemoved { loan_id, .. } => *loan_id,
        }
    }
}

/// Events produced by the service, in the order their writes landed.
///
/// Holds at most `capacity` events; once full, each new event pushes out the
/// oldest one. A capacity of 0 keeps nothing.
#[derive(Debug)]
pub struct EventStore {
    events: VecDeque<Event>,
    capacity: usize,
    dropped: u64,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
            dropped: 0,
        }
    }

    pub fn emit(&mut self, event: Event) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// append the events of one committed write
    pub fn emit_all(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// events recorded for one loan
    pub fn for_loan(&self, loan_id: LoanId) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.loan_id() == loan_id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// events pushed out or never kept since the store was created
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
