pub mod access;
pub mod calendar;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod loan;
pub mod service;
pub mod stats;
pub mod storage;
pub mod types;

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

// re-export key types
pub use calendar::{Clock, MonthLocale, RolloverPolicy, YearMonth};
pub use config::EngineConfig;
pub use decimal::{Money, Rate};
pub use errors::{LoanError, Result};
pub use events::{Event, EventStore};
pub use loan::{Contact, Loan, LoanPatch, NewLoan};
pub use service::LoanService;
pub use stats::{LoanStats, MonthlyPoint, ReportEngine};
pub use storage::{
    InMemoryLoanStore, InMemoryOwnerDirectory, LoanStore, OwnerDirectory, WriteOutcome,
};
pub use types::{LoanId, LoanStatus, Owner, OwnerId, PaymentType, Removal};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;

static INIT: Once = Once::new();

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting this crate
/// to `info`. Safe to call more than once; a subscriber installed elsewhere
/// is left alone.
pub fn init_tracing() {
    INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = "loan_book_rs=info".parse() {
            filter = filter.add_directive(directive);
        }
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
