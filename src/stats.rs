//! Receivables reporting over the full loan book of one owner.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::{self, MonthLocale, YearMonth};
use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::loan::Loan;

/// one bar of the monthly history chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: String,
    pub value: Money,
}

/// dashboard figures for one owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanStats {
    /// number of active loans
    pub total_loans: usize,
    pub total_received: Money,
    /// principal falling due this month on loans not yet settled
    pub total_to_receive: Money,
    pub overdue_count: usize,
    pub overdue_value: Money,
    /// same figure as `total_to_receive`, kept for older clients
    pub monthly_value: Money,
    pub monthly_history: Vec<MonthlyPoint>,
    pub current_month_received: Money,
    pub previous_month_received: Money,
}

impl LoanStats {
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// engine computing `LoanStats`
pub struct ReportEngine {
    pub history_months: u32,
    pub locale: MonthLocale,
}

impl ReportEngine {
    pub fn new(history_months: u32, locale: MonthLocale) -> Self {
        Self {
            history_months,
            locale,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.history_months, config.month_locale)
    }

    /// fails with `BadRequest` when a total leaves the representable range
    pub fn compute(&self, loans: &[Loan], today: NaiveDate) -> Result<LoanStats> {
        let current = YearMonth::of(today);
        let previous = current.previous();

        let active: Vec<&Loan> = loans.iter().filter(|l| l.status.is_active()).collect();
        let paid: Vec<&Loan> = loans.iter().filter(|l| l.payment_date.is_some()).collect();

        let total_received = total("total received", paid.iter().map(|l| l.amount_received()))?;

        let overdue: Vec<&&Loan> = active.iter().filter(|l| l.is_overdue(today)).collect();
        let overdue_value = total("overdue value", overdue.iter().map(|l| principal_of(l)))?;

        let total_to_receive = total(
            "total to receive",
            active
                .iter()
                .filter(|l| current.contains(l.due_date) && !l.is_fully_paid())
                .map(|l| principal_of(l)),
        )?;

        let received_in = |month: YearMonth| -> Result<Money> {
            total(
                "monthly received",
                paid.iter()
                    .filter(|l| l.payment_date.map_or(false, |d| month.contains(d)))
                    .map(|l| l.amount_received()),
            )
        };

        Ok(LoanStats {
            total_loans: active.len(),
            total_received,
            total_to_receive,
            overdue_count: overdue.len(),
            overdue_value,
            monthly_value: total_to_receive,
            monthly_history: self.monthly_history(loans, today)?,
            current_month_received: received_in(current)?,
            previous_month_received: received_in(previous)?,
        })
    }

    /// trailing months, oldest first, current month last
    pub fn monthly_history(&self, loans: &[Loan], today: NaiveDate) -> Result<Vec<MonthlyPoint>> {
        calendar::trailing_months(today, self.history_months)
            .into_iter()
            .map(|month| {
                // unpaid loans land in a bucket too but add nothing
                let value = total(
                    "monthly history",
                    loans
                        .iter()
                        .filter(|l| month.contains(l.reference_date()))
                        .filter(|l| l.payment_date.is_some())
                        .map(|l| l.amount_received()),
                )?;
                Ok(MonthlyPoint {
                    month: calendar::month_label(month, self.locale).to_string(),
                    value,
                })
            })
            .collect()
    }
}

fn total(what: &str, amounts: impl Iterator<Item = Money>) -> Result<Money> {
    Money::checked_sum(amounts).ok_or_else(|| {
        LoanError::bad_request(format!("{} exceeds the representable amount", what))
    })
}

fn principal_of(loan: &Loan) -> Money {
    loan.principal.unwrap_or(Money::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::loan::NewLoan;
    use crate::types::LoanStatus;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan(principal: i64, due: NaiveDate) -> Loan {
        let created = Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap();
        let input =
            NewLoan::new(Money::from_major(principal), due).rate(Rate::from_percentage(dec!(10)));
        Loan::open(Uuid::new_v4(), Uuid::nil(), input, created)
    }

    fn engine() -> ReportEngine {
        ReportEngine::from_config(&EngineConfig::default())
    }

    #[test]
    fn test_single_overdue_loan() {
        let today = date(2024, 5, 20);
        let stats = engine().compute(&[loan(500, date(2024, 5, 1))], today).unwrap();

        assert_eq!(stats.total_loans, 1);
        assert_eq!(stats.overdue_count, 1);
        assert_eq!(stats.overdue_value, Money::from_major(500));
        // due this month as well
        assert_eq!(stats.total_to_receive, Money::from_major(500));
        assert_eq!(stats.monthly_value, stats.total_to_receive);
        assert_eq!(stats.total_received, Money::ZERO);
    }

    #[test]
    fn test_paid_loan_is_not_overdue() {
        let today = date(2024, 5, 20);
        let mut l = loan(500, date(2024, 5, 1));
        l.record_interest_payment(Money::from_major(50), date(2024, 5, 1), date(2024, 5, 1))
            .unwrap();

        let stats = engine().compute(&[l], today).unwrap();
        assert_eq!(stats.overdue_count, 0);
        assert_eq!(stats.overdue_value, Money::ZERO);
        // interest-only payer still owes the principal this month
        assert_eq!(stats.total_to_receive, Money::from_major(500));
    }

    #[test]
    fn test_received_prefers_settlement() {
        let today = date(2024, 5, 20);

        let mut renewed = loan(1_000, date(2024, 6, 10));
        renewed
            .record_interest_payment(Money::from_major(100), date(2024, 5, 10), date(2024, 6, 10))
            .unwrap();

        let mut settled = loan(1_000, date(2024, 4, 10));
        settled.interest_paid_total = Some(Money::from_major(100));
        settled.record_settlement(Money::from_major(1_100), date(2024, 4, 12)).unwrap();
        settled.close();

        let stats = engine().compute(&[renewed, settled], today).unwrap();
        assert_eq!(stats.total_received, Money::from_major(1_200));
        assert_eq!(stats.current_month_received, Money::from_major(100));
        assert_eq!(stats.previous_month_received, Money::from_major(1_100));
        assert_eq!(stats.total_loans, 1);
    }

    #[test]
    fn test_stale_active_settled_loan_not_due() {
        let today = date(2024, 5, 20);
        let mut stale = loan(700, date(2024, 5, 25));
        stale.total_paid_amount = Some(Money::from_major(770));

        let stats = engine().compute(&[stale], today).unwrap();
        assert_eq!(stats.total_loans, 1);
        assert_eq!(stats.total_to_receive, Money::ZERO);
    }

    #[test]
    fn test_previous_month_across_year() {
        let today = date(2024, 1, 3);
        let mut l = loan(200, date(2024, 1, 30));
        l.record_interest_payment(Money::from_major(20), date(2023, 12, 30), date(2024, 1, 30))
            .unwrap();

        let stats = engine().compute(&[l], today).unwrap();
        assert_eq!(stats.previous_month_received, Money::from_major(20));
        assert_eq!(stats.current_month_received, Money::ZERO);
    }

    #[test]
    fn test_monthly_history_shape() {
        let today = date(2024, 3, 15);
        let stats = engine().compute(&[], today).unwrap();

        let labels: Vec<&str> = stats.monthly_history.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(labels, ["Out.", "Nov.", "Dez.", "Jan.", "Fev.", "Mar."]);
        assert!(stats.monthly_history.iter().all(|p| !p.value.is_negative()));
    }

    #[test]
    fn test_monthly_history_buckets() {
        let today = date(2024, 3, 15);

        let mut paid_feb = loan(1_000, date(2024, 3, 10));
        paid_feb
            .record_interest_payment(Money::from_major(100), date(2024, 2, 10), date(2024, 3, 10))
            .unwrap();

        let mut finished_unpaid = loan(300, date(2024, 2, 1));
        finished_unpaid.close();
        finished_unpaid.touch(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());

        let mut settled_old = loan(100, date(2023, 1, 1));
        settled_old.record_settlement(Money::from_major(110), date(2023, 1, 5)).unwrap();

        let loans = [paid_feb, finished_unpaid, loan(50, date(2024, 1, 1)), settled_old];
        let history = ReportEngine::new(6, MonthLocale::En)
            .monthly_history(&loans, today)
            .unwrap();

        assert_eq!(history.len(), 6);
        let values: Vec<Money> = history.iter().map(|p| p.value).collect();
        assert_eq!(
            values,
            [
                Money::ZERO,
                Money::ZERO,
                Money::ZERO,
                Money::ZERO,
                Money::from_major(100),
                Money::ZERO,
            ]
        );
        assert_eq!(history[4].month, "Feb");
    }

    #[test]
    fn test_oversized_totals_are_an_error() {
        let today = date(2024, 5, 20);
        let huge = Money::from_str_exact("50000000000000000000000000000").unwrap();
        let mut big = loan(1, date(2024, 5, 1));
        big.principal = Some(huge);

        let result = engine().compute(&[big.clone(), big], today);
        assert!(matches!(result, Err(LoanError::BadRequest { .. })));
    }

    #[test]
    fn test_finished_loans_excluded_from_active_figures() {
        let today = date(2024, 5, 20);
        let mut l = loan(500, date(2024, 4, 1));
        l.close();
        assert_eq!(l.status, LoanStatus::Finished);

        let stats = engine().compute(&[l], today).unwrap();
        assert_eq!(stats.total_loans, 0);
        assert_eq!(stats.overdue_count, 0);
    }

    #[test]
    fn test_json_field_names() {
        let stats = engine().compute(&[], date(2024, 5, 20)).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&stats.to_json_pretty().unwrap()).unwrap();
        for key in [
            "totalLoans",
            "totalReceived",
            "totalToReceive",
            "overdueCount",
            "overdueValue",
            "monthlyValue",
            "monthlyHistory",
            "currentMonthReceived",
            "previousMonthReceived",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }
}
