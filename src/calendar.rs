//! Calendar helpers for due dates and reporting periods.
//!
//! Due and payment dates are plain calendar days (`NaiveDate`), never
//! instants, so nothing here depends on a timezone.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{LoanError, Result};

/// how "one month later" treats days missing from the target month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloverPolicy {
    /// keep the day number; surplus days spill into the following month
    /// (jan 31 -> mar 3 in a common year)
    #[default]
    Overflow,
    /// keep the day number, capped at the last day of the target month
    ClampToMonthEnd,
}

/// language used for month labels in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthLocale {
    #[default]
    PtBr,
    En,
}

// abbreviations keep their period, as pt-BR writes them
const PT_BR_MONTHS: [&str; 12] = [
    "Jan.", "Fev.", "Mar.", "Abr.", "Mai.", "Jun.", "Jul.", "Ago.", "Set.", "Out.", "Nov.", "Dez.",
];

const EN_MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// a calendar month of a given year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    /// 1-12
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(LoanError::InvalidDate {
                message: format!("month out of range: {}", month),
            });
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// move by a signed number of months
    pub fn shift(&self, months: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + months;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn previous(&self) -> Self {
        self.shift(-1)
    }

    pub fn next(&self) -> Self {
        self.shift(1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        YearMonth::of(date) == *self
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn days(&self) -> u32 {
        days_in_month(self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// source of the current time for the engine
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// current calendar day (UTC)
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

impl Clock for SafeTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        SafeTimeProvider::now(self)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// parse a zero-padded `YYYY-MM-DD` string component by component
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let invalid = || LoanError::InvalidDate {
        message: format!("expected YYYY-MM-DD, got {:?}", s),
    };

    let mut parts = s.split('-');
    let (year, month, day) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(y), Some(m), Some(d), None) if y.len() == 4 && m.len() == 2 && d.len() == 2 => {
            (y, m, d)
        }
        _ => return Err(invalid()),
    };

    if !(year.bytes().chain(month.bytes()).chain(day.bytes())).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// zero-padded `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

/// the same day one calendar month later
pub fn add_one_month(date: NaiveDate, policy: RolloverPolicy) -> Result<NaiveDate> {
    let target = YearMonth::of(date).next();
    let out_of_range = || LoanError::InvalidDate {
        message: format!("cannot roll {} forward one month", format_date(date)),
    };

    match policy {
        RolloverPolicy::Overflow => {
            let first = target.first_day().ok_or_else(out_of_range)?;
            first
                .checked_add_signed(Duration::days(date.day() as i64 - 1))
                .ok_or_else(out_of_range)
        }
        RolloverPolicy::ClampToMonthEnd => {
            let day = date.day().min(target.days());
            NaiveDate::from_ymd_opt(target.year, target.month, day).ok_or_else(out_of_range)
        }
    }
}

/// a due date strictly before today is overdue
pub fn is_overdue(due_date: NaiveDate, today: NaiveDate) -> bool {
    due_date < today
}

/// the `count` months ending with the month of `today`, oldest first
pub fn trailing_months(today: NaiveDate, count: u32) -> Vec<YearMonth> {
    let current = YearMonth::of(today);
    (0..count as i32)
        .rev()
        .map(|back| current.shift(-back))
        .collect()
}

/// capitalized short month name
pub fn month_label(month: YearMonth, locale: MonthLocale) -> &'static str {
    let names = match locale {
        MonthLocale::PtBr => &PT_BR_MONTHS,
        MonthLocale::En => &EN_MONTHS,
    };
    names[(month.month as usize + 11) % 12]
}
