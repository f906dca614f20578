use serde::{Deserialize, Serialize};

use crate::calendar::{MonthLocale, RolloverPolicy};
use crate::errors::{LoanError, Result};

/// engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// how interest-only renewals move the due date
    pub rollover_policy: RolloverPolicy,
    /// number of months reported in the monthly history, current month included
    pub history_months: u32,
    /// language of the month labels in the monthly history
    pub month_locale: MonthLocale,
    /// conditional-write attempts before a write gives up with a conflict
    pub max_write_attempts: u32,
    /// events kept for `take_events`; the oldest are dropped beyond this,
    /// and 0 turns collection off
    pub event_log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::legacy()
    }
}

impl EngineConfig {
    /// behaviour of the existing app: overflowing rollover, six months of
    /// pt-BR history
    pub fn legacy() -> Self {
        Self {
            rollover_policy: RolloverPolicy::Overflow,
            history_months: 6,
            month_locale: MonthLocale::PtBr,
            max_write_attempts: 3,
            event_log_capacity: 256,
        }
    }

    /// due dates never skip a month: jan 31 renews to the last day of february
    pub fn month_end_clamped() -> Self {
        Self {
            rollover_policy: RolloverPolicy::ClampToMonthEnd,
            ..Self::legacy()
        }
    }

    pub fn with_locale(mut self, locale: MonthLocale) -> Self {
        self.month_locale = locale;
        self
    }

    pub fn with_history_months(mut self, months: u32) -> Self {
        self.history_months = months;
        self
    }

    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts;
        self
    }

    pub fn with_event_log_capacity(mut self, capacity: usize) -> Self {
        self.event_log_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_months == 0 {
            return Err(LoanError::InvalidConfiguration {
                message: "history_months must be at least 1".to_string(),
            });
        }
        if self.max_write_attempts == 0 {
            return Err(LoanError::InvalidConfiguration {
                message: "max_write_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// parse and validate a json document; missing keys take legacy values
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let legacy = EngineConfig::default();
        assert_eq!(legacy.rollover_policy, RolloverPolicy::Overflow);
        assert_eq!(legacy.history_months, 6);
        assert!(legacy.validate().is_ok());

        let clamped = EngineConfig::month_end_clamped();
        assert_eq!(clamped.rollover_policy, RolloverPolicy::ClampToMonthEnd);
        assert_eq!(clamped.month_locale, MonthLocale::PtBr);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "month_locale": "en" }"#).unwrap();
        assert_eq!(config.month_locale, MonthLocale::En);
        assert_eq!(config.history_months, 6);
        assert_eq!(config.max_write_attempts, 3);
        assert_eq!(config.event_log_capacity, 256);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "history_months": 0 }"#),
            Err(LoanError::InvalidConfiguration { .. })
        ));
        assert!(EngineConfig::legacy().with_max_write_attempts(0).validate().is_err());
        assert!(EngineConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::month_end_clamped().with_history_months(12);
        let parsed = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
