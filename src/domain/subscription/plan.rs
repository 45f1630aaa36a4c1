//! Billing period of a subscription plan.

use crate::domain::foundation::ValidationError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How often the subscriber is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    #[default]
    Monthly,
    Annual,
}

impl BillingPeriod {
    /// Approximate period length used when the provider omits period bounds.
    pub fn length_days(&self) -> i64 {
        match self {
            BillingPeriod::Monthly => 30,
            BillingPeriod::Annual => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Annual => "annual",
        }
    }
}

impl FromStr for BillingPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" | "month" => Ok(BillingPeriod::Monthly),
            "annual" | "yearly" | "year" => Ok(BillingPeriod::Annual),
            other => Err(ValidationError::invalid_format(
                "billing_period",
                format!("unknown billing period '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_interval_names() {
        assert_eq!("month".parse(), Ok(BillingPeriod::Monthly));
        assert_eq!("year".parse(), Ok(BillingPeriod::Annual));
        assert_eq!("Annual".parse(), Ok(BillingPeriod::Annual));
    }

    #[test]
    fn rejects_unknown_interval() {
        assert!("weekly".parse::<BillingPeriod>().is_err());
    }
}
