//! Purchased plan types.

use serde::{Deserialize, Serialize};

/// Access plan purchased with a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    OneMonth,
    ThreeMonths,
    Lifetime,
}

impl PlanType {
    /// Stable string form used in persistence and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::OneMonth => "ONE_MONTH",
            PlanType::ThreeMonths => "THREE_MONTHS",
            PlanType::Lifetime => "LIFETIME",
        }
    }

    /// Access duration in days, where the plan is time-limited.
    pub fn duration_days(&self) -> Option<i64> {
        match self {
            PlanType::OneMonth => Some(30),
            PlanType::ThreeMonths => Some(90),
            PlanType::Lifetime => None,
        }
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONE_MONTH" => Ok(PlanType::OneMonth),
            "THREE_MONTHS" => Ok(PlanType::ThreeMonths),
            "LIFETIME" => Ok(PlanType::Lifetime),
            other => Err(format!("unknown plan type: {}", other)),
        }
    }
}
