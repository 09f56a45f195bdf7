//! Structured fields extracted from a tender document.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unit of a contract completion period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl PeriodUnit {
    /// Parse a unit word as it appears in tender text ("Days", "year", ...).
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "day" | "days" => Some(Self::Days),
            "week" | "weeks" => Some(Self::Weeks),
            "month" | "months" => Some(Self::Months),
            "year" | "years" => Some(Self::Years),
            _ => None,
        }
    }
}

impl std::fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Days => "Days",
            Self::Weeks => "Weeks",
            Self::Months => "Months",
            Self::Years => "Years",
        };
        f.write_str(s)
    }
}

/// Time allowed to complete the contracted work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionPeriod {
    pub amount: Decimal,
    pub unit: PeriodUnit,
}

impl std::fmt::Display for CompletionPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

/// The extracted tender fields. `None` means no source yielded a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenderFields {
    pub tender_id: Option<String>,
    pub estimated_cost: Option<Decimal>,
    pub emd: Option<Decimal>,
    pub date_of_opening: Option<NaiveDate>,
    pub completion_time: Option<CompletionPeriod>,
}

impl TenderFields {
    /// True once every field has been found.
    pub fn is_complete(&self) -> bool {
        self.tender_id.is_some()
            && self.estimated_cost.is_some()
            && self.emd.is_some()
            && self.date_of_opening.is_some()
            && self.completion_time.is_some()
    }

    /// Names of the fields still missing, in report order.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.tender_id.is_none() {
            missing.push("tender_id");
        }
        if self.estimated_cost.is_none() {
            missing.push("estimated_cost");
        }
        if self.emd.is_none() {
            missing.push("emd");
        }
        if self.date_of_opening.is_none() {
            missing.push("date_of_opening");
        }
        if self.completion_time.is_none() {
            missing.push("completion_time");
        }
        missing
    }
}
