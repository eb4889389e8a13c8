//! Shared primitive types used across the analytics core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stable, unique identifier for any stored record.
pub type RecordId = String;

/// External customer identifier, owned by the customer store.
pub type CustomerId = String;

/// Money in the smallest currency unit. Never floating point.
pub type Money = i64;

/// A point in time. Always supplied by the caller.
pub type Timestamp = DateTime<Utc>;

/// Three-way verdict shared by the A/B evaluator and the ROI calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Recommended")]
    Recommended,
    #[serde(rename = "Needs Review")]
    NeedsReview,
    #[serde(rename = "Not Recommended")]
    NotRecommended,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recommended    => "Recommended",
            Self::NeedsReview    => "Needs Review",
            Self::NotRecommended => "Not Recommended",
        }
    }
}

/// A divide-by-zero-adjacent case that was resolved to a documented
/// sentinel instead of failing. Carried on result objects, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateComputation {
    /// Control rate is 0 (or too small for a finite lift): lift reported as 0.
    ZeroBaseRate,
    /// Pooled proportion is 0 or 1: p-value reported as 1.0.
    ZeroStandardError,
    /// Budget is 0: ROI reported as 0 and treated as undefined.
    ZeroBudget,
    /// LTV is 0: no number of conversions recovers the budget.
    ZeroCustomerLtv,
    /// No target customers: break-even rate reported as 0.
    ZeroTargetCustomers,
}

/// Percentage `part / whole × 100`, 0 when `whole` is 0.
pub fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
