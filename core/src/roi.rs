//! Campaign ROI calculator: pure financial arithmetic, no state.
//!
//! roi is the revenue multiple `expected_revenue / budget`;
//! roi_percentage is the net return `(roi − 1) × 100`.

use crate::{
    config::RoiConfig,
    error::{ensure_range, AnalyticsError, AnalyticsResult},
    types::{DegenerateComputation, Money, Recommendation},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ROIRequest {
    #[serde(rename = "campaign_budget")]
    pub budget:                           Money,
    pub target_customers:                 i64,
    #[serde(rename = "expected_conversion_rate")]
    pub expected_conversion_rate_percent: f64,
    pub avg_customer_ltv:                 Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ROIResult {
    pub expected_conversions:    i64,
    pub expected_revenue:        Money,
    pub roi:                     f64,
    pub roi_percentage:          f64,
    pub break_even_conversions:  i64,
    #[serde(rename = "break_even_rate")]
    pub break_even_rate_percent: f64,
    pub recommendation:          Recommendation,
    #[serde(default)]
    pub degenerate:              Vec<DegenerateComputation>,
}

impl ROIResult {
    /// False when the budget was 0 and `roi` is only a sentinel.
    pub fn roi_is_defined(&self) -> bool {
        !self.degenerate.contains(&DegenerateComputation::ZeroBudget)
    }

    /// False when LTV was 0 and no number of conversions recovers the budget.
    pub fn break_even_is_recoverable(&self) -> bool {
        !self.degenerate.contains(&DegenerateComputation::ZeroCustomerLtv)
    }
}

#[derive(Debug, Clone)]
pub struct ROICalculator {
    config: RoiConfig,
}

impl ROICalculator {
    pub fn new(config: RoiConfig) -> Self {
        Self { config }
    }

    pub fn calculate(&self, req: &ROIRequest) -> AnalyticsResult<ROIResult> {
        if req.budget < 0 {
            return Err(AnalyticsError::invalid("campaign_budget", "must be non-negative"));
        }
        if req.target_customers < 0 {
            return Err(AnalyticsError::invalid("target_customers", "must be non-negative"));
        }
        ensure_range("expected_conversion_rate", req.expected_conversion_rate_percent, 0.0, 100.0)?;
        if req.avg_customer_ltv < 0 {
            return Err(AnalyticsError::invalid("avg_customer_ltv", "must be non-negative"));
        }

        let mut degenerate = Vec::new();

        let expected_conversions = (req.target_customers as f64
            * req.expected_conversion_rate_percent
            / 100.0)
            .round() as i64;

        let expected_revenue = expected_conversions
            .checked_mul(req.avg_customer_ltv)
            .ok_or_else(|| {
                AnalyticsError::invalid(
                    "avg_customer_ltv",
                    "expected revenue overflows the currency unit",
                )
            })?;

        let (roi, roi_percentage) = if req.budget == 0 {
            degenerate.push(DegenerateComputation::ZeroBudget);
            (0.0, 0.0)
        } else {
            let roi = expected_revenue as f64 / req.budget as f64;
            (roi, (roi - 1.0) * 100.0)
        };

        let break_even_conversions = if req.avg_customer_ltv == 0 {
            degenerate.push(DegenerateComputation::ZeroCustomerLtv);
            0
        } else {
            ceil_div(req.budget, req.avg_customer_ltv)
        };

        let break_even_rate_percent = if req.target_customers == 0 {
            degenerate.push(DegenerateComputation::ZeroTargetCustomers);
            0.0
        } else {
            break_even_conversions as f64 / req.target_customers as f64 * 100.0
        };

        let recommendation = if req.budget == 0 {
            // Nothing to judge a multiple against.
            Recommendation::NeedsReview
        } else {
            self.recommend(roi)
        };

        if !degenerate.is_empty() {
            log::warn!("roi: degenerate computation {degenerate:?} for {req:?}");
        }
        log::debug!(
            "roi: conversions={expected_conversions} revenue={expected_revenue} roi={roi:.2} → {}",
            recommendation.as_str(),
        );

        Ok(ROIResult {
            expected_conversions,
            expected_revenue,
            roi,
            roi_percentage,
            break_even_conversions,
            break_even_rate_percent,
            recommendation,
            degenerate,
        })
    }

    pub fn recommend(&self, roi: f64) -> Recommendation {
        if roi >= self.config.recommended_min_roi {
            Recommendation::Recommended
        } else if roi >= self.config.review_min_roi {
            Recommendation::NeedsReview
        } else {
            Recommendation::NotRecommended
        }
    }
}

/// ⌈a / b⌉ for a ≥ 0, b > 0.
fn ceil_div(a: i64, b: i64) -> i64 {
    a / b + i64::from(a % b != 0)
}
