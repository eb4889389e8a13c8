//! Two-proportion z-test, the statistical primitive behind A/B analysis.
//!
//! Given two sampled rates (percent) and their sample sizes, computes the
//! relative lift of B over A, a pooled two-tailed z-test without continuity
//! correction, and a three-way recommendation.
//!
//! Degenerate cases never fail:
//!   - control rate 0      → lift 0 (ZeroBaseRate)
//!   - pooled SE of 0      → z 0, p-value 1.0 (ZeroStandardError)

use crate::{
    config::SignificanceConfig,
    error::{ensure_range, AnalyticsError, AnalyticsResult},
    types::{DegenerateComputation, Recommendation},
};
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

/// Fixed two-tailed significance threshold. Callers needing another
/// threshold compare `p_value` themselves.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;
pub const CONFIDENCE_LEVEL: f64 = 0.95;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    A,
    B,
    #[serde(rename = "NONE")]
    None,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::A    => "A",
            Winner::B    => "B",
            Winner::None => "NONE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionTestResult {
    /// Relative lift of B over A, signed percent.
    pub lift:             f64,
    pub z_statistic:      f64,
    pub p_value:          f64,
    pub is_significant:   bool,
    pub winner:           Winner,
    pub recommendation:   Recommendation,
    pub conclusion:       String,
    pub confidence_level: f64,
    #[serde(default)]
    pub degenerate:       Vec<DegenerateComputation>,
}

// ── Engine ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ProportionTestEngine {
    materiality_floor_pct: f64,
}

impl ProportionTestEngine {
    pub fn new(config: &SignificanceConfig) -> Self {
        Self { materiality_floor_pct: config.materiality_floor_pct }
    }

    pub fn materiality_floor_pct(&self) -> f64 {
        self.materiality_floor_pct
    }

    pub fn evaluate(
        &self,
        rate_a: f64,
        size_a: u64,
        rate_b: f64,
        size_b: u64,
    ) -> AnalyticsResult<ProportionTestResult> {
        validate_group("group_a_metric_value", "group_a_size", rate_a, size_a)?;
        validate_group("group_b_metric_value", "group_b_size", rate_b, size_b)?;

        let mut degenerate = Vec::new();

        // A subnormal control rate overflows the ratio just like a zero one.
        let raw_lift = (rate_b - rate_a) / rate_a * 100.0;
        let lift = if rate_a == 0.0 || !raw_lift.is_finite() {
            degenerate.push(DegenerateComputation::ZeroBaseRate);
            0.0
        } else {
            raw_lift
        };

        let (p_a, p_b) = (rate_a / 100.0, rate_b / 100.0);
        let (n_a, n_b) = (size_a as f64, size_b as f64);

        let pooled = (p_a * n_a + p_b * n_b) / (n_a + n_b);
        let se = (pooled * (1.0 - pooled) * (1.0 / n_a + 1.0 / n_b)).sqrt();

        // NaN (tiny negative variance from rounding) also lands here.
        let (z_statistic, p_value) = if se > 0.0 && se.is_finite() {
            let z = (p_b - p_a) / se;
            (z, two_tailed_p_value(z))
        } else {
            degenerate.push(DegenerateComputation::ZeroStandardError);
            (0.0, 1.0)
        };

        let is_significant = p_value < SIGNIFICANCE_LEVEL;
        let winner = match (is_significant, rate_b > rate_a) {
            (false, _)    => Winner::None,
            (true, true)  => Winner::B,
            (true, false) => Winner::A,
        };

        let zero_base = degenerate.contains(&DegenerateComputation::ZeroBaseRate);
        let recommendation = self.recommend(is_significant, winner, lift, zero_base);
        let conclusion = compose_conclusion(winner, lift, p_value, zero_base);

        if !degenerate.is_empty() {
            log::warn!(
                "proportion test: degenerate computation {:?} (rate_a={rate_a}, rate_b={rate_b})",
                degenerate,
            );
        }
        log::debug!(
            "proportion test: lift={lift:.2}% z={z_statistic:.4} p={p_value:.6} winner={}",
            winner.as_str(),
        );

        Ok(ProportionTestResult {
            lift,
            z_statistic,
            p_value,
            is_significant,
            winner,
            recommendation,
            conclusion,
            confidence_level: CONFIDENCE_LEVEL,
            degenerate,
        })
    }

    fn recommend(
        &self,
        is_significant: bool,
        winner: Winner,
        lift: f64,
        zero_base: bool,
    ) -> Recommendation {
        if !is_significant {
            return Recommendation::NotRecommended;
        }
        // B beat a zero control: direction is known, magnitude is not.
        if zero_base && winner == Winner::B {
            return Recommendation::NeedsReview;
        }
        if lift <= 0.0 {
            Recommendation::NotRecommended
        } else if lift <= self.materiality_floor_pct {
            Recommendation::NeedsReview
        } else {
            Recommendation::Recommended
        }
    }
}

fn validate_group(
    rate_field: &'static str,
    size_field: &'static str,
    rate: f64,
    size: u64,
) -> AnalyticsResult<()> {
    ensure_range(rate_field, rate, 0.0, 100.0)?;
    if size < 1 {
        return Err(AnalyticsError::invalid(size_field, "must be at least 1"));
    }
    Ok(())
}

fn compose_conclusion(winner: Winner, lift: f64, p_value: f64, zero_base: bool) -> String {
    let (better, worse) = match winner {
        Winner::A    => ("A", "B"),
        Winner::B    => ("B", "A"),
        Winner::None => {
            return format!(
                "The difference between groups ({lift:.1}%) is not statistically significant \
                 (p={p_value:.4}). More samples may be needed."
            );
        }
    };
    if zero_base {
        format!(
            "Group {better} outperformed group {worse} (relative lift undefined for a zero \
             control rate) and the difference is statistically significant (p={p_value:.4})."
        )
    } else {
        format!(
            "Group {better} outperformed group {worse} by {:.1}% and the difference is \
             statistically significant (p={p_value:.4}).",
            lift.abs(),
        )
    }
}

/// Standard normal CDF.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * libm::erfc(-x / SQRT_2)
}

/// Two-tailed p-value for a z statistic: 2·(1 − Φ(|z|)).
/// Uses erfc directly so the upper tail keeps its precision.
pub fn two_tailed_p_value(z: f64) -> f64 {
    libm::erfc(z.abs() / SQRT_2).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_cdf_reference_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-15);
        assert!((normal_cdf(1.96) - 0.975_002_104_851_780).abs() < 1e-9);
        assert!((normal_cdf(-1.0) - 0.158_655_253_931_457).abs() < 1e-9);
        assert!((normal_cdf(1.0) + normal_cdf(-1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn p_value_matches_reference_up_to_z_six() {
        let cases = [
            (0.0, 1.0),
            (1.0, 0.317_310_507_862_914),
            (1.959_963_984_540_054, 0.05),
            (3.0, 0.002_699_796_063_260),
            (6.0, 1.973_175_290_075e-9),
        ];
        for (z, expected) in cases {
            let p = two_tailed_p_value(z);
            assert!(
                (p - expected).abs() < 1e-6 * expected.max(1e-3),
                "p({z}) = {p}, expected {expected}"
            );
            assert_eq!(p, two_tailed_p_value(-z), "p-value must be symmetric in z");
        }
    }

    #[test]
    fn conclusion_names_winner_with_absolute_lift() {
        let text = compose_conclusion(Winner::A, -20.0, 0.001, false);
        assert!(text.starts_with("Group A outperformed group B by 20.0%"), "{text}");
        assert!(text.contains("p=0.0010"), "{text}");
    }
}
