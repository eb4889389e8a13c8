//! Retention-effect tracking: did an intervention keep the customer?
//!
//! A record is created when an intervention runs, holding the customer's
//! "before" risk picture. After the measurement period an operator enters
//! the "after" values exactly once.
//!
//! Lifecycle:
//!   pending → measured
//!
//! "Overdue" is derived at query time (pending past its end date); it is
//! never stored. Success is `!has_churned` and nothing else: the churn flag
//! entered by the operator is ground truth, risk movement is only reported.

use crate::{
    config::RetentionConfig,
    error::{ensure_range, AnalyticsError, AnalyticsResult},
    types::{percent_of, CustomerId, Money, RecordId, Timestamp},
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Counseling,
    Campaign,
    Coupon,
    Other,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::Counseling,
        ActionType::Campaign,
        ActionType::Coupon,
        ActionType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counseling => "counseling",
            Self::Campaign   => "campaign",
            Self::Coupon     => "coupon",
            Self::Other      => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "counseling" => Some(Self::Counseling),
            "campaign"   => Some(Self::Campaign),
            "coupon"     => Some(Self::Coupon),
            "other"      => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionStatus {
    Pending,
    Measured,
}

impl RetentionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending  => "pending",
            Self::Measured => "measured",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending"  => Some(Self::Pending),
            "measured" => Some(Self::Measured),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionMeasurement {
    pub after_risk_score:           i32,
    #[serde(rename = "after_churn_prob")]
    pub after_churn_probability:    f64,
    pub after_monthly_amount:       Option<Money>,
    pub has_churned:                bool,
    pub churn_date:                 Option<Timestamp>,
    pub notes:                      Option<String>,
    /// before − after; positive means risk went down.
    pub risk_reduction:             i32,
    /// Present only when both monthly amounts are known.
    #[serde(rename = "amount_change_rate")]
    pub amount_change_rate_percent: Option<f64>,
    pub measured_at:                Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionRecord {
    pub id:                       RecordId,
    pub customer_id:              CustomerId,
    pub action_type:              ActionType,
    pub before_risk_score:        i32,
    #[serde(rename = "before_churn_prob")]
    pub before_churn_probability: f64,
    pub before_monthly_amount:    Option<Money>,
    pub action_date:              Timestamp,
    pub measurement_period_days:  u32,
    pub measurement_end_date:     Timestamp,
    pub status:                   RetentionStatus,
    pub measurement:              Option<RetentionMeasurement>,
}

impl RetentionRecord {
    pub fn is_measured(&self) -> bool {
        self.status == RetentionStatus::Measured
    }

    /// Some(true) when measured and the customer stayed.
    pub fn is_successful(&self) -> Option<bool> {
        self.measurement.as_ref().map(|m| !m.has_churned)
    }

    /// Whole days past the measurement end date, 0 if not yet reached.
    pub fn days_overdue(&self, now: Timestamp) -> i64 {
        (now - self.measurement_end_date).num_days().max(0)
    }

    pub fn is_overdue(&self, now: Timestamp) -> bool {
        self.status == RetentionStatus::Pending && now > self.measurement_end_date
    }
}

/// Creation request, as sent when an intervention starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRetentionRecord {
    pub customer_id:              CustomerId,
    pub action_type:              ActionType,
    pub before_risk_score:        i32,
    #[serde(rename = "before_churn_prob")]
    pub before_churn_probability: f64,
    #[serde(default)]
    pub before_monthly_amount:    Option<Money>,
    #[serde(default)]
    pub measurement_period_days:  Option<u32>,
}

/// After-values entered by an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRequest {
    pub after_risk_score:        i32,
    #[serde(rename = "after_churn_prob")]
    pub after_churn_probability: f64,
    #[serde(default)]
    pub after_monthly_amount:    Option<Money>,
    #[serde(default)]
    pub has_churned:             bool,
    #[serde(default)]
    pub churn_date:              Option<Timestamp>,
    #[serde(default)]
    pub notes:                   Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMeasurement {
    #[serde(flatten)]
    pub record:       RetentionRecord,
    pub days_overdue: i64,
}

impl PendingMeasurement {
    pub fn is_overdue(&self) -> bool {
        self.days_overdue > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTypeStats {
    pub total:        u64,
    pub successful:   u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionStats {
    pub period_days:                u32,
    pub action_type:                Option<ActionType>,
    pub total_records:              u64,
    pub successful_retentions:      u64,
    pub churned_customers:          u64,
    pub retention_success_rate:     f64,
    pub churn_rate:                 f64,
    pub average_risk_reduction:     f64,
    pub average_amount_change_rate: f64,
    pub by_action_type:             BTreeMap<ActionType, ActionTypeStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRetentionHistory {
    pub customer_id:           CustomerId,
    pub total_records:         u64,
    pub successful_retentions: u64,
    pub success_rate:          f64,
    pub total_risk_reduction:  i64,
    /// Newest first.
    pub records:               Vec<RetentionRecord>,
}

// ── Tracker ──────────────────────────────────────────────────────────────────

pub struct RetentionEffectTracker {
    config: RetentionConfig,
}

impl RetentionEffectTracker {
    pub fn new(config: RetentionConfig) -> Self {
        Self { config }
    }

    pub fn create(
        &self,
        req: NewRetentionRecord,
        action_date: Timestamp,
    ) -> AnalyticsResult<RetentionRecord> {
        if req.customer_id.trim().is_empty() {
            return Err(AnalyticsError::invalid("customer_id", "must not be empty"));
        }
        validate_risk_score("before_risk_score", req.before_risk_score)?;
        ensure_range("before_churn_prob", req.before_churn_probability, 0.0, 1.0)?;
        validate_amount("before_monthly_amount", req.before_monthly_amount)?;

        let period = req
            .measurement_period_days
            .unwrap_or(self.config.default_measurement_period_days);
        if period < self.config.min_measurement_period_days
            || period > self.config.max_measurement_period_days
        {
            return Err(AnalyticsError::invalid(
                "measurement_period_days",
                format!(
                    "must be within [{}, {}], got {period}",
                    self.config.min_measurement_period_days,
                    self.config.max_measurement_period_days,
                ),
            ));
        }

        let measurement_end_date = action_date
            .checked_add_signed(Duration::days(i64::from(period)))
            .ok_or_else(|| AnalyticsError::invalid("action_date", "measurement period runs past the calendar"))?;

        let record = RetentionRecord {
            id:                       uuid::Uuid::new_v4().to_string(),
            customer_id:              req.customer_id,
            action_type:              req.action_type,
            before_risk_score:        req.before_risk_score,
            before_churn_probability: req.before_churn_probability,
            before_monthly_amount:    req.before_monthly_amount,
            action_date,
            measurement_period_days:  period,
            measurement_end_date,
            status:                   RetentionStatus::Pending,
            measurement:              None,
        };

        log::info!(
            "retention {}: created for customer {} ({}, risk={}, ends {})",
            record.id,
            record.customer_id,
            record.action_type.as_str(),
            record.before_risk_score,
            record.measurement_end_date,
        );
        Ok(record)
    }

    /// Pending → Measured, exactly once.
    pub fn measure(
        &self,
        record: &mut RetentionRecord,
        req: MeasurementRequest,
        now: Timestamp,
    ) -> AnalyticsResult<()> {
        if record.status == RetentionStatus::Measured {
            return Err(AnalyticsError::illegal_state(
                "measure retention record",
                format!("record {} is already measured", record.id),
            ));
        }
        validate_risk_score("after_risk_score", req.after_risk_score)?;
        ensure_range("after_churn_prob", req.after_churn_probability, 0.0, 1.0)?;
        validate_amount("after_monthly_amount", req.after_monthly_amount)?;

        if now < record.measurement_end_date {
            log::warn!(
                "retention {}: measured {} day(s) before the period ends",
                record.id,
                (record.measurement_end_date - now).num_days(),
            );
        }

        let risk_reduction = record.before_risk_score - req.after_risk_score;
        let amount_change_rate_percent =
            match (record.before_monthly_amount, req.after_monthly_amount) {
                (Some(0), Some(_)) => Some(0.0),
                (Some(before), Some(after)) => {
                    Some((after - before) as f64 / before as f64 * 100.0)
                }
                _ => None,
            };

        record.measurement = Some(RetentionMeasurement {
            after_risk_score:        req.after_risk_score,
            after_churn_probability: req.after_churn_probability,
            after_monthly_amount:    req.after_monthly_amount,
            has_churned:             req.has_churned,
            churn_date:              req.churn_date,
            notes:                   req.notes,
            risk_reduction,
            amount_change_rate_percent,
            measured_at:             now,
        });
        record.status = RetentionStatus::Measured;

        log::info!(
            "retention {}: measured (churned={}, risk_reduction={risk_reduction})",
            record.id,
            req.has_churned,
        );
        Ok(())
    }

    /// Every pending record with its overdue days, earliest end date first.
    pub fn list_pending(
        &self,
        records: &[RetentionRecord],
        now: Timestamp,
    ) -> Vec<PendingMeasurement> {
        let mut pending: Vec<PendingMeasurement> = records
            .iter()
            .filter(|r| r.status == RetentionStatus::Pending)
            .map(|r| PendingMeasurement {
                days_overdue: r.days_overdue(now),
                record:       r.clone(),
            })
            .collect();
        pending.sort_by(|a, b| {
            a.record
                .measurement_end_date
                .cmp(&b.record.measurement_end_date)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        pending
    }

    /// Success statistics over measured records whose action date falls in
    /// `[now − period_days, now]`, optionally for one action type.
    pub fn aggregate(
        &self,
        records: &[RetentionRecord],
        now: Timestamp,
        period_days: u32,
        action_type: Option<ActionType>,
    ) -> AnalyticsResult<RetentionStats> {
        if period_days == 0 {
            return Err(AnalyticsError::invalid("period_days", "must be at least 1"));
        }
        let cutoff = now
            .checked_sub_signed(Duration::days(i64::from(period_days)))
            .ok_or_else(|| AnalyticsError::invalid("period_days", "window reaches outside the calendar"))?;

        let mut total = 0u64;
        let mut successful = 0u64;
        let mut churned = 0u64;
        let mut risk_reduction_sum = 0i64;
        let mut amount_change_sum = 0.0;
        let mut amount_change_count = 0u64;
        let mut by_type: BTreeMap<ActionType, (u64, u64)> = BTreeMap::new();

        let in_scope = records.iter().filter(|r| {
            r.action_date >= cutoff
                && r.action_date <= now
                && action_type.map_or(true, |t| r.action_type == t)
        });

        for record in in_scope {
            let Some(m) = record.measurement.as_ref() else { continue };

            total += 1;
            let entry = by_type.entry(record.action_type).or_insert((0, 0));
            entry.0 += 1;
            if m.has_churned {
                churned += 1;
            } else {
                successful += 1;
                entry.1 += 1;
            }
            risk_reduction_sum += i64::from(m.risk_reduction);
            if let Some(rate) = m.amount_change_rate_percent {
                amount_change_sum += rate;
                amount_change_count += 1;
            }
        }

        let by_action_type = by_type
            .into_iter()
            .map(|(t, (n, ok))| {
                (t, ActionTypeStats {
                    total:        n,
                    successful:   ok,
                    success_rate: percent_of(ok, n),
                })
            })
            .collect();

        Ok(RetentionStats {
            period_days,
            action_type,
            total_records: total,
            successful_retentions: successful,
            churned_customers: churned,
            retention_success_rate: percent_of(successful, total),
            churn_rate: percent_of(churned, total),
            average_risk_reduction: mean(risk_reduction_sum as f64, total),
            average_amount_change_rate: mean(amount_change_sum, amount_change_count),
            by_action_type,
        })
    }

    pub fn customer_history(
        &self,
        records: &[RetentionRecord],
        customer_id: &str,
    ) -> CustomerRetentionHistory {
        let mut mine: Vec<RetentionRecord> = records
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.action_date.cmp(&a.action_date));

        let total = mine.len() as u64;
        let successful = mine.iter().filter(|r| r.is_successful() == Some(true)).count() as u64;
        let total_risk_reduction = mine
            .iter()
            .filter_map(|r| r.measurement.as_ref())
            .map(|m| i64::from(m.risk_reduction))
            .sum();

        CustomerRetentionHistory {
            customer_id: customer_id.to_string(),
            total_records: total,
            successful_retentions: successful,
            success_rate: percent_of(successful, total),
            total_risk_reduction,
            records: mine,
        }
    }
}

fn validate_risk_score(field: &'static str, score: i32) -> AnalyticsResult<()> {
    if !(0..=100).contains(&score) {
        return Err(AnalyticsError::invalid(field, format!("must be within [0, 100], got {score}")));
    }
    Ok(())
}

fn validate_amount(field: &'static str, amount: Option<Money>) -> AnalyticsResult<()> {
    match amount {
        Some(a) if a < 0 => Err(AnalyticsError::invalid(field, "must be non-negative")),
        _ => Ok(()),
    }
}

fn mean(sum: f64, count: u64) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}
