//! Seeded synthetic workload: experiments, campaigns and retention
//! interventions with plausible outcomes, for demos and determinism tests.
//!
//! Same (seed, size, now) → same workload, draw for draw. Record ids are
//! assigned by the desk and are the only thing that differs between runs.

use crate::{
    ab_test::{AnalyzeRequest, NewExperiment, PrimaryMetric},
    campaign::{CampaignProgress, CampaignType, NewCampaign},
    desk::AnalyticsDesk,
    error::AnalyticsResult,
    retention::{ActionType, MeasurementRequest, NewRetentionRecord},
    rng::{SeededRng, StreamSlot},
    types::{Money, Timestamp},
};
use chrono::Duration;
use serde::Serialize;

const SEGMENTS: [&str; 4] = ["high_risk", "dormant", "new_joiners", "premium"];
const CAMPAIGN_TYPES: [CampaignType; 5] = [
    CampaignType::Reactivation,
    CampaignType::Onboarding,
    CampaignType::Loyalty,
    CampaignType::Retention,
    CampaignType::Growth,
];
const MEASUREMENT_PERIODS: [u32; 4] = [14, 30, 30, 60];

#[derive(Debug, Clone)]
pub struct SyntheticExperiment {
    pub request:  NewExperiment,
    pub observed: AnalyzeRequest,
}

#[derive(Debug, Clone)]
pub struct SyntheticCampaign {
    pub request:   NewCampaign,
    pub progress:  Option<CampaignProgress>,
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct SyntheticIntervention {
    pub request:     NewRetentionRecord,
    pub action_date: Timestamp,
    /// Present once the measurement period has ended by `now`.
    pub measurement: Option<(MeasurementRequest, Timestamp)>,
}

#[derive(Debug, Clone)]
pub struct SyntheticWorkload {
    pub seed:          u64,
    pub experiments:   Vec<SyntheticExperiment>,
    pub campaigns:     Vec<SyntheticCampaign>,
    pub interventions: Vec<SyntheticIntervention>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkloadSummary {
    pub experiments:             u64,
    pub significant_experiments: u64,
    pub campaigns:               u64,
    pub completed_campaigns:     u64,
    pub retention_records:       u64,
    pub measured_records:        u64,
}

impl SyntheticWorkload {
    /// `size` is the number of retention interventions; experiments and
    /// campaigns scale down from it.
    pub fn generate(seed: u64, size: usize, now: Timestamp) -> Self {
        let n_experiments = (size / 50).max(1);
        let n_campaigns = (size / 25).max(1);

        let mut exp_rng = SeededRng::new(seed, StreamSlot::Experiments);
        let experiments = (0..n_experiments)
            .map(|i| synth_experiment(&mut exp_rng, i, now))
            .collect();

        let mut camp_rng = SeededRng::new(seed, StreamSlot::Campaigns);
        let campaigns = (0..n_campaigns)
            .map(|i| synth_campaign(&mut camp_rng, i, now))
            .collect();

        let mut ret_rng = SeededRng::new(seed, StreamSlot::Retention);
        let mut meas_rng = SeededRng::new(seed, StreamSlot::Measurements);
        let customers = (size as u64 / 2).max(1);
        let interventions = (0..size)
            .map(|_| synth_intervention(&mut ret_rng, &mut meas_rng, customers, now))
            .collect();

        log::debug!(
            "synthetic workload seed={seed}: {n_experiments} experiments, {n_campaigns} campaigns, {size} interventions"
        );

        Self { seed, experiments, campaigns, interventions }
    }

    /// Drive the workload through the desk in a fixed order.
    pub fn apply(&self, desk: &AnalyticsDesk, now: Timestamp) -> AnalyticsResult<WorkloadSummary> {
        let mut summary = WorkloadSummary::default();

        for exp in &self.experiments {
            let created = desk.create_experiment(exp.request.clone(), now)?;
            let result = desk.analyze_experiment(&created.id, &exp.observed, now)?;
            summary.experiments += 1;
            if result.is_significant {
                summary.significant_experiments += 1;
            }
        }

        for camp in &self.campaigns {
            let created = desk.create_campaign(camp.request.clone(), now)?;
            summary.campaigns += 1;
            let Some(progress) = camp.progress else { continue };
            desk.activate_campaign(&created.id, now)?;
            desk.record_campaign_progress(&created.id, &progress, now)?;
            if camp.completed {
                desk.complete_campaign(&created.id, now)?;
                summary.completed_campaigns += 1;
            }
        }

        for iv in &self.interventions {
            let rec = desk.create_retention_record(iv.request.clone(), iv.action_date, now)?;
            summary.retention_records += 1;
            if let Some((measurement, measured_at)) = &iv.measurement {
                desk.measure_retention(&rec.id, measurement.clone(), *measured_at)?;
                summary.measured_records += 1;
            }
        }

        log::info!(
            "synthetic workload seed={} applied: {} experiments, {} campaigns, {} retention records ({} measured)",
            self.seed,
            summary.experiments,
            summary.campaigns,
            summary.retention_records,
            summary.measured_records,
        );
        Ok(summary)
    }
}

fn synth_experiment(rng: &mut SeededRng, index: usize, now: Timestamp) -> SyntheticExperiment {
    let sample_size = 200 + rng.below(4_800);
    let segment = rng.pick(&SEGMENTS).copied().unwrap_or("all");
    let start_date = now - Duration::days(14 + rng.below(30) as i64);

    let half = sample_size / 2;
    let group_a_size = (half - rng.below(half / 10 + 1)).max(1);
    let group_b_size = (half - rng.below(half / 10 + 1)).max(1);
    let control = rng.uniform(5.0, 20.0);
    let treatment = (control + rng.uniform(-2.0, 5.0)).clamp(0.0, 100.0);

    SyntheticExperiment {
        request: NewExperiment {
            test_name:           format!("Retention offer test #{}", index + 1),
            description:         None,
            hypothesis:          "A personalised offer lowers churn in the segment".into(),
            target_segment:      segment.to_string(),
            sample_size,
            split_ratio:         None,
            start_date,
            end_date:            None,
            group_a_name:        "Control".into(),
            group_a_description: "No contact".into(),
            group_b_name:        "Treatment".into(),
            group_b_description: "Personalised offer".into(),
            primary_metric:      PrimaryMetric::ConversionRate,
        },
        observed: AnalyzeRequest {
            group_a_metric_value: control,
            group_b_metric_value: treatment,
            group_a_size,
            group_b_size,
        },
    }
}

fn synth_campaign(rng: &mut SeededRng, index: usize, now: Timestamp) -> SyntheticCampaign {
    let campaign_type = rng.pick(&CAMPAIGN_TYPES).copied().unwrap_or(CampaignType::Retention);
    let segment = rng.pick(&SEGMENTS).copied().unwrap_or("all");
    let today = now.date_naive();
    let start_date = today - Duration::days(rng.below(90) as i64);
    let end_date = start_date + Duration::days(14 + rng.below(46) as i64);
    let budget: Money = 1_000_000 + rng.below(9_000_000) as Money;
    let target_customers = 500 + rng.below(5_000);

    let started = start_date <= today;
    let progress = started.then(|| {
        let reached = (target_customers as f64 * rng.uniform(0.6, 1.0)).floor() as u64;
        let converted = (reached as f64 * rng.uniform(0.01, 0.15)).floor() as u64;
        let ltv = rng.pareto(20_000.0, 2.5).min(500_000.0) as Money;
        CampaignProgress {
            reached_customers:   reached,
            converted_customers: converted,
            revenue_generated:   converted as Money * ltv,
        }
    });

    SyntheticCampaign {
        request: NewCampaign {
            name: format!("{} wave {}", campaign_type.as_str().to_lowercase(), index + 1),
            campaign_type,
            target_segment: segment.to_string(),
            start_date,
            end_date,
            budget,
            target_customers: target_customers as i64,
        },
        progress,
        completed: started && end_date < today,
    }
}

fn synth_intervention(
    rng: &mut SeededRng,
    meas_rng: &mut SeededRng,
    customers: u64,
    now: Timestamp,
) -> SyntheticIntervention {
    let customer_id = format!("CUST-{:05}", rng.below(customers));
    let action_type = rng.pick(&ActionType::ALL).copied().unwrap_or(ActionType::Other);
    let before_risk_score = 40 + rng.below(61) as i32;
    let before_churn_probability =
        (f64::from(before_risk_score) / 100.0 * rng.uniform(0.6, 1.0)).min(1.0);
    let before_monthly_amount = rng
        .chance(0.8)
        .then(|| rng.pareto(30_000.0, 3.0).min(1_000_000.0) as Money);
    let period = rng.pick(&MEASUREMENT_PERIODS).copied().unwrap_or(30);
    let action_date = now - Duration::days(rng.below(150) as i64);
    let end_date = action_date + Duration::days(i64::from(period));

    // Measurement draws are taken for every intervention so the stream
    // position never depends on which ones are due.
    let churned = meas_rng.chance(base_churn_rate(action_type) * f64::from(before_risk_score) / 70.0);
    let reduction = meas_rng.uniform(-5.0, 35.0).round() as i32;
    let amount_drift = meas_rng.uniform(-0.1, 0.2);
    let churn_offset = meas_rng.below(u64::from(period));
    let lag = meas_rng.below(5) as i64;

    let measurement = (end_date <= now).then(|| {
        let after_risk_score = if churned {
            100
        } else {
            (before_risk_score - reduction).clamp(0, 100)
        };
        let after_monthly_amount = before_monthly_amount.map(|amount| {
            if churned {
                0
            } else {
                (amount as f64 * (1.0 + amount_drift)).round() as Money
            }
        });
        let measured_at = (end_date + Duration::days(lag)).min(now);
        (
            MeasurementRequest {
                after_risk_score,
                after_churn_probability: f64::from(after_risk_score) / 100.0,
                after_monthly_amount,
                has_churned: churned,
                churn_date: churned.then(|| action_date + Duration::days(churn_offset as i64)),
                notes: None,
            },
            measured_at,
        )
    });

    SyntheticIntervention {
        request: NewRetentionRecord {
            customer_id,
            action_type,
            before_risk_score,
            before_churn_probability,
            before_monthly_amount,
            measurement_period_days: Some(period),
        },
        action_date,
        measurement,
    }
}

fn base_churn_rate(action: ActionType) -> f64 {
    match action {
        ActionType::Counseling => 0.18,
        ActionType::Campaign   => 0.28,
        ActionType::Coupon     => 0.22,
        ActionType::Other      => 0.35,
    }
}
