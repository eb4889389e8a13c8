//! The analytics desk, one method per operation.
//!
//! RULES:
//!   - Calculators stay pure; only the desk touches the store.
//!   - Every mutation is a single `atomically` unit: load, apply, write,
//!     append the event. A failure at any step rolls all of it back.
//!   - "now" is always supplied by the caller.

use crate::{
    ab_test::{ABTestEvaluator, AnalyzeRequest, Experiment, ExperimentStatus, NewExperiment},
    campaign::{Campaign, CampaignProgress, CampaignStatus, CampaignTracker, NewCampaign},
    config::AnalyticsConfig,
    error::{AnalyticsError, AnalyticsResult},
    event::{AnalyticsEvent, EventLogEntry},
    proportion_test::ProportionTestResult,
    retention::{
        ActionType, CustomerRetentionHistory, MeasurementRequest, NewRetentionRecord,
        PendingMeasurement, RetentionEffectTracker, RetentionRecord, RetentionStats,
        RetentionStatus,
    },
    roi::{ROICalculator, ROIRequest, ROIResult},
    store::AnalyticsStore,
    types::{Money, RecordId, Timestamp},
};

pub struct AnalyticsDesk {
    config:    AnalyticsConfig,
    store:     AnalyticsStore,
    evaluator: ABTestEvaluator,
    roi:       ROICalculator,
    campaigns: CampaignTracker,
    retention: RetentionEffectTracker,
}

impl AnalyticsDesk {
    /// Wire the desk over an already-migrated store.
    pub fn new(config: AnalyticsConfig, store: AnalyticsStore) -> Self {
        Self {
            evaluator: ABTestEvaluator::new(config.experiments.clone(), &config.significance),
            roi:       ROICalculator::new(config.roi.clone()),
            campaigns: CampaignTracker::new(),
            retention: RetentionEffectTracker::new(config.retention.clone()),
            config,
            store,
        }
    }

    /// Load thresholds from `data_dir`, migrate the store and wire the desk.
    pub fn build(store: AnalyticsStore, data_dir: &str) -> AnalyticsResult<Self> {
        let config = AnalyticsConfig::load(data_dir)?;
        store.migrate()?;
        Ok(Self::new(config, store))
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn store(&self) -> &AnalyticsStore {
        &self.store
    }

    // ── Experiments ────────────────────────────────────────────

    pub fn create_experiment(
        &self,
        req: NewExperiment,
        now: Timestamp,
    ) -> AnalyticsResult<Experiment> {
        let experiment = self.evaluator.create(req, now)?;
        self.store.atomically(|store| {
            store.put_experiment(&experiment)?;
            record(store, &AnalyticsEvent::ExperimentCreated {
                experiment_id:  experiment.id.clone(),
                name:           experiment.name.clone(),
                target_segment: experiment.target_segment.clone(),
            }, now)
        })?;
        log::info!("experiment {}: created '{}' (draft)", experiment.id, experiment.name);
        Ok(experiment)
    }

    pub fn start_experiment(&self, experiment_id: &str, now: Timestamp) -> AnalyticsResult<Experiment> {
        self.store.atomically(|store| {
            let mut experiment = store.get_experiment(experiment_id)?;
            self.evaluator.start(&mut experiment, now)?;
            store.put_experiment(&experiment)?;
            record(store, &status_changed(&experiment.id, ExperimentStatus::Draft, experiment.status), now)?;
            Ok(experiment)
        })
    }

    /// Move every Draft experiment whose start date has arrived to Running.
    /// Returns the ids that moved.
    pub fn refresh_schedules(&self, now: Timestamp) -> AnalyticsResult<Vec<RecordId>> {
        self.store.atomically(|store| {
            let mut started = Vec::new();
            for mut experiment in store.list_experiments(Some(ExperimentStatus::Draft))? {
                if self.evaluator.advance_schedule(&mut experiment, now) {
                    store.put_experiment(&experiment)?;
                    record(store, &status_changed(&experiment.id, ExperimentStatus::Draft, experiment.status), now)?;
                    started.push(experiment.id);
                }
            }
            Ok(started)
        })
    }

    /// Analyze measured values. A Draft whose start date has passed is
    /// advanced first; one still waiting for its start date is rejected.
    pub fn analyze_experiment(
        &self,
        experiment_id: &str,
        req: &AnalyzeRequest,
        now: Timestamp,
    ) -> AnalyticsResult<ProportionTestResult> {
        self.store.atomically(|store| {
            let mut experiment = store.get_experiment(experiment_id)?;
            if self.evaluator.advance_schedule(&mut experiment, now) {
                record(store, &status_changed(&experiment.id, ExperimentStatus::Draft, experiment.status), now)?;
            }

            let before = experiment.status;
            let result = self.evaluator.analyze(&mut experiment, req, now)?;
            store.put_experiment(&experiment)?;

            if before != experiment.status {
                record(store, &status_changed(&experiment.id, before, experiment.status), now)?;
            }
            record(store, &AnalyticsEvent::ExperimentAnalyzed {
                experiment_id:  experiment.id.clone(),
                winner:         result.winner,
                lift:           result.lift,
                p_value:        result.p_value,
                is_significant: result.is_significant,
                recommendation: result.recommendation,
            }, now)?;
            Ok(result)
        })
    }

    pub fn experiment(&self, experiment_id: &str) -> AnalyticsResult<Experiment> {
        self.store.get_experiment(experiment_id)
    }

    pub fn experiments(&self, status: Option<ExperimentStatus>) -> AnalyticsResult<Vec<Experiment>> {
        self.store.list_experiments(status)
    }

    // ── ROI ────────────────────────────────────────────────────

    /// Stateless; nothing is stored.
    pub fn calculate_roi(&self, req: &ROIRequest) -> AnalyticsResult<ROIResult> {
        self.roi.calculate(req)
    }

    // ── Campaigns ──────────────────────────────────────────────

    pub fn create_campaign(&self, req: NewCampaign, now: Timestamp) -> AnalyticsResult<Campaign> {
        let campaign = self.campaigns.create(req, now)?;
        self.store.atomically(|store| {
            store.put_campaign(&campaign)?;
            record(store, &AnalyticsEvent::CampaignCreated {
                campaign_id: campaign.id.clone(),
                name:        campaign.name.clone(),
                budget:      campaign.budget,
            }, now)
        })?;
        log::info!(
            "campaign {}: created '{}' ({}, budget={})",
            campaign.id,
            campaign.name,
            campaign.campaign_type.as_str(),
            campaign.budget,
        );
        Ok(campaign)
    }

    pub fn activate_campaign(&self, campaign_id: &str, now: Timestamp) -> AnalyticsResult<Campaign> {
        self.transition_campaign(campaign_id, now, |tracker, c| tracker.activate(c))
    }

    pub fn complete_campaign(&self, campaign_id: &str, now: Timestamp) -> AnalyticsResult<Campaign> {
        self.transition_campaign(campaign_id, now, |tracker, c| tracker.complete(c))
    }

    pub fn record_campaign_progress(
        &self,
        campaign_id: &str,
        progress: &CampaignProgress,
        now: Timestamp,
    ) -> AnalyticsResult<Campaign> {
        self.store.atomically(|store| {
            let mut campaign = store.get_campaign(campaign_id)?;
            self.campaigns.record_progress(&mut campaign, progress)?;
            store.put_campaign(&campaign)?;
            record(store, &AnalyticsEvent::CampaignProgressRecorded {
                campaign_id:         campaign.id.clone(),
                reached_customers:   progress.reached_customers,
                converted_customers: progress.converted_customers,
                revenue_generated:   progress.revenue_generated,
            }, now)?;
            Ok(campaign)
        })
    }

    pub fn campaign(&self, campaign_id: &str) -> AnalyticsResult<Campaign> {
        self.store.get_campaign(campaign_id)
    }

    pub fn campaigns(&self, status: Option<CampaignStatus>) -> AnalyticsResult<Vec<Campaign>> {
        self.store.list_campaigns(status)
    }

    pub fn projected_campaign_roi(
        &self,
        campaign_id: &str,
        expected_conversion_rate_percent: f64,
        avg_customer_ltv: Money,
    ) -> AnalyticsResult<ROIResult> {
        let campaign = self.store.get_campaign(campaign_id)?;
        self.campaigns
            .projected_roi(&self.roi, &campaign, expected_conversion_rate_percent, avg_customer_ltv)
    }

    fn transition_campaign(
        &self,
        campaign_id: &str,
        now: Timestamp,
        apply: impl FnOnce(&CampaignTracker, &mut Campaign) -> AnalyticsResult<()>,
    ) -> AnalyticsResult<Campaign> {
        self.store.atomically(|store| {
            let mut campaign = store.get_campaign(campaign_id)?;
            let from = campaign.status;
            apply(&self.campaigns, &mut campaign)?;
            store.put_campaign(&campaign)?;
            record(store, &AnalyticsEvent::CampaignStatusChanged {
                campaign_id: campaign.id.clone(),
                from,
                to: campaign.status,
            }, now)?;
            Ok(campaign)
        })
    }

    // ── Retention ──────────────────────────────────────────────

    /// `action_date` is when the intervention ran and may lie in the past;
    /// the log entry is stamped with `now`.
    pub fn create_retention_record(
        &self,
        req: NewRetentionRecord,
        action_date: Timestamp,
        now: Timestamp,
    ) -> AnalyticsResult<RetentionRecord> {
        let rec = self.retention.create(req, action_date)?;
        self.store.atomically(|store| {
            store.put_retention_record(&rec)?;
            record(store, &AnalyticsEvent::RetentionRecordCreated {
                record_id:         rec.id.clone(),
                customer_id:       rec.customer_id.clone(),
                action_type:       rec.action_type,
                before_risk_score: rec.before_risk_score,
            }, now)
        })?;
        Ok(rec)
    }

    /// Read, check and write under one write lock: two concurrent
    /// measurements of the same record cannot both succeed.
    pub fn measure_retention(
        &self,
        record_id: &str,
        req: MeasurementRequest,
        now: Timestamp,
    ) -> AnalyticsResult<RetentionRecord> {
        self.store.atomically(|store| {
            let mut rec = store.get_retention_record(record_id)?;
            self.retention.measure(&mut rec, req, now)?;
            store.put_retention_record(&rec)?;

            let (has_churned, risk_reduction) = rec
                .measurement
                .as_ref()
                .map(|m| (m.has_churned, m.risk_reduction))
                .unwrap_or_default();
            record(store, &AnalyticsEvent::RetentionMeasured {
                record_id:   rec.id.clone(),
                customer_id: rec.customer_id.clone(),
                has_churned,
                risk_reduction,
            }, now)?;
            Ok(rec)
        })
    }

    pub fn retention_record(&self, record_id: &str) -> AnalyticsResult<RetentionRecord> {
        self.store.get_retention_record(record_id)
    }

    pub fn pending_measurements(&self, now: Timestamp) -> AnalyticsResult<Vec<PendingMeasurement>> {
        let pending = self.store.list_retention_records(Some(RetentionStatus::Pending))?;
        Ok(self.retention.list_pending(&pending, now))
    }

    /// `period_days` falls back to `retention.default_stats_period_days`.
    pub fn retention_stats(
        &self,
        now: Timestamp,
        period_days: Option<u32>,
        action_type: Option<ActionType>,
    ) -> AnalyticsResult<RetentionStats> {
        let period = period_days.unwrap_or(self.config.retention.default_stats_period_days);
        let measured = self.store.list_retention_records(Some(RetentionStatus::Measured))?;
        let stats = self.retention.aggregate(&measured, now, period, action_type)?;
        log::debug!(
            "retention stats: period={period}d records={} success={:.1}%",
            stats.total_records,
            stats.retention_success_rate,
        );
        Ok(stats)
    }

    pub fn customer_retention_history(
        &self,
        customer_id: &str,
    ) -> AnalyticsResult<CustomerRetentionHistory> {
        let records = self.store.retention_records_for_customer(customer_id)?;
        Ok(self.retention.customer_history(&records, customer_id))
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn events(&self, entity_id: &str) -> AnalyticsResult<Vec<AnalyticsEvent>> {
        self.store
            .events_for_entity(entity_id)?
            .iter()
            .map(|entry| entry.decode().map_err(AnalyticsError::from))
            .collect()
    }
}

fn record(store: &AnalyticsStore, event: &AnalyticsEvent, now: Timestamp) -> AnalyticsResult<()> {
    store.append_event(&EventLogEntry::new(event, now)?)
}

fn status_changed(id: &str, from: ExperimentStatus, to: ExperimentStatus) -> AnalyticsEvent {
    AnalyticsEvent::ExperimentStatusChanged {
        experiment_id: id.to_string(),
        from,
        to,
    }
}
