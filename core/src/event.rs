//! The event log: an append-only trail of every state change.
//!
//! RULE: Only the desk appends events, and only after the change it
//! describes has been written in the same transaction.

use crate::{
    ab_test::ExperimentStatus,
    campaign::CampaignStatus,
    proportion_test::Winner,
    retention::ActionType,
    types::{CustomerId, RecordId, Recommendation, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Every state change recorded by the desk.
/// Variants are appended only, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    // ── Experiments ────────────────────────────────
    ExperimentCreated {
        experiment_id:  RecordId,
        name:           String,
        target_segment: String,
    },
    ExperimentStatusChanged {
        experiment_id: RecordId,
        from:          ExperimentStatus,
        to:            ExperimentStatus,
    },
    ExperimentAnalyzed {
        experiment_id:  RecordId,
        winner:         Winner,
        lift:           f64,
        p_value:        f64,
        is_significant: bool,
        recommendation: Recommendation,
    },

    // ── Campaigns ──────────────────────────────────
    CampaignCreated {
        campaign_id: RecordId,
        name:        String,
        budget:      i64,
    },
    CampaignStatusChanged {
        campaign_id: RecordId,
        from:        CampaignStatus,
        to:          CampaignStatus,
    },
    CampaignProgressRecorded {
        campaign_id:         RecordId,
        reached_customers:   u64,
        converted_customers: u64,
        revenue_generated:   i64,
    },

    // ── Retention ──────────────────────────────────
    RetentionRecordCreated {
        record_id:         RecordId,
        customer_id:       CustomerId,
        action_type:       ActionType,
        before_risk_score: i32,
    },
    RetentionMeasured {
        record_id:      RecordId,
        customer_id:    CustomerId,
        has_churned:    bool,
        risk_reduction: i32,
    },
}

impl AnalyticsEvent {
    /// Stable name stored in the event_type column.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ExperimentCreated { .. }        => "experiment_created",
            Self::ExperimentStatusChanged { .. }  => "experiment_status_changed",
            Self::ExperimentAnalyzed { .. }       => "experiment_analyzed",
            Self::CampaignCreated { .. }          => "campaign_created",
            Self::CampaignStatusChanged { .. }    => "campaign_status_changed",
            Self::CampaignProgressRecorded { .. } => "campaign_progress_recorded",
            Self::RetentionRecordCreated { .. }   => "retention_record_created",
            Self::RetentionMeasured { .. }        => "retention_measured",
        }
    }

    /// The record this event is about.
    pub fn entity_id(&self) -> &str {
        match self {
            Self::ExperimentCreated { experiment_id, .. }
            | Self::ExperimentStatusChanged { experiment_id, .. }
            | Self::ExperimentAnalyzed { experiment_id, .. } => experiment_id,
            Self::CampaignCreated { campaign_id, .. }
            | Self::CampaignStatusChanged { campaign_id, .. }
            | Self::CampaignProgressRecorded { campaign_id, .. } => campaign_id,
            Self::RetentionRecordCreated { record_id, .. }
            | Self::RetentionMeasured { record_id, .. } => record_id,
        }
    }
}

/// Persisted event log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:          Option<i64>,
    pub entity_id:   RecordId,
    pub event_type:  String,
    pub payload:     String, // JSON-serialized AnalyticsEvent
    pub recorded_at: Timestamp,
}

impl EventLogEntry {
    pub fn new(event: &AnalyticsEvent, recorded_at: Timestamp) -> serde_json::Result<Self> {
        Ok(Self {
            id:          None,
            entity_id:   event.entity_id().to_string(),
            event_type:  event.event_type().to_string(),
            payload:     serde_json::to_string(event)?,
            recorded_at,
        })
    }

    pub fn decode(&self) -> serde_json::Result<AnalyticsEvent> {
        serde_json::from_str(&self.payload)
    }
}
