//! Campaign records: intervention budgets aimed at a customer segment.
//!
//! Lifecycle:
//!   planned → active → completed
//!
//! Reached/converted counts and generated revenue stay unset until the
//! campaign is running; realised ROI is derived from them.

use crate::{
    error::{ensure_range, AnalyticsError, AnalyticsResult},
    roi::{ROICalculator, ROIRequest, ROIResult},
    types::{percent_of, Money, RecordId, Timestamp},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignType {
    Reactivation,
    Onboarding,
    Loyalty,
    Retention,
    Growth,
}

impl CampaignType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reactivation => "REACTIVATION",
            Self::Onboarding   => "ONBOARDING",
            Self::Loyalty      => "LOYALTY",
            Self::Retention    => "RETENTION",
            Self::Growth       => "GROWTH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "REACTIVATION" => Some(Self::Reactivation),
            "ONBOARDING"   => Some(Self::Onboarding),
            "LOYALTY"      => Some(Self::Loyalty),
            "RETENTION"    => Some(Self::Retention),
            "GROWTH"       => Some(Self::Growth),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Planned,
    Active,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned   => "PLANNED",
            Self::Active    => "ACTIVE",
            Self::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PLANNED"   => Some(Self::Planned),
            "ACTIVE"    => Some(Self::Active),
            "COMPLETED" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id:                  RecordId,
    pub name:                String,
    #[serde(rename = "type")]
    pub campaign_type:       CampaignType,
    pub target_segment:      String,
    pub start_date:          NaiveDate,
    pub end_date:            NaiveDate,
    pub budget:              Money,
    pub target_customers:    u64,
    pub status:              CampaignStatus,
    pub reached_customers:   Option<u64>,
    pub converted_customers: Option<u64>,
    pub revenue_generated:   Option<Money>,
    pub created_at:          Timestamp,
}

impl Campaign {
    /// converted / reached × 100, once the campaign has progress.
    pub fn conversion_rate(&self) -> Option<f64> {
        match (self.reached_customers, self.converted_customers) {
            (Some(reached), Some(converted)) => Some(percent_of(converted, reached)),
            _ => None,
        }
    }

    /// Realised revenue multiple. None until revenue is recorded,
    /// and None for a zero budget.
    pub fn roi(&self) -> Option<f64> {
        let revenue = self.revenue_generated?;
        if self.budget == 0 {
            return None;
        }
        Some(revenue as f64 / self.budget as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name:             String,
    #[serde(rename = "type")]
    pub campaign_type:    CampaignType,
    pub target_segment:   String,
    pub start_date:       NaiveDate,
    pub end_date:         NaiveDate,
    pub budget:           Money,
    pub target_customers: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CampaignProgress {
    pub reached_customers:   u64,
    pub converted_customers: u64,
    pub revenue_generated:   Money,
}

#[derive(Debug, Clone, Default)]
pub struct CampaignTracker;

impl CampaignTracker {
    pub fn new() -> Self {
        Self
    }

    pub fn create(&self, req: NewCampaign, now: Timestamp) -> AnalyticsResult<Campaign> {
        if req.name.trim().is_empty() {
            return Err(AnalyticsError::invalid("name", "must not be empty"));
        }
        if req.budget < 0 {
            return Err(AnalyticsError::invalid("budget", "must be non-negative"));
        }
        if req.target_customers < 0 {
            return Err(AnalyticsError::invalid("target_customers", "must be non-negative"));
        }
        if req.end_date < req.start_date {
            return Err(AnalyticsError::invalid("end_date", "must not precede start_date"));
        }

        Ok(Campaign {
            id:                  uuid::Uuid::new_v4().to_string(),
            name:                req.name,
            campaign_type:       req.campaign_type,
            target_segment:      req.target_segment,
            start_date:          req.start_date,
            end_date:            req.end_date,
            budget:              req.budget,
            target_customers:    req.target_customers as u64,
            status:              CampaignStatus::Planned,
            reached_customers:   None,
            converted_customers: None,
            revenue_generated:   None,
            created_at:          now,
        })
    }

    pub fn activate(&self, campaign: &mut Campaign) -> AnalyticsResult<()> {
        self.transition(campaign, CampaignStatus::Planned, CampaignStatus::Active, "activate campaign")?;
        campaign.reached_customers = Some(0);
        campaign.converted_customers = Some(0);
        campaign.revenue_generated = Some(0);
        Ok(())
    }

    pub fn record_progress(
        &self,
        campaign: &mut Campaign,
        progress: &CampaignProgress,
    ) -> AnalyticsResult<()> {
        if campaign.status != CampaignStatus::Active {
            return Err(AnalyticsError::illegal_state(
                "record campaign progress",
                format!("campaign is {}", campaign.status.as_str()),
            ));
        }
        if progress.converted_customers > progress.reached_customers {
            return Err(AnalyticsError::invalid(
                "converted_customers",
                format!(
                    "cannot exceed reached_customers ({} > {})",
                    progress.converted_customers, progress.reached_customers,
                ),
            ));
        }
        if progress.revenue_generated < 0 {
            return Err(AnalyticsError::invalid("revenue_generated", "must be non-negative"));
        }

        campaign.reached_customers = Some(progress.reached_customers);
        campaign.converted_customers = Some(progress.converted_customers);
        campaign.revenue_generated = Some(progress.revenue_generated);

        log::debug!(
            "campaign {}: reached={} converted={} revenue={}",
            campaign.id,
            progress.reached_customers,
            progress.converted_customers,
            progress.revenue_generated,
        );
        Ok(())
    }

    pub fn complete(&self, campaign: &mut Campaign) -> AnalyticsResult<()> {
        self.transition(campaign, CampaignStatus::Active, CampaignStatus::Completed, "complete campaign")
    }

    /// Projected ROI for this campaign's own budget and target count.
    pub fn projected_roi(
        &self,
        calculator: &ROICalculator,
        campaign: &Campaign,
        expected_conversion_rate_percent: f64,
        avg_customer_ltv: Money,
    ) -> AnalyticsResult<ROIResult> {
        ensure_range("expected_conversion_rate", expected_conversion_rate_percent, 0.0, 100.0)?;
        let target_customers = i64::try_from(campaign.target_customers)
            .map_err(|_| AnalyticsError::invalid("target_customers", "exceeds supported range"))?;
        calculator.calculate(&ROIRequest {
            budget: campaign.budget,
            target_customers,
            expected_conversion_rate_percent,
            avg_customer_ltv,
        })
    }

    fn transition(
        &self,
        campaign: &mut Campaign,
        from: CampaignStatus,
        to: CampaignStatus,
        operation: &'static str,
    ) -> AnalyticsResult<()> {
        if campaign.status != from {
            return Err(AnalyticsError::illegal_state(
                operation,
                format!("campaign is {}", campaign.status.as_str()),
            ));
        }
        campaign.status = to;
        log::info!("campaign {}: {} → {}", campaign.id, from.as_str(), to.as_str());
        Ok(())
    }
}
