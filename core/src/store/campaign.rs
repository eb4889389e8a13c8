use super::{parse_text, AnalyticsStore};
use crate::{
    campaign::{Campaign, CampaignStatus, CampaignType},
    error::{AnalyticsError, AnalyticsResult},
};
use rusqlite::{params, OptionalExtension, Row};

impl AnalyticsStore {
    // ── Campaigns ──────────────────────────────────────────────

    pub fn put_campaign(&self, c: &Campaign) -> AnalyticsResult<()> {
        self.conn.execute(
            "INSERT INTO campaign (
                campaign_id, name, campaign_type, target_segment, start_date, end_date,
                budget, target_customers, status,
                reached_customers, converted_customers, revenue_generated, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)
            ON CONFLICT(campaign_id) DO UPDATE SET
                name                = excluded.name,
                campaign_type       = excluded.campaign_type,
                target_segment      = excluded.target_segment,
                start_date          = excluded.start_date,
                end_date            = excluded.end_date,
                budget              = excluded.budget,
                target_customers    = excluded.target_customers,
                status              = excluded.status,
                reached_customers   = excluded.reached_customers,
                converted_customers = excluded.converted_customers,
                revenue_generated   = excluded.revenue_generated",
            params![
                c.id,
                c.name,
                c.campaign_type.as_str(),
                c.target_segment,
                c.start_date,
                c.end_date,
                c.budget,
                c.target_customers as i64,
                c.status.as_str(),
                c.reached_customers.map(|n| n as i64),
                c.converted_customers.map(|n| n as i64),
                c.revenue_generated,
                c.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_campaign(&self, campaign_id: &str) -> AnalyticsResult<Campaign> {
        self.conn
            .query_row(
                "SELECT campaign_id, name, campaign_type, target_segment, start_date, end_date,
                        budget, target_customers, status,
                        reached_customers, converted_customers, revenue_generated, created_at
                 FROM campaign WHERE campaign_id = ?1",
                params![campaign_id],
                campaign_from_row,
            )
            .optional()?
            .ok_or_else(|| AnalyticsError::not_found("campaign", campaign_id))
    }

    /// Ordered by start date, then name.
    pub fn list_campaigns(&self, status: Option<CampaignStatus>) -> AnalyticsResult<Vec<Campaign>> {
        let mut stmt = self.conn.prepare(
            "SELECT campaign_id, name, campaign_type, target_segment, start_date, end_date,
                    budget, target_customers, status,
                    reached_customers, converted_customers, revenue_generated, created_at
             FROM campaign
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY start_date ASC, name ASC",
        )?;
        let campaigns = stmt
            .query_map(params![status.map(|s| s.as_str())], campaign_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(campaigns)
    }
}

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id:                  row.get(0)?,
        name:                row.get(1)?,
        campaign_type:       parse_text(2, row.get(2)?, CampaignType::parse)?,
        target_segment:      row.get(3)?,
        start_date:          row.get(4)?,
        end_date:            row.get(5)?,
        budget:              row.get(6)?,
        target_customers:    row.get::<_, i64>(7)? as u64,
        status:              parse_text(8, row.get(8)?, CampaignStatus::parse)?,
        reached_customers:   row.get::<_, Option<i64>>(9)?.map(|n| n as u64),
        converted_customers: row.get::<_, Option<i64>>(10)?.map(|n| n as u64),
        revenue_generated:   row.get(11)?,
        created_at:          row.get(12)?,
    })
}
