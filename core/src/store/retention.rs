use super::{parse_text, AnalyticsStore};
use crate::{
    error::{AnalyticsError, AnalyticsResult},
    retention::{ActionType, RetentionMeasurement, RetentionRecord, RetentionStatus},
};
use rusqlite::{params, OptionalExtension, Row};

const RETENTION_COLUMNS: &str =
    "record_id, customer_id, action_type, before_risk_score, before_churn_prob,
     before_monthly_amount, action_date, measurement_period_days, measurement_end_date,
     status, after_risk_score, after_churn_prob, after_monthly_amount, has_churned,
     churn_date, notes, risk_reduction, amount_change_rate, measured_at";

impl AnalyticsStore {
    // ── Retention records ──────────────────────────────────────

    pub fn put_retention_record(&self, r: &RetentionRecord) -> AnalyticsResult<()> {
        let m = r.measurement.as_ref();
        self.conn.execute(
            "INSERT INTO retention_record (
                record_id, customer_id, action_type, before_risk_score, before_churn_prob,
                before_monthly_amount, action_date, measurement_period_days, measurement_end_date,
                status, after_risk_score, after_churn_prob, after_monthly_amount, has_churned,
                churn_date, notes, risk_reduction, amount_change_rate, measured_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)
            ON CONFLICT(record_id) DO UPDATE SET
                status               = excluded.status,
                after_risk_score     = excluded.after_risk_score,
                after_churn_prob     = excluded.after_churn_prob,
                after_monthly_amount = excluded.after_monthly_amount,
                has_churned          = excluded.has_churned,
                churn_date           = excluded.churn_date,
                notes                = excluded.notes,
                risk_reduction       = excluded.risk_reduction,
                amount_change_rate   = excluded.amount_change_rate,
                measured_at          = excluded.measured_at",
            params![
                r.id,
                r.customer_id,
                r.action_type.as_str(),
                r.before_risk_score,
                r.before_churn_probability,
                r.before_monthly_amount,
                r.action_date,
                r.measurement_period_days,
                r.measurement_end_date,
                r.status.as_str(),
                m.map(|m| m.after_risk_score),
                m.map(|m| m.after_churn_probability),
                m.and_then(|m| m.after_monthly_amount),
                m.map(|m| m.has_churned),
                m.and_then(|m| m.churn_date),
                m.and_then(|m| m.notes.clone()),
                m.map(|m| m.risk_reduction),
                m.and_then(|m| m.amount_change_rate_percent),
                m.map(|m| m.measured_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_retention_record(&self, record_id: &str) -> AnalyticsResult<RetentionRecord> {
        let sql = format!("SELECT {RETENTION_COLUMNS} FROM retention_record WHERE record_id = ?1");
        self.conn
            .query_row(&sql, params![record_id], retention_from_row)
            .optional()?
            .ok_or_else(|| AnalyticsError::not_found("retention record", record_id))
    }

    /// Ordered by action date, optionally restricted to one status.
    pub fn list_retention_records(
        &self,
        status: Option<RetentionStatus>,
    ) -> AnalyticsResult<Vec<RetentionRecord>> {
        let sql = format!(
            "SELECT {RETENTION_COLUMNS} FROM retention_record
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY action_date ASC, record_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![status.map(|s| s.as_str())], retention_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn retention_records_for_customer(
        &self,
        customer_id: &str,
    ) -> AnalyticsResult<Vec<RetentionRecord>> {
        let sql = format!(
            "SELECT {RETENTION_COLUMNS} FROM retention_record
             WHERE customer_id = ?1
             ORDER BY action_date DESC, record_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![customer_id], retention_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn retention_from_row(row: &Row<'_>) -> rusqlite::Result<RetentionRecord> {
    let status = parse_text(9, row.get(9)?, RetentionStatus::parse)?;

    let measurement = if status == RetentionStatus::Measured {
        Some(RetentionMeasurement {
            after_risk_score:           row.get(10)?,
            after_churn_probability:    row.get(11)?,
            after_monthly_amount:       row.get(12)?,
            has_churned:                row.get(13)?,
            churn_date:                 row.get(14)?,
            notes:                      row.get(15)?,
            risk_reduction:             row.get(16)?,
            amount_change_rate_percent: row.get(17)?,
            measured_at:                row.get(18)?,
        })
    } else {
        None
    };

    Ok(RetentionRecord {
        id:                       row.get(0)?,
        customer_id:              row.get(1)?,
        action_type:              parse_text(2, row.get(2)?, ActionType::parse)?,
        before_risk_score:        row.get(3)?,
        before_churn_probability: row.get(4)?,
        before_monthly_amount:    row.get(5)?,
        action_date:              row.get(6)?,
        measurement_period_days:  row.get(7)?,
        measurement_end_date:     row.get(8)?,
        status,
        measurement,
    })
}
