use super::{parse_text, AnalyticsStore};
use crate::{
    ab_test::{Experiment, ExperimentAnalysis, ExperimentGroup, ExperimentStatus, PrimaryMetric},
    error::{AnalyticsError, AnalyticsResult},
    proportion_test::{ProportionTestResult, Winner},
    types::{DegenerateComputation, Recommendation},
};
use rusqlite::{params, OptionalExtension, Row};

const EXPERIMENT_COLUMNS: &str =
    "experiment_id, name, description, hypothesis, status, target_segment,
     primary_metric, start_date, end_date, sample_size, split_ratio,
     group_a_name, group_a_description, group_a_size, group_a_metric_value,
     group_b_name, group_b_description, group_b_size, group_b_metric_value,
     created_at";

impl AnalyticsStore {
    // ── Experiments ────────────────────────────────────────────

    /// Insert or replace the experiment row, then append any analyses not
    /// yet stored. Stored analyses are never rewritten.
    pub fn put_experiment(&self, e: &Experiment) -> AnalyticsResult<()> {
        self.conn.execute(
            "INSERT INTO experiment (
                experiment_id, name, description, hypothesis, status, target_segment,
                primary_metric, start_date, end_date, sample_size, split_ratio,
                group_a_name, group_a_description, group_a_size, group_a_metric_value,
                group_b_name, group_b_description, group_b_size, group_b_metric_value,
                created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)
            ON CONFLICT(experiment_id) DO UPDATE SET
                name                 = excluded.name,
                description          = excluded.description,
                hypothesis           = excluded.hypothesis,
                status               = excluded.status,
                target_segment       = excluded.target_segment,
                primary_metric       = excluded.primary_metric,
                start_date           = excluded.start_date,
                end_date             = excluded.end_date,
                sample_size          = excluded.sample_size,
                split_ratio          = excluded.split_ratio,
                group_a_name         = excluded.group_a_name,
                group_a_description  = excluded.group_a_description,
                group_a_size         = excluded.group_a_size,
                group_a_metric_value = excluded.group_a_metric_value,
                group_b_name         = excluded.group_b_name,
                group_b_description  = excluded.group_b_description,
                group_b_size         = excluded.group_b_size,
                group_b_metric_value = excluded.group_b_metric_value",
            params![
                e.id,
                e.name,
                e.description,
                e.hypothesis,
                e.status.as_str(),
                e.target_segment,
                e.primary_metric.as_str(),
                e.start_date,
                e.end_date,
                e.sample_size as i64,
                e.split_ratio,
                e.group_a.name,
                e.group_a.description,
                e.group_a.size as i64,
                e.group_a.metric_value,
                e.group_b.name,
                e.group_b.description,
                e.group_b.size as i64,
                e.group_b.metric_value,
                e.created_at,
            ],
        )?;

        let stored: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM experiment_analysis WHERE experiment_id = ?1",
            params![e.id],
            |row| row.get(0),
        )?;
        for analysis in e.analyses.iter().skip(stored as usize) {
            self.insert_experiment_analysis(&e.id, analysis)?;
        }
        Ok(())
    }

    fn insert_experiment_analysis(
        &self,
        experiment_id: &str,
        a: &ExperimentAnalysis,
    ) -> AnalyticsResult<()> {
        let r = &a.result;
        self.conn.execute(
            "INSERT INTO experiment_analysis (
                experiment_id, analyzed_at, lift, z_statistic, p_value,
                is_significant, winner, recommendation, conclusion,
                confidence_level, degenerate
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                experiment_id,
                a.analyzed_at,
                r.lift,
                r.z_statistic,
                r.p_value,
                r.is_significant,
                r.winner.as_str(),
                r.recommendation.as_str(),
                r.conclusion,
                r.confidence_level,
                serde_json::to_string(&r.degenerate)?,
            ],
        )?;
        Ok(())
    }

    pub fn get_experiment(&self, experiment_id: &str) -> AnalyticsResult<Experiment> {
        let sql = format!("SELECT {EXPERIMENT_COLUMNS} FROM experiment WHERE experiment_id = ?1");
        let experiment = self
            .conn
            .query_row(&sql, params![experiment_id], experiment_from_row)
            .optional()?
            .ok_or_else(|| AnalyticsError::not_found("experiment", experiment_id))?;
        self.with_analyses(experiment)
    }

    /// Newest first, optionally restricted to one status.
    pub fn list_experiments(
        &self,
        status: Option<ExperimentStatus>,
    ) -> AnalyticsResult<Vec<Experiment>> {
        let sql = format!(
            "SELECT {EXPERIMENT_COLUMNS} FROM experiment
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, experiment_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let experiments = stmt
            .query_map(params![status.map(|s| s.as_str())], experiment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        experiments
            .into_iter()
            .map(|e| self.with_analyses(e))
            .collect()
    }

    fn with_analyses(&self, mut experiment: Experiment) -> AnalyticsResult<Experiment> {
        let mut stmt = self.conn.prepare(
            "SELECT analyzed_at, lift, z_statistic, p_value, is_significant,
                    winner, recommendation, conclusion, confidence_level, degenerate
             FROM experiment_analysis
             WHERE experiment_id = ?1
             ORDER BY id ASC",
        )?;
        let analyses = stmt
            .query_map(params![experiment.id], |row| {
                let degenerate_json: String = row.get(9)?;
                let degenerate: Vec<DegenerateComputation> =
                    serde_json::from_str(&degenerate_json).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            9,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                Ok(ExperimentAnalysis {
                    analyzed_at: row.get(0)?,
                    result: ProportionTestResult {
                        lift:             row.get(1)?,
                        z_statistic:      row.get(2)?,
                        p_value:          row.get(3)?,
                        is_significant:   row.get(4)?,
                        winner:           parse_text(5, row.get(5)?, parse_winner)?,
                        recommendation:   parse_text(6, row.get(6)?, parse_recommendation)?,
                        conclusion:       row.get(7)?,
                        confidence_level: row.get(8)?,
                        degenerate,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        experiment.result = analyses.last().map(|a| a.result.clone());
        experiment.analyses = analyses;
        Ok(experiment)
    }
}

fn experiment_from_row(row: &Row<'_>) -> rusqlite::Result<Experiment> {
    Ok(Experiment {
        id:             row.get(0)?,
        name:           row.get(1)?,
        description:    row.get(2)?,
        hypothesis:     row.get(3)?,
        status:         parse_text(4, row.get(4)?, ExperimentStatus::parse)?,
        target_segment: row.get(5)?,
        primary_metric: parse_text(6, row.get(6)?, PrimaryMetric::parse)?,
        start_date:     row.get(7)?,
        end_date:       row.get(8)?,
        sample_size:    row.get::<_, i64>(9)? as u64,
        split_ratio:    row.get(10)?,
        group_a: ExperimentGroup {
            name:         row.get(11)?,
            description:  row.get(12)?,
            size:         row.get::<_, i64>(13)? as u64,
            metric_value: row.get(14)?,
        },
        group_b: ExperimentGroup {
            name:         row.get(15)?,
            description:  row.get(16)?,
            size:         row.get::<_, i64>(17)? as u64,
            metric_value: row.get(18)?,
        },
        created_at: row.get(19)?,
        result:     None,
        analyses:   Vec::new(),
    })
}

fn parse_winner(s: &str) -> Option<Winner> {
    match s {
        "A"    => Some(Winner::A),
        "B"    => Some(Winner::B),
        "NONE" => Some(Winner::None),
        _ => None,
    }
}

fn parse_recommendation(s: &str) -> Option<Recommendation> {
    match s {
        "Recommended"     => Some(Recommendation::Recommended),
        "Needs Review"    => Some(Recommendation::NeedsReview),
        "Not Recommended" => Some(Recommendation::NotRecommended),
        _ => None,
    }
}
