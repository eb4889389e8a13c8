use serde::{Deserialize, Serialize};

// ── Significance ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignificanceConfig {
    /// Minimum relative lift (percent) for a significant win to be
    /// "Recommended" rather than "Needs Review".
    pub materiality_floor_pct: f64,
}

// ── ROI ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiConfig {
    /// roi ≥ this → Recommended.
    pub recommended_min_roi: f64,
    /// review_min_roi ≤ roi < recommended_min_roi → Needs Review.
    pub review_min_roi: f64,
}

// ── Experiments ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub min_sample_size: u64,
    pub default_split_ratio: f64,
    pub min_split_ratio: f64,
    pub max_split_ratio: f64,
}

// ── Retention tracking ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub default_measurement_period_days: u32,
    pub min_measurement_period_days: u32,
    pub max_measurement_period_days: u32,
    pub default_stats_period_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub significance: SignificanceConfig,
    pub roi: RoiConfig,
    pub experiments: ExperimentConfig,
    pub retention: RetentionConfig,
}

impl AnalyticsConfig {
    /// Load from the data/ directory.
    /// In tests, use AnalyticsConfig::default().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/analytics/thresholds.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: AnalyticsConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let floor = self.significance.materiality_floor_pct;
        if !floor.is_finite() || floor < 0.0 {
            anyhow::bail!("significance.materiality_floor_pct must be ≥ 0, got {floor}");
        }
        if self.roi.review_min_roi > self.roi.recommended_min_roi {
            anyhow::bail!(
                "roi.review_min_roi ({}) exceeds roi.recommended_min_roi ({})",
                self.roi.review_min_roi,
                self.roi.recommended_min_roi,
            );
        }
        let e = &self.experiments;
        if !(0.0 < e.min_split_ratio && e.min_split_ratio <= e.max_split_ratio && e.max_split_ratio < 1.0) {
            anyhow::bail!(
                "experiments split bounds must satisfy 0 < min ≤ max < 1, got [{}, {}]",
                e.min_split_ratio,
                e.max_split_ratio,
            );
        }
        if e.default_split_ratio < e.min_split_ratio || e.default_split_ratio > e.max_split_ratio {
            anyhow::bail!("experiments.default_split_ratio {} is out of bounds", e.default_split_ratio);
        }
        let r = &self.retention;
        if r.min_measurement_period_days == 0
            || r.min_measurement_period_days > r.max_measurement_period_days
        {
            anyhow::bail!(
                "retention measurement bounds must satisfy 0 < min ≤ max, got [{}, {}]",
                r.min_measurement_period_days,
                r.max_measurement_period_days,
            );
        }
        if r.default_measurement_period_days < r.min_measurement_period_days
            || r.default_measurement_period_days > r.max_measurement_period_days
        {
            anyhow::bail!(
                "retention.default_measurement_period_days {} is out of bounds",
                r.default_measurement_period_days,
            );
        }
        Ok(())
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            significance: SignificanceConfig {
                materiality_floor_pct: 5.0,
            },
            roi: RoiConfig {
                recommended_min_roi: 2.0,
                review_min_roi: 1.0,
            },
            experiments: ExperimentConfig {
                min_sample_size: 100,
                default_split_ratio: 0.5,
                min_split_ratio: 0.1,
                max_split_ratio: 0.9,
            },
            retention: RetentionConfig {
                default_measurement_period_days: 30,
                min_measurement_period_days: 7,
                max_measurement_period_days: 180,
                default_stats_period_days: 30,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_thresholds_match_defaults() {
        let data_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
        let loaded = AnalyticsConfig::load(data_dir).unwrap();
        let defaults = AnalyticsConfig::default();
        assert_eq!(
            serde_json::to_value(&loaded).unwrap(),
            serde_json::to_value(&defaults).unwrap()
        );
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let mut c = AnalyticsConfig::default();
        c.roi.review_min_roi = 3.0;
        assert!(c.validate().is_err());

        let mut c = AnalyticsConfig::default();
        c.experiments.min_split_ratio = 0.8;
        c.experiments.max_split_ratio = 0.2;
        assert!(c.validate().is_err());

        let mut c = AnalyticsConfig::default();
        c.retention.default_measurement_period_days = 365;
        assert!(c.validate().is_err());

        assert!(AnalyticsConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = AnalyticsConfig::load("/nonexistent-analytics-dir").unwrap_err();
        assert!(err.to_string().contains("thresholds.json"), "{err}");
    }
}
