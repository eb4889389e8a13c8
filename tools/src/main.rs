//! desk-runner: headless driver for the campaign analytics desk.
//!
//! Usage:
//!   desk-runner --seed 12345 --records 500 --db analytics.db
//!   desk-runner --db analytics.db --ipc-mode < commands.jsonl

use anyhow::Result;
use chrono::Utc;
use retention_core::{
    ab_test::{AnalyzeRequest, ExperimentStatus, NewExperiment},
    campaign::{CampaignProgress, CampaignStatus, NewCampaign},
    desk::AnalyticsDesk,
    error::{AnalyticsError, AnalyticsResult},
    retention::{ActionType, MeasurementRequest, NewRetentionRecord},
    roi::ROIRequest,
    store::AnalyticsStore,
    synthetic::SyntheticWorkload,
    types::{Money, Timestamp},
};
use serde_json::{json, Value};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    // Experiments
    CreateExperiment {
        request: NewExperiment,
    },
    StartExperiment {
        experiment_id: String,
    },
    AnalyzeExperiment {
        experiment_id:        String,
        group_a_metric_value: f64,
        group_b_metric_value: f64,
        group_a_size:         u64,
        group_b_size:         u64,
    },
    GetExperiment {
        experiment_id: String,
    },
    ListExperiments {
        #[serde(default)]
        status: Option<ExperimentStatus>,
    },

    // ROI and campaigns
    CalculateRoi {
        request: ROIRequest,
    },
    CreateCampaign {
        request: NewCampaign,
    },
    ActivateCampaign {
        campaign_id: String,
    },
    RecordCampaignProgress {
        campaign_id: String,
        progress:    CampaignProgress,
    },
    CompleteCampaign {
        campaign_id: String,
    },
    ListCampaigns {
        #[serde(default)]
        status: Option<CampaignStatus>,
    },
    ProjectedRoi {
        campaign_id:              String,
        expected_conversion_rate: f64,
        avg_customer_ltv:         Money,
    },

    // Retention
    CreateRetentionRecord {
        request:     NewRetentionRecord,
        #[serde(default)]
        action_date: Option<Timestamp>,
    },
    MeasureRetention {
        record_id:   String,
        measurement: MeasurementRequest,
    },
    PendingMeasurements,
    RetentionStats {
        #[serde(default)]
        period_days: Option<u32>,
        #[serde(default)]
        action_type: Option<ActionType>,
    },
    CustomerHistory {
        customer_id: String,
    },

    Events {
        entity_id: String,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let records = parse_arg(&args, "--records", 200usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = string_arg(&args, "--db", ":memory:");
    let data_dir = string_arg(&args, "--data-dir", "./data");

    if !ipc_mode {
        println!("Campaign analytics desk-runner");
        println!("  seed:      {seed}");
        println!("  records:   {records}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let store = if db == ":memory:" {
        AnalyticsStore::in_memory()?
    } else {
        AnalyticsStore::open(db)?
    };
    let desk = AnalyticsDesk::build(store, data_dir)?;

    if ipc_mode {
        run_ipc_loop(&desk)?;
    } else {
        run_demo(&desk, seed, records)?;
    }

    Ok(())
}

fn run_ipc_loop(desk: &AnalyticsDesk) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<IpcCommand>(&buffer) {
            Ok(IpcCommand::Quit) => break,
            Ok(cmd) => handle_command(desk, cmd, Utc::now()).unwrap_or_else(|e| error_response(&e)),
            Err(e) => {
                log::warn!("Unreadable command: {e}");
                json!({ "error": e.to_string(), "status": 400 })
            }
        };
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(desk: &AnalyticsDesk, cmd: IpcCommand, now: Timestamp) -> AnalyticsResult<Value> {
    let value = match cmd {
        IpcCommand::CreateExperiment { request } => {
            serde_json::to_value(desk.create_experiment(request, now)?)?
        }
        IpcCommand::StartExperiment { experiment_id } => {
            serde_json::to_value(desk.start_experiment(&experiment_id, now)?)?
        }
        IpcCommand::AnalyzeExperiment {
            experiment_id,
            group_a_metric_value,
            group_b_metric_value,
            group_a_size,
            group_b_size,
        } => {
            let req = AnalyzeRequest {
                group_a_metric_value,
                group_b_metric_value,
                group_a_size,
                group_b_size,
            };
            serde_json::to_value(desk.analyze_experiment(&experiment_id, &req, now)?)?
        }
        IpcCommand::GetExperiment { experiment_id } => {
            serde_json::to_value(desk.experiment(&experiment_id)?)?
        }
        IpcCommand::ListExperiments { status } => serde_json::to_value(desk.experiments(status)?)?,

        IpcCommand::CalculateRoi { request } => serde_json::to_value(desk.calculate_roi(&request)?)?,
        IpcCommand::CreateCampaign { request } => {
            serde_json::to_value(desk.create_campaign(request, now)?)?
        }
        IpcCommand::ActivateCampaign { campaign_id } => {
            serde_json::to_value(desk.activate_campaign(&campaign_id, now)?)?
        }
        IpcCommand::RecordCampaignProgress { campaign_id, progress } => {
            serde_json::to_value(desk.record_campaign_progress(&campaign_id, &progress, now)?)?
        }
        IpcCommand::CompleteCampaign { campaign_id } => {
            serde_json::to_value(desk.complete_campaign(&campaign_id, now)?)?
        }
        IpcCommand::ListCampaigns { status } => serde_json::to_value(desk.campaigns(status)?)?,
        IpcCommand::ProjectedRoi {
            campaign_id,
            expected_conversion_rate,
            avg_customer_ltv,
        } => serde_json::to_value(desk.projected_campaign_roi(
            &campaign_id,
            expected_conversion_rate,
            avg_customer_ltv,
        )?)?,

        IpcCommand::CreateRetentionRecord { request, action_date } => {
            let action_date = action_date.unwrap_or(now);
            serde_json::to_value(desk.create_retention_record(request, action_date, now)?)?
        }
        IpcCommand::MeasureRetention { record_id, measurement } => {
            serde_json::to_value(desk.measure_retention(&record_id, measurement, now)?)?
        }
        IpcCommand::PendingMeasurements => serde_json::to_value(desk.pending_measurements(now)?)?,
        IpcCommand::RetentionStats { period_days, action_type } => {
            serde_json::to_value(desk.retention_stats(now, period_days, action_type)?)?
        }
        IpcCommand::CustomerHistory { customer_id } => {
            serde_json::to_value(desk.customer_retention_history(&customer_id)?)?
        }

        IpcCommand::Events { entity_id } => serde_json::to_value(desk.events(&entity_id)?)?,
        IpcCommand::Quit => Value::Null,
    };
    Ok(value)
}

fn error_response(e: &AnalyticsError) -> Value {
    if e.status_code() >= 500 {
        log::error!("Command failed: {e}");
    }
    json!({ "error": e.to_string(), "status": e.status_code() })
}

fn run_demo(desk: &AnalyticsDesk, seed: u64, records: usize) -> Result<()> {
    let now = Utc::now();
    let workload = SyntheticWorkload::generate(seed, records, now);
    let summary = workload.apply(desk, now)?;

    println!("=== WORKLOAD SUMMARY ===");
    println!("  experiments:        {} ({} significant)", summary.experiments, summary.significant_experiments);
    println!("  campaigns:          {} ({} completed)", summary.campaigns, summary.completed_campaigns);
    println!("  retention records:  {} ({} measured)", summary.retention_records, summary.measured_records);

    println!();
    println!("=== EXPERIMENTS ===");
    for exp in desk.experiments(Some(ExperimentStatus::Concluded))? {
        if let Some(r) = &exp.result {
            println!(
                "  {:<28} | lift {:>7.2}% | p {:.4} | winner {:<4} | {}",
                exp.name,
                r.lift,
                r.p_value,
                r.winner.as_str(),
                r.recommendation.as_str(),
            );
        }
    }

    println!();
    println!("=== CAMPAIGNS ===");
    for c in desk.campaigns(None)? {
        let roi = c.roi().map(|r| format!("{r:.2}")).unwrap_or_else(|| "n/a".into());
        let conv = c.conversion_rate().map(|r| format!("{r:.1}%")).unwrap_or_else(|| "n/a".into());
        println!("  {:<22} | {:<9} | conv {:>6} | roi {}", c.name, c.status.as_str(), conv, roi);
    }

    println!();
    let period = desk.config().retention.default_stats_period_days * 4;
    let stats = desk.retention_stats(now, Some(period), None)?;
    println!("=== RETENTION (last {period} days) ===");
    println!("  measured:       {}", stats.total_records);
    println!("  success rate:   {:.1}%", stats.retention_success_rate);
    println!("  churn rate:     {:.1}%", stats.churn_rate);
    println!("  avg risk drop:  {:.1}", stats.average_risk_reduction);
    println!("  avg amount Δ:   {:.1}%", stats.average_amount_change_rate);
    for (action, s) in &stats.by_action_type {
        println!("    {:<11} {:>4} records | {:.1}% retained", action.as_str(), s.total, s.success_rate);
    }
    let overdue = desk
        .pending_measurements(now)?
        .iter()
        .filter(|p| p.is_overdue())
        .count();
    println!("  overdue:        {overdue}");
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .unwrap_or(default)
}
