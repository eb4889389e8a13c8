use chrono::{Duration, TimeZone, Utc};
use retention_core::{
    config::AnalyticsConfig,
    error::AnalyticsError,
    retention::{
        ActionType, MeasurementRequest, NewRetentionRecord, RetentionEffectTracker,
        RetentionRecord, RetentionStatus,
    },
    types::Timestamp,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn tracker() -> RetentionEffectTracker {
    RetentionEffectTracker::new(AnalyticsConfig::default().retention)
}

/// Day zero of every scenario.
fn d0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap()
}

fn day(n: i64) -> Timestamp {
    d0() + Duration::days(n)
}

fn new_record(customer: &str, action: ActionType, risk: i32) -> NewRetentionRecord {
    NewRetentionRecord {
        customer_id:              customer.into(),
        action_type:              action,
        before_risk_score:        risk,
        before_churn_probability: f64::from(risk) / 100.0,
        before_monthly_amount:    Some(50_000),
        measurement_period_days:  None,
    }
}

fn measurement(after_risk: i32, churned: bool, after_amount: Option<i64>) -> MeasurementRequest {
    MeasurementRequest {
        after_risk_score:        after_risk,
        after_churn_probability: f64::from(after_risk) / 100.0,
        after_monthly_amount:    after_amount,
        has_churned:             churned,
        churn_date:              None,
        notes:                   None,
    }
}

fn measured(t: &RetentionEffectTracker, action: ActionType, churned: bool, at: i64) -> RetentionRecord {
    let mut r = t.create(new_record("CUST-1", action, 80), day(at)).unwrap();
    t.measure(&mut r, measurement(60, churned, None), day(at + 30)).unwrap();
    r
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn end_date_is_action_date_plus_period() {
    let t = tracker();
    let r = t.create(new_record("CUST-1", ActionType::Counseling, 80), d0()).unwrap();
    assert_eq!(r.measurement_period_days, 30);
    assert_eq!(r.measurement_end_date, day(30));
    assert_eq!(r.status, RetentionStatus::Pending);

    let mut req = new_record("CUST-1", ActionType::Coupon, 80);
    req.measurement_period_days = Some(90);
    let r90 = t.create(req, d0()).unwrap();
    assert_eq!(r90.measurement_end_date, day(90));
}

#[test]
fn create_rejects_out_of_range_inputs() {
    let t = tracker();

    let mut short = new_record("CUST-1", ActionType::Other, 50);
    short.measurement_period_days = Some(6);
    assert!(matches!(
        t.create(short, d0()),
        Err(AnalyticsError::InvalidInput { field: "measurement_period_days", .. })
    ));

    let mut long = new_record("CUST-1", ActionType::Other, 50);
    long.measurement_period_days = Some(181);
    assert!(t.create(long, d0()).is_err());

    assert!(matches!(
        t.create(new_record("CUST-1", ActionType::Other, 101), d0()),
        Err(AnalyticsError::InvalidInput { field: "before_risk_score", .. })
    ));

    let mut prob = new_record("CUST-1", ActionType::Other, 50);
    prob.before_churn_probability = 1.2;
    assert!(matches!(
        t.create(prob, d0()),
        Err(AnalyticsError::InvalidInput { field: "before_churn_prob", .. })
    ));

    let mut amount = new_record("CUST-1", ActionType::Other, 50);
    amount.before_monthly_amount = Some(-1);
    assert!(t.create(amount, d0()).is_err());
}

#[test]
fn measure_computes_reduction_and_amount_change() {
    let t = tracker();
    let mut r = t.create(new_record("CUST-1", ActionType::Counseling, 80), d0()).unwrap();

    t.measure(&mut r, measurement(55, false, Some(60_000)), day(31)).unwrap();

    assert_eq!(r.status, RetentionStatus::Measured);
    let m = r.measurement.as_ref().unwrap();
    assert_eq!(m.risk_reduction, 25);
    assert!((m.amount_change_rate_percent.unwrap() - 20.0).abs() < 1e-12);
    assert_eq!(m.measured_at, day(31));
    assert_eq!(r.is_successful(), Some(true));
}

#[test]
fn amount_change_needs_both_amounts() {
    let t = tracker();
    let mut r = t.create(new_record("CUST-1", ActionType::Coupon, 70), d0()).unwrap();
    t.measure(&mut r, measurement(70, false, None), day(30)).unwrap();
    assert_eq!(r.measurement.unwrap().amount_change_rate_percent, None);

    let mut zero = new_record("CUST-2", ActionType::Coupon, 70);
    zero.before_monthly_amount = Some(0);
    let mut r = t.create(zero, d0()).unwrap();
    t.measure(&mut r, measurement(70, false, Some(10_000)), day(30)).unwrap();
    assert_eq!(r.measurement.unwrap().amount_change_rate_percent, Some(0.0));
}

/// Measuring twice is an illegal state and the first measurement stands.
#[test]
fn second_measurement_is_rejected() {
    let t = tracker();
    let mut r = t.create(new_record("CUST-1", ActionType::Campaign, 80), d0()).unwrap();
    t.measure(&mut r, measurement(60, false, None), day(30)).unwrap();
    let first = r.clone();

    let err = t.measure(&mut r, measurement(10, true, None), day(31)).unwrap_err();
    assert!(matches!(err, AnalyticsError::IllegalState { .. }));
    assert_eq!(err.status_code(), 409);
    assert_eq!(r, first);
}

/// Action at D, period 30: at D+35 the record is 5 days overdue.
#[test]
fn pending_reports_days_overdue() {
    let t = tracker();
    let late = t.create(new_record("CUST-1", ActionType::Counseling, 80), d0()).unwrap();
    let fresh = t.create(new_record("CUST-2", ActionType::Coupon, 60), day(20)).unwrap();
    let mut done = t.create(new_record("CUST-3", ActionType::Other, 60), d0()).unwrap();
    t.measure(&mut done, measurement(50, false, None), day(30)).unwrap();

    let pending = t.list_pending(&[fresh.clone(), done, late.clone()], day(35));

    assert_eq!(pending.len(), 2, "measured records are not pending");
    assert_eq!(pending[0].record.id, late.id, "earliest end date first");
    assert_eq!(pending[0].days_overdue, 5);
    assert!(pending[0].is_overdue());
    assert_eq!(pending[1].record.id, fresh.id);
    assert_eq!(pending[1].days_overdue, 0);
    assert!(!pending[1].is_overdue());
}

/// Four measured records, two churned → 50% success.
#[test]
fn aggregate_success_rate() {
    let t = tracker();
    let records = vec![
        measured(&t, ActionType::Counseling, false, 0),
        measured(&t, ActionType::Counseling, true, 1),
        measured(&t, ActionType::Coupon, false, 2),
        measured(&t, ActionType::Coupon, true, 3),
    ];

    let stats = t.aggregate(&records, day(40), 60, None).unwrap();
    assert_eq!(stats.total_records, 4);
    assert_eq!(stats.successful_retentions, 2);
    assert_eq!(stats.churned_customers, 2);
    assert!((stats.retention_success_rate - 50.0).abs() < 1e-12);
    assert!((stats.churn_rate - 50.0).abs() < 1e-12);
    assert!((stats.average_risk_reduction - 20.0).abs() < 1e-12);
    assert_eq!(stats.by_action_type.len(), 2);
    assert_eq!(stats.by_action_type[&ActionType::Counseling].successful, 1);

    let again = t.aggregate(&records, day(40), 60, None).unwrap();
    assert_eq!(stats, again, "aggregation must be idempotent");
}

#[test]
fn aggregate_respects_window_and_action_filter() {
    let t = tracker();
    let records = vec![
        measured(&t, ActionType::Counseling, false, 0),
        measured(&t, ActionType::Coupon, true, 50),
        measured(&t, ActionType::Coupon, false, 55),
    ];

    // Window [day 30, day 90] excludes the day-0 action.
    let windowed = t.aggregate(&records, day(90), 60, None).unwrap();
    assert_eq!(windowed.total_records, 2);

    let coupons = t.aggregate(&records, day(90), 90, Some(ActionType::Coupon)).unwrap();
    assert_eq!(coupons.total_records, 2);
    assert_eq!(coupons.action_type, Some(ActionType::Coupon));
    assert!((coupons.retention_success_rate - 50.0).abs() < 1e-12);
}

#[test]
fn aggregate_of_nothing_is_all_zero() {
    let stats = tracker().aggregate(&[], d0(), 30, None).unwrap();
    assert_eq!(stats.total_records, 0);
    assert_eq!(stats.retention_success_rate, 0.0);
    assert_eq!(stats.average_amount_change_rate, 0.0);
    assert!(stats.by_action_type.is_empty());

    assert!(tracker().aggregate(&[], d0(), 0, None).is_err());
}

/// A window reaching past the calendar is invalid input, not a crash.
#[test]
fn oversized_window_is_rejected() {
    let t = tracker();
    for period in [100_000_000, u32::MAX] {
        assert!(matches!(
            t.aggregate(&[], d0(), period, None),
            Err(AnalyticsError::InvalidInput { field: "period_days", .. })
        ));
    }
}

#[test]
fn action_date_at_calendar_end_is_rejected() {
    let err = tracker()
        .create(new_record("CUST-1", ActionType::Coupon, 60), chrono::DateTime::<Utc>::MAX_UTC)
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::InvalidInput { field: "action_date", .. }));
    assert_eq!(err.status_code(), 400);
}

/// Amount change is averaged only over records that have it.
#[test]
fn amount_change_average_skips_missing_values() {
    let t = tracker();
    let mut with_amount = t.create(new_record("CUST-1", ActionType::Coupon, 80), d0()).unwrap();
    t.measure(&mut with_amount, measurement(60, false, Some(40_000)), day(30)).unwrap();
    let without = measured(&t, ActionType::Coupon, false, 0);

    let stats = t.aggregate(&[with_amount, without], day(30), 30, None).unwrap();
    assert!((stats.average_amount_change_rate + 20.0).abs() < 1e-12);
}

#[test]
fn customer_history_is_newest_first() {
    let t = tracker();
    let older = measured(&t, ActionType::Counseling, false, 0);
    let newer = t.create(new_record("CUST-1", ActionType::Coupon, 60), day(40)).unwrap();
    let other = t.create(new_record("CUST-9", ActionType::Coupon, 60), day(41)).unwrap();

    let history = t.customer_history(&[older.clone(), other, newer.clone()], "CUST-1");
    assert_eq!(history.total_records, 2);
    assert_eq!(history.records[0].id, newer.id);
    assert_eq!(history.records[1].id, older.id);
    assert_eq!(history.successful_retentions, 1);
    assert!((history.success_rate - 50.0).abs() < 1e-12);
    assert_eq!(history.total_risk_reduction, 20);
}
