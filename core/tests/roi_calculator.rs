use retention_core::{
    config::AnalyticsConfig,
    error::AnalyticsError,
    roi::{ROICalculator, ROIRequest},
    types::{DegenerateComputation, Recommendation},
};

fn calculator() -> ROICalculator {
    ROICalculator::new(AnalyticsConfig::default().roi)
}

fn request(budget: i64, target_customers: i64, rate: f64, ltv: i64) -> ROIRequest {
    ROIRequest {
        budget,
        target_customers,
        expected_conversion_rate_percent: rate,
        avg_customer_ltv: ltv,
    }
}

/// budget 1,000,000; 1,000 targets; 10%; LTV 15,000,000.
/// conversions 100, revenue 1.5e9, roi 1500, break-even 1 conversion (0.1%).
#[test]
fn worked_example() {
    let r = calculator()
        .calculate(&request(1_000_000, 1_000, 10.0, 15_000_000))
        .unwrap();

    assert_eq!(r.expected_conversions, 100);
    assert_eq!(r.expected_revenue, 1_500_000_000);
    assert!((r.roi - 1500.0).abs() < 1e-9, "roi={}", r.roi);
    assert!((r.roi_percentage - 149_900.0).abs() < 1e-6, "roi%={}", r.roi_percentage);
    assert_eq!(r.break_even_conversions, 1);
    assert!((r.break_even_rate_percent - 0.1).abs() < 1e-12);
    assert_eq!(r.recommendation, Recommendation::Recommended);
    assert!(r.degenerate.is_empty());
    assert!(r.roi_is_defined());
}

/// budget 50,000,000; 100,000 targets; 15%; LTV 5,000,000.
/// roi 1500 reads as 149,900% because roi_percentage is (roi − 1) × 100.
#[test]
fn campaign_planning_example() {
    let r = calculator()
        .calculate(&request(50_000_000, 100_000, 15.0, 5_000_000))
        .unwrap();

    assert_eq!(r.expected_conversions, 15_000);
    assert_eq!(r.expected_revenue, 75_000_000_000);
    assert!((r.roi - 1500.0).abs() < 1e-9, "roi={}", r.roi);
    assert!((r.roi_percentage - 149_900.0).abs() < 1e-6, "roi%={}", r.roi_percentage);
    assert_eq!(r.break_even_conversions, 10);
    assert!((r.break_even_rate_percent - 0.01).abs() < 1e-12);
    assert_eq!(r.recommendation, Recommendation::Recommended);
    assert!(r.degenerate.is_empty());
}

#[test]
fn recommendation_thresholds() {
    let c = calculator();
    // 100 conversions × 20,000 = 2,000,000 against a 1,000,000 budget → roi 2.0
    assert_eq!(
        c.calculate(&request(1_000_000, 1_000, 10.0, 20_000)).unwrap().recommendation,
        Recommendation::Recommended
    );
    // roi 1.5
    assert_eq!(
        c.calculate(&request(1_000_000, 1_000, 10.0, 15_000)).unwrap().recommendation,
        Recommendation::NeedsReview
    );
    // roi 1.0 sits on the review boundary
    assert_eq!(
        c.calculate(&request(1_000_000, 1_000, 10.0, 10_000)).unwrap().recommendation,
        Recommendation::NeedsReview
    );
    // roi 0.5
    assert_eq!(
        c.calculate(&request(1_000_000, 1_000, 10.0, 5_000)).unwrap().recommendation,
        Recommendation::NotRecommended
    );
}

/// Break-even rounds up: 1,000,001 / 10,000 needs 101 conversions.
#[test]
fn break_even_rounds_up() {
    let r = calculator()
        .calculate(&request(1_000_001, 2_020, 5.0, 10_000))
        .unwrap();
    assert_eq!(r.break_even_conversions, 101);
    assert!((r.break_even_rate_percent - 5.0).abs() < 1e-12);
}

#[test]
fn conversions_are_rounded_to_nearest() {
    let r = calculator().calculate(&request(10_000, 333, 1.5, 1_000)).unwrap();
    // 333 × 1.5% = 4.995 → 5
    assert_eq!(r.expected_conversions, 5);
    assert_eq!(r.expected_revenue, 5_000);
}

/// A zero budget cannot be judged: roi is 0, flagged, and sent for review.
#[test]
fn zero_budget_is_flagged_not_divided() {
    let r = calculator().calculate(&request(0, 1_000, 10.0, 5_000)).unwrap();
    assert_eq!(r.roi, 0.0);
    assert_eq!(r.roi_percentage, 0.0);
    assert!(r.degenerate.contains(&DegenerateComputation::ZeroBudget));
    assert!(!r.roi_is_defined());
    assert_eq!(r.recommendation, Recommendation::NeedsReview);
    assert_eq!(r.break_even_conversions, 0);
}

#[test]
fn zero_ltv_is_unrecoverable() {
    let r = calculator().calculate(&request(50_000, 1_000, 10.0, 0)).unwrap();
    assert_eq!(r.expected_revenue, 0);
    assert_eq!(r.break_even_conversions, 0);
    assert!(r.degenerate.contains(&DegenerateComputation::ZeroCustomerLtv));
    assert!(!r.break_even_is_recoverable());
    assert_eq!(r.recommendation, Recommendation::NotRecommended);
}

#[test]
fn zero_targets_give_zero_break_even_rate() {
    let r = calculator().calculate(&request(50_000, 0, 10.0, 1_000)).unwrap();
    assert_eq!(r.expected_conversions, 0);
    assert_eq!(r.break_even_rate_percent, 0.0);
    assert!(r.degenerate.contains(&DegenerateComputation::ZeroTargetCustomers));
}

#[test]
fn invalid_requests_are_rejected() {
    let c = calculator();
    let cases = [
        (request(-1, 10, 5.0, 100), "campaign_budget"),
        (request(100, -10, 5.0, 100), "target_customers"),
        (request(100, 10, 100.1, 100), "expected_conversion_rate"),
        (request(100, 10, f64::INFINITY, 100), "expected_conversion_rate"),
        (request(100, 10, 5.0, -100), "avg_customer_ltv"),
    ];
    for (req, expected_field) in cases {
        match c.calculate(&req) {
            Err(AnalyticsError::InvalidInput { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected InvalidInput on {expected_field}, got {other:?}"),
        }
    }
}

#[test]
fn revenue_overflow_is_invalid_input() {
    let err = calculator()
        .calculate(&request(1, 1_000_000_000, 100.0, i64::MAX / 10))
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[test]
fn wire_names_follow_the_request_contract() {
    let req: ROIRequest = serde_json::from_str(
        r#"{"campaign_budget":1000000,"target_customers":1000,
            "expected_conversion_rate":10.0,"avg_customer_ltv":15000000}"#,
    )
    .unwrap();
    assert_eq!(req.budget, 1_000_000);

    let json = serde_json::to_value(calculator().calculate(&req).unwrap()).unwrap();
    assert_eq!(json["recommendation"], "Recommended");
    assert_eq!(json["break_even_conversions"], 1);
    assert!(json.get("break_even_rate").is_some());
}
