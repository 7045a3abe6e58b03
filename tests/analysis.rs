mod common;

use covtree::insights::{generate_insights, InsightKind};
use covtree::risk::{analyze_package_risks, analyze_risks, RiskLevel};

#[test]
fn dotnet_risk_analysis() {
    let data = common::load_fixture("dotnet.xml");
    let analysis = analyze_risks(&data);

    // Every class with lines is scored, generated or not.
    assert_eq!(analysis.total_classes, 7);
    assert!(analysis.high_risk.is_empty());
    assert!(analysis.medium_risk.is_empty());
    // (100 - 52) * (1 + 0)
    assert_eq!(analysis.risk_score, 48.0);
    assert_eq!(analysis.risk_level, RiskLevel::Medium);
    assert_eq!(analysis.coverage_gap, 38.0);
}

#[test]
fn dotnet_package_risks() {
    let data = common::load_fixture("dotnet.xml");
    let packages = analyze_package_risks(&data);

    let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
    // Web: 7 uncovered * 10/20 = 3.5; Domain: Skill 2 * 6/20 = 0.6
    assert_eq!(names[..2], ["Vanguard.Web", "Vanguard.Domain"]);
    assert_eq!(packages[0].risk_score, 3.5);
    assert_eq!(packages[0].uncovered_lines, 9);
    assert_eq!(packages[0].class_count, 3);
    assert_eq!(packages[1].risk_score, 0.6);
}

#[test]
fn java_branch_gap_raises_score() {
    let data = common::load_fixture("java.xml");
    let analysis = analyze_risks(&data);

    // 1 uncovered * 5/20 * (1 + (75 - 50) / 20)
    let scores = covtree::risk::score_classes(&data);
    assert_eq!(scores[0].risk_score, 0.56);
    assert_eq!(scores[0].path, "com/acme/billing/Invoice.java");
    assert_eq!(analysis.risk_level, RiskLevel::Medium);
}

#[test]
fn dotnet_insights() {
    let data = common::load_fixture("dotnet.xml");
    let insights = generate_insights(&data);

    let summary: Vec<(InsightKind, &str)> = insights
        .iter()
        .map(|i| (i.kind, i.title.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (InsightKind::Warning, "Line coverage needs improvement"),
            (InsightKind::Warning, "Moderate branch coverage"),
            (InsightKind::Info, "Some methods are never called"),
            (InsightKind::Warning, "Poorly covered packages"),
            (InsightKind::Info, "Distance to coverage target"),
        ]
    );
    // ceil(25 * 0.9) - 13
    assert_eq!(insights[4].value, Some(10.0));
}
