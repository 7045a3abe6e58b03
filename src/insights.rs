//! Ranked, human-readable observations about a coverage snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::CoverageData;
use crate::risk::{analyze_risks, COVERAGE_TARGET};

/// Line coverage below which a package counts as poorly covered.
pub const LOW_PACKAGE_COVERAGE: f64 = 50.0;

/// Line minus branch coverage above which branches are said to lag.
pub const BRANCH_LAG_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Success,
    Warning,
    Danger,
    Info,
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InsightKind::Success => "success",
            InsightKind::Warning => "warning",
            InsightKind::Danger => "danger",
            InsightKind::Info => "info",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub category: String,
    pub title: String,
    pub message: String,
    pub value: Option<f64>,
}

impl Insight {
    fn new(kind: InsightKind, category: &str, title: &str, message: String) -> Self {
        Self {
            kind,
            category: category.to_string(),
            title: title.to_string(),
            message,
            value: None,
        }
    }

    fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

pub fn generate_insights(data: &CoverageData) -> Vec<Insight> {
    let summary = &data.summary;
    let line = summary.metrics.line_coverage;
    let branch = summary.metrics.branch_coverage;
    let mut insights = Vec::new();

    let (kind, title) = if line >= 80.0 {
        (InsightKind::Success, "Excellent line coverage")
    } else if line >= 60.0 {
        (InsightKind::Info, "Good line coverage")
    } else if line >= 40.0 {
        (InsightKind::Warning, "Line coverage needs improvement")
    } else {
        (InsightKind::Danger, "Critical line coverage")
    };
    insights.push(
        Insight::new(
            kind,
            "coverage",
            title,
            format!(
                "{:.2}% of lines are covered ({} of {}).",
                line, summary.metrics.lines_covered, summary.metrics.lines_valid
            ),
        )
        .with_value(line),
    );

    if summary.metrics.has_branches() {
        let (kind, title) = if branch >= 70.0 {
            (InsightKind::Success, "Strong branch coverage")
        } else if branch >= 50.0 {
            (InsightKind::Warning, "Moderate branch coverage")
        } else {
            (InsightKind::Danger, "Weak branch coverage")
        };
        insights.push(
            Insight::new(
                kind,
                "branches",
                title,
                format!(
                    "{:.2}% of branch outcomes are covered ({} of {}).",
                    branch, summary.metrics.branches_covered, summary.metrics.branches_valid
                ),
            )
            .with_value(branch),
        );

        let lag = line - branch;
        if lag > BRANCH_LAG_THRESHOLD {
            insights.push(
                Insight::new(
                    InsightKind::Warning,
                    "branches",
                    "Branch coverage lags line coverage",
                    format!(
                        "Branch coverage trails line coverage by {:.2} points; \
                         conditional paths are under-tested.",
                        lag
                    ),
                )
                .with_value(crate::model::round2(lag)),
            );
        }
    }

    if let Some(methods) = summary.methods {
        let method = summary.method_coverage;
        let (kind, title) = if method >= 80.0 {
            (InsightKind::Success, "Most methods are exercised")
        } else if method >= 50.0 {
            (InsightKind::Info, "Some methods are never called")
        } else {
            (InsightKind::Warning, "Many methods are never called")
        };
        insights.push(
            Insight::new(
                kind,
                "methods",
                title,
                format!(
                    "{:.2}% of methods are covered ({} of {}).",
                    method, methods.covered, methods.valid
                ),
            )
            .with_value(method),
        );
    }

    let untested = data
        .packages
        .iter()
        .filter(|p| p.metrics.lines_valid > 0 && p.metrics.lines_covered == 0)
        .count();
    if untested > 0 {
        insights.push(
            Insight::new(
                InsightKind::Danger,
                "packages",
                "Untested packages",
                format!("{untested} package(s) have no covered lines at all."),
            )
            .with_value(untested as f64),
        );
    }

    let low = data
        .packages
        .iter()
        .filter(|p| p.metrics.line_coverage > 0.0 && p.metrics.line_coverage < LOW_PACKAGE_COVERAGE)
        .count();
    if low > 0 {
        insights.push(
            Insight::new(
                InsightKind::Warning,
                "packages",
                "Poorly covered packages",
                format!("{low} package(s) are below {LOW_PACKAGE_COVERAGE}% line coverage."),
            )
            .with_value(low as f64),
        );
    }

    let risks = analyze_risks(data);
    if !risks.high_risk.is_empty() {
        let count = risks.high_risk.len();
        insights.push(
            Insight::new(
                InsightKind::Danger,
                "risk",
                "High-risk classes",
                format!(
                    "{count} class(es) combine many uncovered lines with high complexity; \
                     start with {}.",
                    risks.high_risk[0].name
                ),
            )
            .with_value(count as f64),
        );
    }

    if risks.coverage_gap > 0.0 {
        let needed = lines_to_target(data);
        insights.push(
            Insight::new(
                InsightKind::Info,
                "target",
                "Distance to coverage target",
                format!(
                    "Cover {needed} more line(s) to reach {COVERAGE_TARGET}% line coverage."
                ),
            )
            .with_value(needed as f64),
        );
    } else {
        insights.push(Insight::new(
            InsightKind::Success,
            "target",
            "Coverage target met",
            format!("Line coverage is at or above {COVERAGE_TARGET}%."),
        ));
    }

    insights
}

/// Additional covered lines needed to reach the coverage target.
#[must_use]
pub fn lines_to_target(data: &CoverageData) -> u64 {
    let metrics = &data.summary.metrics;
    let required = (metrics.lines_valid as f64 * COVERAGE_TARGET / 100.0).ceil() as u64;
    required.saturating_sub(metrics.lines_covered)
}
