//! Class and package risk scoring.
//!
//! A class's score grows with its uncovered lines and is scaled by its size,
//! its complexity and how far branch coverage trails line coverage. Scores
//! are only meaningful relative to each other; the high/medium cut-offs are
//! derived from the top score of each dataset.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{round2, ClassInfo, CoverageData};

/// Lowest possible high-risk threshold.
pub const HIGH_RISK_FLOOR: f64 = 50.0;

/// Line coverage the coverage gap is measured against.
pub const COVERAGE_TARGET: f64 = 90.0;

const COMPLEXITY_DIVISOR: f64 = 20.0;
const BRANCH_GAP_DIVISOR: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Level for an aggregate score in [0, 100].
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 50.0 {
            RiskLevel::High
        } else if score >= 25.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRisk {
    pub name: String,
    pub path: String,
    pub coverage: f64,
    pub lines_valid: u64,
    pub branch_coverage: f64,
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAnalysis {
    pub high_risk: Vec<ClassRisk>,
    pub medium_risk: Vec<ClassRisk>,
    /// Aggregate score in [0, 100].
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// Percentage points of line coverage missing to reach the target.
    pub coverage_gap: f64,
    /// Classes that were scored (those with at least one valid line).
    pub total_classes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageRisk {
    pub name: String,
    pub coverage: f64,
    pub lines_valid: u64,
    pub uncovered_lines: u64,
    pub class_count: usize,
    pub high_risk_classes: usize,
    pub risk_score: f64,
}

#[must_use]
pub fn size_factor(lines_valid: u64) -> f64 {
    if lines_valid > 200 {
        1.5
    } else if lines_valid > 100 {
        1.2
    } else {
        1.0
    }
}

/// Unknown complexity (0) yields a factor of 0.
#[must_use]
pub fn complexity_factor(complexity: f64) -> f64 {
    if complexity.is_finite() && complexity > 0.0 {
        complexity / COMPLEXITY_DIVISOR
    } else {
        0.0
    }
}

/// How far branch coverage trails line coverage, in units of 20 points.
/// Zero when the class has no branch data.
#[must_use]
pub fn branch_gap_factor(class: &ClassInfo) -> f64 {
    if !class.metrics.has_branches() {
        return 0.0;
    }
    ((class.metrics.line_coverage - class.metrics.branch_coverage) / BRANCH_GAP_DIVISOR).max(0.0)
}

#[must_use]
pub fn class_risk_score(class: &ClassInfo) -> f64 {
    let uncovered = class.metrics.uncovered_lines() as f64;
    uncovered
        * size_factor(class.metrics.lines_valid)
        * complexity_factor(class.complexity)
        * (1.0 + branch_gap_factor(class))
}

fn class_risk(class: &ClassInfo) -> ClassRisk {
    ClassRisk {
        name: class.name.clone(),
        path: class.filename.clone(),
        coverage: class.metrics.line_coverage,
        lines_valid: class.metrics.lines_valid,
        branch_coverage: class.metrics.branch_coverage,
        risk_score: round2(class_risk_score(class)),
    }
}

/// Score every class with valid lines, highest score first.
pub fn score_classes(data: &CoverageData) -> Vec<ClassRisk> {
    let mut risks: Vec<ClassRisk> = data
        .classes()
        .filter(|(_, c)| c.metrics.lines_valid > 0)
        .map(|(_, c)| class_risk(c))
        .collect();
    risks.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    risks
}

/// Score at or above which a class is high risk.
#[must_use]
pub fn high_risk_threshold(sorted: &[ClassRisk]) -> f64 {
    let top = sorted.first().map(|r| r.risk_score).unwrap_or(0.0);
    HIGH_RISK_FLOOR.max(top / 2.0)
}

pub fn analyze_risks(data: &CoverageData) -> RiskAnalysis {
    let risks = score_classes(data);
    let threshold = high_risk_threshold(&risks);
    let total_classes = risks.len();

    let (high_risk, rest): (Vec<ClassRisk>, Vec<ClassRisk>) =
        risks.into_iter().partition(|r| r.risk_score >= threshold);
    let medium_risk: Vec<ClassRisk> = rest
        .into_iter()
        .filter(|r| r.risk_score >= threshold / 2.0)
        .collect();

    let overall = data.summary.metrics.line_coverage;
    let distribution = if total_classes == 0 {
        0.0
    } else {
        (3 * high_risk.len() + medium_risk.len()) as f64 / total_classes as f64
    };
    let risk_score = round2(((100.0 - overall) * (1.0 + distribution * 0.5)).clamp(0.0, 100.0));

    log::debug!(
        "risk analysis: {} classes scored, threshold {:.2}, {} high, {} medium",
        total_classes,
        threshold,
        high_risk.len(),
        medium_risk.len()
    );

    RiskAnalysis {
        high_risk,
        medium_risk,
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
        coverage_gap: round2((COVERAGE_TARGET - overall).max(0.0)),
        total_classes,
    }
}

/// Per-package totals of the class scores, highest first. Packages without
/// any scored class are omitted.
pub fn analyze_package_risks(data: &CoverageData) -> Vec<PackageRisk> {
    let threshold = high_risk_threshold(&score_classes(data));

    let mut packages: Vec<PackageRisk> = data
        .packages
        .iter()
        .filter_map(|pkg| {
            let risks: Vec<ClassRisk> = pkg
                .classes
                .iter()
                .filter(|c| c.metrics.lines_valid > 0)
                .map(class_risk)
                .collect();
            if risks.is_empty() {
                return None;
            }
            Some(PackageRisk {
                name: pkg.name.clone(),
                coverage: pkg.metrics.line_coverage,
                lines_valid: pkg.metrics.lines_valid,
                uncovered_lines: pkg.metrics.uncovered_lines(),
                class_count: risks.len(),
                high_risk_classes: risks.iter().filter(|r| r.risk_score >= threshold).count(),
                risk_score: round2(risks.iter().map(|r| r.risk_score).sum()),
            })
        })
        .collect();
    packages.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    packages
}
