//! Diff two coverage snapshots package by package and class by class.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{CovtreeError, Result};
use crate::model::{round2, ClassInfo, CoverageData, CoverageMetrics, PackageInfo};

/// Length cap of the most improved / declined lists.
pub const MAX_MOVERS: usize = 5;

/// Signed differences, newer minus older.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryDelta {
    pub line_coverage_change: f64,
    pub branch_coverage_change: f64,
    pub method_coverage_change: f64,
    pub class_coverage_change: f64,
    pub complexity_change: f64,
    pub lines_valid_change: i64,
    pub lines_covered_change: i64,
    pub branches_valid_change: i64,
    pub branches_covered_change: i64,
    pub package_count_change: i64,
    pub class_count_change: i64,
}

/// Per-entity delta shared by package and class rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsDelta {
    pub old_coverage: Option<f64>,
    pub new_coverage: Option<f64>,
    pub line_coverage_change: f64,
    pub branch_coverage_change: f64,
    pub lines_valid_change: i64,
    pub lines_covered_change: i64,
}

impl MetricsDelta {
    fn between(older: Option<&CoverageMetrics>, newer: Option<&CoverageMetrics>) -> Self {
        let zero = CoverageMetrics::default();
        let old = older.unwrap_or(&zero);
        let new = newer.unwrap_or(&zero);
        Self {
            old_coverage: older.map(|m| m.line_coverage),
            new_coverage: newer.map(|m| m.line_coverage),
            line_coverage_change: round2(new.line_coverage - old.line_coverage),
            branch_coverage_change: round2(new.branch_coverage - old.branch_coverage),
            lines_valid_change: signed_delta(old.lines_valid, new.lines_valid),
            lines_covered_change: signed_delta(old.lines_covered, new.lines_covered),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassComparison {
    pub package: String,
    pub name: String,
    pub in_first: bool,
    pub in_second: bool,
    #[serde(flatten)]
    pub delta: MetricsDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageComparison {
    pub name: String,
    pub in_first: bool,
    pub in_second: bool,
    #[serde(flatten)]
    pub delta: MetricsDelta,
    pub classes: Vec<ClassComparison>,
}

impl PackageComparison {
    pub fn is_new(&self) -> bool {
        self.in_second && !self.in_first
    }

    pub fn is_removed(&self) -> bool {
        self.in_first && !self.in_second
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub summary: SummaryDelta,
    pub packages: Vec<PackageComparison>,
    pub new_packages: Vec<String>,
    pub removed_packages: Vec<String>,
    pub changed_packages: Vec<String>,
    /// `(package, class)` pairs.
    pub new_classes: Vec<(String, String)>,
    pub removed_classes: Vec<(String, String)>,
    /// Packages whose line coverage went up, largest gain first. A new
    /// package counts from 0.
    pub most_improved: Vec<PackageComparison>,
    /// Packages whose line coverage went down, largest loss first. A removed
    /// package counts as dropping to 0.
    pub most_declined: Vec<PackageComparison>,
}

impl ComparisonResult {
    /// True when overall line coverage dropped.
    #[must_use]
    pub fn has_regression(&self) -> bool {
        self.summary.line_coverage_change < 0.0
    }

    pub fn package(&self, name: &str) -> Option<&PackageComparison> {
        self.packages.iter().find(|p| p.name == name)
    }
}

fn signed_delta(old: u64, new: u64) -> i64 {
    new as i64 - old as i64
}

/// Names in first-seen order: older ones first, then names only in newer.
fn union_names<'a>(older: impl Iterator<Item = &'a str>, newer: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    older.chain(newer).filter(|n| seen.insert(*n)).collect()
}

fn summarize(older: &CoverageData, newer: &CoverageData) -> SummaryDelta {
    let (old, new) = (&older.summary, &newer.summary);
    SummaryDelta {
        line_coverage_change: round2(new.metrics.line_coverage - old.metrics.line_coverage),
        branch_coverage_change: round2(new.metrics.branch_coverage - old.metrics.branch_coverage),
        method_coverage_change: round2(new.method_coverage - old.method_coverage),
        class_coverage_change: round2(new.class_coverage - old.class_coverage),
        complexity_change: round2(new.complexity - old.complexity),
        lines_valid_change: signed_delta(old.metrics.lines_valid, new.metrics.lines_valid),
        lines_covered_change: signed_delta(old.metrics.lines_covered, new.metrics.lines_covered),
        branches_valid_change: signed_delta(old.metrics.branches_valid, new.metrics.branches_valid),
        branches_covered_change: signed_delta(
            old.metrics.branches_covered,
            new.metrics.branches_covered,
        ),
        package_count_change: newer.packages.len() as i64 - older.packages.len() as i64,
        class_count_change: newer.class_count() as i64 - older.class_count() as i64,
    }
}

fn compare_classes(package: &str, older: Option<&PackageInfo>, newer: Option<&PackageInfo>) -> Vec<ClassComparison> {
    let old_classes = older.map(|p| p.classes.as_slice()).unwrap_or_default();
    let new_classes = newer.map(|p| p.classes.as_slice()).unwrap_or_default();
    let find = |classes: &[ClassInfo], name: &str| -> Option<CoverageMetrics> {
        classes.iter().find(|c| c.name == name).map(|c| c.metrics.clone())
    };

    union_names(
        old_classes.iter().map(|c| c.name.as_str()),
        new_classes.iter().map(|c| c.name.as_str()),
    )
    .into_iter()
    .map(|name| {
        let old = find(old_classes, name);
        let new = find(new_classes, name);
        ClassComparison {
            package: package.to_string(),
            name: name.to_string(),
            in_first: old.is_some(),
            in_second: new.is_some(),
            delta: MetricsDelta::between(old.as_ref(), new.as_ref()),
        }
    })
    .collect()
}

/// Compare two snapshots. Either side missing is an error.
pub fn compare(older: Option<&CoverageData>, newer: Option<&CoverageData>) -> Result<ComparisonResult> {
    let (Some(older), Some(newer)) = (older, newer) else {
        return Err(CovtreeError::ComparisonInputMissing);
    };

    let mut result = ComparisonResult {
        summary: summarize(older, newer),
        ..Default::default()
    };

    let names = union_names(
        older.packages.iter().map(|p| p.name.as_str()),
        newer.packages.iter().map(|p| p.name.as_str()),
    );
    for name in names {
        let old = older.package(name);
        let new = newer.package(name);
        let row = PackageComparison {
            name: name.to_string(),
            in_first: old.is_some(),
            in_second: new.is_some(),
            delta: MetricsDelta::between(old.map(|p| &p.metrics), new.map(|p| &p.metrics)),
            classes: compare_classes(name, old, new),
        };

        for class in &row.classes {
            let key = (class.package.clone(), class.name.clone());
            match (class.in_first, class.in_second) {
                (false, true) => result.new_classes.push(key),
                (true, false) => result.removed_classes.push(key),
                _ => {}
            }
        }
        match (row.in_first, row.in_second) {
            (false, true) => result.new_packages.push(row.name.clone()),
            (true, false) => result.removed_packages.push(row.name.clone()),
            _ => result.changed_packages.push(row.name.clone()),
        }
        result.packages.push(row);
    }

    let mut improved: Vec<&PackageComparison> = result
        .packages
        .iter()
        .filter(|p| p.delta.line_coverage_change > 0.0)
        .collect();
    improved.sort_by(|a, b| b.delta.line_coverage_change.total_cmp(&a.delta.line_coverage_change));

    let mut declined: Vec<&PackageComparison> = result
        .packages
        .iter()
        .filter(|p| p.delta.line_coverage_change < 0.0)
        .collect();
    declined.sort_by(|a, b| a.delta.line_coverage_change.total_cmp(&b.delta.line_coverage_change));

    result.most_improved = improved.into_iter().take(MAX_MOVERS).cloned().collect();
    result.most_declined = declined.into_iter().take(MAX_MOVERS).cloned().collect();

    log::debug!(
        "compared {} packages: {} new, {} removed, {} changed",
        result.packages.len(),
        result.new_packages.len(),
        result.removed_packages.len(),
        result.changed_packages.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CoverageSummary;
    use pretty_assertions::assert_eq;

    fn class(name: &str, valid: u64, covered: u64) -> ClassInfo {
        ClassInfo {
            name: name.to_string(),
            filename: format!("{name}.cs"),
            metrics: CoverageMetrics::from_counts(valid, covered, 0, 0),
            ..Default::default()
        }
    }

    fn package(name: &str, classes: Vec<ClassInfo>) -> PackageInfo {
        PackageInfo {
            name: name.to_string(),
            metrics: crate::aggregate::aggregate(classes.iter().map(|c| &c.metrics)),
            classes,
            ..Default::default()
        }
    }

    fn dataset(packages: Vec<PackageInfo>) -> CoverageData {
        CoverageData {
            summary: CoverageSummary {
                metrics: crate::aggregate::aggregate(packages.iter().map(|p| &p.metrics)),
                ..Default::default()
            },
            packages,
        }
    }

    #[test]
    fn test_missing_input() {
        let data = CoverageData::new();
        assert!(matches!(compare(None, Some(&data)), Err(CovtreeError::ComparisonInputMissing)));
        assert!(matches!(compare(Some(&data), None), Err(CovtreeError::ComparisonInputMissing)));
        assert!(compare(Some(&data), Some(&data)).is_ok());
    }

    #[test]
    fn test_new_package() {
        let a = dataset(vec![]);
        let b = dataset(vec![package("X", vec![class("C", 100, 50)])]);
        let result = compare(Some(&a), Some(&b)).unwrap();

        assert_eq!(result.new_packages, vec!["X".to_string()]);
        assert!(result.removed_packages.is_empty());
        let x = result.package("X").unwrap();
        assert!(x.is_new());
        assert_eq!(x.delta.old_coverage, None);
        assert_eq!(x.delta.new_coverage, Some(50.0));
        assert_eq!(x.delta.lines_valid_change, 100);
        assert_eq!(result.new_classes, vec![("X".to_string(), "C".to_string())]);
        assert_eq!(result.summary.line_coverage_change, 50.0);
        assert!(!result.has_regression());
    }

    #[test]
    fn test_removed_and_changed() {
        let a = dataset(vec![
            package("Gone", vec![class("G", 10, 10)]),
            package("Kept", vec![class("K", 10, 5), class("Old", 10, 0)]),
        ]);
        let b = dataset(vec![package("Kept", vec![class("K", 10, 8), class("New", 4, 4)])]);
        let result = compare(Some(&a), Some(&b)).unwrap();

        assert_eq!(result.removed_packages, vec!["Gone".to_string()]);
        assert_eq!(result.changed_packages, vec!["Kept".to_string()]);
        assert!(result.new_packages.is_empty());

        let kept = result.package("Kept").unwrap();
        let names: Vec<&str> = kept.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["K", "Old", "New"]);
        assert!(kept.classes.iter().all(|c| c.in_first || c.in_second));
        assert_eq!(kept.classes[0].delta.line_coverage_change, 30.0);

        assert_eq!(
            result.removed_classes,
            vec![("Gone".to_string(), "G".to_string()), ("Kept".to_string(), "Old".to_string())]
        );
        assert_eq!(result.new_classes, vec![("Kept".to_string(), "New".to_string())]);
        assert_eq!(result.summary.package_count_change, -1);
        assert_eq!(result.summary.class_count_change, -1);
    }

    #[test]
    fn test_movers_sorted_and_capped() {
        let names = ["A", "B", "C", "D", "E", "F", "G"];
        let a = dataset(names.iter().map(|n| package(n, vec![class("C", 100, 50)])).collect());
        let b = dataset(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| package(n, vec![class("C", 100, 51 + i as u64)]))
                .collect(),
        );

        let forward = compare(Some(&a), Some(&b)).unwrap();
        let improved: Vec<&str> = forward.most_improved.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(improved, vec!["G", "F", "E", "D", "C"]);
        assert!(forward.most_declined.is_empty());

        let backward = compare(Some(&b), Some(&a)).unwrap();
        let declined: Vec<&str> = backward.most_declined.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(declined, vec!["G", "F", "E", "D", "C"]);
        assert!(backward.has_regression());
    }

    #[test]
    fn test_new_and_removed_packages_are_movers() {
        let a = dataset(vec![
            package("Kept", vec![class("K", 10, 5)]),
            package("Gone", vec![class("G", 10, 8)]),
        ]);
        let b = dataset(vec![
            package("Kept", vec![class("K", 10, 6)]),
            package("X", vec![class("C", 100, 50)]),
        ]);
        let result = compare(Some(&a), Some(&b)).unwrap();

        let improved: Vec<(&str, f64)> = result
            .most_improved
            .iter()
            .map(|p| (p.name.as_str(), p.delta.line_coverage_change))
            .collect();
        assert_eq!(improved, vec![("X", 50.0), ("Kept", 10.0)]);

        let declined: Vec<(&str, f64)> = result
            .most_declined
            .iter()
            .map(|p| (p.name.as_str(), p.delta.line_coverage_change))
            .collect();
        assert_eq!(declined, vec![("Gone", -80.0)]);
    }

    #[test]
    fn test_zero_delta_not_a_mover() {
        let a = dataset(vec![package("Same", vec![class("C", 10, 5)])]);
        let result = compare(Some(&a), Some(&a)).unwrap();
        assert!(result.most_improved.is_empty());
        assert!(result.most_declined.is_empty());
        assert_eq!(result.summary, SummaryDelta::default());
    }

    #[test]
    fn test_duplicate_package_first_match() {
        let a = dataset(vec![
            package("Dup", vec![class("C", 10, 1)]),
            package("Dup", vec![class("C", 10, 9)]),
        ]);
        let b = dataset(vec![package("Dup", vec![class("C", 10, 5)])]);
        let result = compare(Some(&a), Some(&b)).unwrap();

        assert_eq!(result.packages.len(), 1);
        assert_eq!(result.packages[0].delta.line_coverage_change, 40.0);
    }
}
