//! Typed representation of a Cobertura coverage document.
//!
//! The parser produces a `CoverageData` snapshot; every analysis in the crate
//! takes that snapshot by reference and never mutates it.

use serde::{Deserialize, Serialize};

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Clamp a percentage into [0, 100]. NaN becomes 0.
#[must_use]
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Compute a percentage, returning 0.0 when the total is zero.
#[must_use]
pub fn percentage(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(clamp_percent(covered as f64 / total as f64 * 100.0))
    }
}

/// Convert a Cobertura rate in [0, 1] into a clamped, rounded percentage.
#[must_use]
pub fn rate_to_percent(rate: f64) -> f64 {
    round2(clamp_percent(rate * 100.0))
}

/// Line and branch coverage shared by classes, packages and the summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetrics {
    pub line_coverage: f64,
    pub branch_coverage: f64,
    pub lines_valid: u64,
    pub lines_covered: u64,
    pub branches_valid: u64,
    pub branches_covered: u64,
}

impl CoverageMetrics {
    /// Build metrics from absolute counts. Covered counts are clamped to
    /// their valid counts.
    #[must_use]
    pub fn from_counts(
        lines_valid: u64,
        lines_covered: u64,
        branches_valid: u64,
        branches_covered: u64,
    ) -> Self {
        let lines_covered = lines_covered.min(lines_valid);
        let branches_covered = branches_covered.min(branches_valid);
        Self {
            line_coverage: percentage(lines_covered, lines_valid),
            branch_coverage: percentage(branches_covered, branches_valid),
            lines_valid,
            lines_covered,
            branches_valid,
            branches_covered,
        }
    }

    #[must_use]
    pub fn uncovered_lines(&self) -> u64 {
        self.lines_valid.saturating_sub(self.lines_covered)
    }

    #[must_use]
    pub fn has_branches(&self) -> bool {
        self.branches_valid > 0
    }
}

/// A valid/covered pair, used for methods and conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub valid: u64,
    pub covered: u64,
}

impl Counts {
    #[must_use]
    pub fn new(valid: u64, covered: u64) -> Self {
        Self {
            valid,
            covered: covered.min(valid),
        }
    }

    #[must_use]
    pub fn coverage(&self) -> f64 {
        percentage(self.covered, self.valid)
    }

    /// Sum a sequence of counts.
    pub fn sum<'a>(items: impl IntoIterator<Item = &'a Counts>) -> Counts {
        items.into_iter().fold(Counts::default(), |acc, c| Counts {
            valid: acc.valid + c.valid,
            covered: acc.covered + c.covered,
        })
    }
}

/// Parsed `condition-coverage="50% (1/2)"` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionInfo {
    pub coverage: f64,
    pub covered: u32,
    pub total: u32,
}

/// A single instrumented line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineInfo {
    pub number: u32,
    pub hits: u64,
    pub branch: bool,
    pub condition: Option<ConditionInfo>,
}

/// Coverage for a single class (one `<class>` element).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub filename: String,
    pub complexity: f64,
    #[serde(flatten)]
    pub metrics: CoverageMetrics,
    pub lines: Vec<LineInfo>,
    pub methods: Option<Counts>,
}

/// Coverage for a package and its classes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    #[serde(flatten)]
    pub metrics: CoverageMetrics,
    pub classes: Vec<ClassInfo>,
    pub method_coverage: Option<f64>,
    pub complexity: Option<f64>,
    pub methods: Option<Counts>,
}

impl PackageInfo {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Insert a class, replacing an existing class of the same name in place.
    pub fn insert_class(&mut self, class: ClassInfo) {
        match self.classes.iter_mut().find(|c| c.name == class.name) {
            Some(existing) => *existing = class,
            None => self.classes.push(class),
        }
    }

    /// First class with the given name.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.iter().find(|c| c.name == name)
    }
}

/// Document-level totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    #[serde(flatten)]
    pub metrics: CoverageMetrics,
    pub method_coverage: f64,
    pub class_coverage: f64,
    pub complexity: f64,
    pub timestamp: Option<i64>,
    pub methods: Option<Counts>,
    pub conditions: Option<Counts>,
}

/// The complete result of parsing a single coverage document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageData {
    pub summary: CoverageSummary,
    pub packages: Vec<PackageInfo>,
}

impl CoverageData {
    pub fn new() -> Self {
        Self::default()
    }

    /// First package with the given name.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&PackageInfo> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Every class paired with its owning package, in document order.
    pub fn classes(&self) -> impl Iterator<Item = (&PackageInfo, &ClassInfo)> {
        self.packages
            .iter()
            .flat_map(|p| p.classes.iter().map(move |c| (p, c)))
    }

    #[must_use]
    pub fn class_count(&self) -> usize {
        self.packages.iter().map(|p| p.classes.len()).sum()
    }
}
