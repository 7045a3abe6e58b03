//! Plain-text and Markdown rendering of analysis results.

use std::fmt::Write;

use crate::compare::{ComparisonResult, PackageComparison};
use crate::hierarchy::{HierarchyNode, HierarchyTree};
use crate::history::{CoverageSnapshot, SavedReport, TrendAnalysis};
use crate::insights::Insight;
use crate::model::CoverageData;
use crate::risk::{ClassRisk, PackageRisk, RiskAnalysis};

impl ComparisonResult {
    /// Format using a specific formatter.
    #[must_use]
    pub fn format(&self, formatter: &dyn ReportFormatter) -> String {
        formatter.format(self)
    }
}

/// Trait for formatting comparison reports.
pub trait ReportFormatter {
    fn format(&self, result: &ComparisonResult) -> String;
}

fn signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{value:.2}")
    } else {
        format!("{value:.2}")
    }
}

fn signed_int(value: i64) -> String {
    if value > 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

fn coverage_cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}%"))
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, result: &ComparisonResult) -> String {
        let mut out = String::new();
        let s = &result.summary;

        writeln!(out, "Line coverage:   {} pts", signed(s.line_coverage_change)).unwrap();
        writeln!(out, "Branch coverage: {} pts", signed(s.branch_coverage_change)).unwrap();
        writeln!(out, "Method coverage: {} pts", signed(s.method_coverage_change)).unwrap();
        writeln!(
            out,
            "Lines:           {} valid, {} covered",
            signed_int(s.lines_valid_change),
            signed_int(s.lines_covered_change)
        )
        .unwrap();

        let lists: [(&str, &[String]); 3] = [
            ("New packages", &result.new_packages),
            ("Removed packages", &result.removed_packages),
            ("Changed packages", &result.changed_packages),
        ];
        for (title, names) in lists {
            if !names.is_empty() {
                writeln!(out, "\n{title} ({}):", names.len()).unwrap();
                for name in names {
                    writeln!(out, "  {name}").unwrap();
                }
            }
        }

        let movers: [(&str, &[PackageComparison]); 2] = [
            ("Most improved", &result.most_improved),
            ("Most declined", &result.most_declined),
        ];
        for (title, rows) in movers {
            if !rows.is_empty() {
                writeln!(out, "\n{title}:").unwrap();
                for p in rows {
                    writeln!(
                        out,
                        "  {}  {} -> {}  ({} pts)",
                        p.name,
                        coverage_cell(p.delta.old_coverage),
                        coverage_cell(p.delta.new_coverage),
                        signed(p.delta.line_coverage_change)
                    )
                    .unwrap();
                }
            }
        }

        if result.has_regression() {
            out.push_str("\nCoverage regressed.\n");
        }
        out
    }
}

/// Markdown formatter.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, result: &ComparisonResult) -> String {
        let mut md = String::new();
        let s = &result.summary;

        let marker = if result.has_regression() { "📉" } else { "📈" };
        writeln!(
            md,
            "### Coverage change: {} pts {marker}\n",
            signed(s.line_coverage_change)
        )
        .unwrap();

        md.push_str("| Metric | Change |\n");
        md.push_str("|:-------|-------:|\n");
        writeln!(md, "| Line coverage | {} |", signed(s.line_coverage_change)).unwrap();
        writeln!(md, "| Branch coverage | {} |", signed(s.branch_coverage_change)).unwrap();
        writeln!(md, "| Method coverage | {} |", signed(s.method_coverage_change)).unwrap();
        writeln!(md, "| Lines valid | {} |", signed_int(s.lines_valid_change)).unwrap();
        writeln!(md, "| Lines covered | {} |", signed_int(s.lines_covered_change)).unwrap();

        if !result.packages.is_empty() {
            md.push_str("\n| Package | Before | After | Change |\n");
            md.push_str("|:--------|-------:|------:|-------:|\n");
            for p in &result.packages {
                let status = if p.is_new() {
                    " (new)"
                } else if p.is_removed() {
                    " (removed)"
                } else {
                    ""
                };
                writeln!(
                    md,
                    "| `{}`{status} | {} | {} | {} |",
                    p.name,
                    coverage_cell(p.delta.old_coverage),
                    coverage_cell(p.delta.new_coverage),
                    signed(p.delta.line_coverage_change)
                )
                .unwrap();
            }
        }

        if !result.new_classes.is_empty() || !result.removed_classes.is_empty() {
            md.push_str("\n<details>\n<summary>Class changes</summary>\n\n");
            for (package, class) in &result.new_classes {
                writeln!(md, "- added `{package}` / `{class}`").unwrap();
            }
            for (package, class) in &result.removed_classes {
                writeln!(md, "- removed `{package}` / `{class}`").unwrap();
            }
            md.push_str("\n</details>\n");
        }

        md
    }
}

// -- Plain renderers ----------------------------------------------------------

pub fn render_summary(data: &CoverageData) -> String {
    let mut out = String::new();
    let s = &data.summary;
    let m = &s.metrics;

    writeln!(
        out,
        "Line coverage:   {:.2}% ({}/{} lines)",
        m.line_coverage, m.lines_covered, m.lines_valid
    )
    .unwrap();
    if m.has_branches() {
        writeln!(
            out,
            "Branch coverage: {:.2}% ({}/{} branches)",
            m.branch_coverage, m.branches_covered, m.branches_valid
        )
        .unwrap();
    } else {
        writeln!(out, "Branch coverage: {:.2}%", m.branch_coverage).unwrap();
    }
    match s.methods {
        Some(methods) => writeln!(
            out,
            "Method coverage: {:.2}% ({}/{} methods)",
            s.method_coverage, methods.covered, methods.valid
        )
        .unwrap(),
        None => writeln!(out, "Method coverage: {:.2}%", s.method_coverage).unwrap(),
    }
    writeln!(out, "Class coverage:  {:.2}%", s.class_coverage).unwrap();
    writeln!(out, "Complexity:      {}", s.complexity).unwrap();
    writeln!(
        out,
        "Packages:        {} ({} classes)",
        data.packages.len(),
        data.class_count()
    )
    .unwrap();

    if !data.packages.is_empty() {
        out.push('\n');
        let width = data.packages.iter().map(|p| p.name.len()).max().unwrap_or(0);
        for p in &data.packages {
            writeln!(
                out,
                "  {:<width$}  {:>7.2}%  {:>6} lines",
                p.name, p.metrics.line_coverage, p.metrics.lines_valid
            )
            .unwrap();
        }
    }
    out
}

/// Indented outline of the tree down to `depth`.
pub fn render_tree(tree: &HierarchyTree, depth: usize) -> String {
    fn walk(tree: &HierarchyTree, node: &HierarchyNode, depth: usize, out: &mut String) {
        let indent = "  ".repeat(node.level);
        let marker = if node.is_group { "/" } else { "" };
        writeln!(
            out,
            "{indent}{}{marker}  {:.2}%  ({} lines)",
            node.name, node.coverage, node.size
        )
        .unwrap();
        for child in tree.children(node) {
            if child.level <= depth {
                walk(tree, child, depth, out);
            }
        }
    }

    let mut out = String::new();
    walk(tree, tree.root(), depth, &mut out);
    out
}

fn render_class_risks(out: &mut String, title: &str, risks: &[ClassRisk]) {
    if risks.is_empty() {
        return;
    }
    writeln!(out, "\n{title} ({}):", risks.len()).unwrap();
    for r in risks {
        writeln!(
            out,
            "  {:>10.2}  {}  {:.2}% of {} lines  {}",
            r.risk_score, r.name, r.coverage, r.lines_valid, r.path
        )
        .unwrap();
    }
}

pub fn render_risks(analysis: &RiskAnalysis, packages: Option<&[PackageRisk]>) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "Risk score: {:.2} ({})",
        analysis.risk_score, analysis.risk_level
    )
    .unwrap();
    writeln!(out, "Coverage gap to target: {:.2} pts", analysis.coverage_gap).unwrap();
    writeln!(out, "Classes scored: {}", analysis.total_classes).unwrap();

    render_class_risks(&mut out, "High risk", &analysis.high_risk);
    render_class_risks(&mut out, "Medium risk", &analysis.medium_risk);

    if let Some(packages) = packages {
        if !packages.is_empty() {
            writeln!(out, "\nPackages:").unwrap();
            for p in packages {
                writeln!(
                    out,
                    "  {:>10.2}  {}  {:.2}%  {} uncovered lines  {}/{} high-risk classes",
                    p.risk_score,
                    p.name,
                    p.coverage,
                    p.uncovered_lines,
                    p.high_risk_classes,
                    p.class_count
                )
                .unwrap();
            }
        }
    }
    out
}

pub fn render_insights(insights: &[Insight]) -> String {
    let mut out = String::new();
    for insight in insights {
        writeln!(out, "[{}] {}", insight.kind, insight.title).unwrap();
        writeln!(out, "    {}", insight.message).unwrap();
    }
    out
}

pub fn render_history(reports: &[SavedReport]) -> String {
    if reports.is_empty() {
        return "No saved reports.\n".to_string();
    }
    let mut out = String::new();
    for r in reports {
        writeln!(
            out,
            "{}  {}  {:.2}%",
            r.saved_at.format("%Y-%m-%d %H:%M:%S"),
            r.name,
            r.data.summary.metrics.line_coverage
        )
        .unwrap();
    }
    out
}

pub fn render_trend(snapshots: &[CoverageSnapshot], analysis: Option<&TrendAnalysis>) -> String {
    if snapshots.is_empty() {
        return "No coverage snapshots recorded.\n".to_string();
    }
    let mut out = String::new();
    for s in snapshots {
        writeln!(
            out,
            "{}  line {:.2}%  branch {:.2}%  method {:.2}%",
            s.date.format("%Y-%m-%d %H:%M:%S"),
            s.line_coverage,
            s.branch_coverage,
            s.method_coverage
        )
        .unwrap();
    }
    if let Some(a) = analysis {
        writeln!(
            out,
            "\nTrend: {} (line {} pts, branch {} pts, method {} pts)",
            a.direction,
            signed(a.line_change),
            signed(a.branch_change),
            signed(a.method_change)
        )
        .unwrap();
    }
    out
}
