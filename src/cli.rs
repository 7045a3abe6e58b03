//! Command handler functions for the covtree CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::ValueEnum;

use crate::compare::compare;
use crate::hierarchy::{self, HierarchyOptions};
use crate::history::{
    CoverageSnapshot, ReportHistory, RiskHistory, RiskHistoryEntry, TrendStore,
};
use crate::insights::generate_insights;
use crate::model::CoverageData;
use crate::notify::Notifier;
use crate::parsers;
use crate::report::{self, MarkdownFormatter, ReportFormatter, TextFormatter};
use crate::risk::{analyze_package_risks, analyze_risks};
use crate::store::KeyValueStore;

/// Output style for the `compare` command.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum Style {
    #[default]
    Text,
    Markdown,
}

/// Parse a coverage file. Failures go to `notifier` and end the command.
pub fn load_coverage(file: &Path, notifier: &dyn Notifier) -> Result<CoverageData> {
    parsers::load_file(file, notifier)
        .ok_or_else(|| anyhow!("Could not read coverage from {}", file.display()))
}

pub fn cmd_summary(file: &Path, notifier: &dyn Notifier) -> Result<String> {
    let data = load_coverage(file, notifier)?;
    Ok(report::render_summary(&data))
}

pub fn cmd_tree(file: &Path, depth: Option<usize>, notifier: &dyn Notifier) -> Result<String> {
    let data = load_coverage(file, notifier)?;
    let tree = hierarchy::build(&data, &HierarchyOptions::default());
    let depth = depth.unwrap_or_else(|| tree.max_depth());
    Ok(report::render_tree(&tree, depth))
}

pub fn cmd_risks(file: &Path, packages: bool, notifier: &dyn Notifier) -> Result<String> {
    let data = load_coverage(file, notifier)?;
    let analysis = analyze_risks(&data);
    let package_risks = packages.then(|| analyze_package_risks(&data));
    Ok(report::render_risks(&analysis, package_risks.as_deref()))
}

pub fn cmd_insights(file: &Path, notifier: &dyn Notifier) -> Result<String> {
    let data = load_coverage(file, notifier)?;
    Ok(report::render_insights(&generate_insights(&data)))
}

pub fn cmd_compare(old: &Path, new: &Path, style: Style, notifier: &dyn Notifier) -> Result<String> {
    let older = load_coverage(old, notifier)?;
    let newer = load_coverage(new, notifier)?;
    let result = compare(Some(&older), Some(&newer))?;

    let formatter: &dyn ReportFormatter = match style {
        Style::Text => &TextFormatter,
        Style::Markdown => &MarkdownFormatter,
    };
    Ok(result.format(formatter))
}

/// Save a report and record a trend snapshot and risk history entry for it.
pub fn cmd_save<S: KeyValueStore>(
    store: &mut S,
    file: &Path,
    name: Option<&str>,
    notifier: &dyn Notifier,
) -> Result<String> {
    let data = load_coverage(file, notifier)?;
    let name = match name {
        Some(n) => n.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Cannot derive a report name from {}", file.display()))?,
    };
    let now = Utc::now();

    ReportHistory::new(store)
        .save_at(&name, &data, now)
        .context("Failed to save report")?;
    TrendStore::new(store)
        .record(CoverageSnapshot::from_data(&data, now))
        .context("Failed to record coverage snapshot")?;
    let analysis = analyze_risks(&data);
    RiskHistory::new(store)
        .record(RiskHistoryEntry::from_analysis(&analysis, now))
        .context("Failed to record risk history")?;

    let mut out = String::new();
    writeln!(
        out,
        "Saved '{}' ({:.2}% line coverage, risk {:.2} {})",
        name, data.summary.metrics.line_coverage, analysis.risk_score, analysis.risk_level
    )
    .unwrap();
    Ok(out)
}

pub fn cmd_history<S: KeyValueStore>(store: &mut S) -> Result<String> {
    let reports = ReportHistory::new(store).list()?;
    Ok(report::render_history(&reports))
}

pub fn cmd_trend<S: KeyValueStore>(store: &mut S) -> Result<String> {
    let trend = TrendStore::new(store);
    let snapshots = trend.snapshots()?;
    let analysis = trend.analyze()?;
    Ok(report::render_trend(&snapshots, analysis.as_ref()))
}
