//! Saved reports, coverage trend snapshots and risk history.
//!
//! Each collection lives as one JSON array under its own key in a
//! [`KeyValueStore`] and is capped in length.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{round2, CoverageData};
use crate::risk::{RiskAnalysis, RiskLevel};
use crate::store::KeyValueStore;

pub const REPORTS_KEY: &str = "covtree:reports";
pub const TREND_KEY: &str = "covtree:trend";
pub const RISK_HISTORY_KEY: &str = "covtree:risk-history";

pub const MAX_SAVED_REPORTS: usize = 10;
pub const MAX_TREND_SNAPSHOTS: usize = 30;
pub const MAX_RISK_ENTRIES: usize = 30;

/// Line coverage change (percentage points) within which a trend is stable.
pub const TREND_STABLE_BAND: f64 = 0.5;

// -- Saved reports ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedReport {
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub data: CoverageData,
}

/// Named full snapshots, newest first.
pub struct ReportHistory<'a, S> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore> ReportHistory<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<SavedReport>> {
        Ok(self.store.get_json(REPORTS_KEY)?.unwrap_or_default())
    }

    pub fn save(&mut self, name: &str, data: &CoverageData) -> Result<()> {
        self.save_at(name, data, Utc::now())
    }

    /// Save under `name`, replacing any report of the same name.
    pub fn save_at(&mut self, name: &str, data: &CoverageData, saved_at: DateTime<Utc>) -> Result<()> {
        let mut reports = self.list()?;
        reports.retain(|r| r.name != name);
        reports.insert(
            0,
            SavedReport {
                name: name.to_string(),
                saved_at,
                data: data.clone(),
            },
        );
        reports.truncate(MAX_SAVED_REPORTS);
        self.store.set_json(REPORTS_KEY, &reports)
    }

    pub fn load(&self, name: &str) -> Result<Option<SavedReport>> {
        Ok(self.list()?.into_iter().find(|r| r.name == name))
    }

    /// Returns false when no report had that name.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        let mut reports = self.list()?;
        let before = reports.len();
        reports.retain(|r| r.name != name);
        if reports.len() == before {
            return Ok(false);
        }
        self.store.set_json(REPORTS_KEY, &reports)?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(REPORTS_KEY)
    }
}

// -- Coverage trend ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSnapshot {
    pub date: DateTime<Utc>,
    pub line_coverage: f64,
    pub branch_coverage: f64,
    pub method_coverage: f64,
    pub lines_valid: u64,
    pub lines_covered: u64,
    pub branches_valid: u64,
    pub branches_covered: u64,
    pub package_count: usize,
    pub class_count: usize,
}

impl CoverageSnapshot {
    pub fn from_data(data: &CoverageData, date: DateTime<Utc>) -> Self {
        let m = &data.summary.metrics;
        Self {
            date,
            line_coverage: m.line_coverage,
            branch_coverage: m.branch_coverage,
            method_coverage: data.summary.method_coverage,
            lines_valid: m.lines_valid,
            lines_covered: m.lines_covered,
            branches_valid: m.branches_valid,
            branches_covered: m.branches_covered,
            package_count: data.packages.len(),
            class_count: data.class_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

impl TrendDirection {
    fn from_delta(delta: f64) -> Self {
        if delta > TREND_STABLE_BAND {
            TrendDirection::Improving
        } else if delta < -TREND_STABLE_BAND {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
        })
    }
}

/// Latest snapshot against the one before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub current: CoverageSnapshot,
    pub previous: CoverageSnapshot,
    pub line_change: f64,
    pub branch_change: f64,
    pub method_change: f64,
    pub direction: TrendDirection,
    pub snapshot_count: usize,
}

pub struct TrendStore<'a, S> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore> TrendStore<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Snapshots in chronological order.
    pub fn snapshots(&self) -> Result<Vec<CoverageSnapshot>> {
        Ok(self.store.get_json(TREND_KEY)?.unwrap_or_default())
    }

    pub fn record(&mut self, snapshot: CoverageSnapshot) -> Result<()> {
        let mut snapshots = self.snapshots()?;
        snapshots.push(snapshot);
        snapshots.sort_by_key(|s| s.date);
        if snapshots.len() > MAX_TREND_SNAPSHOTS {
            snapshots.drain(..snapshots.len() - MAX_TREND_SNAPSHOTS);
        }
        self.store.set_json(TREND_KEY, &snapshots)
    }

    /// `None` until at least two snapshots exist.
    pub fn analyze(&self) -> Result<Option<TrendAnalysis>> {
        let snapshots = self.snapshots()?;
        let [.., previous, current] = snapshots.as_slice() else {
            return Ok(None);
        };
        let line_change = round2(current.line_coverage - previous.line_coverage);
        Ok(Some(TrendAnalysis {
            line_change,
            branch_change: round2(current.branch_coverage - previous.branch_coverage),
            method_change: round2(current.method_coverage - previous.method_coverage),
            direction: TrendDirection::from_delta(line_change),
            snapshot_count: snapshots.len(),
            current: current.clone(),
            previous: previous.clone(),
        }))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(TREND_KEY)
    }
}

// -- Risk history -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskHistoryEntry {
    pub date: DateTime<Utc>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    pub total_classes: usize,
}

impl RiskHistoryEntry {
    pub fn from_analysis(analysis: &RiskAnalysis, date: DateTime<Utc>) -> Self {
        Self {
            date,
            risk_score: analysis.risk_score,
            risk_level: analysis.risk_level,
            high_risk_count: analysis.high_risk.len(),
            medium_risk_count: analysis.medium_risk.len(),
            total_classes: analysis.total_classes,
        }
    }
}

pub struct RiskHistory<'a, S> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore> RiskHistory<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    pub fn entries(&self) -> Result<Vec<RiskHistoryEntry>> {
        Ok(self.store.get_json(RISK_HISTORY_KEY)?.unwrap_or_default())
    }

    pub fn record(&mut self, entry: RiskHistoryEntry) -> Result<()> {
        let mut entries = self.entries()?;
        entries.push(entry);
        if entries.len() > MAX_RISK_ENTRIES {
            entries.drain(..entries.len() - MAX_RISK_ENTRIES);
        }
        self.store.set_json(RISK_HISTORY_KEY, &entries)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(RISK_HISTORY_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageMetrics, CoverageSummary};
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn data(valid: u64, covered: u64) -> CoverageData {
        CoverageData {
            summary: CoverageSummary {
                metrics: CoverageMetrics::from_counts(valid, covered, 0, 0),
                ..Default::default()
            },
            packages: Vec::new(),
        }
    }

    #[test]
    fn test_reports_newest_first_and_replaced() {
        let mut store = MemoryStore::new();
        let mut history = ReportHistory::new(&mut store);
        history.save_at("a", &data(10, 1), day(0)).unwrap();
        history.save_at("b", &data(10, 2), day(1)).unwrap();
        history.save_at("a", &data(10, 3), day(2)).unwrap();

        let names: Vec<String> = history.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        let a = history.load("a").unwrap().unwrap();
        assert_eq!(a.data.summary.metrics.lines_covered, 3);
        assert_eq!(a.saved_at, day(2));
    }

    #[test]
    fn test_reports_capped() {
        let mut store = MemoryStore::new();
        let mut history = ReportHistory::new(&mut store);
        for i in 0..12 {
            history.save_at(&format!("r{i}"), &data(1, 1), day(i)).unwrap();
        }
        let reports = history.list().unwrap();
        assert_eq!(reports.len(), MAX_SAVED_REPORTS);
        assert_eq!(reports[0].name, "r11");
        assert!(history.load("r0").unwrap().is_none());
    }

    #[test]
    fn test_reports_delete_and_clear() {
        let mut store = MemoryStore::new();
        let mut history = ReportHistory::new(&mut store);
        history.save_at("a", &data(1, 1), day(0)).unwrap();
        assert!(history.delete("a").unwrap());
        assert!(!history.delete("a").unwrap());
        history.save_at("b", &data(1, 1), day(0)).unwrap();
        history.clear().unwrap();
        assert!(history.list().unwrap().is_empty());
    }

    #[test]
    fn test_trend_direction() {
        let mut store = MemoryStore::new();
        let mut trend = TrendStore::new(&mut store);
        assert!(trend.analyze().unwrap().is_none());

        trend.record(CoverageSnapshot::from_data(&data(100, 50), day(0))).unwrap();
        assert!(trend.analyze().unwrap().is_none());

        trend.record(CoverageSnapshot::from_data(&data(100, 60), day(1))).unwrap();
        let analysis = trend.analyze().unwrap().unwrap();
        assert_eq!(analysis.line_change, 10.0);
        assert_eq!(analysis.direction, TrendDirection::Improving);
        assert_eq!(analysis.snapshot_count, 2);

        trend.record(CoverageSnapshot::from_data(&data(1000, 597), day(2))).unwrap();
        let analysis = trend.analyze().unwrap().unwrap();
        assert_eq!(analysis.line_change, -0.3);
        assert_eq!(analysis.direction, TrendDirection::Stable);

        trend.record(CoverageSnapshot::from_data(&data(100, 50), day(3))).unwrap();
        assert_eq!(trend.analyze().unwrap().unwrap().direction, TrendDirection::Declining);
    }

    #[test]
    fn test_trend_chronological_and_capped() {
        let mut store = MemoryStore::new();
        let mut trend = TrendStore::new(&mut store);
        for i in (0..35).rev() {
            trend.record(CoverageSnapshot::from_data(&data(100, i as u64), day(i))).unwrap();
        }
        let snapshots = trend.snapshots().unwrap();
        assert_eq!(snapshots.len(), MAX_TREND_SNAPSHOTS);
        assert!(snapshots.windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(snapshots.last().unwrap().date, day(34));
    }

    #[test]
    fn test_risk_history_capped() {
        let mut store = MemoryStore::new();
        let mut history = RiskHistory::new(&mut store);
        let analysis = crate::risk::analyze_risks(&data(10, 5));
        for i in 0..31 {
            history
                .record(RiskHistoryEntry::from_analysis(&analysis, day(i)))
                .unwrap();
        }
        let entries = history.entries().unwrap();
        assert_eq!(entries.len(), MAX_RISK_ENTRIES);
        assert_eq!(entries[0].date, day(1));
        assert_eq!(entries[0].risk_level, analysis.risk_level);
        history.clear().unwrap();
        assert!(history.entries().unwrap().is_empty());
    }
}
