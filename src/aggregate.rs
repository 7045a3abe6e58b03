//! Bottom-up roll-up of coverage counts.
//!
//! Absolute fields are summed; percentages are recomputed from the summed
//! counts rather than averaged.

use crate::model::{Counts, CoverageMetrics};

/// Combine child metrics into a parent.
pub fn aggregate<'a>(children: impl IntoIterator<Item = &'a CoverageMetrics>) -> CoverageMetrics {
    let (lines_valid, lines_covered, branches_valid, branches_covered) = children
        .into_iter()
        .fold((0u64, 0u64, 0u64, 0u64), |(lv, lc, bv, bc), m| {
            (
                lv + m.lines_valid,
                lc + m.lines_covered,
                bv + m.branches_valid,
                bc + m.branches_covered,
            )
        });
    CoverageMetrics::from_counts(lines_valid, lines_covered, branches_valid, branches_covered)
}

/// Sum optional counts. Returns `None` when no child carries counts.
pub fn aggregate_counts<'a>(children: impl IntoIterator<Item = &'a Option<Counts>>) -> Option<Counts> {
    let present: Vec<&Counts> = children.into_iter().flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(Counts::sum(present))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_recomputes_percentages() {
        let a = CoverageMetrics::from_counts(10, 9, 2, 2);
        let b = CoverageMetrics::from_counts(90, 36, 8, 2);
        let total = aggregate([&a, &b]);

        assert_eq!(total.lines_valid, 100);
        assert_eq!(total.lines_covered, 45);
        // Not the mean of 90% and 40%.
        assert_eq!(total.line_coverage, 45.0);
        assert_eq!(total.branches_valid, 10);
        assert_eq!(total.branch_coverage, 40.0);
    }

    #[test]
    fn test_aggregate_empty() {
        let total = aggregate(std::iter::empty());
        assert_eq!(total, CoverageMetrics::default());
    }

    #[test]
    fn test_aggregate_counts() {
        let items = [Some(Counts::new(4, 2)), None, Some(Counts::new(6, 6))];
        assert_eq!(aggregate_counts(&items), Some(Counts::new(10, 8)));
        assert_eq!(aggregate_counts(&[None, None]), None);
    }
}
