//! Breadth-first flattening of the tree into treemap rows.
//!
//! Treemap rows reference their parent by label, so labels must be unique
//! across the emitted rows. Repeated names get a zero-width joiner and a
//! counter appended; the label → id lookup reverses that.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use super::{HierarchyTree, NodeId, ROOT};

/// Invisible separator between a repeated name and its counter.
pub const LABEL_SEPARATOR: char = '\u{200D}';

/// One treemap row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub label: String,
    pub parent: Option<String>,
    pub size: u64,
    pub coverage: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FlatHierarchy {
    pub rows: Vec<ChartRow>,
    ids: HashMap<String, String>,
}

impl FlatHierarchy {
    /// Node id behind a (possibly disambiguated) label.
    pub fn id_for(&self, label: &str) -> Option<&str> {
        self.ids.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub(super) fn flatten(tree: &HierarchyTree, depth: usize) -> FlatHierarchy {
    let mut flat = FlatHierarchy::default();
    let mut taken: HashSet<String> = HashSet::new();
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut labels: HashMap<NodeId, String> = HashMap::new();
    let mut queue: VecDeque<NodeId> = VecDeque::from([ROOT]);

    while let Some(handle) = queue.pop_front() {
        let node = tree.node(handle);

        let counter = counters.entry(node.name.clone()).or_insert(0);
        let mut label = node.name.clone();
        while taken.contains(&label) {
            *counter += 1;
            label = format!("{}{}{}", node.name, LABEL_SEPARATOR, counter);
        }
        taken.insert(label.clone());

        let parent = node
            .parent
            .as_deref()
            .and_then(|id| tree.index.get(id))
            .and_then(|p| labels.get(p))
            .cloned();

        flat.ids.insert(label.clone(), node.id.clone());
        flat.rows.push(ChartRow {
            label: label.clone(),
            parent,
            size: node.size,
            coverage: node.coverage,
        });
        labels.insert(handle, label);

        queue.extend(
            node.children
                .iter()
                .copied()
                .filter(|&c| tree.node(c).level <= depth),
        );
    }

    flat
}

#[cfg(test)]
mod tests {
    use crate::hierarchy::{build, HierarchyOptions, LABEL_SEPARATOR};
    use crate::model::{ClassInfo, CoverageData, CoverageMetrics, PackageInfo};

    fn sample() -> CoverageData {
        let class = |name: &str, filename: &str, valid: u64, covered: u64| ClassInfo {
            name: name.to_string(),
            filename: filename.to_string(),
            metrics: CoverageMetrics::from_counts(valid, covered, 0, 0),
            ..Default::default()
        };
        CoverageData {
            packages: vec![
                PackageInfo {
                    name: "Shop.Web".to_string(),
                    classes: vec![
                        class("Cart", "Models/Cart.cs", 10, 5),
                        class("Home", "Controllers/Home.cs", 20, 20),
                    ],
                    ..Default::default()
                },
                PackageInfo {
                    name: "Shop.Api".to_string(),
                    classes: vec![class("Order", "Models/Order.cs", 30, 0)],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_single_root_row() {
        let tree = build(&sample(), &HierarchyOptions::default());
        let flat = tree.flatten(tree.max_depth());

        let roots: Vec<_> = flat.rows.iter().filter(|r| r.parent.is_none()).collect();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].label, "Coverage");
        assert_eq!(flat.rows[0].label, "Coverage");
        assert_eq!(flat.len(), tree.node_count());
    }

    #[test]
    fn test_repeated_names_disambiguated() {
        let tree = build(&sample(), &HierarchyOptions::default());
        let flat = tree.flatten(tree.max_depth());

        let models: Vec<&str> = flat
            .rows
            .iter()
            .map(|r| r.label.as_str())
            .filter(|l| l.starts_with("Models"))
            .collect();
        let second = format!("Models{}1", LABEL_SEPARATOR);
        assert_eq!(models, vec!["Models", second.as_str()]);

        assert_eq!(flat.id_for("Models"), Some("Coverage.Shop.Web.Models"));
        assert_eq!(flat.id_for(&second), Some("Coverage.Shop.Api.Models"));

        // Children of the second Models point at the disambiguated label.
        let order = flat.rows.iter().find(|r| r.label == "Order").unwrap();
        assert_eq!(order.parent.as_deref(), Some(second.as_str()));
    }

    #[test]
    fn test_depth_limits_rows() {
        let tree = build(&sample(), &HierarchyOptions::default());

        let shallow = tree.flatten(1);
        assert_eq!(shallow.len(), 2);
        let shop = &shallow.rows[1];
        assert_eq!(shop.label, "Shop");
        assert_eq!(shop.size, 60);

        let zero = tree.flatten(0);
        assert_eq!(zero.len(), 1);

        // The tree itself is untouched by a shallow flatten.
        assert_eq!(tree.flatten(tree.max_depth()).len(), tree.node_count());
    }
}
