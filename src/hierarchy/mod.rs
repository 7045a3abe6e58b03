//! Package → folder → class tree with size-weighted coverage roll-up.
//!
//! Nodes live in an arena owned by [`HierarchyTree`]. Children are arena
//! handles and the parent link is the parent's string id, so there is no
//! ownership cycle; lookups by id go through an explicit index.
//!
//! Node ids are the dot-joined path from the root (`Coverage.App.Models.User`)
//! so identical short names under different parents never collide.

pub mod filter;
mod flatten;
pub mod path;

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{round2, ClassInfo, CoverageData, PackageInfo};

pub use filter::FilterRules;
pub use flatten::{ChartRow, FlatHierarchy, LABEL_SEPARATOR};

pub const DEFAULT_ROOT_NAME: &str = "Coverage";

/// Deepest level reported by [`HierarchyTree::max_depth`].
pub const MAX_DISPLAY_DEPTH: usize = 10;

#[derive(Debug, Clone)]
pub struct HierarchyOptions {
    pub root_name: String,
    pub display_depth_cap: usize,
    pub filter: FilterRules,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        Self {
            root_name: DEFAULT_ROOT_NAME.to_string(),
            display_depth_cap: MAX_DISPLAY_DEPTH,
            filter: FilterRules::default(),
        }
    }
}

/// Arena handle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The class a leaf was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassRef {
    pub package: String,
    pub name: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    pub id: String,
    pub name: String,
    /// Slash-joined segments below the root.
    pub full_path: String,
    /// Id of the parent node; `None` for the root.
    pub parent: Option<String>,
    /// Valid lines below this node.
    pub size: u64,
    pub coverage: f64,
    pub level: usize,
    pub is_group: bool,
    pub children: Vec<NodeId>,
    pub class: Option<ClassRef>,
}

impl HierarchyNode {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct HierarchyTree {
    nodes: Vec<HierarchyNode>,
    index: HashMap<String, NodeId>,
    max_depth: usize,
}

const ROOT: NodeId = NodeId(0);

impl HierarchyTree {
    fn with_root(name: &str) -> Self {
        let root = HierarchyNode {
            id: name.to_string(),
            name: name.to_string(),
            full_path: String::new(),
            parent: None,
            size: 0,
            coverage: 0.0,
            level: 0,
            is_group: true,
            children: Vec::new(),
            class: None,
        };
        let mut index = HashMap::new();
        index.insert(root.id.clone(), ROOT);
        Self {
            nodes: vec![root],
            index,
            max_depth: 0,
        }
    }

    pub fn root(&self) -> &HierarchyNode {
        &self.nodes[ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> &HierarchyNode {
        &self.nodes[id.0]
    }

    /// Look a node up by its string id.
    pub fn get(&self, id: &str) -> Option<&HierarchyNode> {
        self.index.get(id).map(|&n| self.node(n))
    }

    pub fn children<'a>(&'a self, node: &'a HierarchyNode) -> impl Iterator<Item = &'a HierarchyNode> + 'a {
        node.children.iter().map(move |&c| self.node(c))
    }

    pub fn parent(&self, node: &HierarchyNode) -> Option<&HierarchyNode> {
        node.parent.as_deref().and_then(|id| self.get(id))
    }

    /// Nodes from the root down to `id`, inclusive. Empty when `id` is unknown.
    pub fn path_to(&self, id: &str) -> Vec<&HierarchyNode> {
        let mut path = Vec::new();
        let mut current = self.get(id);
        while let Some(node) = current {
            path.push(node);
            current = self.parent(node);
        }
        path.reverse();
        path
    }

    /// Deepest level in the tree, capped for display.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes in insertion order (parents before children).
    pub fn iter(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.iter()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.iter().filter(|n| n.is_leaf() && n.level > 0)
    }

    /// Rows for a treemap, showing nodes down to `depth`.
    pub fn flatten(&self, depth: usize) -> FlatHierarchy {
        flatten::flatten(self, depth)
    }

    fn insert(&mut self, segments: &[String], package: &PackageInfo, class: &ClassInfo) {
        let mut current = ROOT;
        for (i, segment) in segments.iter().enumerate() {
            let is_leaf = i + 1 == segments.len();
            let child = self.child(current, segment, !is_leaf);

            if !is_leaf {
                self.make_group(child);
            } else if self.nodes[child.0].is_leaf() {
                self.attach_class(child, package, class);
            } else {
                // A folder of the same name already holds other classes.
                let own = self.child(child, segment, false);
                self.attach_class(own, package, class);
            }
            current = child;
        }
    }

    /// Child of `parent` named `segment`, created on first use.
    fn child(&mut self, parent: NodeId, segment: &str, is_group: bool) -> NodeId {
        let parent_node = &self.nodes[parent.0];
        let id = format!("{}.{}", parent_node.id, segment);
        if let Some(&existing) = self.index.get(&id) {
            return existing;
        }

        let full_path = if parent_node.full_path.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{}", parent_node.full_path, segment)
        };
        let node = HierarchyNode {
            id: id.clone(),
            name: segment.to_string(),
            full_path,
            parent: Some(parent_node.id.clone()),
            size: 0,
            coverage: 0.0,
            level: parent_node.level + 1,
            is_group,
            children: Vec::new(),
            class: None,
        };
        let handle = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(handle);
        self.index.insert(id, handle);
        handle
    }

    /// Mark `node` as a group. A class already stored on it moves down to a
    /// leaf child of the same name. Paths never repeat a segment back to back,
    /// so that child id is never reached by another class path.
    fn make_group(&mut self, node: NodeId) {
        self.nodes[node.0].is_group = true;
        let Some(class) = self.nodes[node.0].class.take() else {
            return;
        };
        let (name, size, coverage) = {
            let n = &self.nodes[node.0];
            (n.name.clone(), n.size, n.coverage)
        };
        let own = self.child(node, &name, false);
        let leaf = &mut self.nodes[own.0];
        leaf.size = size;
        leaf.coverage = coverage;
        leaf.class = Some(class);
    }

    /// Store a class on a leaf. Two classes resolving to the same leaf: the
    /// later one wins.
    fn attach_class(&mut self, node: NodeId, package: &PackageInfo, class: &ClassInfo) {
        let leaf = &mut self.nodes[node.0];
        leaf.size = class.metrics.lines_valid;
        leaf.coverage = class.metrics.line_coverage;
        leaf.class = Some(ClassRef {
            package: package.name.clone(),
            name: class.name.clone(),
            filename: class.filename.clone(),
        });
    }

    /// Recompute every group from its children. Children always sit at a
    /// higher arena index than their parent, so a reverse sweep is post-order.
    fn roll_up(&mut self) {
        for idx in (0..self.nodes.len()).rev() {
            if self.nodes[idx].children.is_empty() {
                continue;
            }
            let (size, weighted) = self.nodes[idx]
                .children
                .iter()
                .map(|c| &self.nodes[c.0])
                .fold((0u64, 0.0f64), |(size, weighted), child| {
                    (size + child.size, weighted + child.size as f64 * child.coverage)
                });
            let node = &mut self.nodes[idx];
            node.size = size;
            node.coverage = if size > 0 {
                round2(weighted / size as f64)
            } else {
                0.0
            };
        }
    }
}

/// Build the hierarchy for every class that passes the filter.
pub fn build(data: &CoverageData, options: &HierarchyOptions) -> HierarchyTree {
    let mut tree = HierarchyTree::with_root(&options.root_name);
    let mut excluded = 0usize;

    for (package, class) in data.classes() {
        if options.filter.excludes(package, class) {
            excluded += 1;
            continue;
        }
        let segments = path::class_path(&package.name, &class.filename, &class.name);
        tree.insert(&segments, package, class);
    }

    tree.roll_up();
    let deepest = tree.nodes.iter().map(|n| n.level).max().unwrap_or(0);
    tree.max_depth = deepest.min(options.display_depth_cap);

    log::debug!(
        "built hierarchy: {} nodes, depth {}, {} classes excluded",
        tree.node_count(),
        deepest,
        excluded
    );
    tree
}
