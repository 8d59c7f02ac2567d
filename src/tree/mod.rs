//! Key Tree Projection
//!
//! Pure functions that turn a flat list of delimited key names into a tree of
//! group and leaf nodes, and sort or filter that tree.
//!
//! ```text
//! ["a", "a:b", "a:c"]          a          (leaf,  id "a")
//!        │ build_tree(":")     a/         (group, id "group__a")
//!        ▼                     ├── b      (leaf,  id "a:b")
//!     Vec<TreeItem>            └── c      (leaf,  id "a:c")
//! ```
//!
//! Trees are rebuilt from scratch whenever the key list changes; node ids stay
//! stable for the same keys so view state can be kept by id.

mod build;
mod transform;

pub use build::*;
pub use transform::*;

/// Whether a node is an intermediate path segment or a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Group,
    Leaf,
}

/// One node of the key tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    /// Full path; groups carry the `group__` prefix
    pub id: String,
    /// Last path segment
    pub name: String,
    /// Depth, 0 for roots
    pub level: usize,
    pub kind: NodeKind,
    /// Always empty for leaves
    pub children: Vec<TreeItem>,
}

impl TreeItem {
    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    /// The full key name of a leaf
    pub fn key(&self) -> Option<&str> {
        self.is_leaf().then_some(self.id.as_str())
    }
}
