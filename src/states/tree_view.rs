//! Tree View State
//!
//! Expansion and selection of tree nodes, keyed by node id and independent of
//! any particular tree, so it survives rebuilds. The two are orthogonal:
//! expanding never touches the selection and selecting never expands.

use crate::tree::TreeItem;
use ahash::AHashSet;
use hashlink::LinkedHashSet;

/// Called with the next selection when selection is owned by the caller
pub type SelectionCallback = Box<dyn FnMut(&[String]) + Send>;

/// Expand/select state of one tree widget
pub struct TreeViewState {
    expanded: AHashSet<String>,
    /// Selected ids in selection order
    selected: LinkedHashSet<String>,
    selectable: bool,
    multi_select: bool,
    /// `Some` when selection is controlled by the owner
    on_selection_change: Option<SelectionCallback>,
}

/// One visible line of a flattened tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub id: String,
    pub name: String,
    pub level: usize,
    pub is_group: bool,
    pub has_children: bool,
    pub expanded: bool,
    pub selected: bool,
    /// Last among its siblings
    pub is_last: bool,
    /// One flag per ancestor column: the vertical guide continues past this row
    pub guides: Vec<bool>,
}

impl Default for TreeViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeViewState {
    /// Internally owned selection, single-select, nothing expanded
    pub fn new() -> Self {
        Self {
            expanded: AHashSet::new(),
            selected: LinkedHashSet::new(),
            selectable: true,
            multi_select: false,
            on_selection_change: None,
        }
    }

    /// Selection owned by the caller: it supplies the current ids and is told
    /// about every change, then syncs back through [`Self::set_selected_ids`]
    pub fn controlled<I, S>(selected: I, on_change: SelectionCallback) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = Self::new();
        state.set_selected_ids(selected);
        state.on_selection_change = Some(on_change);
        state
    }

    pub fn with_expanded<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expanded.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_multi_select(mut self, multi_select: bool) -> Self {
        self.multi_select = multi_select;
        self
    }

    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    pub fn is_controlled(&self) -> bool {
        self.on_selection_change.is_some()
    }

    // ==================== Expansion ====================

    pub fn expanded_ids(&self) -> &AHashSet<String> {
        &self.expanded
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Flip one node; returns whether it is now expanded
    pub fn toggle_expanded(&mut self, id: &str) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.to_string());
            true
        }
    }

    pub fn expand(&mut self, id: impl Into<String>) {
        self.expanded.insert(id.into());
    }

    pub fn collapse(&mut self, id: &str) {
        self.expanded.remove(id);
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    // ==================== Selection ====================

    pub fn selected_ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Replace the selection, e.g. when a controlling owner syncs its state
    pub fn set_selected_ids<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = ids.into_iter().map(Into::into).collect();
    }

    /// React to a click on `id`; `modifier` is the multi-select key.
    ///
    /// Returns the next selection. Internal state applies it directly;
    /// controlled state hands it to the owner's callback instead.
    pub fn handle_selection(&mut self, id: &str, modifier: bool) -> Vec<String> {
        if !self.selectable {
            return self.selected_ids();
        }

        let next: Vec<String> = if self.multi_select && modifier {
            if self.selected.contains(id) {
                self.selected.iter().filter(|s| *s != id).cloned().collect()
            } else {
                self.selected
                    .iter()
                    .cloned()
                    .chain(std::iter::once(id.to_string()))
                    .collect()
            }
        } else if self.selected.contains(id) {
            Vec::new()
        } else {
            vec![id.to_string()]
        };

        match self.on_selection_change.as_mut() {
            Some(on_change) => on_change(next.as_slice()),
            None => self.set_selected_ids(next.iter().cloned()),
        }
        next
    }

    pub fn clear_selection(&mut self) {
        match self.on_selection_change.as_mut() {
            Some(on_change) => on_change(Vec::new().as_slice()),
            None => self.selected.clear(),
        }
    }

    // ==================== Rows ====================

    /// Flatten the tree into the rows to draw, descending only into expanded
    /// groups
    pub fn visible_rows(&self, tree: &[TreeItem]) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        let mut guides = Vec::new();
        self.push_rows(tree, &mut guides, &mut rows);
        rows
    }

    fn push_rows(&self, nodes: &[TreeItem], guides: &mut Vec<bool>, rows: &mut Vec<TreeRow>) {
        for (position, node) in nodes.iter().enumerate() {
            let is_last = position + 1 == nodes.len();
            let expanded = self.is_expanded(&node.id);
            rows.push(TreeRow {
                id: node.id.clone(),
                name: node.name.clone(),
                level: node.level,
                is_group: node.is_group(),
                has_children: !node.children.is_empty(),
                expanded,
                selected: self.is_selected(&node.id),
                is_last,
                guides: guides.clone(),
            });

            if expanded && !node.children.is_empty() {
                guides.push(!is_last);
                self.push_rows(&node.children, guides, rows);
                guides.pop();
            }
        }
    }
}

impl std::fmt::Debug for TreeViewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeViewState")
            .field("expanded", &self.expanded.len())
            .field("selected", &self.selected_ids())
            .field("selectable", &self.selectable)
            .field("multi_select", &self.multi_select)
            .field("controlled", &self.is_controlled())
            .finish()
    }
}
