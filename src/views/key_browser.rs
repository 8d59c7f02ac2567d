//! Key Browser
//!
//! View model of the key sidebar: the sorted key tree of one key space, the
//! search keyword and the tree's expand/select state.
//!
//! ```text
//! KeySpaceCache ──KeysChanged──▶ sync() ──▶ dataset (sorted tree)
//!                                              │ filter_tree(keyword)
//!                                              ▼
//!                               TreeViewState::visible_rows ──▶ rows()
//! ```

use crate::domain::{KeySpaceId, KeyspaceConfig};
use crate::states::{CacheEvent, KeySpaceCache, TreeRow, TreeViewState};
use crate::tree::{TreeItem, build_tree, count_leaves, filter_tree, sort_tree};
use ahash::AHashSet;

/// Browser state for one key space
#[derive(Debug)]
pub struct KeyBrowser {
    space: KeySpaceId,
    delimiter: String,
    /// Search keyword, matched against node names
    keyword: String,
    /// Sorted tree of every cached key
    dataset: Vec<TreeItem>,
    is_loading: bool,
    has_more: bool,
    view: TreeViewState,
}

impl KeyBrowser {
    pub fn new(space: KeySpaceId, delimiter: impl Into<String>) -> Self {
        Self {
            space,
            delimiter: delimiter.into(),
            keyword: String::new(),
            dataset: Vec::new(),
            is_loading: false,
            has_more: false,
            view: TreeViewState::new().with_multi_select(true),
        }
    }

    pub fn from_config(space: KeySpaceId, config: &KeyspaceConfig) -> Self {
        Self::new(space, config.delimiter.clone())
    }

    // ==================== Getters ====================

    pub fn space(&self) -> &KeySpaceId {
        &self.space
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn dataset(&self) -> &[TreeItem] {
        &self.dataset
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// More pages can be loaded
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Number of keys in the tree
    pub fn key_count(&self) -> usize {
        count_leaves(&self.dataset)
    }

    pub fn view(&self) -> &TreeViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut TreeViewState {
        &mut self.view
    }

    // ==================== Updates ====================

    /// Rebuild the tree from a flat key list
    pub fn rebuild<S: AsRef<str>>(&mut self, keys: &[S]) {
        self.dataset = sort_tree(build_tree(keys, &self.delimiter));
    }

    /// Pull the latest state of this key space from the cache
    pub fn sync(&mut self, cache: &KeySpaceCache) {
        let snapshot = cache.snapshot(&self.space);
        self.is_loading = snapshot.is_loading();
        self.has_more = snapshot.cursor().is_some();
        self.rebuild(snapshot.keys());
        tracing::debug!(space = %self.space, keys = snapshot.keys().len(), "Key browser synced");
    }

    /// Handle a cache event; returns whether the browser changed
    pub fn handle_event(&mut self, event: &CacheEvent, cache: &KeySpaceCache) -> bool {
        match event {
            CacheEvent::KeysChanged { space } if *space == self.space => {
                self.sync(cache);
                true
            }
            _ => false,
        }
    }

    pub fn set_keyword(&mut self, keyword: impl Into<String>) {
        self.keyword = keyword.into();
    }

    // ==================== Projection ====================

    /// The tree after applying the keyword filter
    pub fn visible_tree(&self) -> Vec<TreeItem> {
        filter_tree(&self.dataset, &self.keyword)
    }

    /// Rows to draw for the filtered tree
    pub fn rows(&self) -> Vec<TreeRow> {
        self.view.visible_rows(&self.visible_tree())
    }

    /// Selected ids that are keys, skipping selected groups
    pub fn selected_keys(&self) -> Vec<String> {
        let mut leaves = AHashSet::new();
        collect_leaf_ids(&self.dataset, &mut leaves);
        self.view
            .selected_ids()
            .into_iter()
            .filter(|id| leaves.contains(id.as_str()))
            .collect()
    }

    /// Plain-text rendering of the visible rows
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for row in self.rows() {
            for continues in &row.guides {
                out.push_str(if *continues { "│  " } else { "   " });
            }
            out.push_str(if row.is_last { "└─ " } else { "├─ " });
            if row.is_group {
                out.push_str(if row.expanded { "▾ " } else { "▸ " });
            }
            out.push_str(&row.name);
            if row.selected {
                out.push_str("  *");
            }
            out.push('\n');
        }
        out
    }
}

fn collect_leaf_ids<'a>(nodes: &'a [TreeItem], out: &mut AHashSet<&'a str>) {
    for node in nodes {
        match node.key() {
            Some(key) => {
                out.insert(key);
            }
            None => collect_leaf_ids(&node.children, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{BridgeBackend, BridgeOptions, IpcBridge, MemoryBackend};
    use std::sync::Arc;

    fn browser() -> KeyBrowser {
        KeyBrowser::new(KeySpaceId::new("local", 0), ":")
    }

    #[test]
    fn test_rebuild_sorts_and_counts() {
        let mut browser = browser();
        browser.rebuild(&["b", "a:2", "a:1", "A"]);

        let rows = browser.rows();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "A", "b"]);
        assert_eq!(browser.key_count(), 4);
    }

    #[test]
    fn test_keyword_filters_rows() {
        let mut browser = browser();
        browser.rebuild(&["user:1:name", "user:2:mail", "session:9"]);
        browser.view_mut().expand("group__user");
        browser.view_mut().expand("group__user:1");

        browser.set_keyword("NAME");
        let rows = browser.rows();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["group__user", "group__user:1", "user:1:name"]);

        browser.set_keyword("");
        assert_eq!(browser.visible_tree().len(), 2);
    }

    #[test]
    fn test_selected_keys_skip_groups() {
        let mut browser = browser();
        browser.rebuild(&["a:x", "b"]);
        browser.view_mut().handle_selection("group__a", false);
        browser.view_mut().handle_selection("b", true);
        browser.view_mut().handle_selection("gone", true);

        assert_eq!(browser.selected_keys(), vec!["b"]);
    }

    #[test]
    fn test_render_text_draws_guides() {
        let mut browser = browser();
        browser.rebuild(&["a:x", "a:y:z", "b"]);
        browser.view_mut().expand("group__a");
        browser.view_mut().expand("group__a:y");

        let text = browser.render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "├─ ▾ a");
        assert_eq!(lines[1], "│  ├─ ▾ y");
        assert_eq!(lines[2], "│  │  └─ z");
        assert_eq!(lines[3], "│  └─ x");
        assert_eq!(lines[4], "└─ b");
    }

    #[tokio::test]
    async fn test_sync_follows_cache_events() {
        let (backend, inbound) = MemoryBackend::new();
        backend.seed("local", 0, ["app:cfg", "app:db:url", "queue"]);
        let bridge = IpcBridge::new(backend.clone(), BridgeOptions::default());
        tokio::spawn(bridge.clone().run_inbound(inbound));

        let cache = KeySpaceCache::new(Arc::new(BridgeBackend::new(bridge)), 100);
        let events = cache.events();
        let mut browser = browser();

        cache.reload(browser.space()).await.expect("reload");
        let changed = events
            .try_iter()
            .filter(|event| browser.handle_event(event, &cache))
            .count();
        assert!(changed > 0);
        assert_eq!(browser.key_count(), 3);
        assert!(!browser.is_loading());
        assert!(!browser.has_more());

        // Events of other spaces are ignored
        let other = CacheEvent::KeysChanged {
            space: KeySpaceId::new("local", 5),
        };
        assert!(!browser.handle_event(&other, &cache));
    }
}
