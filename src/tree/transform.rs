//! Tree Sorting and Filtering

use super::TreeItem;
use std::cmp::Ordering;

/// Sort every sibling list: groups first, then by name ignoring case.
///
/// Ties fall back to the exact name and then the id, so the order is total
/// and sorting a sorted tree changes nothing.
pub fn sort_tree(mut nodes: Vec<TreeItem>) -> Vec<TreeItem> {
    sort_in_place(&mut nodes);
    nodes
}

fn sort_in_place(nodes: &mut [TreeItem]) {
    for node in nodes.iter_mut() {
        sort_in_place(&mut node.children);
    }
    nodes.sort_by(compare_nodes);
}

fn compare_nodes(a: &TreeItem, b: &TreeItem) -> Ordering {
    b.is_group()
        .cmp(&a.is_group())
        .then_with(|| compare_ignore_case(&a.name, &b.name))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Keep nodes whose name contains `keyword` (ignoring case) and the groups
/// leading to them.
///
/// A matching node keeps all of its children; a group kept only for its
/// descendants keeps just the retained ones. An empty keyword keeps
/// everything.
pub fn filter_tree(nodes: &[TreeItem], keyword: &str) -> Vec<TreeItem> {
    if keyword.is_empty() {
        return nodes.to_vec();
    }
    let needle = keyword.to_lowercase();
    filter_nodes(nodes, &needle)
}

fn filter_nodes(nodes: &[TreeItem], needle: &str) -> Vec<TreeItem> {
    nodes
        .iter()
        .filter_map(|node| {
            if node.name.to_lowercase().contains(needle) {
                return Some(node.clone());
            }
            let children = filter_nodes(&node.children, needle);
            (!children.is_empty()).then(|| TreeItem {
                id: node.id.clone(),
                name: node.name.clone(),
                level: node.level,
                kind: node.kind,
                children,
            })
        })
        .collect()
}
