//! Tree Building

use super::{NodeKind, TreeItem};
use crate::constants::GROUP_ID_PREFIX;
use ahash::AHashMap;

/// Node under construction; children are arena indices
struct Draft {
    id: String,
    name: String,
    level: usize,
    kind: NodeKind,
    children: Vec<usize>,
}

/// Build the key tree.
///
/// Nodes keep the order in which their first key appeared. A key and a group
/// with the same path (`"user"` and `"user:1"`) become two nodes. An empty
/// delimiter puts every key at the root.
pub fn build_tree<I, S>(keys: I, delimiter: &str) -> Vec<TreeItem>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut drafts: Vec<Draft> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut index: AHashMap<(NodeKind, String), usize> = AHashMap::new();

    for key in keys {
        let key = key.as_ref();
        let segments: Vec<&str> = if delimiter.is_empty() {
            vec![key]
        } else {
            key.split(delimiter).collect()
        };
        let last = segments.len() - 1;

        let mut parent: Option<usize> = None;
        let mut path = String::with_capacity(key.len());

        for (level, segment) in segments.into_iter().enumerate() {
            if level > 0 {
                path.push_str(delimiter);
            }
            path.push_str(segment);

            let kind = if level == last {
                NodeKind::Leaf
            } else {
                NodeKind::Group
            };

            let node = match index.get(&(kind, path.clone())) {
                Some(&node) => node,
                None => {
                    let node = drafts.len();
                    drafts.push(Draft {
                        id: match kind {
                            NodeKind::Group => format!("{GROUP_ID_PREFIX}{path}"),
                            NodeKind::Leaf => path.clone(),
                        },
                        name: segment.to_string(),
                        level,
                        kind,
                        children: Vec::new(),
                    });
                    match parent {
                        Some(parent) => drafts[parent].children.push(node),
                        None => roots.push(node),
                    }
                    index.insert((kind, path.clone()), node);
                    node
                }
            };
            parent = Some(node);
        }
    }

    roots
        .into_iter()
        .map(|root| materialize(&mut drafts, root))
        .collect()
}

fn materialize(drafts: &mut [Draft], node: usize) -> TreeItem {
    let children = std::mem::take(&mut drafts[node].children);
    let draft = &mut drafts[node];
    let id = std::mem::take(&mut draft.id);
    let name = std::mem::take(&mut draft.name);
    let (level, kind) = (draft.level, draft.kind);

    TreeItem {
        id,
        name,
        level,
        kind,
        children: children
            .into_iter()
            .map(|child| materialize(drafts, child))
            .collect(),
    }
}

/// Number of leaves, i.e. keys, in a tree
pub fn count_leaves(nodes: &[TreeItem]) -> usize {
    nodes
        .iter()
        .map(|node| match node.kind {
            NodeKind::Leaf => 1,
            NodeKind::Group => count_leaves(&node.children),
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_and_group_with_same_path_stay_apart() {
        let tree = build_tree(["a", "a:b", "a:c"], ":");
        assert_eq!(tree.len(), 2);

        let leaf = &tree[0];
        assert_eq!(leaf.id, "a");
        assert_eq!(leaf.name, "a");
        assert!(leaf.is_leaf());
        assert!(leaf.children.is_empty());

        let group = &tree[1];
        assert_eq!(group.id, "group__a");
        assert_eq!(group.name, "a");
        assert!(group.is_group());

        let children: Vec<(&str, &str, usize)> = group
            .children
            .iter()
            .map(|c| (c.id.as_str(), c.name.as_str(), c.level))
            .collect();
        assert_eq!(children, vec![("a:b", "b", 1), ("a:c", "c", 1)]);
        assert!(group.children.iter().all(TreeItem::is_leaf));
    }

    #[test]
    fn test_nested_groups_share_nodes() {
        let tree = build_tree(["user:1:name", "user:1:age", "user:2:name"], ":");
        assert_eq!(tree.len(), 1);

        let user = &tree[0];
        assert_eq!(user.id, "group__user");
        assert_eq!(user.children.len(), 2);
        assert_eq!(user.children[0].id, "group__user:1");
        assert_eq!(user.children[0].children.len(), 2);
        assert_eq!(user.children[0].children[1].key(), Some("user:1:age"));
        assert_eq!(count_leaves(&tree), 3);
    }

    #[test]
    fn test_duplicate_keys_make_one_leaf() {
        let tree = build_tree(["x:y", "x:y"], ":");
        assert_eq!(count_leaves(&tree), 1);
    }

    #[test]
    fn test_empty_segments_and_delimiter() {
        let tree = build_tree(["a::b", ":lead"], ":");
        assert_eq!(tree[0].id, "group__a");
        assert_eq!(tree[0].children[0].id, "group__a:");
        assert_eq!(tree[0].children[0].name, "");
        assert_eq!(tree[0].children[0].children[0].id, "a::b");
        assert_eq!(tree[1].id, "group__");
        assert_eq!(tree[1].children[0].key(), Some(":lead"));

        let flat = build_tree(["a:b", "c"], "");
        assert_eq!(flat.len(), 2);
        assert!(flat.iter().all(TreeItem::is_leaf));
        assert_eq!(flat[0].name, "a:b");
    }

    #[test]
    fn test_multichar_delimiter() {
        let tree = build_tree(["svc::cache::hits"], "::");
        assert_eq!(tree[0].name, "svc");
        assert_eq!(tree[0].children[0].id, "group__svc::cache");
        assert_eq!(tree[0].children[0].children[0].id, "svc::cache::hits");
    }

    #[test]
    fn test_ids_are_stable_across_rebuilds() {
        let first = build_tree(["a:b", "c"], ":");
        let second = build_tree(["a:b", "c"], ":");
        assert_eq!(first, second);
    }
}
