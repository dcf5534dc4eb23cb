// src/tree/projection.rs
//! Pure functions over the node hierarchy: flattening for rendering and
//! path-copying updates.
use std::sync::Arc;

use crate::model::{NodeId, TreeNode};

/// Depth-first pre-order list of the visible nodes.
///
/// A node's children follow it only when it is expanded. Sibling order is
/// the order the server returned; nothing is sorted.
pub fn flatten(nodes: &[Arc<TreeNode>]) -> Vec<Arc<TreeNode>> {
    let mut rows = Vec::with_capacity(nodes.len());
    for node in nodes {
        push_visible(node, &mut rows);
    }
    rows
}

fn push_visible(node: &Arc<TreeNode>, rows: &mut Vec<Arc<TreeNode>>) {
    rows.push(Arc::clone(node));
    if node.expanded {
        for child in &node.children {
            push_visible(child, rows);
        }
    }
}

/// Depth-first search by identity over the whole hierarchy.
pub fn find<'a>(nodes: &'a [Arc<TreeNode>], id: NodeId) -> Option<&'a Arc<TreeNode>> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find(&node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Replace the node `id` with `update(node)`.
///
/// Every ancestor on the root→node path is rebuilt; all other subtrees are
/// shared with the input (`Arc::ptr_eq` holds for them). When nothing
/// matches, a fresh top-level vector with the same contents is returned.
pub fn find_and_update<F>(nodes: &[Arc<TreeNode>], id: NodeId, update: F) -> Vec<Arc<TreeNode>>
where
    F: FnOnce(&TreeNode) -> TreeNode,
{
    let mut update = Some(update);
    rebuild_path(nodes, id, &mut update).unwrap_or_else(|| nodes.to_vec())
}

fn rebuild_path<F>(
    nodes: &[Arc<TreeNode>],
    id: NodeId,
    update: &mut Option<F>,
) -> Option<Vec<Arc<TreeNode>>>
where
    F: FnOnce(&TreeNode) -> TreeNode,
{
    for (idx, node) in nodes.iter().enumerate() {
        let replacement = if node.id == id {
            update.take().map(|f| Arc::new(f(node.as_ref())))
        } else if node.children.is_empty() {
            None
        } else {
            rebuild_path(&node.children, id, update)
                .map(|children| Arc::new(node.with_children(children)))
        };

        if let Some(new_node) = replacement {
            let mut out = nodes.to_vec();
            out[idx] = new_node;
            return Some(out);
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{EntityType, Status};

    pub(crate) fn leaf(id: NodeId, level: usize) -> TreeNode {
        TreeNode {
            id,
            name: format!("node-{id}"),
            entity_type: EntityType::Container,
            parent_id: None,
            profile_id: None,
            has_children: false,
            child_count: 0,
            status: Status::Active,
            level,
            expanded: false,
            loading: false,
            children: Vec::new(),
        }
    }

    pub(crate) fn branch(id: NodeId, level: usize, expanded: bool, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            has_children: true,
            child_count: children.len() as u32,
            expanded,
            children: children.into_iter().map(Arc::new).collect(),
            ..leaf(id, level)
        }
    }

    fn ids(rows: &[Arc<TreeNode>]) -> Vec<NodeId> {
        rows.iter().map(|n| n.id).collect()
    }

    #[test]
    fn collapsed_siblings_are_adjacent() {
        let nodes = vec![
            Arc::new(branch(1, 0, false, vec![leaf(11, 1)])),
            Arc::new(leaf(2, 0)),
        ];
        assert_eq!(ids(&flatten(&nodes)), vec![1, 2]);
    }

    #[test]
    fn expanded_children_follow_their_parent() {
        let nodes = vec![
            Arc::new(branch(1, 0, true, vec![leaf(11, 1), leaf(12, 1)])),
            Arc::new(leaf(2, 0)),
        ];
        assert_eq!(ids(&flatten(&nodes)), vec![1, 11, 12, 2]);
    }

    #[test]
    fn collapsed_ancestor_hides_expanded_descendants() {
        let nodes = vec![Arc::new(branch(
            1,
            0,
            false,
            vec![branch(11, 1, true, vec![leaf(111, 2)])],
        ))];
        assert_eq!(ids(&flatten(&nodes)), vec![1]);
    }

    #[test]
    fn flatten_shares_node_identity() {
        let nodes = vec![Arc::new(leaf(1, 0))];
        let rows = flatten(&nodes);
        assert!(Arc::ptr_eq(&rows[0], &nodes[0]));
    }

    #[test]
    fn update_rebuilds_only_the_path() {
        let nodes = vec![
            Arc::new(branch(
                1,
                0,
                true,
                vec![branch(11, 1, true, vec![leaf(111, 2)]), leaf(12, 1)],
            )),
            Arc::new(branch(2, 0, true, vec![leaf(21, 1)])),
        ];

        let updated = find_and_update(&nodes, 111, |n| TreeNode {
            name: "renamed".into(),
            ..n.clone()
        });

        // Path: 1 -> 11 -> 111 are new objects.
        assert!(!Arc::ptr_eq(&updated[0], &nodes[0]));
        assert!(!Arc::ptr_eq(&updated[0].children[0], &nodes[0].children[0]));
        assert_eq!(updated[0].children[0].children[0].name, "renamed");

        // Off-path subtrees keep their identity.
        assert!(Arc::ptr_eq(&updated[0].children[1], &nodes[0].children[1]));
        assert!(Arc::ptr_eq(&updated[1], &nodes[1]));
    }

    #[test]
    fn update_without_match_keeps_content() {
        let nodes = vec![Arc::new(branch(1, 0, true, vec![leaf(11, 1)]))];
        let updated = find_and_update(&nodes, 999, |n| n.clone());
        assert_eq!(updated, nodes);
        assert!(Arc::ptr_eq(&updated[0], &nodes[0]));
    }

    #[test]
    fn find_searches_collapsed_subtrees_too() {
        let nodes = vec![Arc::new(branch(1, 0, false, vec![leaf(11, 1)]))];
        assert_eq!(find(&nodes, 11).map(|n| n.level), Some(1));
        assert!(find(&nodes, 5).is_none());
    }
}
