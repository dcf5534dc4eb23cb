// src/tree/store.rs
//! Tree state, the intents that change it, and the single-writer store
//! that publishes snapshots to subscribers.
use std::sync::Arc;

use tokio::sync::watch;

use crate::model::{NodeId, TreeNode, TreeNodeDto};
use crate::tree::projection::{find, find_and_update, flatten};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeState {
    pub nodes: Vec<Arc<TreeNode>>,
    /// Render-ordered projection of `nodes`; rebuilt on every mutation.
    pub flat: Vec<Arc<TreeNode>>,
    pub selected: Option<NodeId>,
    pub loading: bool,
    pub error: Option<String>,
}

impl TreeState {
    /// Selected node, if it is currently visible. A selection that points
    /// at a node outside the flat projection resolves to `None`.
    pub fn selected_node(&self) -> Option<&Arc<TreeNode>> {
        let id = self.selected?;
        self.flat.iter().find(|n| n.id == id)
    }

    /// Any node in the hierarchy, visible or not.
    pub fn node(&self, id: NodeId) -> Option<&Arc<TreeNode>> {
        find(&self.nodes, id)
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.flat.iter().position(|n| n.id == id)
    }

    fn with_nodes(&self, nodes: Vec<Arc<TreeNode>>) -> TreeState {
        TreeState {
            flat: flatten(&nodes),
            nodes,
            selected: self.selected,
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    LoadRoots,
    LoadRootsSucceeded { nodes: Vec<TreeNodeDto> },
    LoadRootsFailed { error: String },
    LoadChildren { node_id: NodeId },
    LoadChildrenSucceeded { parent_id: NodeId, children: Vec<TreeNodeDto> },
    LoadChildrenFailed { node_id: NodeId, error: String },
    ToggleExpansion { node_id: NodeId },
    SelectNode { node_id: NodeId },
    DeselectNode,
    ResetTree,
}

/// Apply one intent. Pure: the input snapshot is never touched.
pub fn reduce(state: &TreeState, intent: Intent) -> TreeState {
    match intent {
        Intent::LoadRoots => TreeState {
            loading: true,
            error: None,
            ..state.clone()
        },

        Intent::LoadRootsSucceeded { nodes } => {
            let nodes: Vec<Arc<TreeNode>> = nodes
                .into_iter()
                .map(|dto| Arc::new(TreeNode::from_dto(dto, 0)))
                .collect();
            TreeState {
                loading: false,
                error: None,
                ..state.with_nodes(nodes)
            }
        }

        Intent::LoadRootsFailed { error } => TreeState {
            loading: false,
            error: Some(error),
            ..state.clone()
        },

        Intent::LoadChildren { node_id } => {
            let nodes = find_and_update(&state.nodes, node_id, |node| TreeNode {
                loading: true,
                ..node.clone()
            });
            state.with_nodes(nodes)
        }

        Intent::LoadChildrenSucceeded { parent_id, children } => {
            let nodes = find_and_update(&state.nodes, parent_id, |parent| {
                let children = if parent.has_children {
                    children
                        .into_iter()
                        .map(|dto| Arc::new(TreeNode::from_dto(dto, parent.level + 1)))
                        .collect()
                } else {
                    if !children.is_empty() {
                        log::warn!(
                            "[TREE] node {} reported no children but {} arrived; dropping them",
                            parent.id,
                            children.len()
                        );
                    }
                    Vec::new()
                };
                TreeNode {
                    loading: false,
                    expanded: true,
                    ..parent.with_children(children)
                }
            });
            state.with_nodes(nodes)
        }

        Intent::LoadChildrenFailed { node_id, error } => {
            let nodes = find_and_update(&state.nodes, node_id, |node| TreeNode {
                loading: false,
                ..node.clone()
            });
            TreeState {
                error: Some(error),
                ..state.with_nodes(nodes)
            }
        }

        Intent::ToggleExpansion { node_id } => {
            let nodes = find_and_update(&state.nodes, node_id, |node| TreeNode {
                expanded: !node.expanded,
                ..node.clone()
            });
            state.with_nodes(nodes)
        }

        Intent::SelectNode { node_id } => TreeState {
            selected: Some(node_id),
            ..state.clone()
        },

        Intent::DeselectNode => TreeState {
            selected: None,
            ..state.clone()
        },

        Intent::ResetTree => TreeState::default(),
    }
}

/// Owner of the current tree snapshot.
///
/// `dispatch` is the only way to change state; readers hold a
/// [`watch::Receiver`] and always observe a fully applied snapshot.
pub struct TreeStore {
    tx: watch::Sender<Arc<TreeState>>,
}

impl TreeStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(TreeState::default()));
        Self { tx }
    }

    pub fn dispatch(&self, intent: Intent) {
        log::debug!("[TREE] dispatch {:?}", IntentName(&intent));
        let next = {
            let current = self.tx.borrow();
            reduce(&current, intent)
        };
        self.tx.send_replace(Arc::new(next));
    }

    pub fn snapshot(&self) -> Arc<TreeState> {
        Arc::clone(&*self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<TreeState>> {
        self.tx.subscribe()
    }
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Short debug form; payloads can be large.
struct IntentName<'a>(&'a Intent);

impl std::fmt::Debug for IntentName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Intent::LoadRootsSucceeded { nodes } => write!(f, "LoadRootsSucceeded({} nodes)", nodes.len()),
            Intent::LoadChildrenSucceeded { parent_id, children } => {
                write!(f, "LoadChildrenSucceeded({parent_id}, {} children)", children.len())
            }
            other => write!(f, "{other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, Status};
    use crate::tree::projection::tests::{branch, leaf};

    fn dto(id: NodeId, has_children: bool) -> TreeNodeDto {
        TreeNodeDto {
            id,
            name: format!("dto-{id}"),
            entity_type: EntityType::Container,
            parent_id: None,
            profile_id: None,
            has_children,
            child_count: 0,
            status: Status::Active,
        }
    }

    fn state_with(nodes: Vec<TreeNode>) -> TreeState {
        TreeState::default().with_nodes(nodes.into_iter().map(Arc::new).collect())
    }

    #[test]
    fn load_roots_sets_loading_and_clears_error() {
        let state = TreeState {
            error: Some("old".into()),
            ..TreeState::default()
        };
        let next = reduce(&state, Intent::LoadRoots);
        assert!(next.loading);
        assert_eq!(next.error, None);
    }

    #[test]
    fn roots_arrive_at_level_zero_and_are_flattened() {
        let loading = reduce(&TreeState::default(), Intent::LoadRoots);
        let next = reduce(
            &loading,
            Intent::LoadRootsSucceeded {
                nodes: vec![dto(1, true), dto(2, false)],
            },
        );
        assert!(!next.loading);
        assert_eq!(next.nodes.len(), 2);
        assert!(next.nodes.iter().all(|n| n.level == 0));
        assert_eq!(next.flat.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn failure_preserves_tree() {
        let state = TreeState {
            loading: true,
            ..state_with(vec![leaf(1, 0), leaf(2, 0)])
        };
        let next = reduce(&state, Intent::LoadRootsFailed { error: "boom".into() });
        assert!(!next.loading);
        assert_eq!(next.error.as_deref(), Some("boom"));
        assert_eq!(next.nodes, state.nodes);
        assert!(Arc::ptr_eq(&next.nodes[0], &state.nodes[0]));
    }

    #[test]
    fn load_children_marks_nested_node_loading() {
        let state = state_with(vec![branch(1, 0, true, vec![branch(11, 1, false, vec![])])]);
        let next = reduce(&state, Intent::LoadChildren { node_id: 11 });
        assert!(next.node(11).unwrap().loading);
        assert!(!next.node(1).unwrap().loading);
    }

    #[test]
    fn children_completions_apply_in_arrival_order() {
        let state = reduce(
            &TreeState::default(),
            Intent::LoadRootsSucceeded {
                nodes: vec![dto(1, true), dto(2, true)],
            },
        );
        let state = reduce(&state, Intent::LoadChildren { node_id: 1 });
        let state = reduce(&state, Intent::LoadChildren { node_id: 2 });
        assert!(state.node(1).unwrap().loading && state.node(2).unwrap().loading);

        // 2 answers first; 1 is still in flight and must stay untouched.
        let state = reduce(
            &state,
            Intent::LoadChildrenSucceeded {
                parent_id: 2,
                children: vec![dto(21, false)],
            },
        );
        assert!(state.node(1).unwrap().loading);
        assert!(!state.node(1).unwrap().expanded);
        assert!(state.node(2).unwrap().expanded);

        let state = reduce(
            &state,
            Intent::LoadChildrenSucceeded {
                parent_id: 1,
                children: vec![dto(11, false), dto(12, false)],
            },
        );
        let one = state.node(1).unwrap();
        let two = state.node(2).unwrap();
        assert!(!one.loading && !two.loading);
        assert_eq!(one.children.iter().map(|c| c.id).collect::<Vec<_>>(), vec![11, 12]);
        assert_eq!(two.children.iter().map(|c| c.id).collect::<Vec<_>>(), vec![21]);
        assert_eq!(
            state.flat.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![1, 11, 12, 2, 21]
        );
        assert!(state.flat.iter().filter(|n| n.id > 10).all(|n| n.level == 1));
    }

    #[test]
    fn load_children_for_unknown_node_changes_nothing() {
        let state = state_with(vec![leaf(1, 0)]);
        let next = reduce(&state, Intent::LoadChildren { node_id: 42 });
        assert_eq!(next, state);
    }

    #[test]
    fn children_success_forces_expansion() {
        let mut seven = branch(7, 2, false, vec![]);
        seven.loading = true;
        let state = state_with(vec![branch(1, 0, true, vec![branch(3, 1, true, vec![seven])])]);

        let next = reduce(
            &state,
            Intent::LoadChildrenSucceeded {
                parent_id: 7,
                children: vec![dto(71, false), dto(72, false)],
            },
        );

        let node = next.node(7).unwrap();
        assert!(node.expanded);
        assert!(!node.loading);
        assert_eq!(node.children.iter().map(|c| c.id).collect::<Vec<_>>(), vec![71, 72]);
        assert!(node.children.iter().all(|c| c.level == 3));
        assert_eq!(
            next.flat.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![1, 3, 7, 71, 72]
        );
    }

    #[test]
    fn children_for_childless_node_are_dropped() {
        let state = state_with(vec![leaf(1, 0)]);
        let next = reduce(
            &state,
            Intent::LoadChildrenSucceeded {
                parent_id: 1,
                children: vec![dto(2, false)],
            },
        );
        let node = next.node(1).unwrap();
        assert!(node.children.is_empty());
        assert!(node.expanded);
    }

    #[test]
    fn children_failure_clears_loading_and_records_store_error() {
        let mut node = branch(5, 0, false, vec![]);
        node.loading = true;
        let state = state_with(vec![node]);
        let next = reduce(
            &state,
            Intent::LoadChildrenFailed {
                node_id: 5,
                error: "timeout".into(),
            },
        );
        let node = next.node(5).unwrap();
        assert!(!node.loading);
        assert!(!node.expanded);
        assert_eq!(next.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn toggle_twice_is_identity() {
        let state = state_with(vec![branch(1, 0, true, vec![leaf(11, 1)]), leaf(2, 0)]);
        let once = reduce(&state, Intent::ToggleExpansion { node_id: 1 });
        assert_eq!(once.flat.len(), 2);
        let twice = reduce(&once, Intent::ToggleExpansion { node_id: 1 });
        assert_eq!(twice, state);
    }

    #[test]
    fn toggle_without_loaded_children_expands_to_nothing() {
        let state = state_with(vec![branch(1, 0, false, vec![])]);
        let next = reduce(&state, Intent::ToggleExpansion { node_id: 1 });
        assert!(next.node(1).unwrap().expanded);
        assert_eq!(next.flat.len(), 1);
    }

    #[test]
    fn dangling_selection_resolves_to_none() {
        let state = state_with(vec![branch(1, 0, false, vec![leaf(11, 1)])]);
        let selected = reduce(&state, Intent::SelectNode { node_id: 11 });
        assert_eq!(selected.selected, Some(11));
        assert!(selected.selected_node().is_none());

        let visible = reduce(&selected, Intent::SelectNode { node_id: 1 });
        assert_eq!(visible.selected_node().map(|n| n.id), Some(1));
        assert_eq!(reduce(&visible, Intent::DeselectNode).selected, None);
    }

    #[test]
    fn reset_clears_everything() {
        let state = TreeState {
            selected: Some(1),
            error: Some("x".into()),
            ..state_with(vec![leaf(1, 0)])
        };
        let next = reduce(&state, Intent::ResetTree);
        assert!(next.nodes.is_empty() && next.flat.is_empty());
        assert_eq!(next.selected, None);
        assert_eq!(next.error, None);
    }

    #[test]
    fn store_publishes_snapshots() {
        let store = TreeStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.dispatch(Intent::LoadRoots);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().loading);
        assert!(store.snapshot().loading);
    }
}
