// src/tree/mod.rs
pub mod projection;
pub mod store;

pub use projection::{find, find_and_update, flatten};
pub use store::{reduce, Intent, TreeState, TreeStore};

use crate::model::{NodeId, TreeNode};

/// Work an intent asks for beyond the state change itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Dispatch a follow-up intent.
    Dispatch(Intent),
    FetchRoots,
    FetchChildren(NodeId),
}

pub fn effect_of(intent: &Intent) -> Option<Effect> {
    match intent {
        Intent::LoadRoots => Some(Effect::FetchRoots),
        Intent::LoadChildren { node_id } => Some(Effect::FetchChildren(*node_id)),
        Intent::ResetTree => Some(Effect::Dispatch(Intent::LoadRoots)),
        _ => None,
    }
}

/// What "expand this node" means for the view: fetch children the first
/// time, flip the flag afterwards, nothing for leaves.
pub fn expand_intent(node: &TreeNode) -> Option<Intent> {
    if !node.has_children {
        return None;
    }
    if !node.expanded && node.children.is_empty() {
        Some(Intent::LoadChildren { node_id: node.id })
    } else {
        Some(Intent::ToggleExpansion { node_id: node.id })
    }
}
