// src/batch_mode.rs
//! Non-interactive commands: print the tree, export resolved tables.
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};

use crate::gateway::{Gateway, TreeNodeQuery};
use crate::model::NodeId;
use crate::resolver;
use crate::results_export::{write_table, OutputFormat};
use crate::tree::{Intent, TreeState, TreeStore};

pub struct BatchConfig {
    pub entity_ids: Vec<NodeId>,
    pub output_dir: PathBuf,
    pub output_format: OutputFormat,
    pub exit_on_error: bool,
    pub verbose: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: Vec<PathBuf>,
    pub failed: usize,
}

/// Export one resolved table per entity as `entity_<id>.<ext>`.
pub async fn run_batch(gateway: &Gateway, config: &BatchConfig) -> Result<BatchSummary> {
    if config.verbose {
        println!("Arbor Batch Mode");
        println!("================");
        println!("API: {}", gateway.base_url());
        println!("Entities: {:?}", config.entity_ids);
        println!("Output Directory: {}", config.output_dir.display());
        println!("Output Format: {}", config.output_format.extension());
    }
    fs::create_dir_all(&config.output_dir)?;

    let started = Instant::now();
    let mut summary = BatchSummary::default();
    for &id in &config.entity_ids {
        let detail = match gateway.entity(id).await {
            Ok(d) => d,
            Err(e) => {
                summary.failed += 1;
                eprintln!("Error fetching entity {id}: {e}");
                if config.exit_on_error {
                    bail!("Entity {id} failed: {e}");
                }
                continue;
            }
        };
        let table = resolver::resolve(gateway, &detail).await;
        let path = config
            .output_dir
            .join(format!("entity_{id}.{}", config.output_format.extension()));
        if let Err(e) = write_table(&path, &table, config.output_format) {
            summary.failed += 1;
            eprintln!("Error saving entity {id}: {e}");
            if config.exit_on_error {
                return Err(e);
            }
            continue;
        }
        if config.verbose {
            println!("  Saved {} columns to {}", table.columns.len(), path.display());
        }
        log::info!("[BATCH] entity {id} -> {}", path.display());
        summary.written.push(path);
    }

    if config.verbose {
        println!("\nBatch execution completed");
        println!("Total time: {:?}", started.elapsed());
        println!("Successful: {}, Failed: {}", summary.written.len(), summary.failed);
    }
    Ok(summary)
}

/// Drive the tree store with real intents until every node above `depth`
/// levels has been expanded. Roots are level 0; `depth` 1 means roots only.
pub async fn walk_tree(gateway: &Gateway, depth: usize, include_deleted: bool) -> Result<TreeState> {
    let store = TreeStore::new();
    store.dispatch(Intent::LoadRoots);
    match gateway.tree_nodes(&TreeNodeQuery::roots(include_deleted)).await {
        Ok(nodes) => store.dispatch(Intent::LoadRootsSucceeded { nodes }),
        Err(e) => {
            store.dispatch(Intent::LoadRootsFailed { error: e.to_string() });
            bail!("Loading roots failed: {e}");
        }
    }

    let mut attempted: HashSet<NodeId> = HashSet::new();
    loop {
        let pending: Vec<NodeId> = store
            .snapshot()
            .flat
            .iter()
            .filter(|n| n.has_children && n.level + 1 < depth && !attempted.contains(&n.id))
            .map(|n| n.id)
            .collect();
        if pending.is_empty() {
            break;
        }
        for node_id in pending {
            attempted.insert(node_id);
            store.dispatch(Intent::LoadChildren { node_id });
            let query = TreeNodeQuery::children_of(node_id, include_deleted);
            match gateway.tree_nodes(&query).await {
                Ok(children) => store.dispatch(Intent::LoadChildrenSucceeded {
                    parent_id: node_id,
                    children,
                }),
                Err(e) => {
                    log::warn!("[BATCH] children of {node_id} failed: {e}");
                    store.dispatch(Intent::LoadChildrenFailed {
                        node_id,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
    Ok(store.snapshot().as_ref().clone())
}

/// One line per visible node: indentation, name, type, id, child count.
pub fn format_tree(state: &TreeState) -> String {
    let mut out = String::new();
    for node in &state.flat {
        out.push_str(&"  ".repeat(node.level));
        out.push_str(&format!(
            "{} [{}] #{}",
            node.name,
            node.entity_type.label(),
            node.id
        ));
        if node.has_children {
            out.push_str(&format!(" ({})", node.child_count));
        }
        if node.is_deleted() {
            out.push_str(" (deleted)");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, Status, TreeNodeDto};
    use crate::tree::reduce;

    #[test]
    fn format_tree_indents_by_level() {
        let dto = |id: NodeId, parent: Option<NodeId>, has_children: bool, status: Status| TreeNodeDto {
            id,
            name: format!("n{id}"),
            entity_type: if parent.is_some() { EntityType::Schema } else { EntityType::Container },
            parent_id: parent,
            profile_id: None,
            has_children,
            child_count: if has_children { 1 } else { 0 },
            status,
        };
        let s = reduce(
            &TreeState::default(),
            Intent::LoadRootsSucceeded {
                nodes: vec![dto(1, None, true, Status::Active)],
            },
        );
        let s = reduce(
            &s,
            Intent::LoadChildrenSucceeded {
                parent_id: 1,
                children: vec![dto(2, Some(1), false, Status::Deleted)],
            },
        );
        assert_eq!(
            format_tree(&s),
            "n1 [Container] #1 (1)\n  n2 [Schema] #2 (deleted)\n"
        );
    }
}
