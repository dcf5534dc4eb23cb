// src/worker.rs
//! Background fetch thread.
//!
//! The UI loop stays single threaded: it sends `FetchRequest`s and polls
//! `FetchResponse`s. Each request runs as its own task on the worker's
//! runtime, so responses come back in completion order, not request order.
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tokio::runtime::Builder;

use crate::gateway::{ConnectionTestResult, Gateway, TreeNodeQuery};
use crate::model::{EntityDetail, EntityType, NodeId, ProfileDto, TreeNodeDto};
use crate::resolver::{self, ResolvedTable};

/// Bumped on every connection switch or tree reset.
pub type Generation = u64;
/// Identifies one detail load; only the latest is ever applied.
pub type Ticket = u64;

#[derive(Debug)]
pub enum FetchRequest {
    Roots { generation: Generation },
    Children { generation: Generation, parent_id: NodeId },
    Detail { generation: Generation, ticket: Ticket, node_id: NodeId },
    Health { generation: Generation },
    /// Later requests go to `gateway`. Tasks already running finish against
    /// the old one and are filtered out by generation.
    Reconnect { gateway: Gateway, include_deleted: bool },
    Quit,
}

/// Everything the table and element panes show for one node.
#[derive(Debug, Clone)]
pub struct EntityView {
    pub detail: EntityDetail,
    pub table: ResolvedTable,
    /// Only for schema nodes, and only when the profile endpoint answered.
    pub profile: Option<ProfileDto>,
}

#[derive(Debug)]
pub enum FetchResponse {
    Roots {
        generation: Generation,
        result: Result<Vec<TreeNodeDto>, String>,
    },
    Children {
        generation: Generation,
        parent_id: NodeId,
        result: Result<Vec<TreeNodeDto>, String>,
    },
    Detail {
        generation: Generation,
        ticket: Ticket,
        node_id: NodeId,
        result: Result<Box<EntityView>, String>,
    },
    Health {
        generation: Generation,
        result: ConnectionTestResult,
    },
}

impl FetchResponse {
    pub fn generation(&self) -> Generation {
        match self {
            FetchResponse::Roots { generation, .. }
            | FetchResponse::Children { generation, .. }
            | FetchResponse::Detail { generation, .. }
            | FetchResponse::Health { generation, .. } => *generation,
        }
    }
}

pub fn start_fetch_worker(
    gateway: Gateway,
    include_deleted: bool,
) -> std::io::Result<(Sender<FetchRequest>, Receiver<FetchResponse>)> {
    let (req_tx, req_rx) = mpsc::channel::<FetchRequest>();
    let (resp_tx, resp_rx) = mpsc::channel::<FetchResponse>();

    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("arbor-fetch")
        .build()?;

    thread::Builder::new()
        .name("arbor-worker".into())
        .spawn(move || {
            let mut gateway = gateway;
            let mut include_deleted = include_deleted;
            while let Ok(req) = req_rx.recv() {
                match req {
                    FetchRequest::Quit => break,
                    FetchRequest::Reconnect {
                        gateway: next,
                        include_deleted: flag,
                    } => {
                        log::info!("[WORKER] reconnect -> {}", next.base_url());
                        gateway = next;
                        include_deleted = flag;
                    }
                    other => {
                        let gw = gateway.clone();
                        let tx = resp_tx.clone();
                        runtime.spawn(async move {
                            if let Some(resp) = run(&gw, include_deleted, other).await {
                                // Receiver gone means the UI is shutting down.
                                let _ = tx.send(resp);
                            }
                        });
                    }
                }
            }
            runtime.shutdown_background();
            log::debug!("[WORKER] stopped");
        })?;

    Ok((req_tx, resp_rx))
}

async fn run(gateway: &Gateway, include_deleted: bool, req: FetchRequest) -> Option<FetchResponse> {
    let resp = match req {
        FetchRequest::Roots { generation } => {
            let result = gateway
                .tree_nodes(&TreeNodeQuery::roots(include_deleted))
                .await
                .map_err(|e| e.to_string());
            FetchResponse::Roots { generation, result }
        }
        FetchRequest::Children { generation, parent_id } => {
            let result = gateway
                .tree_nodes(&TreeNodeQuery::children_of(parent_id, include_deleted))
                .await
                .map_err(|e| e.to_string());
            FetchResponse::Children {
                generation,
                parent_id,
                result,
            }
        }
        FetchRequest::Detail {
            generation,
            ticket,
            node_id,
        } => {
            let result = load_entity_view(gateway, node_id, include_deleted)
                .await
                .map(Box::new);
            FetchResponse::Detail {
                generation,
                ticket,
                node_id,
                result,
            }
        }
        FetchRequest::Health { generation } => FetchResponse::Health {
            generation,
            result: gateway.health().await,
        },
        FetchRequest::Reconnect { .. } | FetchRequest::Quit => return None,
    };
    Some(resp)
}

/// Entity detail, resolved table and (for schemas) the profile summary.
pub async fn load_entity_view(
    gateway: &Gateway,
    node_id: NodeId,
    include_deleted: bool,
) -> Result<EntityView, String> {
    let detail = gateway.entity(node_id).await.map_err(|e| e.to_string())?;
    let table = resolver::resolve(gateway, &detail).await;
    let profile = if detail.entity_type == EntityType::Schema {
        match gateway.profile(detail.id, include_deleted).await {
            Ok(p) => Some(p),
            Err(e) => {
                log::debug!("[WORKER] profile {} unavailable: {e}", detail.id);
                None
            }
        }
    } else {
        None
    };
    Ok(EntityView {
        detail,
        table,
        profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    /// Children of 1 answer slowly, everything else at once.
    async fn tree_nodes(Query(q): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
        let parent: i64 = q.get("parentId").and_then(|p| p.parse().ok()).unwrap_or(0);
        if parent == 1 {
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        Json(json!([{
            "id": parent * 10 + 1, "name": "child", "entityType": 1,
            "parentId": parent, "hasChildren": false, "status": 1
        }]))
    }

    fn stub_gateway(rt: &tokio::runtime::Runtime) -> Gateway {
        let addr = rt.block_on(async {
            let tcp = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = tcp.local_addr().unwrap();
            let router = Router::new().route("/api/v1/entities/tree-nodes", get(tree_nodes));
            tokio::spawn(async move {
                axum::serve(tcp, router).await.unwrap();
            });
            addr
        });
        Gateway::new(&format!("http://{addr}/api/v1"), "ADEL", None).unwrap()
    }

    #[test]
    fn responses_arrive_in_completion_order() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = start_fetch_worker(stub_gateway(&rt), false).unwrap();

        tx.send(FetchRequest::Children { generation: 3, parent_id: 1 }).unwrap();
        tx.send(FetchRequest::Children { generation: 3, parent_id: 2 }).unwrap();

        let wait = Duration::from_secs(5);
        let first = rx.recv_timeout(wait).unwrap();
        let second = rx.recv_timeout(wait).unwrap();
        match (&first, &second) {
            (
                FetchResponse::Children { parent_id: 2, result: Ok(fast), .. },
                FetchResponse::Children { parent_id: 1, result: Ok(slow), .. },
            ) => {
                assert_eq!(fast[0].id, 21);
                assert_eq!(slow[0].id, 11);
            }
            other => panic!("unexpected order: {other:?}"),
        }
        assert_eq!(first.generation(), 3);
        assert_eq!(second.generation(), 3);
        tx.send(FetchRequest::Quit).unwrap();
    }

    #[test]
    fn requests_after_reconnect_carry_their_own_generation() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let gw = stub_gateway(&rt);
        let (tx, rx) = start_fetch_worker(gw.clone(), false).unwrap();

        tx.send(FetchRequest::Children { generation: 1, parent_id: 1 }).unwrap();
        tx.send(FetchRequest::Reconnect { gateway: gw, include_deleted: true }).unwrap();
        tx.send(FetchRequest::Roots { generation: 2 }).unwrap();

        let wait = Duration::from_secs(5);
        let gens: Vec<Generation> = (0..2)
            .map(|_| rx.recv_timeout(wait).unwrap().generation())
            .collect();
        // The slow pre-reconnect load still lands, last and tagged as old.
        assert_eq!(gens, vec![2, 1]);
        tx.send(FetchRequest::Quit).unwrap();
    }
}
