// src/gateway.rs
//! HTTP client for the entity REST API.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::error::GatewayError;
use crate::model::{EntityDetail, EntityType, NodeId, ProfileDto, TreeNodeDto};
use crate::resolver::DetailSource;

pub const DATABASE_HEADER: &str = "X-Database-Name";
pub const ENVIRONMENT_HEADER: &str = "X-Environment";
const API_SUFFIX: &str = "/api/v1";

/// Filter for a tree-node listing. All fields optional; the default lists
/// active roots.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TreeNodeQuery {
    pub parent_id: Option<NodeId>,
    pub entity_type: Option<EntityType>,
    pub include_deleted: bool,
}

impl TreeNodeQuery {
    pub fn roots(include_deleted: bool) -> Self {
        TreeNodeQuery {
            include_deleted,
            ..Default::default()
        }
    }

    pub fn children_of(parent_id: NodeId, include_deleted: bool) -> Self {
        TreeNodeQuery {
            parent_id: Some(parent_id),
            include_deleted,
            ..Default::default()
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(id) = self.parent_id {
            params.push(("parentId", id.to_string()));
        }
        if let Some(t) = self.entity_type {
            params.push(("entityType", u8::from(t).to_string()));
        }
        if self.include_deleted {
            params.push(("includeDeleted", "true".to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct Gateway {
    http_client: Client,
    base_url: String,
}

impl Gateway {
    pub fn new(
        api_url: &str,
        database_name: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        let base_url = api_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(GatewayError::InvalidBaseUrl(api_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        if !database_name.is_empty() {
            let value = HeaderValue::from_str(database_name)
                .map_err(|_| GatewayError::InvalidHeader(database_name.to_string()))?;
            headers.insert(DATABASE_HEADER, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Gateway {
            http_client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Health endpoint lives beside the versioned API, not under it.
    pub fn health_url(&self) -> String {
        let root = self
            .base_url
            .strip_suffix(API_SUFFIX)
            .unwrap_or(&self.base_url);
        format!("{root}/health")
    }

    pub async fn tree_nodes(&self, query: &TreeNodeQuery) -> Result<Vec<TreeNodeDto>, GatewayError> {
        let url = format!("{}/entities/tree-nodes", self.base_url);
        let resp = self
            .http_client
            .get(&url)
            .query(&query.params())
            .send()
            .await?;
        decode(resp, &url).await
    }

    pub async fn entity(&self, id: NodeId) -> Result<EntityDetail, GatewayError> {
        let url = format!("{}/entities/{id}", self.base_url);
        let resp = self.http_client.get(&url).send().await?;
        decode(resp, &url).await
    }

    pub async fn profile(&self, id: NodeId, include_deleted: bool) -> Result<ProfileDto, GatewayError> {
        let url = format!("{}/profiles/{id}", self.base_url);
        let mut req = self.http_client.get(&url);
        if include_deleted {
            req = req.query(&[("includeDeleted", "true")]);
        }
        decode(req.send().await?, &url).await
    }

    /// Never fails; transport and status problems become an unsuccessful
    /// result.
    pub async fn health(&self) -> ConnectionTestResult {
        let url = self.health_url();
        match self.http_client.get(&url).send().await {
            Ok(resp) if resp.status().as_u16() == 200 => {
                let environment = resp
                    .headers()
                    .get(ENVIRONMENT_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("Unknown")
                    .to_string();
                ConnectionTestResult {
                    success: true,
                    message: "Connection successful".to_string(),
                    environment,
                }
            }
            Ok(resp) => failed(format!("HTTP {}", resp.status().as_u16())),
            Err(e) => failed(e.to_string()),
        }
    }
}

fn failed(reason: String) -> ConnectionTestResult {
    ConnectionTestResult {
        success: false,
        message: format!("Connection failed: {reason}"),
        environment: "Unknown".to_string(),
    }
}

async fn decode<T: DeserializeOwned>(resp: Response, url: &str) -> Result<T, GatewayError> {
    let status = resp.status();
    if !status.is_success() {
        log::warn!("[GATEWAY] {url} -> {status}");
        return Err(GatewayError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(resp.json::<T>().await?)
}

#[async_trait]
impl DetailSource for Gateway {
    async fn entity(&self, id: NodeId) -> Result<EntityDetail, GatewayError> {
        Gateway::entity(self, id).await
    }
}
