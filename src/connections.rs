// src/connections.rs
//! Saved API connections and which one is active.
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::persist;

pub const CONNECTIONS_FILE: &str = "connections.json";
pub const ENVIRONMENT_DEFAULT_ID: &str = "environment-default";

static API_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://.+").expect("valid api url pattern")
});

pub fn is_valid_api_url(url: &str) -> bool {
    API_URL_RE.is_match(url)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub name: String,
    pub api_url: String,
    pub database_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_default: bool,
}

impl Connection {
    fn local(id: &str, database: &str, description: &str, is_default: bool) -> Self {
        Connection {
            id: id.to_string(),
            name: format!("Local - {database}"),
            api_url: crate::config::DEFAULT_API_URL.to_string(),
            database_name: database.to_string(),
            description: Some(description.to_string()),
            last_connected: None,
            is_default,
        }
    }

    /// Connection built from configuration when nothing saved is current.
    pub fn environment_default(config: &Config) -> Self {
        Connection {
            id: ENVIRONMENT_DEFAULT_ID.to_string(),
            name: "Default (Environment)".to_string(),
            api_url: config.api_url.clone(),
            database_name: config.database_name.clone(),
            description: Some("Default connection from configuration".to_string()),
            last_connected: None,
            is_default: true,
        }
    }

    pub fn label(&self) -> String {
        format!("{} [{}]", self.name, self.database_name)
    }
}

pub fn default_connections() -> Vec<Connection> {
    vec![
        Connection::local("local-adel", "ADEL", "Local development database", true),
        Connection::local("local-adel-test", "ADEL_Test", "Local test database", false),
    ]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredConnections {
    #[serde(default)]
    connections: Vec<Connection>,
    #[serde(default)]
    current: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConnectionStore {
    path: PathBuf,
    connections: Vec<Connection>,
    current_id: Option<String>,
}

impl ConnectionStore {
    /// Missing or unreadable file (or an empty list) offers the defaults.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CONNECTIONS_FILE);
        let stored: StoredConnections = persist::read_json(&path).unwrap_or_default();
        let connections = if stored.connections.is_empty() {
            default_connections()
        } else {
            stored.connections
        };
        ConnectionStore {
            path,
            connections,
            current_id: stored.current,
        }
    }

    pub fn save(&self) -> Result<()> {
        let stored = StoredConnections {
            connections: self.connections.clone(),
            current: self.current_id.clone(),
        };
        persist::write_json(&self.path, &stored)
    }

    pub fn get(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Most recently connected first, never-connected last, then by name.
    pub fn sorted(&self) -> Vec<&Connection> {
        let mut list: Vec<&Connection> = self.connections.iter().collect();
        list.sort_by(|a, b| {
            b.last_connected
                .cmp(&a.last_connected)
                .then_with(|| a.name.cmp(&b.name))
        });
        list
    }

    /// Saved current connection, else the environment default.
    pub fn current(&self, config: &Config) -> Connection {
        self.current_id
            .as_deref()
            .and_then(|id| self.get(id))
            .cloned()
            .unwrap_or_else(|| Connection::environment_default(config))
    }

    /// Connection for this run: an explicit id must exist, otherwise the
    /// current one.
    pub fn resolve(&self, config: &Config, explicit: Option<&str>) -> Result<Connection> {
        match explicit {
            Some(id) => match self.get(id) {
                Some(c) => Ok(c.clone()),
                None => bail!("Unknown connection '{id}'"),
            },
            None => Ok(self.current(config)),
        }
    }

    pub fn upsert(&mut self, connection: Connection) -> Result<()> {
        if !is_valid_api_url(&connection.api_url) {
            bail!("Invalid API URL for {}: {}", connection.id, connection.api_url);
        }
        match self.connections.iter_mut().find(|c| c.id == connection.id) {
            Some(slot) => *slot = connection,
            None => self.connections.push(connection),
        }
        Ok(())
    }

    /// Stamp, upsert and make current. The caller persists.
    pub fn set_current(&mut self, id: &str) -> Result<Connection> {
        let Some(mut conn) = self.get(id).cloned() else {
            bail!("Unknown connection '{id}'");
        };
        conn.last_connected = Some(Utc::now());
        self.upsert(conn.clone())?;
        self.current_id = Some(conn.id.clone());
        log::info!("[CONN] switched to {} ({})", conn.id, conn.database_name);
        Ok(conn)
    }

    /// Id of the saved connection after `current_id` in stored order,
    /// wrapping around.
    pub fn next_id(&self, current_id: &str) -> Option<String> {
        if self.connections.is_empty() {
            return None;
        }
        let next = match self.connections.iter().position(|c| c.id == current_id) {
            Some(i) => (i + 1) % self.connections.len(),
            None => 0,
        };
        Some(self.connections[next].id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn absent_file_offers_two_local_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConnectionStore::load(dir.path());
        let list = store.sorted();
        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["local-adel", "local-adel-test"]);
        assert_eq!(store.get("local-adel-test").unwrap().database_name, "ADEL_Test");
        assert!(list.iter().all(|c| c.api_url == "http://localhost:5112/api/v1"));
    }

    #[test]
    fn unresolved_current_falls_back_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConnectionStore::load(dir.path());
        let config = Config {
            database_name: "Other".into(),
            ..Config::default()
        };
        let current = store.current(&config);
        assert_eq!(current.id, ENVIRONMENT_DEFAULT_ID);
        assert_eq!(current.database_name, "Other");
    }

    #[test]
    fn set_current_stamps_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConnectionStore::load(dir.path());
        let conn = store.set_current("local-adel-test").unwrap();
        assert!(conn.last_connected.is_some());
        store.save().unwrap();

        let reloaded = ConnectionStore::load(dir.path());
        let current = reloaded.current(&Config::default());
        assert_eq!(current.id, "local-adel-test");
        assert_eq!(current.last_connected, conn.last_connected);
        assert!(store.set_current("missing").is_err());
    }

    #[test]
    fn sorted_puts_recent_first_then_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConnectionStore::load(dir.path());
        let mut extra = Connection::local("a", "Alpha", "", false);
        extra.last_connected = Some(Utc::now() - Duration::hours(1));
        store.upsert(extra).unwrap();
        store.set_current("local-adel-test").unwrap();

        let ids: Vec<&str> = store.sorted().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["local-adel-test", "a", "local-adel"]);
    }

    #[test]
    fn upsert_validates_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConnectionStore::load(dir.path());
        let mut bad = Connection::local("x", "X", "", false);
        bad.api_url = "localhost".into();
        assert!(store.upsert(bad).is_err());
        assert!(is_valid_api_url("https://h"));
        assert!(!is_valid_api_url("http://"));
    }

    #[test]
    fn next_id_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConnectionStore::load(dir.path());
        assert_eq!(store.next_id("local-adel").as_deref(), Some("local-adel-test"));
        assert_eq!(store.next_id("local-adel-test").as_deref(), Some("local-adel"));
        assert_eq!(store.next_id(ENVIRONMENT_DEFAULT_ID).as_deref(), Some("local-adel"));
    }
}
