// src/error.rs
use thiserror::Error;

/// Failures talking to the REST backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Invalid database name for header: {0}")]
    InvalidHeader(String),
}

/// Failures decoding wire records into the typed data model.
#[derive(Debug, Error, PartialEq)]
pub enum DataModelError {
    #[error("Unknown entity type {0}")]
    UnknownEntityType(u8),

    #[error("Unknown status {0}")]
    UnknownStatus(u8),

    #[error("Invalid value map key {key} for element {element_id}")]
    ElementKey { key: u32, element_id: u32 },

    #[error("Element {element_id}: value {raw} is not a valid {data_type}")]
    ValueMismatch {
        element_id: u32,
        data_type: String,
        raw: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("api_url must start with http:// or https:// (got {0})")]
    InvalidApiUrl(String),
}
