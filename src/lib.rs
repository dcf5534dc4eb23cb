// src/lib.rs
// Modules shared by the browser binary and the integration tests
pub mod batch_mode;
pub mod browser;
pub mod config;
pub mod connections;
pub mod error;
pub mod gateway;
pub mod layout_state;
pub mod model;
pub mod palette;
pub mod persist;
pub mod resolver;
pub mod results_export;
pub mod table_pane;
pub mod tree;
pub mod tree_pane;
pub mod value;
pub mod worker;

pub use error::{ConfigError, DataModelError, GatewayError};
pub use gateway::Gateway;
