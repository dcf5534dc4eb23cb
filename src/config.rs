// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "arbor.toml";
pub const DEFAULT_API_URL: &str = "http://localhost:5112/api/v1";
pub const DEFAULT_DATABASE: &str = "ADEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub database_name: String,
    pub include_deleted: bool,
    /// Seconds; absent means requests never time out.
    pub request_timeout_secs: Option<u64>,
    pub colors: ColorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            database_name: DEFAULT_DATABASE.to_string(),
            include_deleted: false,
            request_timeout_secs: None,
            colors: ColorConfig::default(),
        }
    }
}

impl Config {
    /// A missing file is not an error: it yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("[CONFIG] {} not found, using defaults", path.display());
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if crate::connections::is_valid_api_url(&self.api_url) {
            Ok(())
        } else {
            Err(ConfigError::InvalidApiUrl(self.api_url.clone()))
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Directory holding the executable, canonicalised; `.` when unknown.
pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        .and_then(|p| fs::canonicalize(p).ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_path() -> PathBuf {
    exe_dir().join(CONFIG_FILE)
}

/// Where connections, layout and the log live. Falls back to the
/// executable's directory when the platform has no project dirs.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "Arbor")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(exe_dir)
}

/// RGB triples for every themed surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub default_bg: [u8; 3],
    pub plain_fg: [u8; 3],
    pub pane_border: [u8; 3],
    pub pane_border_focus: [u8; 3],
    pub tree_cursor_fg: [u8; 3],
    pub tree_cursor_bg: [u8; 3],
    pub tree_selected_fg: [u8; 3],
    pub tree_deleted_fg: [u8; 3],
    pub tree_count_fg: [u8; 3],
    pub tree_loading_fg: [u8; 3],
    pub icon_container: [u8; 3],
    pub icon_schema: [u8; 3],
    pub icon_record: [u8; 3],
    pub icon_field: [u8; 3],
    pub header_row: [u8; 3],
    pub table_caret_fg: [u8; 3],
    pub table_caret_bg: [u8; 3],
    pub label_fg: [u8; 3],
    pub help_bg: [u8; 3],
    pub help_border: [u8; 3],
    pub status_fg: [u8; 3],
    pub error_fg: [u8; 3],
    pub info_fg: [u8; 3],
}

impl Default for ColorConfig {
    fn default() -> Self {
        ColorConfig {
            default_bg: [30, 31, 40],
            plain_fg: [200, 200, 200],
            pane_border: [84, 84, 109],
            pane_border_focus: [126, 156, 216],
            tree_cursor_fg: [22, 22, 22],
            tree_cursor_bg: [149, 127, 184],
            tree_selected_fg: [230, 195, 132],
            tree_deleted_fg: [114, 113, 105],
            tree_count_fg: [120, 120, 145],
            tree_loading_fg: [255, 160, 102],
            icon_container: [126, 156, 216],
            icon_schema: [152, 187, 108],
            icon_record: [210, 126, 153],
            icon_field: [122, 168, 159],
            header_row: [230, 195, 132],
            table_caret_fg: [22, 22, 22],
            table_caret_bg: [127, 180, 202],
            label_fg: [147, 138, 169],
            help_bg: [42, 42, 55],
            help_border: [149, 127, 184],
            status_fg: [156, 171, 202],
            error_fg: [232, 36, 36],
            info_fg: [152, 187, 108],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.request_timeout(), None);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut f = fs::File::create(&path).unwrap();
        writeln!(
            f,
            "database_name = \"ADEL_Test\"\nrequest_timeout_secs = 5\n\n[colors]\nerror_fg = [1, 2, 3]"
        )
        .unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.database_name, "ADEL_Test");
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.colors.error_fg, [1, 2, 3]);
        assert_eq!(cfg.colors.info_fg, ColorConfig::default().info_fg);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "api_url = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn non_http_api_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "api_url = \"localhost:5112\"").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidApiUrl(_))
        ));
    }
}
