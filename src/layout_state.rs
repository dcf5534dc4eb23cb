// src/layout_state.rs
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::persist;

pub const LAYOUT_FILE: &str = "layout.json";

pub const TREE_WIDTH_MIN: u16 = 10;
pub const TREE_WIDTH_MAX: u16 = 50;
pub const TABLE_HEIGHT_MIN: u16 = 25;
pub const TABLE_HEIGHT_MAX: u16 = 90;

/// Pane proportions in percent of the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutState {
    pub tree_width: u16,
    pub table_height: u16,
    pub tree_collapsed: bool,
}

impl Default for LayoutState {
    fn default() -> Self {
        LayoutState {
            tree_width: 20,
            table_height: 75,
            tree_collapsed: false,
        }
    }
}

impl LayoutState {
    pub fn load(dir: &Path) -> Self {
        persist::read_json::<LayoutState>(&dir.join(LAYOUT_FILE))
            .unwrap_or_default()
            .clamped()
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        persist::write_json(&dir.join(LAYOUT_FILE), self)
    }

    pub fn clamped(self) -> Self {
        LayoutState {
            tree_width: self.tree_width.clamp(TREE_WIDTH_MIN, TREE_WIDTH_MAX),
            table_height: self.table_height.clamp(TABLE_HEIGHT_MIN, TABLE_HEIGHT_MAX),
            ..self
        }
    }

    pub fn resize_tree(&mut self, delta: i16) {
        self.tree_width = step(self.tree_width, delta, TREE_WIDTH_MIN, TREE_WIDTH_MAX);
    }

    pub fn resize_table(&mut self, delta: i16) {
        self.table_height = step(self.table_height, delta, TABLE_HEIGHT_MIN, TABLE_HEIGHT_MAX);
    }

    pub fn toggle_tree(&mut self) {
        self.tree_collapsed = !self.tree_collapsed;
    }
}

fn step(value: u16, delta: i16, min: u16, max: u16) -> u16 {
    (i32::from(value) + i32::from(delta)).clamp(i32::from(min), i32::from(max)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resizing_stays_within_bounds() {
        let mut l = LayoutState::default();
        l.resize_tree(-100);
        assert_eq!(l.tree_width, TREE_WIDTH_MIN);
        l.resize_tree(5);
        assert_eq!(l.tree_width, 15);
        l.resize_table(100);
        assert_eq!(l.table_height, TABLE_HEIGHT_MAX);
    }

    #[test]
    fn stored_values_are_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(LAYOUT_FILE),
            r#"{"treeWidth": 80, "tableHeight": 3, "treeCollapsed": true}"#,
        )
        .unwrap();
        let l = LayoutState::load(dir.path());
        assert_eq!(
            l,
            LayoutState {
                tree_width: 50,
                table_height: 25,
                tree_collapsed: true
            }
        );
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(LayoutState::load(dir.path()), LayoutState::default());
        let mut l = LayoutState::default();
        l.toggle_tree();
        l.save(dir.path()).unwrap();
        assert!(LayoutState::load(dir.path()).tree_collapsed);
    }
}
