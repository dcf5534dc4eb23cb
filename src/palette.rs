// src/palette.rs
#![allow(non_snake_case)]
use once_cell::sync::{Lazy, OnceCell};
use tui::style::{Color, Modifier, Style};

use crate::config::ColorConfig;
use crate::model::EntityType;

/*──────────────────────── 1. Kanagawa tones (RGB) ─────────────────────────*/
pub mod KANAGAWA {
    use tui::style::Color;

    /// Secondary hint text.
    pub const PUMICE: Color = Color::Rgb(114, 113, 105);
}

/*──────────────────────── 2. Configured colors ────────────────────────────*/
static INSTALLED: OnceCell<ColorConfig> = OnceCell::new();

/// Set once by the launcher before the first frame; later calls are ignored.
pub fn install(colors: ColorConfig) {
    let _ = INSTALLED.set(colors);
}

pub static CONFIG_COLORS: Lazy<ColorConfig> =
    Lazy::new(|| INSTALLED.get().cloned().unwrap_or_default());

#[inline]
pub fn rgb(arr: [u8; 3]) -> Color {
    Color::Rgb(arr[0], arr[1], arr[2])
}

/// Icon and tint per entity type.
pub fn entity_glyph(t: EntityType) -> (&'static str, Color) {
    let c = &*CONFIG_COLORS;
    match t {
        EntityType::Container => ("󰉋", rgb(c.icon_container)),
        EntityType::Schema => ("󰙅", rgb(c.icon_schema)),
        EntityType::Record => ("󰈙", rgb(c.icon_record)),
        EntityType::SchemaField => ("󰠵", rgb(c.icon_field)),
    }
}

/*──────────────────────── 3. Style shortcuts ──────────────────────────────*/
pub mod STYLE {
    use super::{rgb, Modifier, Style, CONFIG_COLORS};

    fn fg(c: [u8; 3]) -> Style {
        Style::default().fg(rgb(c))
    }

    fn fg_bg(f: [u8; 3], b: [u8; 3]) -> Style {
        Style::default().fg(rgb(f)).bg(rgb(b))
    }

    pub fn default_bg() -> Style { Style::default().bg(rgb(CONFIG_COLORS.default_bg)) }
    pub fn plain() -> Style { fg(CONFIG_COLORS.plain_fg) }

    /* ─── panes ─── */
    pub fn border() -> Style { fg(CONFIG_COLORS.pane_border) }
    pub fn border_focus() -> Style { fg(CONFIG_COLORS.pane_border_focus) }
    pub fn border_for(focused: bool) -> Style { if focused { border_focus() } else { border() } }

    /* ─── tree ─── */
    pub fn tree_cursor() -> Style { fg_bg(CONFIG_COLORS.tree_cursor_fg, CONFIG_COLORS.tree_cursor_bg) }
    pub fn tree_selected() -> Style { fg(CONFIG_COLORS.tree_selected_fg).add_modifier(Modifier::BOLD) }
    pub fn tree_deleted() -> Style { fg(CONFIG_COLORS.tree_deleted_fg).add_modifier(Modifier::DIM | Modifier::CROSSED_OUT) }
    pub fn tree_count() -> Style { fg(CONFIG_COLORS.tree_count_fg) }
    pub fn tree_loading() -> Style { fg(CONFIG_COLORS.tree_loading_fg).add_modifier(Modifier::ITALIC) }

    /* ─── table / elements ─── */
    pub fn header_row() -> Style { fg(CONFIG_COLORS.header_row).add_modifier(Modifier::BOLD) }
    pub fn table_caret() -> Style { fg_bg(CONFIG_COLORS.table_caret_fg, CONFIG_COLORS.table_caret_bg) }
    pub fn label() -> Style { fg(CONFIG_COLORS.label_fg) }

    /* ─── help / status ─── */
    pub fn help_bg() -> Style { Style::default().bg(rgb(CONFIG_COLORS.help_bg)) }
    pub fn help_border() -> Style { fg(CONFIG_COLORS.help_border) }
    pub fn status_fg() -> Style { fg(CONFIG_COLORS.status_fg) }
    pub fn error_fg() -> Style { fg(CONFIG_COLORS.error_fg) }
    pub fn info_fg() -> Style { fg(CONFIG_COLORS.info_fg) }
}
