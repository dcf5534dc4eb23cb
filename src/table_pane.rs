// src/table_pane.rs
//! Right-hand side: the resolved table for the selected node and the
//! per-element metadata underneath it.
use copypasta::{ClipboardContext, ClipboardProvider};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use tui::{
    backend::Backend,
    layout::Rect,
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use unicode_segmentation::UnicodeSegmentation;

use crate::model::{EntityDetail, ProfileDto};
use crate::palette::STYLE;
use crate::resolver::ResolvedTable;
use crate::results_export;
use crate::worker::EntityView;

const MAX_COL_WIDTH: usize = 32;
const COL_GAP: usize = 2;

/// What the detail side currently holds.
#[derive(Debug, Clone, Default)]
pub enum DetailContent {
    #[default]
    Empty,
    Loading,
    Loaded(Box<EntityView>),
    Failed(String),
}

pub struct TablePane {
    pub focused: bool,
    pub content: DetailContent,
    cursor_col: usize,
    view_col: usize,
    element_scroll: u16,
    clipboard: Option<ClipboardContext>,
}

impl Default for TablePane {
    fn default() -> Self {
        Self::new()
    }
}

impl TablePane {
    pub fn new() -> Self {
        // Headless sessions have no clipboard; copying then reports an error.
        let clipboard = ClipboardContext::new()
            .map_err(|e| log::warn!("[TABLE] clipboard unavailable: {e}"))
            .ok();
        Self {
            focused: false,
            content: DetailContent::Empty,
            cursor_col: 0,
            view_col: 0,
            element_scroll: 0,
            clipboard,
        }
    }

    pub fn set_content(&mut self, content: DetailContent) {
        self.content = content;
        self.cursor_col = 0;
        self.view_col = 0;
        self.element_scroll = 0;
    }

    pub fn table(&self) -> Option<&ResolvedTable> {
        match &self.content {
            DetailContent::Loaded(view) => Some(&view.table),
            _ => None,
        }
    }

    pub fn cursor_col(&self) -> usize {
        self.cursor_col
    }

    /// Text of the cell under the cursor (data row 0).
    pub fn focused_cell(&self) -> Option<String> {
        let (_, rows) = self.table()?.to_grid();
        rows.first()?.get(self.cursor_col).cloned()
    }

    /// Returns a status-bar message when the key did something visible.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<String> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let ncols = self.table().map(|t| t.to_grid().0.len()).unwrap_or(0);
        match key.code {
            KeyCode::Left => self.cursor_col = self.cursor_col.saturating_sub(1),
            KeyCode::Right if self.cursor_col + 1 < ncols => self.cursor_col += 1,
            KeyCode::Home => self.cursor_col = 0,
            KeyCode::End => self.cursor_col = ncols.saturating_sub(1),
            KeyCode::Up => self.element_scroll = self.element_scroll.saturating_sub(1),
            KeyCode::Down => self.element_scroll = self.element_scroll.saturating_add(1),
            KeyCode::Char('y') => return Some(self.copy_focused_cell()),
            KeyCode::Char('e') => return Some(self.export_csv()),
            _ => {}
        }
        None
    }

    fn copy_focused_cell(&mut self) -> String {
        let Some(text) = self.focused_cell() else {
            return "Nothing to copy.".to_string();
        };
        let Some(clipboard) = self.clipboard.as_mut() else {
            return "Clipboard unavailable.".to_string();
        };
        match clipboard.set_contents(text) {
            Ok(()) => "Cell copied to clipboard.".to_string(),
            Err(e) => format!("Copy failed: {e}"),
        }
    }

    fn export_csv(&self) -> String {
        let Some(table) = self.table() else {
            return "No table loaded, nothing to export.".to_string();
        };
        match results_export::export_csv_to(&results_export::downloads_folder(), table) {
            Ok(path) => format!("CSV exported to: {}", path.display()),
            Err(e) => format!("Error saving CSV: {e}"),
        }
    }

    fn clamp_view(&mut self, widths: &[usize], avail: usize) {
        if self.cursor_col < self.view_col {
            self.view_col = self.cursor_col;
        }
        while self.view_col < self.cursor_col {
            let used: usize = widths[self.view_col..=self.cursor_col]
                .iter()
                .map(|w| w + COL_GAP)
                .sum();
            if used <= avail {
                break;
            }
            self.view_col += 1;
        }
    }

    pub fn render_table<B: Backend>(&mut self, f: &mut Frame<B>, area: Rect) {
        let title = match &self.content {
            DetailContent::Loaded(v) => format!(
                " {} #{} ",
                v.detail.entity_type.label(),
                v.detail.id
            ),
            _ => " Table ".to_string(),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(STYLE::border_for(self.focused));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let grid = match &self.content {
            DetailContent::Empty => {
                f.render_widget(
                    Paragraph::new(Span::styled("  Select a node (Enter) to view it.", STYLE::status_fg())),
                    inner,
                );
                return;
            }
            DetailContent::Loading => {
                f.render_widget(Paragraph::new(Span::styled("  Loading…", STYLE::tree_loading())), inner);
                return;
            }
            DetailContent::Failed(e) => {
                f.render_widget(
                    Paragraph::new(Span::styled(format!("  {e}"), STYLE::error_fg())).wrap(Wrap { trim: true }),
                    inner,
                );
                return;
            }
            DetailContent::Loaded(view) => view.table.to_grid(),
        };

        let (headers, rows) = grid;
        let widths = column_widths(&headers, &rows);
        self.cursor_col = self.cursor_col.min(headers.len().saturating_sub(1));
        self.clamp_view(&widths, inner.width as usize);

        let mut lines = Vec::with_capacity(rows.len() + 2);
        lines.push(Spans::from(
            (self.view_col..headers.len())
                .map(|c| Span::styled(cell_text(&headers[c], widths[c]), STYLE::header_row()))
                .collect::<Vec<_>>(),
        ));
        lines.push(Spans::from(Span::styled(
            "─".repeat(inner.width as usize),
            STYLE::border(),
        )));
        for row in &rows {
            lines.push(Spans::from(
                (self.view_col..row.len().min(widths.len()))
                    .map(|c| {
                        let style = if c == self.cursor_col && self.focused {
                            STYLE::table_caret()
                        } else {
                            STYLE::plain()
                        };
                        Span::styled(cell_text(&row[c], widths[c]), style)
                    })
                    .collect::<Vec<_>>(),
            ));
        }
        f.render_widget(Paragraph::new(lines), inner);
    }

    pub fn render_elements<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let block = Block::default()
            .title(" Elements ")
            .borders(Borders::ALL)
            .border_style(STYLE::border());
        let lines = match &self.content {
            DetailContent::Loaded(view) => element_lines(&view.detail, view.profile.as_ref()),
            _ => Vec::new(),
        };
        f.render_widget(
            Paragraph::new(lines).block(block).scroll((self.element_scroll, 0)),
            area,
        );
    }
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(c, h)| {
            rows.iter()
                .filter_map(|r| r.get(c))
                .map(|s| s.graphemes(true).count())
                .chain(std::iter::once(h.graphemes(true).count()))
                .max()
                .unwrap_or(0)
                .clamp(3, MAX_COL_WIDTH)
        })
        .collect()
}

/// Fit `s` into `width` graphemes (ellipsis when cut), then pad and gap.
pub fn cell_text(s: &str, width: usize) -> String {
    let g: Vec<&str> = s.graphemes(true).collect();
    let body = if g.len() > width {
        let mut t: String = g[..width.saturating_sub(1)].concat();
        t.push('…');
        t
    } else {
        format!("{s}{}", " ".repeat(width - g.len()))
    };
    format!("{body}{}", " ".repeat(COL_GAP))
}

/// Metadata lines: one per element, then the profile summary for schemas.
pub fn element_lines(detail: &EntityDetail, profile: Option<&ProfileDto>) -> Vec<Spans<'static>> {
    let mut lines = Vec::new();
    if detail.values.is_empty() {
        lines.push(Spans::from(Span::styled("  (no element values)", STYLE::status_fg())));
    }
    for (id, ev) in &detail.values {
        let user = ev.user_id.as_deref().unwrap_or("-");
        lines.push(Spans::from(vec![
            Span::styled(format!("{id:>4} "), STYLE::tree_count()),
            Span::styled(format!("{:<16}", detail.entity_type.field_label(*id)), STYLE::label()),
            Span::styled(format!("{:<24}", ev.value.to_string()), STYLE::plain()),
            Span::styled(
                format!(" {} · rev {} · {user}", ev.data_type, ev.revision_id),
                STYLE::status_fg(),
            ),
        ]));
    }

    if let Some(p) = profile {
        lines.push(Spans::from(""));
        lines.push(Spans::from(Span::styled(
            format!(
                "Profile #{}: {} fields, {} entities",
                p.id,
                p.elements.len(),
                p.entity_count
            ),
            STYLE::header_row(),
        )));
        let mut fields: Vec<_> = p.elements.iter().collect();
        fields.sort_by_key(|e| (e.properties.order_number.unwrap_or(i64::MAX), e.id));
        for el in fields {
            let props = &el.properties;
            let mut flags = Vec::new();
            if props.primary_key == Some(true) {
                flags.push("PK");
            }
            if props.allow_null == Some(false) {
                flags.push("NOT NULL");
            }
            lines.push(Spans::from(vec![
                Span::styled(
                    format!("  {:<20}", props.name.as_deref().unwrap_or("?")),
                    STYLE::label(),
                ),
                Span::styled(
                    format!("{:<12}", props.data_type.as_deref().unwrap_or("")),
                    STYLE::plain(),
                ),
                Span::styled(flags.join(" "), STYLE::info_fg()),
            ]));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementValue, EntityType};
    use crate::value::Value;

    #[test]
    fn cells_truncate_on_grapheme_boundaries() {
        assert_eq!(cell_text("abc", 5), "abc    ");
        assert_eq!(cell_text("héllo wörld", 6), "héllo…  ");
        assert_eq!(cell_text("👍🏽👍🏽", 2), "👍🏽👍🏽  ");
    }

    #[test]
    fn widths_are_clamped() {
        let headers = vec!["ID".to_string(), "x".repeat(50)];
        let rows = vec![vec!["1".to_string(), "y".to_string()]];
        assert_eq!(column_widths(&headers, &rows), vec![3, MAX_COL_WIDTH]);
    }

    #[test]
    fn element_lines_use_fixed_labels() {
        let detail = EntityDetail {
            id: 4,
            entity_type: EntityType::SchemaField,
            profile_id: None,
            values: [(
                2,
                ElementValue {
                    element_id: 2,
                    value: Value::Text("Int".into()),
                    data_type: "String".into(),
                    revision_id: 3,
                    user_id: None,
                },
            )]
            .into_iter()
            .collect(),
            children: None,
        };
        let lines = element_lines(&detail, None);
        assert_eq!(lines.len(), 1);
        let text: String = lines[0].0.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.contains("Data Type"));
        assert!(text.contains("rev 3"));
    }

    #[test]
    fn keys_move_cursor_within_columns() {
        use crossterm::event::KeyModifiers;
        let mut pane = TablePane {
            focused: true,
            content: DetailContent::Empty,
            cursor_col: 0,
            view_col: 0,
            element_scroll: 0,
            clipboard: None,
        };
        pane.handle_key(KeyEvent::new(KeyCode::Right, KeyModifiers::NONE));
        assert_eq!(pane.cursor_col(), 0);
        assert_eq!(
            pane.handle_key(KeyEvent::new(KeyCode::Char('e'), KeyModifiers::NONE)).as_deref(),
            Some("No table loaded, nothing to export.")
        );
        assert_eq!(
            pane.handle_key(KeyEvent::new(KeyCode::Char('y'), KeyModifiers::NONE)).as_deref(),
            Some("Nothing to copy.")
        );
    }
}
