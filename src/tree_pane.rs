// src/tree_pane.rs
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use tui::{
    backend::Backend,
    layout::{Margin, Rect},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::model::{NodeId, TreeNode};
use crate::palette::{entity_glyph, KANAGAWA as k, STYLE};
use crate::tree::{expand_intent, Intent, TreeState};

#[derive(Debug, Clone, PartialEq)]
pub enum TreeAction {
    None,
    Dispatch(Intent),
}

/// Cursor and scroll state over the store's flat projection. The pane
/// never owns nodes; it is handed the current snapshot on every call.
pub struct TreePane {
    pub focused: bool,
    cursor: usize,
    /// Node under the cursor, so the cursor follows it when rows above
    /// appear or disappear.
    cursor_id: Option<NodeId>,
    view_offset: usize,
    last_height: usize,
}

impl Default for TreePane {
    fn default() -> Self {
        Self::new()
    }
}

impl TreePane {
    pub fn new() -> Self {
        Self {
            focused: true,
            cursor: 0,
            cursor_id: None,
            view_offset: 0,
            last_height: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn view_offset(&self) -> usize {
        self.view_offset
    }

    /// Re-anchor after a new snapshot arrived.
    pub fn sync(&mut self, state: &TreeState) {
        if let Some(pos) = self.cursor_id.and_then(|id| state.position(id)) {
            self.cursor = pos;
        } else {
            self.cursor = self.cursor.min(state.flat.len().saturating_sub(1));
            self.cursor_id = state.flat.get(self.cursor).map(|n| n.id);
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.cursor_id = None;
        self.view_offset = 0;
    }

    fn move_to(&mut self, state: &TreeState, idx: usize) {
        if let Some(node) = state.flat.get(idx) {
            self.cursor = idx;
            self.cursor_id = Some(node.id);
            self.ensure_visible(self.last_height);
        }
    }

    fn current<'a>(&self, state: &'a TreeState) -> Option<&'a TreeNode> {
        state.flat.get(self.cursor).map(|n| n.as_ref())
    }

    pub fn handle_key(&mut self, key: KeyEvent, state: &TreeState) -> TreeAction {
        if key.kind != KeyEventKind::Press || state.flat.is_empty() {
            return TreeAction::None;
        }
        self.sync(state);

        match key.code {
            KeyCode::Up => {
                if self.cursor > 0 {
                    self.move_to(state, self.cursor - 1);
                }
            }
            KeyCode::Down => self.move_to(state, self.cursor + 1),
            KeyCode::Home => self.move_to(state, 0),
            KeyCode::End => self.move_to(state, state.flat.len() - 1),
            KeyCode::PageUp => self.move_to(state, self.cursor.saturating_sub(self.page())),
            KeyCode::PageDown => {
                let idx = (self.cursor + self.page()).min(state.flat.len() - 1);
                self.move_to(state, idx);
            }
            KeyCode::Right | KeyCode::Char(' ') => {
                if let Some(intent) = self.current(state).and_then(expand_intent) {
                    return TreeAction::Dispatch(intent);
                }
            }
            KeyCode::Left => {
                let Some(node) = self.current(state) else {
                    return TreeAction::None;
                };
                if node.expanded {
                    return TreeAction::Dispatch(Intent::ToggleExpansion { node_id: node.id });
                }
                if let Some(pos) = node.parent_id.and_then(|p| state.position(p)) {
                    self.move_to(state, pos);
                }
            }
            KeyCode::Enter => {
                if let Some(node) = self.current(state) {
                    return TreeAction::Dispatch(Intent::SelectNode { node_id: node.id });
                }
            }
            KeyCode::Esc => return TreeAction::Dispatch(Intent::DeselectNode),
            _ => {}
        }
        TreeAction::None
    }

    pub fn handle_mouse(&mut self, event: MouseEvent, area: Rect, state: &TreeState) -> TreeAction {
        let inner = area.inner(&Margin { horizontal: 1, vertical: 1 });
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let inside = event.column >= inner.x
                    && event.column < inner.x + inner.width
                    && event.row >= inner.y
                    && event.row < inner.y + inner.height;
                if !inside {
                    return TreeAction::None;
                }
                let idx = self.view_offset + event.row.saturating_sub(inner.y) as usize;
                if let Some(node) = state.flat.get(idx) {
                    self.cursor = idx;
                    self.cursor_id = Some(node.id);
                    return TreeAction::Dispatch(Intent::SelectNode { node_id: node.id });
                }
            }
            MouseEventKind::ScrollUp => {
                self.view_offset = self.view_offset.saturating_sub(1);
            }
            MouseEventKind::ScrollDown => {
                let max_offset = state.flat.len().saturating_sub(inner.height as usize);
                if self.view_offset < max_offset {
                    self.view_offset += 1;
                }
            }
            _ => {}
        }
        TreeAction::None
    }

    fn page(&self) -> usize {
        self.last_height.max(1)
    }

    pub fn ensure_visible(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        if self.cursor < self.view_offset {
            self.view_offset = self.cursor;
        } else if self.cursor >= self.view_offset + visible_height {
            self.view_offset = self.cursor + 1 - visible_height;
        }
    }

    pub fn render<B: Backend>(&mut self, f: &mut Frame<B>, area: Rect, state: &TreeState) {
        let title = if state.loading {
            " Entities (loading…) ".to_string()
        } else {
            format!(" Entities [{}] ", state.flat.len())
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(STYLE::border_for(self.focused));
        let inner = block.inner(area);
        f.render_widget(block, area);

        self.sync(state);
        self.last_height = inner.height as usize;
        self.view_offset = self.view_offset.min(state.flat.len().saturating_sub(1));
        self.ensure_visible(self.last_height);

        if state.flat.is_empty() {
            let hint = match (&state.error, state.loading) {
                (Some(e), _) => Span::styled(format!("  {e}"), STYLE::error_fg()),
                (None, true) => Span::styled("  Loading…", STYLE::tree_loading()),
                (None, false) => Span::styled("  No entities. F5 to reload.", dim_hint()),
            };
            f.render_widget(Paragraph::new(Spans::from(hint)), inner);
            return;
        }

        // Only the visible window of the projection is materialised.
        let end = (self.view_offset + self.last_height).min(state.flat.len());
        let lines: Vec<Spans> = state.flat[self.view_offset..end]
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let at_cursor = self.view_offset + i == self.cursor;
                let selected = state.selected == Some(node.id);
                row_spans(node, at_cursor && self.focused, selected)
            })
            .collect();
        f.render_widget(Paragraph::new(lines), inner);
    }
}

fn dim_hint() -> tui::style::Style {
    tui::style::Style::default().fg(k::PUMICE)
}

/// Plain text of a row, without styling.
pub fn row_text(node: &TreeNode) -> String {
    let mut text = "  ".repeat(node.level);
    text.push_str(match (node.has_children, node.expanded) {
        (false, _) => "  ",
        (true, false) => "▶ ",
        (true, true) => "▼ ",
    });
    text.push_str(entity_glyph(node.entity_type).0);
    text.push(' ');
    text.push_str(&node.name);
    if node.has_children {
        text.push_str(&format!(" ({})", node.child_count));
    }
    if node.loading {
        text.push_str(" ⟳");
    }
    text
}

fn row_spans(node: &TreeNode, at_cursor: bool, selected: bool) -> Spans<'static> {
    if at_cursor {
        return Spans::from(Span::styled(row_text(node), STYLE::tree_cursor()));
    }

    let base = if node.is_deleted() {
        STYLE::tree_deleted()
    } else if selected {
        STYLE::tree_selected()
    } else {
        STYLE::plain()
    };
    let (icon, tint) = entity_glyph(node.entity_type);
    let arrow = match (node.has_children, node.expanded) {
        (false, _) => "  ",
        (true, false) => "▶ ",
        (true, true) => "▼ ",
    };

    let mut spans = vec![
        Span::styled(format!("{}{}", "  ".repeat(node.level), arrow), base),
        Span::styled(format!("{icon} "), if node.is_deleted() { base } else { base.fg(tint) }),
        Span::styled(node.name.clone(), base),
    ];
    if node.has_children {
        spans.push(Span::styled(format!(" ({})", node.child_count), STYLE::tree_count()));
    }
    if node.loading {
        spans.push(Span::styled(" ⟳", STYLE::tree_loading()));
    }
    Spans::from(spans)
}
