// src/browser.rs
//! The interactive session: panes, focus, layout, and the glue between
//! the tree store and the fetch worker.
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Span, Spans},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::config::Config;
use crate::connections::{Connection, ConnectionStore};
use crate::gateway::Gateway;
use crate::layout_state::LayoutState;
use crate::model::NodeId;
use crate::palette::STYLE;
use crate::table_pane::{DetailContent, TablePane};
use crate::tree::{effect_of, Effect, Intent, TreeStore};
use crate::tree_pane::{TreeAction, TreePane};
use crate::worker::{start_fetch_worker, FetchRequest, FetchResponse, Generation, Ticket};

const STATUS_TTL: Duration = Duration::from_secs(5);
const RESIZE_STEP: i16 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Focus {
    Tree,
    Table,
}

pub struct Browser {
    pub store: TreeStore,
    pub tree: TreePane,
    pub table: TablePane,
    pub layout: LayoutState,
    pub focus: Focus,
    pub show_help: bool,

    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    config: Config,
    data_dir: PathBuf,
    connections: ConnectionStore,
    pub connection: Connection,
    environment: Option<String>,

    req_tx: Sender<FetchRequest>,
    resp_rx: Receiver<FetchResponse>,
    generation: Generation,
    detail_ticket: Ticket,
    /// Node the detail side was last asked to show.
    detail_for: Option<NodeId>,

    last_tree_area: Option<Rect>,
    last_table_area: Option<Rect>,
}

fn gateway_for(connection: &Connection, config: &Config) -> Result<Gateway> {
    Ok(Gateway::new(
        &connection.api_url,
        &connection.database_name,
        config.request_timeout(),
    )?)
}

impl Browser {
    pub fn new(
        config: Config,
        data_dir: PathBuf,
        connections: ConnectionStore,
        connection: Connection,
    ) -> Result<Self> {
        let gateway = gateway_for(&connection, &config)?;
        let (req_tx, resp_rx) = start_fetch_worker(gateway, config.include_deleted)?;
        let layout = LayoutState::load(&data_dir);
        log::info!(
            "[BROWSER] starting on {} ({})",
            connection.api_url,
            connection.database_name
        );

        let mut browser = Self {
            store: TreeStore::new(),
            tree: TreePane::new(),
            table: TablePane::new(),
            focus: if layout.tree_collapsed { Focus::Table } else { Focus::Tree },
            layout,
            show_help: false,
            status_message: None,
            status_message_time: None,
            config,
            data_dir,
            connections,
            connection,
            environment: None,
            req_tx,
            resp_rx,
            generation: 0,
            detail_ticket: 0,
            detail_for: None,
            last_tree_area: None,
            last_table_area: None,
        };
        browser.apply_focus();
        browser.dispatch(Intent::LoadRoots);
        browser.send(FetchRequest::Health {
            generation: browser.generation,
        });
        Ok(browser)
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    fn send(&self, req: FetchRequest) {
        if self.req_tx.send(req).is_err() {
            log::error!("[BROWSER] fetch worker is gone");
        }
    }

    /// Apply an intent, run its side effect, then bring the detail side in
    /// line with the selection.
    pub fn dispatch(&mut self, intent: Intent) {
        // Re-selecting the node whose detail failed is the retry.
        let retry = matches!(intent, Intent::SelectNode { node_id } if Some(node_id) == self.detail_for)
            && matches!(self.table.content, DetailContent::Failed(_));
        let effect = effect_of(&intent);
        self.store.dispatch(intent);
        match effect {
            Some(Effect::Dispatch(next)) => self.dispatch(next),
            Some(Effect::FetchRoots) => self.send(FetchRequest::Roots {
                generation: self.generation,
            }),
            Some(Effect::FetchChildren(parent_id)) => self.send(FetchRequest::Children {
                generation: self.generation,
                parent_id,
            }),
            None => {}
        }
        self.sync_detail(retry);
    }

    fn sync_detail(&mut self, retry: bool) {
        let selected = self.store.snapshot().selected;
        if selected == self.detail_for && !retry {
            return;
        }
        self.detail_for = selected;
        self.detail_ticket += 1;
        match selected {
            Some(node_id) => {
                self.table.set_content(DetailContent::Loading);
                self.send(FetchRequest::Detail {
                    generation: self.generation,
                    ticket: self.detail_ticket,
                    node_id,
                });
            }
            None => self.table.set_content(DetailContent::Empty),
        }
    }

    /// Drop everything in flight and reload the roots.
    pub fn reset_tree(&mut self) {
        self.generation += 1;
        self.tree.reset();
        self.dispatch(Intent::ResetTree);
    }

    pub fn switch_connection(&mut self) -> Result<()> {
        let Some(next) = self.connections.next_id(&self.connection.id) else {
            self.set_status("No saved connections.");
            return Ok(());
        };
        let Some(candidate) = self.connections.get(&next) else {
            return Ok(());
        };
        // Nothing is persisted for a connection that cannot be used.
        let gateway = gateway_for(candidate, &self.config)?;
        let connection = self.connections.set_current(&next)?;
        self.connections.save()?;
        self.send(FetchRequest::Reconnect {
            gateway,
            include_deleted: self.config.include_deleted,
        });
        self.set_status(format!("Connected to {}", connection.label()));
        self.connection = connection;
        self.environment = None;
        self.reset_tree();
        self.send(FetchRequest::Health {
            generation: self.generation,
        });
        Ok(())
    }

    /// Drain worker responses. Returns true when anything changed.
    pub fn poll_responses(&mut self) -> bool {
        let mut changed = false;
        while let Ok(resp) = self.resp_rx.try_recv() {
            changed |= self.apply_response(resp);
        }
        changed
    }

    pub fn apply_response(&mut self, resp: FetchResponse) -> bool {
        if resp.generation() != self.generation {
            log::debug!(
                "[BROWSER] dropping response from generation {} (now {})",
                resp.generation(),
                self.generation
            );
            return false;
        }
        match resp {
            FetchResponse::Roots { result, .. } => self.dispatch(match result {
                Ok(nodes) => Intent::LoadRootsSucceeded { nodes },
                Err(error) => Intent::LoadRootsFailed { error },
            }),
            FetchResponse::Children {
                parent_id, result, ..
            } => self.dispatch(match result {
                Ok(children) => Intent::LoadChildrenSucceeded { parent_id, children },
                Err(error) => Intent::LoadChildrenFailed {
                    node_id: parent_id,
                    error,
                },
            }),
            FetchResponse::Detail {
                ticket,
                node_id,
                result,
                ..
            } => {
                if ticket != self.detail_ticket {
                    log::debug!("[BROWSER] stale detail for {node_id} (ticket {ticket})");
                    return false;
                }
                self.table.set_content(match result {
                    Ok(view) => DetailContent::Loaded(view),
                    Err(e) => DetailContent::Failed(e),
                });
            }
            FetchResponse::Health { result, .. } => {
                if result.success {
                    self.environment = Some(result.environment);
                } else {
                    self.set_status(result.message);
                }
            }
        }
        true
    }

    pub fn update(&mut self) {
        if let Some(t) = self.status_message_time {
            if t.elapsed() > STATUS_TTL {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    fn apply_focus(&mut self) {
        if self.layout.tree_collapsed && self.focus == Focus::Tree {
            self.focus = Focus::Table;
        }
        self.tree.focused = self.focus == Focus::Tree;
        self.table.focused = self.focus == Focus::Table;
    }

    fn switch_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Tree => Focus::Table,
            Focus::Table if !self.layout.tree_collapsed => Focus::Tree,
            Focus::Table => Focus::Table,
        };
        self.apply_focus();
    }

    fn save_layout(&mut self) {
        if let Err(e) = self.layout.save(&self.data_dir) {
            log::warn!("[BROWSER] could not save layout: {e}");
        }
    }

    /// Returns `Ok(true)` when the user asked to quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.kind != KeyEventKind::Press {
            return Ok(false);
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q')) && ctrl {
            return Ok(true);
        }
        if key.code == KeyCode::F(1) {
            self.show_help = !self.show_help;
            return Ok(false);
        }
        if self.show_help {
            if key.code == KeyCode::Esc {
                self.show_help = false;
            }
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') if !ctrl => return Ok(true),
            KeyCode::Tab => self.switch_focus(),
            KeyCode::Char('b') if ctrl => {
                self.layout.toggle_tree();
                self.apply_focus();
                self.save_layout();
            }
            KeyCode::Left if ctrl => {
                self.layout.resize_tree(-RESIZE_STEP);
                self.save_layout();
            }
            KeyCode::Right if ctrl => {
                self.layout.resize_tree(RESIZE_STEP);
                self.save_layout();
            }
            KeyCode::Up if ctrl => {
                self.layout.resize_table(-RESIZE_STEP);
                self.save_layout();
            }
            KeyCode::Down if ctrl => {
                self.layout.resize_table(RESIZE_STEP);
                self.save_layout();
            }
            KeyCode::F(5) => {
                self.reset_tree();
                self.set_status("Reloading tree…");
            }
            KeyCode::Char('c') if !ctrl => {
                if let Err(e) = self.switch_connection() {
                    self.set_status(format!("Connection switch failed: {e}"));
                }
            }
            _ => match self.focus {
                Focus::Tree => {
                    let state = self.store.snapshot();
                    if let TreeAction::Dispatch(intent) = self.tree.handle_key(key, &state) {
                        self.dispatch(intent);
                    }
                }
                Focus::Table => {
                    if let Some(msg) = self.table.handle_key(key) {
                        self.set_status(msg);
                    }
                }
            },
        }
        Ok(false)
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) {
        let hit = |r: Option<Rect>| {
            r.map(|r| {
                event.column >= r.x
                    && event.column < r.x + r.width
                    && event.row >= r.y
                    && event.row < r.y + r.height
            })
            .unwrap_or(false)
        };

        if hit(self.last_tree_area) {
            if let Some(area) = self.last_tree_area {
                if matches!(event.kind, MouseEventKind::Down(_)) {
                    self.focus = Focus::Tree;
                    self.apply_focus();
                }
                let state = self.store.snapshot();
                if let TreeAction::Dispatch(intent) = self.tree.handle_mouse(event, area, &state) {
                    self.dispatch(intent);
                }
            }
        } else if hit(self.last_table_area) && matches!(event.kind, MouseEventKind::Down(_)) {
            self.focus = Focus::Table;
            self.apply_focus();
        }
    }

    /// Persist what should outlive the session and stop the worker.
    pub fn final_save(&mut self) {
        self.save_layout();
        self.send(FetchRequest::Quit);
    }

    pub fn render<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let state = self.store.snapshot();
        terminal.draw(|f| {
            let size = f.size();
            if size.height <= 4 || size.width <= 20 {
                return;
            }
            f.render_widget(Block::default().style(STYLE::default_bg()), size);

            if self.show_help {
                render_help(f, size);
                return;
            }

            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(1)])
                .split(size);

            let right = if self.layout.tree_collapsed {
                self.last_tree_area = None;
                rows[0]
            } else {
                let cols = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([
                        Constraint::Percentage(self.layout.tree_width),
                        Constraint::Percentage(100 - self.layout.tree_width),
                    ])
                    .split(rows[0]);
                self.tree.render(f, cols[0], &state);
                self.last_tree_area = Some(cols[0]);
                cols[1]
            };

            let panes = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Percentage(self.layout.table_height),
                    Constraint::Percentage(100 - self.layout.table_height),
                ])
                .split(right);
            self.table.render_table(f, panes[0]);
            self.table.render_elements(f, panes[1]);
            self.last_table_area = Some(panes[0]);

            self.render_status(f, rows[1], state.error.as_deref());
        })?;
        Ok(())
    }

    fn render_status<B: Backend>(&self, f: &mut Frame<B>, area: Rect, error: Option<&str>) {
        let mut spans = vec![Span::styled(
            format!(" {} ", self.connection.label()),
            STYLE::header_row(),
        )];
        if let Some(env) = &self.environment {
            spans.push(Span::styled(format!("({env}) "), STYLE::status_fg()));
        }
        if let Some(msg) = &self.status_message {
            spans.push(Span::styled(format!("│ {msg} "), STYLE::info_fg()));
        }
        if let Some(err) = error {
            spans.push(Span::styled(format!("│ {err} "), STYLE::error_fg()));
        }
        spans.push(Span::styled("│ F1 help", STYLE::status_fg()));
        f.render_widget(Paragraph::new(Spans::from(spans)), area);
    }
}

fn render_help<B: Backend>(f: &mut Frame<B>, area: Rect) {
    const HELP: &[&str] = &[
        " Arbor  –  Key Reference ",
        "",
        "  Tree",
        "      ↑ / ↓                Move cursor",
        "      → / Space            Expand (loads children on first use)",
        "      ←                    Collapse, or jump to parent",
        "      Enter / click        Show node in table",
        "      Esc                  Clear selection",
        "",
        "  Table",
        "      ← / →                Move cell cursor",
        "      ↑ / ↓                Scroll element list",
        "      y                    Copy cell to clipboard",
        "      e                    Export table as CSV to Downloads",
        "",
        "  Global",
        "      Tab                  Cycle focus",
        "      Ctrl + B             Show / hide tree",
        "      Ctrl + ← / →         Resize tree",
        "      Ctrl + ↑ / ↓         Resize table",
        "      F5                   Reload tree",
        "      c                    Next saved connection",
        "      F1                   Close this help screen",
        "      q / Ctrl + Q         Quit",
    ];

    let block = Block::default()
        .style(STYLE::help_bg())
        .borders(Borders::ALL)
        .title(" Help (F1 to close) ")
        .border_style(STYLE::help_border());
    let p = Paragraph::new(HELP.join("\n"))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
