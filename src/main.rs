//! src/main.rs – Arbor launcher: interactive entity browser plus batch commands
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::event::Event;
use tui::{backend::CrosstermBackend, Terminal};

use arbor::batch_mode::{self, BatchConfig};
use arbor::browser::Browser;
use arbor::config::{self, Config};
use arbor::connections::{Connection, ConnectionStore};
use arbor::gateway::Gateway;
use arbor::model::NodeId;
use arbor::palette;
use arbor::results_export::OutputFormat;

/*──────────────────────── CLI structures ──────────────────────*/
#[derive(Parser)]
#[command(name = "Arbor")]
#[command(about = "A terminal browser for hierarchical entity data", long_about = None)]
struct Cli {
    /// Config file (default: arbor.toml next to the executable)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Saved connection id to use for this run
    #[arg(long, global = true, value_name = "ID")]
    connection: Option<String>,

    /// Override the API base URL
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Override the database name sent in X-Database-Name
    #[arg(long, global = true, value_name = "NAME")]
    database: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the entity tree (non-interactive)
    Tree {
        /// Number of levels to print; roots are level 1
        #[arg(short, long, default_value_t = 2)]
        depth: usize,

        /// Include deleted entities
        #[arg(long)]
        include_deleted: bool,
    },

    /// Export resolved tables for entities (non-interactive)
    Batch {
        /// Entity id to export (repeatable)
        #[arg(short = 'n', long = "entity", value_name = "ID", required = true)]
        entities: Vec<NodeId>,

        /// Output directory for results
        #[arg(short, long, value_name = "DIR")]
        output_dir: PathBuf,

        /// Output format (csv, json, txt, xlsx)
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Exit immediately on first error
        #[arg(short, long)]
        exit_on_error: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List saved connections
    Connections {
        /// Probe each connection's health endpoint
        #[arg(long)]
        test: bool,

        #[command(subcommand)]
        action: Option<ConnectionAction>,
    },
}

#[derive(Subcommand)]
enum ConnectionAction {
    /// Make a saved connection the current one
    Use { id: String },
}

/*──────────────────────── logging ──────────────────────────────*/
/// Interactive sessions log to a file so the alternate screen stays clean.
fn init_logging(log_file: Option<&Path>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                // No writable log file: stay silent rather than draw over the TUI.
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    builder.init();
}

/*──────────────────────── helpers ──────────────────────────────*/
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(db) = &cli.database {
        config.database_name = db.clone();
    }
}

fn active_connection(cli: &Cli, store: &ConnectionStore, config: &Config) -> anyhow::Result<Connection> {
    let mut conn = store.resolve(config, cli.connection.as_deref())?;
    if let Some(url) = &cli.api_url {
        conn.api_url = url.clone();
    }
    if let Some(db) = &cli.database {
        conn.database_name = db.clone();
    }
    Ok(conn)
}

fn gateway_for(conn: &Connection, config: &Config) -> anyhow::Result<Gateway> {
    Ok(Gateway::new(&conn.api_url, &conn.database_name, config.request_timeout())?)
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/*──────────────────────── main ────────────────────────────────*/
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let config_result = Config::load_from(&config_path);

    let data_dir = config::data_dir();
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;

    match &cli.command {
        Some(command) => {
            init_logging(None);
            // Batch modes need a valid config.
            let mut config = config_result?;
            apply_overrides(&cli, &mut config);
            run_command(&cli, command, config, &data_dir)
        }
        None => {
            init_logging(Some(&data_dir.join("arbor.log")));
            let (mut config, config_error) = match config_result {
                Ok(cfg) => (cfg, None),
                Err(e) => {
                    log::error!("[MAIN] {e}");
                    (Config::default(), Some(e.to_string()))
                }
            };
            apply_overrides(&cli, &mut config);
            run_interactive_mode(&cli, config, data_dir, config_error)
        }
    }
}

fn run_command(cli: &Cli, command: &Commands, config: Config, data_dir: &Path) -> anyhow::Result<()> {
    let mut store = ConnectionStore::load(data_dir);
    match command {
        Commands::Tree { depth, include_deleted } => {
            let conn = active_connection(cli, &store, &config)?;
            let gateway = gateway_for(&conn, &config)?;
            let include_deleted = *include_deleted || config.include_deleted;
            let state = runtime()?.block_on(batch_mode::walk_tree(&gateway, *depth, include_deleted))?;
            print!("{}", batch_mode::format_tree(&state));
            if let Some(err) = &state.error {
                eprintln!("Warning: {err}");
            }
            Ok(())
        }
        Commands::Batch {
            entities,
            output_dir,
            format,
            exit_on_error,
            verbose,
        } => {
            let conn = active_connection(cli, &store, &config)?;
            let gateway = gateway_for(&conn, &config)?;
            let batch_config = BatchConfig {
                entity_ids: entities.clone(),
                output_dir: output_dir.clone(),
                output_format: OutputFormat::parse(format)?,
                exit_on_error: *exit_on_error,
                verbose: *verbose,
            };
            let summary = runtime()?.block_on(batch_mode::run_batch(&gateway, &batch_config))?;
            if summary.written.is_empty() && summary.failed > 0 {
                anyhow::bail!("No entity could be exported");
            }
            Ok(())
        }
        Commands::Connections { test, action } => {
            if let Some(ConnectionAction::Use { id }) = action {
                let conn = store.set_current(id)?;
                store.save()?;
                println!("Current connection: {}", conn.label());
                return Ok(());
            }

            let current = store.current(&config);
            let rt = if *test { Some(runtime()?) } else { None };
            for conn in store.sorted() {
                let marker = if conn.id == current.id { "*" } else { " " };
                let seen = conn
                    .last_connected
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{marker} {:<18} {:<24} {:<36} {seen}",
                    conn.id, conn.name, conn.api_url
                );
                if let Some(rt) = &rt {
                    let result = rt.block_on(async {
                        match gateway_for(conn, &config) {
                            Ok(gw) => gw.health().await,
                            Err(e) => arbor::gateway::ConnectionTestResult {
                                success: false,
                                message: format!("Connection failed: {e}"),
                                environment: "Unknown".into(),
                            },
                        }
                    });
                    let env = if result.success {
                        format!(" ({})", result.environment)
                    } else {
                        String::new()
                    };
                    println!("    {}{env}", result.message);
                }
            }
            Ok(())
        }
    }
}

fn run_interactive_mode(
    cli: &Cli,
    config: Config,
    data_dir: PathBuf,
    config_error: Option<String>,
) -> anyhow::Result<()> {
    palette::install(config.colors.clone());

    let store = ConnectionStore::load(&data_dir);
    let connection = active_connection(cli, &store, &config)?;
    let mut browser = Browser::new(config, data_dir, store, connection)?;
    if let Some(msg) = config_error {
        browser.set_status(msg);
    }

    /* ───── console-control handler – flag & let the loop exit ───── */
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))?;
    }

    /* Crossterm / TUI init */
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture,
        crossterm::terminal::SetTitle(format!("Arbor – {}", browser.connection.label()))
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut term = Terminal::new(backend)?;

    /* event/render loop */
    let tick = Duration::from_millis(100);
    let mut last_draw = Instant::now();
    let mut dirty = true;
    let result = (|| -> anyhow::Result<()> {
        'main: loop {
            if shutdown.load(Ordering::SeqCst) {
                break 'main;
            }
            if browser.poll_responses() {
                dirty = true;
            }

            if crossterm::event::poll(tick)? {
                match crossterm::event::read()? {
                    Event::Key(k) if browser.handle_key(k)? => break 'main,
                    Event::Key(_) => dirty = true,
                    Event::Mouse(m) => {
                        browser.handle_mouse(m);
                        dirty = true;
                    }
                    Event::Resize(_, _) => dirty = true,
                    _ => {}
                }
            }

            browser.update();
            if dirty && last_draw.elapsed() >= Duration::from_millis(15) {
                browser.render(&mut term)?;
                last_draw = Instant::now();
                dirty = false;
            }
        }
        Ok(())
    })();

    /* ─── graceful quit: persist state and restore console ─── */
    browser.final_save();

    let mut out = io::stdout();
    crossterm::execute!(
        out,
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    out.flush()?;
    crossterm::terminal::disable_raw_mode()?;
    log::info!("[MAIN] session ended");
    result
}
