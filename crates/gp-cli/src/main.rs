mod server;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use gp_core::{
    ColumnLayout, ContextHasher, Diagnostics, Event, GridConfig, Position, Session, SharedSession,
    StateView, Token, Vocabulary, export_json, import_json, parse_token_list, seed_from_i64, trace,
};
use gp_store::{SessionStore, list_sessions, load_config};
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Parser)]
#[command(name = "gp", about = "Deterministic grid paths with a replayable event timeline")]
struct Cli {
    /// Session name (default: "default")
    #[arg(long, global = true)]
    session: Option<String>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or replace) the session from a config and a token sequence
    Init {
        /// Token ids ("42,17,89") or free text to tokenize
        input: String,

        /// TOML grid config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Replace configured columns with N evenly spaced ones
        #[arg(long, conflicts_with = "scatter")]
        columns: Option<usize>,

        /// Replace configured columns with N random ones
        #[arg(long)]
        scatter: Option<usize>,

        /// RNG seed for --scatter
        #[arg(long, default_value_t = 42)]
        rng_seed: u64,
    },

    /// Trace a single path without touching any session
    Trace {
        /// Token ids ("42,17,89") or free text to tokenize
        input: String,

        /// Column seed; negative or wide values are reduced to 32 bits
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        seed: i64,

        /// Start cell as "x,y"
        #[arg(long, default_value = "15,14", value_parser = parse_position)]
        start: Position,

        #[arg(long, default_value_t = gp_core::GRID_SIZE)]
        grid: u32,

        #[arg(long, default_value_t = gp_core::MAX_STEP)]
        max_step: u32,

        /// Print the path as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the per-column paths of the session
    Columns {
        #[arg(long)]
        json: bool,
    },

    /// Append events from a JSON-lines file
    Record {
        path: PathBuf,
    },

    /// Pin the view to an event index
    Focus {
        index: usize,
    },

    /// Unpin the view and follow the latest event
    Follow,

    /// Clear the event timeline and diagnostics
    Reset,

    /// Show the replayed view
    View {
        /// Event index to replay up to (default: current focus)
        #[arg(long, conflicts_with = "step")]
        at: Option<usize>,

        /// Replay up to the event recorded at this step
        #[arg(long)]
        step: Option<u64>,

        #[arg(long)]
        json: bool,
    },

    /// Replace diagnostics from a JSON file
    Diagnostics {
        path: PathBuf,
    },

    /// Show session statistics
    Stats,

    /// List stored sessions
    Sessions,

    /// Export the session to a JSON file
    Export {
        path: PathBuf,
    },

    /// Import a session from a JSON file, replacing the stored one
    Import {
        path: PathBuf,
    },

    /// Serve the session over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 7878)]
        port: u16,

        /// Keep mutations in memory instead of journaling them
        #[arg(long)]
        memory: bool,
    },
}

/// Candidates listed by `gp diagnostics`.
const TOP_CANDIDATES: usize = 5;

fn data_dir() -> Option<PathBuf> {
    std::env::var("GP_DATA_DIR").ok().map(PathBuf::from)
}

fn open_store(cli: &Cli) -> Result<SessionStore> {
    let base_dir = data_dir();
    SessionStore::open(cli.session.as_deref(), base_dir.as_deref())
        .context("failed to open session store")
}

fn load_session(store: &SessionStore) -> Result<Session> {
    store
        .load()
        .context("failed to load session")?
        .ok_or_else(|| anyhow!("session '{}' is empty; run `gp init` first", store.name()))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn parse_position(s: &str) -> std::result::Result<Position, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"x,y\", got '{s}'"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x '{x}': {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y '{y}': {e}"))?;
    Ok(Position::new(x, y))
}

/// Token ids when `input` is a plain id list, otherwise the words of
/// `input` interned in first-seen order.
fn encode_input(input: &str) -> Vec<Token> {
    match parse_token_list(input) {
        Some(tokens) if !tokens.is_empty() => tokens,
        _ => Vocabulary::new().encode(input),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Init {
            input,
            config,
            columns,
            scatter,
            rng_seed,
        } => cmd_init(&cli, input, config.as_deref(), *columns, *scatter, *rng_seed),
        Commands::Trace {
            input,
            seed,
            start,
            grid,
            max_step,
            json,
        } => cmd_trace(input, *seed, *start, *grid, *max_step, *json),
        Commands::Columns { json } => cmd_columns(&cli, *json),
        Commands::Record { path } => cmd_record(&cli, path),
        Commands::Focus { index } => cmd_focus(&cli, *index),
        Commands::Follow => cmd_follow(&cli),
        Commands::Reset => cmd_reset(&cli),
        Commands::View { at, step, json } => cmd_view(&cli, *at, *step, *json),
        Commands::Diagnostics { path } => cmd_diagnostics(&cli, path),
        Commands::Stats => cmd_stats(&cli),
        Commands::Sessions => cmd_sessions(),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Import { path } => cmd_import(&cli, path),
        Commands::Serve { host, port, memory } => cmd_serve(&cli, host, *port, *memory).await,
    }
}

fn cmd_init(
    cli: &Cli,
    input: &str,
    config_path: Option<&Path>,
    columns: Option<usize>,
    scatter: Option<usize>,
    rng_seed: u64,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            load_config(path).with_context(|| format!("failed to load {}", path.display()))?
        }
        None => GridConfig::default(),
    };
    if let Some(n) = columns {
        config.columns = ColumnLayout::evenly_spaced(n, config.grid_size);
    } else if let Some(n) = scatter {
        let mut rng = SmallRng::seed_from_u64(rng_seed);
        config.columns = ColumnLayout::scattered(n, config.grid_size, &mut rng);
    }

    let tokens = encode_input(input);
    let session = Session::new(config, tokens).context("invalid session config")?;
    let store = open_store(cli)?;
    store.save(&session).context("failed to save session")?;

    println!(
        "initialized session '{}': {} columns, {} tokens",
        store.name(),
        session.columns().len(),
        session.tokens().len()
    );
    Ok(())
}

fn cmd_trace(
    input: &str,
    seed: i64,
    start: Position,
    grid: u32,
    max_step: u32,
    json: bool,
) -> Result<()> {
    let config = GridConfig {
        grid_size: grid,
        max_step,
        ..GridConfig::default()
    };
    config.validate().context("invalid grid")?;

    let tokens = encode_input(input);
    let path = trace(
        &ContextHasher::new(max_step),
        grid,
        start,
        &tokens,
        seed_from_i64(seed),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&path)?);
        return Ok(());
    }
    for (i, step) in path.steps().iter().enumerate() {
        match step.displacement {
            Some(d) => println!("{i:>4}  token={:<10} d={d:<10} {}", step.token, step.position),
            None => println!("{i:>4}  token={:<10} {:<12} {}", step.token, "start", step.position),
        }
    }
    Ok(())
}

fn cmd_columns(cli: &Cli, json: bool) -> Result<()> {
    let store = open_store(cli)?;
    let session = load_session(&store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(session.columns())?);
        return Ok(());
    }
    for column in session.columns().columns() {
        let cells: Vec<String> = column.path.positions().map(|p| p.to_string()).collect();
        println!(
            "column {} seed={} start={}: {}",
            column.index,
            column.spec.seed,
            column.spec.start,
            cells.join(" -> ")
        );
    }
    Ok(())
}

fn cmd_record(cli: &Cli, path: &Path) -> Result<()> {
    let store = open_store(cli)?;
    let mut session = load_session(&store)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut recorded = 0usize;
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid event", path.display(), lineno + 1))?;
        let event = session
            .prepare(event)
            .with_context(|| format!("{}:{}: rejected", path.display(), lineno + 1))?;
        store
            .store()
            .append_event(&event)
            .with_context(|| format!("{}:{}: failed to journal event", path.display(), lineno + 1))?;
        session.append(event)?;
        recorded += 1;
    }

    let last = session
        .log()
        .last_step()
        .map_or_else(|| "-".to_string(), |s| s.to_string());
    println!(
        "recorded {recorded} events. events={}, last_step={last}",
        session.log().len()
    );
    Ok(())
}

fn cmd_focus(cli: &Cli, index: usize) -> Result<()> {
    let store = open_store(cli)?;
    let mut session = load_session(&store)?;
    session.set_focus(index)?;
    store.store().save_focus(Some(index), true)?;
    println!("focus pinned at {index}");
    Ok(())
}

fn cmd_follow(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let mut session = load_session(&store)?;
    session.follow_latest();
    store.store().save_focus(session.log().focus(), false)?;
    match session.log().focus() {
        Some(i) => println!("following latest (index {i})"),
        None => println!("following latest (log is empty)"),
    }
    Ok(())
}

fn cmd_reset(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let session = load_session(&store)?;
    store.store().clear_events().context("failed to clear events")?;
    println!("reset. dropped {} events", session.log().len());
    Ok(())
}

fn cmd_view(cli: &Cli, at: Option<usize>, step: Option<u64>, json: bool) -> Result<()> {
    let store = open_store(cli)?;
    let session = load_session(&store)?;
    let at = match step {
        Some(step) => Some(
            session
                .log()
                .index_of_step(step)
                .ok_or_else(|| anyhow!("no event recorded at step {step}"))?,
        ),
        None => at,
    };
    let view = match at {
        Some(i) => session.view_at(i)?,
        None => session.view(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view, session.log().len(), session.log().is_pinned());
    }
    Ok(())
}

fn print_view(view: &StateView, events: usize, pinned: bool) {
    match (view.index, view.step()) {
        (Some(i), Some(step)) => println!("index:    {i} (step {step})"),
        _ => println!("index:    none (seed fallback)"),
    }
    println!("events:   {events}");
    println!("pinned:   {}", if pinned { "yes" } else { "no" });
    if !view.fallback_columns.is_empty() && !view.is_fallback() {
        println!("fallback: {:?}", view.fallback_columns);
    }
    match &view.best_candidate {
        Some(c) => println!("best:     {} score={:.3}", c.location, c.score),
        None => println!("best:     none"),
    }
    for (i, loc) in view.current_locations.iter().enumerate() {
        println!("column {i}: {loc}");
    }
}

fn cmd_diagnostics(cli: &Cli, path: &Path) -> Result<()> {
    let store = open_store(cli)?;
    let mut session = load_session(&store)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let diagnostics: Diagnostics =
        serde_json::from_str(&content).context("invalid diagnostics JSON")?;

    session.set_diagnostics(diagnostics);
    store
        .store()
        .save_diagnostics(session.diagnostics())
        .context("failed to save diagnostics")?;

    match session.diagnostics().best_candidate() {
        Some(c) => println!(
            "{} candidates. best {} score={:.3}",
            session.diagnostics().candidates.len(),
            c.location,
            c.score
        ),
        None => println!("no candidates"),
    }
    for (rank, c) in session
        .diagnostics()
        .ranked()
        .iter()
        .take(TOP_CANDIDATES)
        .enumerate()
    {
        println!("{:>3}. {} score={:.3}", rank + 1, c.location, c.score);
    }
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let session = load_session(&store)?;
    let stats = session.stats();

    println!("session:   {}", store.name());
    println!("id:        {}", session.id);
    println!("grid:      {}x{}", session.config().grid_size, session.config().grid_size);
    println!("columns:   {}", stats.columns);
    println!("tokens:    {}", stats.tokens);
    println!("events:    {}", stats.events);
    println!(
        "focus:     {}",
        stats.focus.map_or_else(|| "-".to_string(), |f| f.to_string())
    );
    println!("pinned:    {}", if stats.pinned { "yes" } else { "no" });
    println!("db_size:   {:.1}KB", store.db_size() as f64 / 1024.0);
    Ok(())
}

fn cmd_sessions() -> Result<()> {
    let base_dir = data_dir();
    let names = list_sessions(base_dir.as_deref()).context("failed to list sessions")?;
    if names.is_empty() {
        println!("(no sessions)");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let store = open_store(cli)?;
    let session = load_session(&store)?;

    let json = export_json(&session).context("failed to serialize session")?;
    std::fs::write(path, &json).with_context(|| format!("failed to write {}", path.display()))?;

    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let session = import_json(&json).context("failed to import JSON")?;

    let store = open_store(cli)?;
    store.save(&session).context("failed to save imported session")?;

    println!(
        "imported from {}. columns={}, events={}",
        path.display(),
        session.columns().len(),
        session.log().len()
    );
    Ok(())
}

async fn cmd_serve(cli: &Cli, host: &str, port: u16, memory: bool) -> Result<()> {
    let store = open_store(cli)?;
    let session = load_session(&store)?;
    tracing::info!(
        "serving session '{}' ({} events)",
        store.name(),
        session.log().len()
    );

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid address {host}:{port}"))?;
    let shared = SharedSession::new(session);
    let state = if memory {
        server::AppState::new(shared)
    } else {
        server::AppState::with_store(shared, store)
    };
    server::serve(addr, Arc::new(state)).await
}
