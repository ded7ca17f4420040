use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use unicode_width::UnicodeWidthStr;

use retrowordle::{
    app::{self, App},
    config::{Config, ConfigStore, FileConfigStore, StorageBackend},
    error::AdminError,
    progress::ProgressStore,
    progression::progress_summary,
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    store::{open_backend, KeyValueStore},
};

const TICK_RATE_MS: u64 = 100;
const LOG_ENV: &str = "RETROWORDLE_LOG";
const LOG_FILE: &str = "retrowordle.log";

/// retro word-guessing tui with three-level sessions
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Guess the five-letter word in six tries. Words come in sessions of three levels; clearing a level unlocks the next, and progress is kept between runs."
)]
pub struct Cli {
    /// directory holding saved progress (defaults to the platform state dir)
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,

    /// storage backend for progress
    #[clap(long, value_enum, global = true)]
    backend: Option<StorageBackend>,

    /// config file to read instead of the platform default
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// jump straight to this session, e.g. session-2
    #[clap(short = 's', long)]
    session: Option<String>,

    /// show the target word while playing
    #[clap(long)]
    reveal: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// manage sessions and their words
    Admin {
        #[clap(subcommand)]
        action: AdminAction,
    },
    /// print aggregate stats
    Stats {
        /// clear all stats
        #[clap(long)]
        reset: bool,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    /// list sessions, words and progress
    List,
    /// write the built-in sessions, keeping existing progress
    Defaults,
    /// create or rewrite a session
    Set {
        session_id: String,
        name: String,
        word1: String,
        word2: String,
        word3: String,
    },
    /// zero a session's progress, or one level with --level
    Reset {
        session_id: String,
        #[clap(long)]
        level: Option<u8>,
    },
    /// remove every session and the current game
    Clear,
}

/// Effective settings after merging the config file with flags.
#[derive(Debug, Clone)]
struct Settings {
    config_store: FileConfigStore,
    config: Config,
    data_dir: PathBuf,
    backend: StorageBackend,
    reveal: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        let config_store = match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        };
        let config = config_store.load();
        Settings {
            data_dir: self
                .data_dir
                .clone()
                .unwrap_or_else(|| config.resolved_data_dir()),
            backend: self.backend.unwrap_or(config.backend),
            reveal: self.reveal || config.reveal_target,
            config_store,
            config,
        }
    }
}

fn init_tracing(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // the TUI owns the terminal, so interactive runs log to a file
    let file = log_file.and_then(|path| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });
    match file {
        Some(file) => registry
            .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init(),
        None if log_file.is_some() => registry.init(),
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init(),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let settings = cli.settings();

    match &cli.command {
        Some(command) => {
            init_tracing(None);
            let mut store = ProgressStore::new(open_backend(settings.backend, &settings.data_dir));
            if let Err(e) = run_command(command, &mut store, &mut io::stdout()) {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        None => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
            }
            init_tracing(Some(settings.data_dir.join(LOG_FILE).as_path()));
            play(&cli, settings)
        }
    }
}

fn play(cli: &Cli, mut settings: Settings) -> Result<(), Box<dyn Error>> {
    info!(data_dir = %settings.data_dir.display(), backend = %settings.backend, "starting");
    let store = ProgressStore::new(open_backend(settings.backend, &settings.data_dir));
    let mut app = App::new(store, settings.reveal);

    match &cli.session {
        Some(id) => {
            if let Err(e) = app.select_session(id) {
                app.set_session_input(id);
                warn!("cannot open session {id}: {e}");
            }
        }
        None => {
            if !app.resume() {
                if let Some(last) = &settings.config.last_session {
                    app.set_session_input(last);
                }
            }
        }
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = app::run(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result?;

    if let Some(id) = app.session_id() {
        settings.config.last_session = Some(id.to_string());
        if let Err(e) = settings.config_store.save(&settings.config) {
            warn!("could not save config: {e}");
        }
    }
    Ok(())
}

fn run_command<S: KeyValueStore>(
    command: &Command,
    store: &mut ProgressStore<S>,
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Stats { reset: true } => {
            store.reset_stats()?;
            writeln!(out, "stats cleared")?;
        }
        Command::Stats { reset: false } => {
            let stats = store.load_stats();
            writeln!(out, "played      {}", stats.games_played)?;
            writeln!(out, "win %       {}", stats.win_percentage())?;
            writeln!(out, "streak      {}", stats.current_streak)?;
            writeln!(out, "max streak  {}", stats.max_streak)?;
            let scale = stats.max_distribution().max(1);
            for (i, count) in stats.guess_distribution.iter().enumerate() {
                let bar = "#".repeat((*count * 20 / scale) as usize);
                writeln!(out, "{}  {bar} {count}", i + 1)?;
            }
        }
        Command::Admin { action } => run_admin(action, store, out)?,
    }
    Ok(())
}

fn run_admin<S: KeyValueStore>(
    action: &AdminAction,
    store: &mut ProgressStore<S>,
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>> {
    match action {
        AdminAction::List => {
            let sessions = store.load_sessions().unwrap_or_default();
            if sessions.is_empty() {
                writeln!(out, "no sessions")?;
            }
            let name_width = sessions
                .values()
                .map(|s| s.session_name.width())
                .max()
                .unwrap_or(0);
            for session in sessions.values() {
                let pad = " ".repeat(name_width - session.session_name.width());
                writeln!(
                    out,
                    "{}  {}{pad}  {}",
                    session.session_id,
                    session.session_name,
                    progress_summary(session)
                )?;
                for level in &session.levels {
                    let best = level
                        .best_score
                        .map_or_else(|| "-".to_string(), |b| b.to_string());
                    writeln!(
                        out,
                        "    {}. {}  {}  attempts {}  best {best}",
                        level.level_number,
                        level.word,
                        if level.completed { "done" } else { "open" },
                        level.attempts
                    )?;
                }
            }
        }
        AdminAction::Defaults => {
            let sessions = store.create_default_sessions()?;
            writeln!(out, "{} default sessions written", sessions.len())?;
        }
        AdminAction::Set {
            session_id,
            name,
            word1,
            word2,
            word3,
        } => {
            let session = store.save_session_config(session_id, name, word1, word2, word3)?;
            writeln!(
                out,
                "saved {}: {} ({})",
                session.session_id,
                session.session_name,
                session.levels.iter().map(|l| l.word.as_str()).collect::<Vec<_>>().join(", ")
            )?;
        }
        AdminAction::Reset { session_id, level } => {
            let id = session_id.trim().to_lowercase();
            let found = match level {
                Some(n) => store.reset_level(&id, *n)?,
                None => store.reset_session(&id)?,
            };
            if !found {
                return Err(AdminError::UnknownSession(id).into());
            }
            match level {
                Some(n) => writeln!(out, "reset {id} level {n}")?,
                None => writeln!(out, "reset {id}")?,
            }
        }
        AdminAction::Clear => {
            store.clear_sessions()?;
            writeln!(out, "all sessions cleared")?;
        }
    }
    Ok(())
}
