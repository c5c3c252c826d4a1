// LogSift - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Config loading and logging initialisation (debug mode support)
// 3. Pipeline assembly and batch import of the event file
// 4. Filter setup from the CLI, then printing or following visible events

use clap::Parser;
use logsift::app::pipeline::{FilterSettings, Pipeline};
use logsift::app::tail::{TailManager, TailProgress};
use logsift::core::diagnostics::{Diagnostics, MemoryDiagnostics, TeeDiagnostics, TracingDiagnostics};
use logsift::core::filter::LogFilter;
use logsift::core::model::{Level, LogEvent};
use logsift::platform::config::{self, AppConfig, PlatformPaths};
use logsift::util;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// LogSift - Thread-aware log event filter.
///
/// Reads a JSON-lines event file, optionally restricts it to a set of
/// threads, levels, or message text, and prints the visible events.
#[derive(Parser, Debug)]
#[command(name = "LogSift", version, about)]
struct Cli {
    /// JSON-lines event file to read.
    path: PathBuf,

    /// Keep watching the file and print events as they are appended.
    #[arg(short = 'f', long = "follow")]
    follow: bool,

    /// Show only events from this thread (repeatable).
    #[arg(short = 't', long = "thread")]
    threads: Vec<String>,

    /// Thread search prefix; deselects threads it does not match and limits
    /// `--invert` to the matching threads.
    #[arg(short = 's', long = "search")]
    search: Option<String>,

    /// Invert the thread selection within the search results.
    #[arg(short = 'i', long = "invert")]
    invert: bool,

    /// Print the known threads (split by the search prefix) and exit.
    #[arg(long = "list-threads")]
    list_threads: bool,

    /// Minimum severity to show.
    #[arg(short = 'l', long = "min-level")]
    min_level: Option<String>,

    /// Show only events whose message contains this text (case-insensitive).
    #[arg(short = 'c', long = "contains")]
    contains: Option<String>,

    /// Config file to use instead of the platform default.
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    // Config is read before logging exists; warnings are replayed after init.
    let (app_config, config_warnings) = match cli.config {
        Some(ref path) => match config::load_config_file(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(2);
            }
        },
        None => config::load_config(&PlatformPaths::resolve().config_dir),
    };

    util::logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );
    for warning in &config_warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        file = %cli.path.display(),
        "LogSift starting"
    );

    if let Err(e) = run(&cli, &app_config) {
        tracing::error!(error = %e, "LogSift failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, app_config: &AppConfig) -> io::Result<()> {
    let memory = Arc::new(MemoryDiagnostics::new());
    let diagnostics: Arc<dyn Diagnostics> = Arc::new(TeeDiagnostics::new(vec![
        Arc::new(TracingDiagnostics) as Arc<dyn Diagnostics>,
        memory.clone(),
    ]));

    let pipeline = Pipeline::new(app_config.max_events, diagnostics);
    pipeline.barrier().install_panic_hook();

    let report = pipeline
        .import(cli.path.clone(), app_config.batch_size)?
        .ok_or_else(|| {
            io::Error::other(format!("could not import '{}'", cli.path.display()))
        })?;
    if report.malformed > 0 {
        eprintln!("warning: skipped {} malformed line(s)", report.malformed);
    }

    pipeline.configure(&filter_settings(cli));

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.list_threads {
        let snapshot = pipeline.threads().snapshot();
        for id in snapshot.partition.visible() {
            let mark = if snapshot.selection.contains(id) { '*' } else { ' ' };
            writeln!(out, "{mark} {id}")?;
        }
        if !snapshot.partition.hidden().is_empty() {
            writeln!(out, "-- not matching '{}' --", snapshot.search)?;
            for id in snapshot.partition.hidden() {
                let mark = if snapshot.selection.contains(id) { '*' } else { ' ' };
                writeln!(out, "{mark} {id}")?;
            }
        }
        return Ok(());
    }

    for row in pipeline.visible_rows() {
        if let Some(event) = pipeline.store().get(row) {
            writeln!(out, "{}", format_event(&event))?;
        }
    }
    out.flush()?;
    drop(out);

    if cli.follow {
        follow(cli, app_config, &pipeline, report.bytes_consumed)?;
    }

    if !memory.is_empty() {
        eprintln!("warning: {} event(s) could not be processed", memory.len());
    }
    Ok(())
}

fn filter_settings(cli: &Cli) -> FilterSettings {
    let min_level = cli.min_level.as_deref().and_then(|raw| {
        let level = Level::parse(raw);
        if level == Level::Unknown {
            tracing::warn!(level = %raw, "Unrecognised --min-level; level filter not applied");
            None
        } else {
            Some(level)
        }
    });
    FilterSettings {
        thread_filter: cli.list_threads,
        threads: cli.threads.clone(),
        search: cli.search.clone(),
        invert: cli.invert,
        min_level,
        contains: cli.contains.clone(),
    }
}

fn follow(
    cli: &Cli,
    app_config: &AppConfig,
    pipeline: &Pipeline,
    start_offset: u64,
) -> io::Result<()> {
    let mut tail = TailManager::new();
    pipeline.follow(
        &mut tail,
        cli.path.clone(),
        Some(start_offset),
        app_config.tail_poll_interval_ms,
    )?;

    let interval = Duration::from_millis(app_config.tail_poll_interval_ms);
    let mut next_row = pipeline.store().len();
    loop {
        std::thread::sleep(interval);

        for progress in tail.poll_progress() {
            match progress {
                TailProgress::FileError { path, message } => {
                    eprintln!("warning: {}: {message}", path.display());
                }
                TailProgress::Stopped => return Ok(()),
                TailProgress::Started { .. } | TailProgress::NewEvents { .. } => {}
            }
        }

        let end = pipeline.store().len();
        if end == next_row {
            continue;
        }
        // Thread universe follows the live data.
        if pipeline.threads().is_enabled() {
            pipeline.threads().reload();
        }
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for (row, event) in pipeline.visible_since(next_row) {
            if row >= end {
                break;
            }
            writeln!(out, "{}", format_event(&event))?;
        }
        out.flush()?;
        next_row = end;
    }
}

fn format_event(event: &LogEvent) -> String {
    let timestamp = event
        .timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.3f ").to_string())
        .unwrap_or_default();
    let logger = event
        .logger
        .as_deref()
        .map(|l| format!(" {l}:"))
        .unwrap_or_default();
    format!(
        "{timestamp}{:<5} [{}]{logger} {}",
        event.level.short_label(),
        event.thread,
        event.message
    )
}
