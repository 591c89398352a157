//! Pullback CLI: offline replay, snapshot inspection and config rendering.
//!
//! Commands:
//! - `replay`: feed recorded 1-minute bars through the full pipeline and
//!   print decisions as JSON lines
//! - `snapshot`: summarize a bar-store snapshot file
//! - `config`: print the effective configuration and its fingerprint

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pullback_core::domain::Bar;
use pullback_core::store::{BarStore, Snapshot};
use pullback_core::strategy::{DecisionEvent, LastSeenGate, MemorySink, StrategyOrchestrator};
use pullback_core::{PipelineConfig, ProfileKind};

#[derive(Parser)]
#[command(name = "pullback", about = "Pullback CLI: replay 1-minute bars through the decision pipeline")]
struct Cli {
    /// Debug-level logging unless RUST_LOG says otherwise.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a CSV of 1-minute bars (instrument,time,open,high,low,close,volume).
    Replay {
        /// CSV file with a header row.
        #[arg(long)]
        bars: PathBuf,

        /// TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Profile override: standard or extended.
        #[arg(long)]
        profile: Option<ProfileKind>,

        /// Save a snapshot of the store here after the replay.
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Print IGNORE decisions too.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    /// Summarize a snapshot file.
    Snapshot {
        /// Snapshot JSON written by `replay --snapshot` or a live store.
        path: PathBuf,
    },
    /// Print the effective configuration as TOML.
    Config {
        /// TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Profile override: standard or extended.
        #[arg(long)]
        profile: Option<ProfileKind>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Replay {
            bars,
            config,
            profile,
            snapshot,
            all,
        } => run_replay(&bars, config.as_deref(), profile, snapshot.as_deref(), all),
        Commands::Snapshot { path } => run_snapshot(&path),
        Commands::Config { config, profile } => run_config(config.as_deref(), profile),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, profile: Option<ProfileKind>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(profile) = profile {
        config.profile = profile;
        config.validate().context("config invalid with the requested profile")?;
    }
    Ok(config)
}

// ── Replay ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    instrument: String,
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

const TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

fn parse_time(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(time);
        }
    }
    bail!("unrecognized timestamp '{raw}' (expected YYYY-MM-DD HH:MM[:SS])")
}

/// Bars grouped per instrument, time-ordered, repeats removed.
fn read_bars(path: &Path) -> Result<BTreeMap<String, Vec<Bar>>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;

    let mut grouped: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        // +2: one for the header, one for 1-based numbering
        let row = row.with_context(|| format!("{}: bad row at line {}", path.display(), line + 2))?;
        let time = parse_time(&row.time).with_context(|| format!("line {}", line + 2))?;
        grouped
            .entry(row.instrument)
            .or_default()
            .push(Bar::new(time, row.open, row.high, row.low, row.close, row.volume));
    }

    let gate = LastSeenGate::new();
    for (instrument, bars) in grouped.iter_mut() {
        bars.sort_by_key(|bar| bar.time);
        let before = bars.len();
        bars.retain(|bar| gate.admit(instrument, bar.time));
        if bars.len() != before {
            tracing::warn!(
                instrument = %instrument,
                dropped = before - bars.len(),
                "duplicate timestamps dropped"
            );
        }
    }
    Ok(grouped)
}

fn run_replay(
    bars_path: &Path,
    config_path: Option<&Path>,
    profile: Option<ProfileKind>,
    snapshot: Option<&Path>,
    all: bool,
) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let grouped = read_bars(bars_path)?;
    if grouped.is_empty() {
        bail!("{} contains no bars", bars_path.display());
    }

    let store = Arc::new(BarStore::new(config.store.clone()));
    let orchestrator = Arc::new(StrategyOrchestrator::new(config, Arc::clone(&store))?);
    orchestrator.attach();
    let sink = Arc::new(MemorySink::new());
    orchestrator.add_sink(sink.clone());

    // One task per instrument; an instrument is never split across tasks.
    let stored: usize = grouped
        .into_par_iter()
        .map(|(instrument, bars)| store.replay(&instrument, bars, true))
        .sum();

    let mut events = sink.drain();
    events.sort_by(|a, b| {
        a.candle_time
            .cmp(&b.candle_time)
            .then_with(|| a.instrument.cmp(&b.instrument))
    });

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut printed = 0;
    for event in events.iter().filter(|e| all || e.decision.state.is_actionable()) {
        serde_json::to_writer(&mut out, event).context("writing decision")?;
        writeln!(out)?;
        printed += 1;
    }
    out.flush()?;

    if let Some(path) = snapshot {
        let written = store.save(Some(path)).context("saving snapshot")?;
        eprintln!("snapshot: {}", written.display());
    }

    print_summary(&events, stored, store.instruments().len(), printed);
    Ok(())
}

fn print_summary(events: &[DecisionEvent], stored: usize, instruments: usize, printed: usize) {
    let mut by_state: BTreeMap<&str, usize> = BTreeMap::new();
    for event in events {
        *by_state.entry(event.decision.state.as_str()).or_default() += 1;
    }

    eprintln!();
    eprintln!("Replay summary");
    eprintln!("  instruments:  {instruments}");
    eprintln!("  bars stored:  {stored}");
    eprintln!("  evaluations:  {}", events.len());
    for (state, count) in &by_state {
        eprintln!("    {state:<14} {count}");
    }
    eprintln!("  printed:      {printed}");
}

// ── Snapshot ─────────────────────────────────────────────────────────

fn run_snapshot(path: &Path) -> Result<()> {
    let snapshot = Snapshot::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;
    let alerts = snapshot.alert_state();

    println!("Snapshot {}", path.display());
    println!("  taken at:     {}", snapshot.timestamp);
    println!("  instruments:  {}", snapshot.bars.len());
    println!("  bars:         {}", snapshot.bar_count());
    println!();
    println!("{:<28} {:>6}  {:<19}  {:<19}", "instrument", "bars", "first", "last");
    for (instrument, bars) in &snapshot.bars {
        let first = bars.first().map(|b| b.time.to_string()).unwrap_or_default();
        let last = bars.last().map(|b| b.time.to_string()).unwrap_or_default();
        println!("{instrument:<28} {:>6}  {first:<19}  {last:<19}", bars.len());
    }

    if !alerts.last_alert_time.is_empty() || !alerts.paused_until.is_empty() {
        println!();
        println!("Alert state");
        for (instrument, at) in &alerts.last_alert_time {
            println!("  last alert  {instrument}: {}", format_epoch(*at));
        }
        for (instrument, directions) in &alerts.dedupe_map {
            for (direction, at) in directions {
                println!("  dedupe      {instrument} {direction}: {}", format_epoch(*at));
            }
        }
        for (instrument, until) in &alerts.paused_until {
            println!("  paused      {instrument} until {}", format_epoch(*until));
        }
    }
    Ok(())
}

fn format_epoch(seconds: f64) -> String {
    chrono::DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
        .map(|t| t.naive_utc().to_string())
        .unwrap_or_else(|| format!("{seconds}"))
}

// ── Config ───────────────────────────────────────────────────────────

fn run_config(path: Option<&Path>, profile: Option<ProfileKind>) -> Result<()> {
    let config = load_config(path, profile)?;
    let text = config.resolved().to_toml_string()?;
    println!("# fingerprint: {}", config.fingerprint());
    print!("{text}");
    Ok(())
}
