//! Command line front end: runs simulated training sessions and manages the
//! engine configuration file.

mod demo;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use trainer::config::{EngineConfig, load_config, write_config};
use trainer::context::Services;
use trainer::data::{FixedSessionCount, MemoryRecorder, MemoryStore};
use trainer::exec::InteractionThread;
use trainer::executor::Executor;
use trainer::logging;

#[derive(Parser)]
#[command(
    name = "trainer",
    version,
    about = "Adaptive task scheduler for cognitive training modules"
)]
struct Cli {
    /// Engine configuration file (TOML). Missing files mean defaults.
    #[arg(long, global = true, default_value = "trainer.toml")]
    config: PathBuf,

    /// Log more (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the arithmetic module against a simulated participant and print
    /// one JSON report per session.
    Simulate {
        /// Tasks per round; the module runs a practice round and a sprint.
        #[arg(long, default_value_t = 12)]
        trials: u32,
        /// Probability that the participant answers correctly.
        #[arg(long, default_value_t = 0.8)]
        accuracy: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Sessions to run back to back; the level carries over.
        #[arg(long, default_value_t = 1)]
        sessions: u32,
        /// Override the pause between tasks.
        #[arg(long)]
        pause_ms: Option<u64>,
    },
    /// Print the effective configuration.
    Config {
        /// Also write it to the configuration file.
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(match cli.verbose {
        0 => "trainer=info",
        1 => "trainer=debug",
        _ => "trainer=trace",
    });
    let cfg = load_config(&cli.config)?;
    match cli.command {
        Command::Simulate {
            trials,
            accuracy,
            seed,
            sessions,
            pause_ms,
        } => cmd_simulate(cfg, trials, accuracy, seed, sessions, pause_ms),
        Command::Config { write } => cmd_config(&cfg, &cli.config, write),
    }
}

fn cmd_simulate(
    mut cfg: EngineConfig,
    trials: u32,
    accuracy: f64,
    seed: u64,
    sessions: u32,
    pause_ms: Option<u64>,
) -> Result<()> {
    demo::pause_override(&mut cfg, pause_ms);
    cfg.validate()?;

    let store = Arc::new(MemoryStore::new());
    let recorder = Arc::new(MemoryRecorder::new());
    let surface = Arc::new(demo::SimulatedParticipant::new(accuracy, seed));
    let interaction = InteractionThread::spawn().context("start interaction thread")?;
    let (mut tree, root) = demo::arithmetic_module(&cfg, trials, seed)?;

    for session in 0..sessions {
        let services = Services {
            store: store.clone(),
            recorder: recorder.clone(),
            sessions: Arc::new(FixedSessionCount::finished(session)),
            surface: surface.clone(),
            interaction: Arc::clone(&interaction),
        };
        let executor = Executor::new(cfg.clone(), services);
        let report = executor
            .run_session("arithmetic", &mut tree)
            .with_context(|| format!("session {}", session + 1))?;
        info!(
            session = session + 1,
            level = ?demo::stored_level(store.as_ref(), &tree, root),
            "session done"
        );
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize session report")?
        );
    }
    interaction.shutdown();
    Ok(())
}

fn cmd_config(cfg: &EngineConfig, path: &std::path::Path, write: bool) -> Result<()> {
    print!("{}", toml::to_string_pretty(cfg).context("serialize config")?);
    if write {
        write_config(path, cfg)?;
        info!(path = %path.display(), "configuration written");
    }
    Ok(())
}
