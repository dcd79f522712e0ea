//! Confine CLI - Command-line front end for snap interface confinement

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use confine_core::{ChangeOutcome, ConfineConfig, InterfaceManager};
use confine_interfaces::{PlugRef, SlotRef, SnapInfo};
use confine_state::devicectx::{Model, MODEL_KEY, SEEDED_KEY};
use confine_state::Change;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "confine")]
#[command(about = "Confine - Interface connections and security profiles for snaps")]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// State database directory, overrides the configuration
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Directory of snap declarations (*.yaml) to install before running
    #[arg(long, global = true)]
    snaps: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Parse and sanitize snap declarations
    Check {
        /// Declaration files
        #[arg(required = true)]
        manifests: Vec<PathBuf>,
    },
    /// List registered interfaces
    Interfaces,
    /// Connect a plug to a slot
    Connect {
        /// Plug as <snap>:<plug>
        plug: PlugRef,
        /// Slot as <snap>:<slot>
        slot: SlotRef,
    },
    /// Disconnect a plug from a slot
    Disconnect {
        /// Plug as <snap>:<plug>
        plug: PlugRef,
        /// Slot as <snap>:<slot>
        slot: SlotRef,
    },
    /// List current connections
    Connections,
    /// Show the security profiles of a snap
    Profiles {
        /// Snap name
        snap: String,
    },
    /// Acknowledge a device model and mark the device seeded
    Seed {
        #[arg(long)]
        brand: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        base: Option<String>,
    },
    /// Show seeding status and recorded changes
    Status,
}

#[derive(Serialize)]
struct StatusReport {
    seeded: bool,
    model: Option<Model>,
    changes: Vec<Change>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command.as_ref() else {
        println!("Confine v{} - Use --help for commands", env!("CARGO_PKG_VERSION"));
        return Ok(());
    };

    run(&cli, command)
}

fn run(cli: &Cli, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Check { manifests } => check(manifests, cli.json)?,
        Commands::Interfaces => {
            let interfaces = open_manager(cli)?.interfaces();
            emit(cli.json, &interfaces, || {
                for i in &interfaces {
                    println!("{:<16} {}", i.name, i.summary);
                }
            })?;
        }
        Commands::Connect { plug, slot } => {
            let outcome = open_manager(cli)?.connect(plug, slot)?;
            report_outcome(cli.json, &outcome)?;
        }
        Commands::Disconnect { plug, slot } => {
            let outcome = open_manager(cli)?.disconnect(plug, slot)?;
            report_outcome(cli.json, &outcome)?;
        }
        Commands::Connections => {
            let conns = open_manager(cli)?.connections();
            emit(cli.json, &conns, || {
                if conns.is_empty() {
                    println!("No connections.");
                }
                for conn in &conns {
                    println!("{:<32} {}", conn.plug, conn.slot);
                }
            })?;
        }
        Commands::Profiles { snap } => {
            let profiles = open_manager(cli)?.profiles(snap)?;
            emit(cli.json, &profiles, || {
                for (system, tags) in &profiles.systems {
                    for (tag, text) in tags {
                        println!("[{} {}]", system.as_str(), tag);
                        println!("{text}");
                    }
                }
            })?;
        }
        Commands::Seed { brand, model, base } => {
            let mut acknowledged = Model::new(brand.as_str(), model.as_str());
            if let Some(base) = base {
                acknowledged = acknowledged.with_base(base.as_str());
            }
            let manager = open_manager(cli)?;
            let mut st = manager.state().lock();
            st.set(MODEL_KEY, &acknowledged)?;
            st.set(SEEDED_KEY, &true)?;
            st.checkpoint()?;
            info!(model = %acknowledged, "device seeded");
            println!("Seeded with model {acknowledged}");
        }
        Commands::Status => {
            let manager = open_manager(cli)?;
            let report = {
                let st = manager.state().lock();
                StatusReport {
                    seeded: st.get(SEEDED_KEY)?.unwrap_or(false),
                    model: st.get(MODEL_KEY)?,
                    changes: st.changes().to_vec(),
                }
            };
            emit(cli.json, &report, || {
                println!("Seeded: {}", report.seeded);
                match &report.model {
                    Some(model) => println!("Model:  {model}"),
                    None => println!("Model:  (not acknowledged)"),
                }
                for change in &report.changes {
                    println!(
                        "{:<4} {:<8} {:<12} {}",
                        change.id,
                        change.status.to_string(),
                        change.kind,
                        change.summary
                    );
                }
            })?;
        }
    }

    Ok(())
}

/// Builds the manager and installs every declaration found under `--snaps`.
fn open_manager(cli: &Cli) -> anyhow::Result<InterfaceManager> {
    let mut config = match &cli.config {
        Some(path) => ConfineConfig::load(path)?,
        None => ConfineConfig::default(),
    };
    if let Some(state) = &cli.state {
        config.state.db_path = Some(state.clone());
    }

    let manager = InterfaceManager::new(config)?;
    if let Some(dir) = &cli.snaps {
        for path in declaration_files(dir)? {
            let info = read_declaration(&path)?;
            let restored = manager
                .add_snap(&info)
                .with_context(|| format!("cannot install {}", path.display()))?;
            debug!(snap = %info.name, restored = restored.len(), "installed declaration");
        }
    }
    Ok(manager)
}

fn declaration_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_declaration(path: &Path) -> anyhow::Result<SnapInfo> {
    let text =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    SnapInfo::from_yaml(&text).with_context(|| format!("invalid declaration {}", path.display()))
}

/// Installs the declarations into a throwaway manager so every endpoint is sanitized.
fn check(manifests: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let manager = InterfaceManager::new(ConfineConfig::default())?;
    let mut failures = Vec::new();
    for path in manifests {
        let result = read_declaration(path).and_then(|info| {
            manager
                .add_snap(&info)
                .map(|_| info.name.clone())
                .map_err(anyhow::Error::from)
        });
        match result {
            Ok(name) if !json => println!("{}: ok ({name})", path.display()),
            Ok(_) => {}
            Err(err) => {
                if !json {
                    println!("{}: {err:#}", path.display());
                }
                failures.push((path.display().to_string(), format!("{err:#}")));
            }
        }
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&failures)?);
    }
    if !failures.is_empty() {
        bail!("{} of {} declarations rejected", failures.len(), manifests.len());
    }
    Ok(())
}

fn report_outcome(json: bool, outcome: &ChangeOutcome) -> anyhow::Result<()> {
    emit(json, outcome, || {
        println!("{} {}: {}", outcome.kind, outcome.change_id, outcome.connection);
        for profiles in &outcome.profiles {
            let tags: usize = profiles.systems.values().map(|t| t.len()).sum();
            println!("  {}: {} profile entries", profiles.snap, tags);
        }
    })
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text();
    }
    Ok(())
}
