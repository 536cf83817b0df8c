use clap::{Parser, Subcommand};
use lansim::cli::Shell;
use lansim::config;
use lansim::dataplane::{Network, TickSummary};
use lansim::telemetry::{init_logging, ErrorLog, LogConfig, Statistics};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "lansim")]
#[command(about = "A tick-driven LAN and router simulator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Load a topology and run the simulation
    Run {
        /// Path to the topology file
        #[arg(short, long, default_value = "topology.toml")]
        config: PathBuf,

        /// Number of ticks to run
        #[arg(short, long, default_value_t = 10)]
        ticks: u32,
    },
    /// Interactive administrative shell
    Shell {
        /// Topology file to start from
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Read commands from a file instead of stdin
        #[arg(short, long)]
        script: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a topology file
    Validate {
        /// Path to the topology file
        #[arg(short, long, default_value = "topology.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Config {
            action: ConfigAction::Validate {
                config: config_path,
            },
        }) => {
            setup_logging(None);
            cmd_config_validate(&config_path)
        }
        Some(Commands::Run {
            config: config_path,
            ticks,
        }) => cmd_run(&config_path, ticks),
        Some(Commands::Shell { config, script }) => cmd_shell(config.as_deref(), script.as_deref()),
        None => cmd_shell(None, None),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn setup_logging(config: Option<&LogConfig>) {
    if let Err(e) = init_logging(config) {
        eprintln!("[WARN] Logging not initialized: {}", e);
    }
}

/// Load, validate and build a topology
fn load_network(
    config_path: &Path,
    errors: &mut ErrorLog,
) -> Result<(config::Config, Network), String> {
    let cfg = config::load(config_path).map_err(|e| format!("Failed to load config: {}", e))?;
    setup_logging(Some(&cfg.logging));
    info!("Loaded {}", config_path.display());

    let validation = config::validate(&cfg);
    validation.print_diagnostics();
    if validation.has_errors() {
        return Err("Validation failed with errors".to_string());
    }

    let network =
        Network::from_config(&cfg, errors).map_err(|e| format!("Failed to build network: {}", e))?;
    Ok((cfg, network))
}

fn cmd_run(config_path: &Path, ticks: u32) -> Result<(), String> {
    let mut errors = ErrorLog::new();
    let mut stats = Statistics::new();
    let (cfg, mut network) = load_network(config_path, &mut errors)?;

    let sent = config::inject_packets(&cfg, &mut network, &mut stats)
        .map_err(|e| format!("Failed to send packets: {}", e))?;
    info!("Injected {} packets, running {} ticks", sent.len(), ticks);

    let mut total = TickSummary::default();
    for _ in 0..ticks {
        let summary = network.tick(&mut stats, &mut errors);
        println!(
            "Tick {}: delivered={} relayed={} absorbed={} dropped_ttl={} dropped_policy={}",
            network.ticks(),
            summary.delivered,
            summary.relayed,
            summary.absorbed,
            summary.dropped_ttl,
            summary.dropped_policy
        );
        total.merge(summary);
    }

    println!();
    print!("{}", stats);
    if !errors.is_empty() {
        println!("\n{} diagnostics recorded:", errors.len());
        for entry in errors.entries(None) {
            println!("  {}", entry);
        }
    }
    info!("Simulation finished: {:?}", total);
    Ok(())
}

fn cmd_shell(config_path: Option<&Path>, script: Option<&Path>) -> Result<(), String> {
    let mut shell = match config_path {
        Some(path) => {
            let mut errors = ErrorLog::new();
            let mut stats = Statistics::new();
            let (cfg, mut network) = load_network(path, &mut errors)?;
            for entry in errors.entries(None) {
                println!("[WARN] {}", entry);
            }
            let sent = config::inject_packets(&cfg, &mut network, &mut stats)
                .map_err(|e| format!("Failed to send packets: {}", e))?;
            info!("Injected {} packets", sent.len());
            Shell::with_state(network, stats, errors)
        }
        None => {
            setup_logging(None);
            Shell::new()
        }
    };

    let mut stdout = io::stdout();
    match script {
        Some(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
            shell
                .run(BufReader::new(file), &mut stdout, false)
                .map_err(|e| format!("Shell I/O error: {}", e))
        }
        None => {
            println!("lansim shell, type 'help' for commands");
            shell
                .run(io::stdin().lock(), &mut stdout, true)
                .map_err(|e| format!("Shell I/O error: {}", e))
        }
    }
}

fn cmd_config_validate(config_path: &Path) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!(
            "[INFO] Configuration is valid: {} devices, {} links",
            cfg.devices.len(),
            cfg.links.len()
        );
        Ok(())
    }
}
