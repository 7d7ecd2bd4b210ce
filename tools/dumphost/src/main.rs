mod config;
mod env_utils;
mod host_storage;
mod logging;
mod peer;
mod port_detect;
mod serial_link;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use logging::Logger;
use sd_dumper::{MountLoop, SessionConfig, SessionMode};

use config::FileConfig;
use host_storage::{HostControl, HostStorage};

const DEFAULT_BAUD: u32 = 9600;

#[derive(Debug, Parser)]
#[command(name = "dumphost")]
#[command(about = "Serial dump capture and card shell over a host directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Mount the card directory and serve dump or shell sessions.
    Run(RunArgs),
    /// Play the dumping peer on a serial port.
    Peer(PeerArgs),
    /// List serial port candidates.
    Ports,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Dump,
    Shell,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    card: PathBuf,
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud: Option<u32>,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Stop after this many mount cycles instead of running forever.
    #[arg(long)]
    cycles: Option<u32>,
}

#[derive(Debug, Args)]
struct PeerArgs {
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud: Option<u32>,
    #[arg(long, default_value_t = sd_dumper::config::DUMP_LINE_COUNT)]
    lines: u16,
    /// Text file whose lines are sent instead of generated ones.
    #[arg(long)]
    source: Option<PathBuf>,
}

fn session_config(args: &RunArgs) -> Result<SessionConfig> {
    let mut config = SessionConfig::default();
    if let Some(path) = &args.config {
        FileConfig::load(path)?.apply(&mut config)?;
    }
    if let Some(mode) = args.mode {
        config.mode = match mode {
            ModeArg::Dump => SessionMode::Dump,
            ModeArg::Shell => SessionMode::Shell,
        };
    }
    Ok(config)
}

fn run_host(args: RunArgs) -> Result<()> {
    let config = session_config(&args)?;
    let port = env_utils::resolve_port(args.port.clone())?;
    let baud = env_utils::resolve_baud(args.baud, DEFAULT_BAUD)?;
    let link = serial_link::attach(&port, baud, config.timing)?;

    log::info!(
        "host: start card={} mode={:?}",
        args.card.display(),
        config.mode
    );
    let mut mount = MountLoop::new(
        HostStorage::new(&args.card),
        link,
        HostControl::default(),
        config,
    );
    match args.cycles {
        Some(cycles) => {
            mount.run_for(cycles);
            log::info!(
                "host: done cycles={} resets={}",
                cycles,
                mount.control().resets
            );
            Ok(())
        }
        None => mount.run(),
    }
}

fn run_peer(args: PeerArgs) -> Result<()> {
    let port = env_utils::resolve_port(args.port)?;
    let baud = env_utils::resolve_baud(args.baud, DEFAULT_BAUD)?;
    let lines = peer::load_lines(args.source.as_deref(), args.lines)?;
    let serial = serial_link::open_port(&port, baud)?;
    peer::serve(serial, sd_dumper::DumpProtocol::default(), &lines)
}

fn run(cli: Cli) -> Result<()> {
    Logger::from_env()?.install()?;

    match cli.command {
        Commands::Run(args) => run_host(args),
        Commands::Peer(args) => run_peer(args),
        Commands::Ports => {
            for candidate in port_detect::list_candidates() {
                println!("{candidate}");
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
