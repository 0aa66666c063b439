mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use scsi_shell_core::{BusConfig, LogControl, Shell, ShellSettings, SimulatedBus, Variant};
use tracing::{error, info};

use logging::Logging;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Raw SCSI commands
    Aspi,
    /// SMDI sample transfer commands
    Smdi,
}

impl From<Mode> for Variant {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Aspi => Variant::Aspi,
            Mode::Smdi => Variant::Smdi,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive ASPI / SMDI test shell", long_about = None)]
struct Args {
    /// Command set to expose (overrides the config file)
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Bus description (TOML); the built-in demo bus is used otherwise
    #[arg(long)]
    bus: Option<PathBuf>,

    /// Shell settings (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Staging directory for AIF transfers
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Write the demo bus description to this path and exit
    #[arg(long)]
    init_bus: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let logging = Logging::init(args.verbose)?;

    if let Some(path) = &args.init_bus {
        BusConfig::demo()
            .save_to_file(path)
            .with_context(|| format!("writing bus description to {}", path.display()))?;
        println!("Demo bus written to {}", path.display());
        return Ok(());
    }

    let mut settings = match &args.config {
        Some(path) => ShellSettings::load_from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => ShellSettings::default(),
    };
    if let Some(mode) = args.mode {
        settings.variant = mode.into();
    }
    if let Some(dir) = args.staging_dir {
        settings.staging_dir = dir;
    }
    if settings.debug {
        logging.set_debug(true)?;
    }
    if let Some(path) = &settings.log_file {
        logging
            .set_log_file(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
    }

    let bus_config = match &args.bus {
        Some(path) => BusConfig::load_from_file(path)
            .with_context(|| format!("loading bus description from {}", path.display()))?,
        None => BusConfig::demo(),
    };
    info!(
        devices = bus_config.devices.len(),
        variant = settings.variant.name(),
        "Starting shell"
    );
    let bus = SimulatedBus::new(bus_config);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    Shell::new(&bus, settings)
        .with_log_control(&logging)
        .run(stdin.lock(), &mut stdout)
}
