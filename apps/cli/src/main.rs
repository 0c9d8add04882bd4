use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pl81_core::device::Panel;
use pl81_core::endpoint::list_ports;
use pl81_core::protocol::constants::DEFAULT_TEMP_K;
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Neewer PL81-Pro serial toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the transparent sniffer between a client app and the panel
    Sniff {
        /// Real device path (default: autodiscover the CH340 bridge)
        #[arg(long)]
        device: Option<String>,

        /// Baud rate for the device side
        #[arg(long)]
        baud: Option<u32>,

        /// Directory for capture logs
        #[arg(long)]
        capture_dir: Option<PathBuf>,

        /// Load relay settings from a TOML file (flags still override)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Power the panel on
    On,
    /// Power the panel off
    Off,
    /// Set brightness (0-100 %) and optional color temperature in Kelvin
    Set {
        brightness: u8,
        /// 2900-7000 K, default 4950 K
        kelvin: Option<u16>,
    },
    /// Listen for a status frame (turn the panel's knob to trigger one)
    Status {
        /// Listen window in seconds
        #[arg(long, default_value_t = 3)]
        window: u64,
    },
    /// List candidate serial ports
    Ports,
}

fn main() {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if cli.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(cli) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sniff {
            device,
            baud,
            capture_dir,
            config,
        } => run_sniff(device, baud, capture_dir, config),
        Commands::On => {
            Panel::open().context("open panel")?.power(true)?;
            println!("Power on sent.");
            Ok(())
        }
        Commands::Off => {
            Panel::open().context("open panel")?.power(false)?;
            println!("Power off sent.");
            Ok(())
        }
        Commands::Set { brightness, kelvin } => {
            let mut panel = Panel::open().context("open panel")?;
            let applied = panel.set_cct(brightness, kelvin.unwrap_or(DEFAULT_TEMP_K))?;
            println!(
                "brightness={}% temp={}K (0x{:02x})",
                applied.brightness, applied.kelvin, applied.temp_code
            );
            Ok(())
        }
        Commands::Status { window } => {
            let mut panel = Panel::open().context("open panel")?;
            println!("Listening for status frames ({window}s)...");
            println!("(Turn the knob on the panel to trigger a status update)");
            match panel.read_status(Duration::from_secs(window))? {
                Some(status) => {
                    let checksum_note = if status.checksum_valid {
                        ""
                    } else {
                        "  [checksum mismatch]"
                    };
                    println!(
                        "mode=0x{:02x} brightness={}% temp={}K (0x{:02x}){}",
                        status.mode,
                        status.brightness,
                        status.kelvin,
                        status.temp_code,
                        checksum_note
                    );
                }
                None => println!("No status frame seen."),
            }
            Ok(())
        }
        Commands::Ports => {
            for line in list_ports()? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

#[cfg(unix)]
fn run_sniff(
    device: Option<String>,
    baud: Option<u32>,
    capture_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    use pl81_core::relay::{RelayConfig, RelaySession};

    let mut relay_config = match config {
        Some(path) => RelayConfig::load_from_file(&path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => RelayConfig::default(),
    };
    if device.is_some() {
        relay_config.device_port = device;
    }
    if let Some(baud) = baud {
        relay_config.baud = baud;
    }
    if let Some(dir) = capture_dir {
        relay_config.capture_dir = dir;
    }

    let mut session = RelaySession::open(&relay_config)?;
    install_stop_signals(session.stop_handle());

    println!();
    println!("Real device:   {}", session.device_path());
    println!("Virtual port:  {}", session.client_path());
    println!();
    println!("Close the vendor app first, then reopen it and point it at the");
    println!("virtual port. Use it normally; every byte is logged. Ctrl+C stops.");
    println!();

    let result = session.run();
    let (from_client, from_device) = session.totals();
    println!();
    println!("Capture complete");
    println!("  App → Light:  {from_client} bytes");
    println!("  Light → App:  {from_device} bytes");
    result?;
    Ok(())
}

#[cfg(not(unix))]
fn run_sniff(
    _device: Option<String>,
    _baud: Option<u32>,
    _capture_dir: Option<PathBuf>,
    _config: Option<PathBuf>,
) -> Result<()> {
    anyhow::bail!("the sniffer needs a Unix host for pseudo-terminal support")
}

/// SIGINT/SIGTERM only flip the session's stop flag; cleanup and the final
/// counter report happen on the relay thread.
#[cfg(unix)]
fn install_stop_signals(stop: pl81_core::relay::StopHandle) {
    use std::sync::OnceLock;

    static STOP: OnceLock<pl81_core::relay::StopHandle> = OnceLock::new();
    let _ = STOP.set(stop);

    extern "C" fn on_signal(_sig: libc::c_int) {
        if let Some(handle) = STOP.get() {
            handle.request_stop();
        }
    }

    let handler: extern "C" fn(libc::c_int) = on_signal;
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}
