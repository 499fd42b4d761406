//! btbridged: IPMI BT bridge daemon.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BtBmcDevice        SocketBus          TimerFdDeadline         │
//! │  (BtDevice)         (IpcBus)           (DeadlineTimer)         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │                Bridge (pure logic)                     │    │
//! │  │  PendingQueue · DeadlineScheduler · codec              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  events::run (poll loop) · ConsoleLogger                       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use btbridge::adapters::bt_device::BtBmcDevice;
use btbridge::adapters::ipc_socket::SocketBus;
use btbridge::adapters::log_sink;
use btbridge::adapters::timer::TimerFdDeadline;
use btbridge::app::service::Bridge;
use btbridge::config::BridgeConfig;
use btbridge::events;

/// Bridge IPMI BT host requests onto a local IPC socket.
#[derive(Debug, Parser)]
#[command(name = "btbridged", version)]
struct Args {
    /// BT character device to use
    #[arg(short, long, value_name = "PATH")]
    device: Option<PathBuf>,

    /// Path to bind the IPC datagram socket at
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Per-request response timeout in milliseconds
    #[arg(short, long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v progress, -vv message dumps)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log to syslog (LOG_DAEMON) instead of the console
    #[arg(short = 's', long)]
    syslog: bool,
}

impl Args {
    /// Defaults, then the config file, then flags.
    fn resolve(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => BridgeConfig::default(),
        };
        if let Some(device) = &self.device {
            config.device_path.clone_from(device);
        }
        if let Some(socket) = &self.socket {
            config.socket_path.clone_from(socket);
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = ms;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.syslog {
        log_sink::init_syslog(args.verbose).context("connecting to syslog")?;
    } else {
        log_sink::init(args.verbose).context("installing logger")?;
    }
    info!("btbridged v{} starting", env!("CARGO_PKG_VERSION"));

    let config = args.resolve()?;
    events::install_signal_handlers().context("installing signal handlers")?;

    info!("Opening {}", config.device_path.display());
    let mut dev = BtBmcDevice::open(&config.device_path).with_context(|| {
        format!(
            "Couldn't open {} with flags O_RDWR",
            config.device_path.display()
        )
    })?;

    info!("Creating timer fd");
    let timer = TimerFdDeadline::new().context("Couldn't create timerfd")?;

    info!("Binding IPC socket {}", config.socket_path.display());
    let mut bus = SocketBus::bind(&config.socket_path).with_context(|| {
        format!("Couldn't bind {}", config.socket_path.display())
    })?;

    let mut bridge = Bridge::with_max_frame(timer, config.timeout(), config.max_frame_len);
    let outcome = events::run(&mut bridge, &mut dev, &mut bus);
    bridge.shutdown();
    outcome.context("event loop failed")?;

    info!("Shutting down");
    Ok(())
}
