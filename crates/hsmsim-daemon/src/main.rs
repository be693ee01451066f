//! hsmsim-daemon: payment HSM simulator.
//!
//! Binds a TCP port and answers the device's framed command protocol so
//! payment switches and test harnesses can run against it instead of real
//! hardware. The LMK, message header, and policy flags are fixed at
//! startup and immutable for the process lifetime.
//!
//! # Fork safety
//!
//! Daemonization via `fork()` must occur before the Tokio runtime starts:
//! `fork()` in a multi-threaded process only duplicates the calling
//! thread and leaves any mutex held by another thread locked forever in
//! the child. The binary therefore uses a synchronous `fn main()` that
//! daemonizes first and only then constructs the runtime.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use hsmsim_core::{HsmContext, Policy};
use hsmsim_daemon::config::{ConfigFile, SimulatorConfig};
use hsmsim_daemon::server::{serve, SimulatorState};

/// hsmsim daemon - payment HSM simulator
#[derive(Parser, Debug)]
#[command(name = "hsmsim-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "hsmsim.toml")]
    config: PathBuf,

    /// TCP port to listen on (default 1500)
    #[arg(short, long)]
    port: Option<u16>,

    /// LMK as 32 hex characters
    #[arg(long)]
    lmk: Option<String>,

    /// Message header every frame must carry
    #[arg(long)]
    header: Option<String>,

    /// Trace frames and parsed fields
    #[arg(long)]
    debug: bool,

    /// Skip odd-parity validation of recovered keys
    #[arg(long)]
    skip_parity: bool,

    /// Report success where the device would report a failure
    #[arg(long)]
    approve_all: bool,

    /// Run in foreground (don't daemonize)
    #[arg(long)]
    no_daemon: bool,

    /// Path to PID file
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log to file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Write the PID file.
fn write_pid_file(pid_path: &PathBuf) -> Result<()> {
    if let Some(parent) = pid_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(pid_path, std::process::id().to_string())?;
    info!("PID file written to {:?}", pid_path);
    Ok(())
}

/// Remove the PID file.
fn remove_pid_file(pid_path: &PathBuf) {
    if pid_path.exists() {
        if let Err(e) = std::fs::remove_file(pid_path) {
            warn!("Failed to remove PID file: {e}");
        }
    }
}

/// Perform daemonization via the double-fork pattern.
///
/// Must be called while the process is still single-threaded; see the
/// crate docs. Returns `Ok(true)` when the caller is the daemon child and
/// `Ok(false)` on platforms without fork.
#[allow(unsafe_code)] // fork() requires unsafe
fn daemonize() -> Result<bool> {
    #[cfg(unix)]
    {
        use nix::unistd::{fork, setsid, ForkResult};

        // SAFETY: called before the Tokio runtime exists, so the process
        // is single-threaded and fork() is well-defined.
        match unsafe { fork() }? {
            ForkResult::Parent { .. } => {
                std::process::exit(0);
            },
            ForkResult::Child => {},
        }

        // New session: lose the controlling terminal.
        setsid()?;

        // SAFETY: still single-threaded; second fork prevents the daemon
        // from ever reacquiring a controlling terminal.
        match unsafe { fork() }? {
            ForkResult::Parent { .. } => {
                std::process::exit(0);
            },
            ForkResult::Child => {},
        }

        std::env::set_current_dir("/")?;

        Ok(true)
    }

    #[cfg(not(unix))]
    {
        Ok(false)
    }
}

/// Synchronous entry point: daemonize first, then start the runtime.
fn main() -> Result<()> {
    let args = Args::parse();

    if !args.no_daemon {
        match daemonize() {
            Ok(true | false) => {},
            Err(e) => {
                // Tracing is not initialised yet.
                eprintln!("Daemonization failed: {e}");
                return Err(e);
            },
        }
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to create Tokio runtime")?;
    runtime.block_on(async_main(args))
}

/// Async entry point; all initialisation and the accept loop live here.
async fn async_main(args: Args) -> Result<()> {
    // Initialise logging. --debug widens the filter so frame and field
    // traces show without a separate log-level flag.
    let level = if args.debug { "debug" } else { &args.log_level };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context("failed to open log file")?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if args.no_daemon {
        info!("Running in foreground mode (--no-daemon)");
    }

    // Load configuration; CLI flags override the file.
    let file = if args.config.exists() {
        ConfigFile::from_file(&args.config)?
    } else {
        info!("No config file found at {:?}, using defaults", args.config);
        ConfigFile::default()
    };
    let cfg = SimulatorConfig::resolve(
        &file,
        args.port,
        args.lmk.clone(),
        args.header.clone(),
        args.debug,
        args.skip_parity,
        args.approve_all,
    );

    // An invalid LMK refuses to start the process.
    let ctx = HsmContext::new(
        &cfg.lmk_hex,
        Policy {
            skip_parity: cfg.skip_parity,
            approve_all: cfg.approve_all,
        },
    )
    .context("invalid LMK configuration")?;

    if let Some(pid_path) = &args.pid_file {
        write_pid_file(pid_path)?;
    }

    let listener = TcpListener::bind(("0.0.0.0", cfg.port))
        .await
        .with_context(|| format!("failed to bind port {}", cfg.port))?;

    info!(
        port = cfg.port,
        header = %String::from_utf8_lossy(&cfg.header),
        skip_parity = cfg.skip_parity,
        approve_all = cfg.approve_all,
        "hsmsim daemon started (pid: {})",
        std::process::id(),
    );

    let state = SimulatorState::new(ctx, cfg.header.clone(), cfg.debug);

    let server_state = state.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = serve(listener, server_state).await {
            tracing::error!("server error: {e}");
        }
    });

    // Signal handling: flag shutdown, let the accept loop drain.
    let signal_state = state.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_state.request_shutdown();
    });

    tokio::select! {
        _ = server_task => {
            info!("server exited");
        }
        _ = signal_task => {
            info!("signal handler triggered shutdown");
        }
    }

    info!("Shutting down daemon...");
    state.request_shutdown();
    if let Some(pid_path) = &args.pid_file {
        remove_pid_file(pid_path);
    }
    info!("Daemon shutdown complete");
    Ok(())
}

/// Resolves when SIGTERM or SIGINT arrives.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C");
    }
}
