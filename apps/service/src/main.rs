mod config;
mod loader;
mod render;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use netcheck::prober::parse_address;
use netcheck::{Engine, Prober, StatusEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use config::Settings;
use render::Presenter;

/// Watch the reachability of configured network devices
#[derive(Debug, Parser)]
#[command(name = "netcheck", version, about)]
struct Cli {
    /// Settings file (defaults to ~/.config/netcheck/settings.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Device configuration file, overrides $NETCHECK_DEVICES and the settings
    #[arg(long, global = true)]
    devices: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll every configured interface (default). Send SIGHUP to reload.
    Run,
    /// Validate a device configuration and make it the active one
    Import { file: PathBuf },
    /// Probe a single address once
    Check { address: String },
    /// Print the effective settings
    Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::from_config(cli.settings.as_deref())?;
    settings.apply_env();
    if let Some(devices) = cli.devices {
        settings.paths.devices = Some(devices);
    }

    let _log_guard = match settings.log_path() {
        Ok(path) => logger::init_with_file(&path),
        Err(e) => {
            logger::init();
            warn!("Logging to stderr only: {e}");
            None
        }
    };
    info!("--- Application Started ---");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(settings).await,
        Command::Import { file } => import(&settings, &file).await,
        Command::Check { address } => check(&settings, &address).await,
        Command::Settings => {
            println!("{settings}");
            Ok(())
        }
    }
}

async fn run(settings: Settings) -> Result<()> {
    let devices_path = settings.devices_path()?;
    let prober: Arc<dyn Prober> = Arc::new(settings.prober());
    let mut engine = Engine::new(prober, settings.poll_settings());
    let mut presenter = Presenter::new(io::stdout());
    let mut events = engine.view().subscribe();
    let mut reload_signal = ReloadSignal::new()?;

    info!(path = %devices_path.display(), "Watching device configuration");
    reload(&mut engine, &devices_path, &mut presenter).await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Shutting down");
                break;
            }
            _ = reload_signal.recv() => {
                info!("Reload requested");
                reload(&mut engine, &devices_path, &mut presenter).await?;
            }
            event = events.recv() => match event {
                Ok(StatusEvent::Updated(record)) => presenter.update(&record)?,
                Ok(StatusEvent::Reloaded { .. }) => {
                    presenter.full(&engine.registry(), &engine.view())?
                }
                Ok(StatusEvent::Removed(_)) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Status display fell behind, redrawing");
                    presenter.full(&engine.registry(), &engine.view())?;
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine.shutdown().await;
    Ok(())
}

/// Load the device configuration and apply it. Configuration problems are
/// shown to the user and leave the running pollers alone.
async fn reload(
    engine: &mut Engine,
    path: &Path,
    presenter: &mut Presenter<io::Stdout>,
) -> io::Result<()> {
    match loader::load_registry(path).await {
        Ok(registry) => {
            engine.apply(registry).await;
            Ok(())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Device configuration rejected");
            presenter.load_error(&e)
        }
    }
}

async fn import(settings: &Settings, file: &Path) -> Result<()> {
    let destination = settings.devices_path()?;
    let registry = loader::import(file, &destination).await?;

    println!(
        "Imported {} devices ({} interfaces) into {}",
        registry.devices().len(),
        registry.len(),
        destination.display()
    );
    println!("Send SIGHUP to a running netcheck to pick it up");
    Ok(())
}

async fn check(settings: &Settings, address: &str) -> Result<()> {
    let address = parse_address(address)?;
    let prober = settings.prober();

    info!(%address, port = prober.port(), "Checking device");
    match prober.probe(address).await {
        Ok(outcome) => {
            info!(%address, %outcome, "Check finished");
            println!("{address}: {}", if outcome.is_reachable() { "Online" } else { "Offline" });
        }
        Err(e) => {
            warn!(%address, error = %e, "Check failed");
            println!("{address}: Offline ({e})");
        }
    }
    Ok(())
}

/// SIGHUP on unix, never fires elsewhere
struct ReloadSignal {
    #[cfg(unix)]
    hangup: Option<tokio::signal::unix::Signal>,
}

impl ReloadSignal {
    #[cfg(unix)]
    fn new() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self { hangup: Some(signal(SignalKind::hangup())?) })
    }

    #[cfg(not(unix))]
    fn new() -> io::Result<Self> {
        Ok(Self {})
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        if let Some(hangup) = &mut self.hangup {
            if hangup.recv().await.is_some() {
                return;
            }
            self.hangup = None;
        }
        std::future::pending::<()>().await
    }
}
