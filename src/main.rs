use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use log::{error, info, warn};

use lyrion_mpris::bridge::{Bridge, EngineChannel};
use lyrion_mpris::config::{default_config_path, BridgeConfig, ConfigOverrides};
use lyrion_mpris::data::PlayerView;
use lyrion_mpris::helpers::ConfigWatcher;
use lyrion_mpris::logging::initialize_logging;
use lyrion_mpris::players::lms::LmsRpcClient;

/// Mirror a Lyrion Music Server player as an MPRIS media player
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/lyrion-mpris/config.json)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    /// Log every poll and command
    #[clap(short, long)]
    verbose: bool,

    /// Do not reload the configuration when the file changes
    #[clap(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let file_config = BridgeConfig::load_or_default(&config_path)?;
    let overrides = ConfigOverrides { verbose: cli.verbose };
    let config = overrides.apply(file_config.clone());

    if let Err(e) = initialize_logging(config.logging.as_ref(), cli.debug) {
        eprintln!("Failed to initialize logging: {}", e);
        let _ = env_logger::try_init();
    }
    info!("lyrion-mpris {} using {:?}", env!("CARGO_PKG_VERSION"), config_path);

    if !config.connection().is_usable() {
        warn!("No server address or player id configured, exporting a disconnected player");
    }

    let channel = EngineChannel::new();
    let handle = channel.handle();
    let sink = start_export(&config, channel.handle())?;
    let bridge = Bridge::with_channel(channel, LmsRpcClient::with_reqwest(), sink, config.clone());
    let engine = tokio::spawn(bridge.run());

    let _watcher = if cli.no_watch {
        None
    } else {
        match ConfigWatcher::start(&config_path, file_config, overrides, handle.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Not watching {:?}: {}", config_path, e);
                None
            }
        }
    };

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    handle.shutdown();

    if let Err(e) = engine.await {
        error!("Engine task failed: {}", e);
    }
    Ok(())
}

#[cfg(not(windows))]
fn start_export(
    config: &BridgeConfig,
    engine: lyrion_mpris::BridgeHandle,
) -> Result<lyrion_mpris::mpris::DbusExport, Box<dyn Error>> {
    let export = lyrion_mpris::mpris::DbusExport::start(&config.bus_name, PlayerView::new(&config.identity), engine)?;
    Ok(export)
}

#[cfg(windows)]
fn start_export(
    _config: &BridgeConfig,
    _engine: lyrion_mpris::BridgeHandle,
) -> Result<NoExport, Box<dyn Error>> {
    Err("MPRIS export requires a D-Bus session bus".into())
}

#[cfg(windows)]
struct NoExport;

#[cfg(windows)]
impl lyrion_mpris::ExportSink for NoExport {
    fn publish(&mut self, _view: &PlayerView) {}
    fn emit_seeked(&mut self, _position_us: i64) {}
    fn release(&mut self) {}
}
