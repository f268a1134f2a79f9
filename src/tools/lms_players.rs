use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use lyrion_mpris::bridge::{map_status, translate, CommandContext};
use lyrion_mpris::config::{default_config_path, BridgeConfig};
use lyrion_mpris::data::{LoopStatus, PlayerCall, TrackId};
use lyrion_mpris::players::lms::{status_request, LmsRpcClient};

/// Command line client for the Lyrion Music Server player the bridge mirrors
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Configuration file to take the connection settings from
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// LMS server hostname or IP address (overrides the config file)
    #[clap(short = 'H', long)]
    host: Option<String>,

    /// LMS server port (overrides the config file)
    #[clap(short, long)]
    port: Option<u16>,

    /// Player ID (MAC address) to control (overrides the config file)
    #[clap(short = 'i', long)]
    player_id: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Clone, Copy, ValueEnum)]
enum Repeat {
    #[value(name = "none")]
    Off,
    Track,
    Playlist,
}

#[derive(Subcommand)]
enum Commands {
    /// List all players known to the server
    ListPlayers,

    /// Show the raw status and what the bridge would export
    Status,

    /// Start playback
    Play,

    /// Pause playback
    Pause,

    /// Toggle between playing and paused
    Toggle,

    /// Stop playback
    Stop,

    /// Skip to the next track
    Next,

    /// Skip to the previous track
    Previous,

    /// Set the volume
    Volume {
        /// Volume level (0-100)
        #[clap(value_parser = clap::value_parser!(u8).range(0..=100))]
        level: u8,
    },

    /// Turn shuffle on (using the configured shuffle mode) or off
    Shuffle {
        #[clap(value_enum)]
        state: Toggle,
    },

    /// Set the repeat mode
    Repeat {
        #[clap(value_enum)]
        mode: Repeat,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info")
    );

    let cli = Cli::parse();

    let mut config = BridgeConfig::load_or_default(cli.config.unwrap_or_else(default_config_path))?;
    if let Some(host) = cli.host {
        config.server_address = host;
    }
    if let Some(port) = cli.port {
        config.server_port = port;
    }
    if let Some(player_id) = cli.player_id {
        config.player_id = player_id;
    }
    let connection = config.connection();
    if connection.host.is_empty() {
        return Err("No server address configured, use --host".into());
    }

    let client = LmsRpcClient::with_reqwest();

    let call = match cli.command {
        Commands::ListPlayers => {
            let players = client.list_players(&connection).await?;
            println!("Available players ({}):", players.len());
            for (i, player) in players.iter().enumerate() {
                println!("{}. {} ({})", i + 1, player.name, player.id);
            }
            return Ok(());
        }
        Commands::Status => {
            if connection.player_id.is_empty() {
                return Err("No player id configured, use --player-id".into());
            }
            let status = client.fetch_status(&connection, &connection.player_id, status_request()).await?;
            println!("{}", serde_json::to_string_pretty(status.raw())?);

            let mapped = map_status(&status, &connection);
            println!("\nExported as:");
            if let Some(identity) = &mapped.identity {
                println!("  Identity: {}", identity);
            }
            println!("  PlaybackStatus: {}", mapped.playback_status);
            println!("  TrackId: {}", mapped.metadata.track_id);
            println!("  Title: {}", mapped.metadata.title.as_deref().unwrap_or("-"));
            println!("  Artist: {}", mapped.metadata.artists.join(", "));
            println!("  Album: {}", mapped.metadata.album.as_deref().unwrap_or("-"));
            println!("  ArtUrl: {}", mapped.metadata.art_url.as_deref().unwrap_or("-"));
            match mapped.metadata.length_us {
                Some(length) => println!("  Position: {} / {} us", mapped.position_us, length),
                None => println!("  Position: {} us", mapped.position_us),
            }
            println!("  LoopStatus: {}", mapped.loop_status);
            println!("  Shuffle: {}", mapped.shuffle);
            match mapped.volume {
                Some(volume) => println!("  Volume: {:.2}", volume),
                None => println!("  Volume: unknown"),
            }
            println!("  CanSeek: {}", mapped.can_seek);
            return Ok(());
        }
        Commands::Play => PlayerCall::Play,
        Commands::Pause => PlayerCall::Pause,
        Commands::Toggle => PlayerCall::PlayPause,
        Commands::Stop => PlayerCall::Stop,
        Commands::Next => PlayerCall::Next,
        Commands::Previous => PlayerCall::Previous,
        Commands::Volume { level } => PlayerCall::SetVolume(f64::from(level) / 100.0),
        Commands::Shuffle { state } => PlayerCall::SetShuffle(matches!(state, Toggle::On)),
        Commands::Repeat { mode } => PlayerCall::SetLoopStatus(match mode {
            Repeat::Off => LoopStatus::None,
            Repeat::Track => LoopStatus::Track,
            Repeat::Playlist => LoopStatus::Playlist,
        }),
    };

    if connection.player_id.is_empty() {
        return Err("No player id configured, use --player-id".into());
    }

    let no_track = TrackId::no_track();
    let context = CommandContext {
        current_track: &no_track,
        shuffle_mode: connection.shuffle_mode,
    };
    match translate(&call, &context).command {
        Some(command) => {
            info!("Sending {} to {}", call, connection.player_id);
            client.request(&connection, &connection.player_id, command).await?;
            println!("{}", call);
        }
        None => println!("Nothing to send for {}", call),
    }
    Ok(())
}
