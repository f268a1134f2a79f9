// Configuration for the Lyrion MPRIS bridge
//
// The configuration lives in a JSON file whose keys mirror the settings schema
// of the desktop preferences (server-address, player-id, ...). The engine never
// reads the file itself: it receives an immutable `ConnectionConfig` snapshot
// per poll cycle and a fresh one whenever the file changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;
use crate::players::lms::jsonrps::JSONRPC_PATH;

/// Name of the directory below the XDG config home
pub const CONFIG_DIR_NAME: &str = "lyrion-mpris";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Identity shown on the bus until the server reports a player name
pub const DEFAULT_IDENTITY: &str = "Lyrion Now Playing";

/// Suffix of the well-known bus name `org.mpris.MediaPlayer2.<suffix>`
pub const DEFAULT_BUS_NAME: &str = "LyrionMprisBridge";

/// Errors raised while loading or validating the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Shuffle granularity used when shuffle is switched on from the desktop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ShuffleModeRepr", into = "i64")]
pub enum ShuffleMode {
    /// `playlist shuffle 1`
    ByTrack,
    /// `playlist shuffle 2`
    ByAlbum,
}

// https://lyrion.org/reference/cli/playlist/#playlist-shuffle
pub const LMS_SHUFFLE_OFF: i64 = 0;
pub const LMS_SHUFFLE_BY_TRACK: i64 = 1;
pub const LMS_SHUFFLE_BY_ALBUM: i64 = 2;

impl ShuffleMode {
    /// Code sent with `playlist shuffle <code>` to enable this mode
    pub fn lms_code(&self) -> i64 {
        match self {
            ShuffleMode::ByTrack => LMS_SHUFFLE_BY_TRACK,
            ShuffleMode::ByAlbum => LMS_SHUFFLE_BY_ALBUM,
        }
    }
}

impl Default for ShuffleMode {
    fn default() -> Self {
        ShuffleMode::ByTrack
    }
}

/// Accepts the numeric LMS code as well as a readable name
#[derive(Deserialize)]
#[serde(untagged)]
enum ShuffleModeRepr {
    Code(i64),
    Name(String),
}

impl From<ShuffleModeRepr> for ShuffleMode {
    fn from(repr: ShuffleModeRepr) -> Self {
        // Anything but album shuffle falls back to track shuffle
        match repr {
            ShuffleModeRepr::Code(LMS_SHUFFLE_BY_ALBUM) => ShuffleMode::ByAlbum,
            ShuffleModeRepr::Name(name) if matches!(name.to_lowercase().as_str(), "by-album" | "album") => ShuffleMode::ByAlbum,
            _ => ShuffleMode::ByTrack,
        }
    }
}

impl From<ShuffleMode> for i64 {
    fn from(mode: ShuffleMode) -> Self {
        mode.lms_code()
    }
}

/// Credentials for the LMS web interface. Either part may be missing.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Build credentials from the raw settings; `None` if both parts are empty
    pub fn from_parts(username: &str, password: &str) -> Option<Self> {
        let non_empty = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        let credentials = Credentials {
            username: non_empty(username),
            password: non_empty(password),
        };
        if credentials.username.is_none() && credentials.password.is_none() {
            None
        } else {
            Some(credentials)
        }
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }
}

// Keep passwords out of debug logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Immutable connection settings for one poll cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub player_id: String,
    pub credentials: Option<Credentials>,
    /// Seconds between polls, at least 1
    pub poll_interval_secs: u64,
    pub shuffle_mode: ShuffleMode,
    /// Embed the credentials in artwork URLs that point at the server
    pub share_artwork_credentials: bool,
}

impl ConnectionConfig {
    /// A poll needs both a server address and a player
    pub fn is_usable(&self) -> bool {
        !self.host.is_empty() && !self.player_id.is_empty()
    }

    /// Base URL without credentials, e.g. `http://192.168.1.10:9000`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// JSON-RPC endpoint
    pub fn rpc_url(&self) -> String {
        format!("{}{}", self.base_url(), JSONRPC_PATH)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Credentials to embed into artwork URLs, if sharing is enabled
    pub fn artwork_credentials(&self) -> Option<&Credentials> {
        if self.share_artwork_credentials {
            self.credentials.as_ref()
        } else {
            None
        }
    }
}

/// Contents of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeConfig {
    /// "http" or "https"
    #[serde(default = "default_scheme")]
    pub server_scheme: String,

    /// Server hostname or IP address; empty means not configured
    #[serde(default)]
    pub server_address: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    /// Player id (usually the MAC address) to mirror
    #[serde(default)]
    pub player_id: String,

    #[serde(default)]
    pub server_username: String,

    #[serde(default)]
    pub server_password: String,

    /// Poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default)]
    pub shuffle_mode: ShuffleMode,

    #[serde(default)]
    pub allow_artwork_credentials: bool,

    #[serde(default)]
    pub verbose_logging: bool,

    /// Fallback MPRIS identity
    #[serde(default = "default_identity")]
    pub identity: String,

    #[serde(default = "default_bus_name")]
    pub bus_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_poll_interval() -> u64 {
    3
}

fn default_identity() -> String {
    DEFAULT_IDENTITY.to_string()
}

fn default_bus_name() -> String {
    DEFAULT_BUS_NAME.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_scheme: default_scheme(),
            server_address: String::new(),
            server_port: default_port(),
            player_id: String::new(),
            server_username: String::new(),
            server_password: String::new(),
            poll_interval: default_poll_interval(),
            shuffle_mode: ShuffleMode::default(),
            allow_artwork_credentials: false,
            verbose_logging: false,
            identity: default_identity(),
            bus_name: default_bus_name(),
            logging: None,
        }
    }
}

impl BridgeConfig {
    /// Load and validate the configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: BridgeConfig = serde_json::from_str(json)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        debug!("Loading configuration from {:?}", path);
        Self::from_file(path)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    fn normalize(&mut self) {
        self.server_scheme = self.server_scheme.trim().to_lowercase();
        self.server_address = self.server_address.trim().to_string();
        self.player_id = self.player_id.trim().to_string();
        self.poll_interval = self.poll_interval.max(1);
        if self.identity.trim().is_empty() {
            self.identity = default_identity();
        }
        if self.bus_name.trim().is_empty() {
            self.bus_name = default_bus_name();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server_scheme != "http" && self.server_scheme != "https" {
            return Err(ConfigError::Invalid(format!("unsupported server-scheme '{}'", self.server_scheme)));
        }
        if self.server_port == 0 {
            return Err(ConfigError::Invalid("server-port must be between 1 and 65535".to_string()));
        }
        Ok(())
    }

    /// Connection snapshot handed to the engine
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            scheme: self.server_scheme.clone(),
            host: self.server_address.clone(),
            port: self.server_port,
            player_id: self.player_id.clone(),
            credentials: Credentials::from_parts(&self.server_username, &self.server_password),
            poll_interval_secs: self.poll_interval.max(1),
            shuffle_mode: self.shuffle_mode,
            share_artwork_credentials: self.allow_artwork_credentials,
        }
    }
}

/// Command line settings that take precedence over the file, including after a reload
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigOverrides {
    pub verbose: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: BridgeConfig) -> BridgeConfig {
        if self.verbose {
            config.verbose_logging = true;
        }
        config
    }
}

/// Default location: `$XDG_CONFIG_HOME/lyrion-mpris/config.json`, falling back to `~/.config`
pub fn default_config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
}
