use std::collections::HashMap;
use std::io::Write;
use log::{debug, info, warn, Level};
use serde::{Deserialize, Serialize};
use env_logger::{Builder, Target, WriteStyle};

/// Available logging subsystems
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoggingSubsystem {
    /// Daemon startup and shutdown
    #[serde(rename = "main")]
    Main,
    /// LMS JSON-RPC client
    #[serde(rename = "lms")]
    Lms,
    /// Poll scheduler, state mapping and command translation
    #[serde(rename = "bridge")]
    Bridge,
    /// Exported MPRIS object
    #[serde(rename = "mpris")]
    Mpris,
    /// Configuration loading and file watching
    #[serde(rename = "config")]
    Config,
    /// HTTP client internals
    #[serde(rename = "http")]
    Http,
    /// D-Bus library internals
    #[serde(rename = "dbus")]
    Dbus,
}

impl LoggingSubsystem {
    /// Get the module prefix for this subsystem
    pub fn module_prefix(&self) -> &'static str {
        match self {
            LoggingSubsystem::Main => "lyrion_mpris",
            LoggingSubsystem::Lms => "lyrion_mpris::players::lms",
            LoggingSubsystem::Bridge => "lyrion_mpris::bridge",
            LoggingSubsystem::Mpris => "lyrion_mpris::mpris",
            LoggingSubsystem::Config => "lyrion_mpris::config,lyrion_mpris::helpers::config_watch",
            LoggingSubsystem::Http => "reqwest,hyper,hyper_util",
            LoggingSubsystem::Dbus => "dbus",
        }
    }

    /// Get all available subsystems
    pub fn all() -> Vec<LoggingSubsystem> {
        vec![
            LoggingSubsystem::Main,
            LoggingSubsystem::Lms,
            LoggingSubsystem::Bridge,
            LoggingSubsystem::Mpris,
            LoggingSubsystem::Config,
            LoggingSubsystem::Http,
            LoggingSubsystem::Dbus,
        ]
    }

    fn parse(name: &str) -> Option<LoggingSubsystem> {
        match name.to_lowercase().as_str() {
            "main" => Some(LoggingSubsystem::Main),
            "lms" => Some(LoggingSubsystem::Lms),
            "bridge" => Some(LoggingSubsystem::Bridge),
            "mpris" => Some(LoggingSubsystem::Mpris),
            "config" => Some(LoggingSubsystem::Config),
            "http" => Some(LoggingSubsystem::Http),
            "dbus" => Some(LoggingSubsystem::Dbus),
            _ => None,
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    Stdout,
    #[default]
    Stderr,
}

/// `logging` section of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub target: LogTarget,

    /// Prefix lines with the local time. Off is useful under journald, which stamps lines itself.
    #[serde(default = "default_true")]
    pub timestamps: bool,

    #[serde(default = "default_true")]
    pub colors: bool,

    /// Per-subsystem levels, keyed by subsystem name or by module path
    #[serde(default)]
    pub subsystems: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            target: LogTarget::default(),
            timestamps: true,
            colors: true,
            subsystems: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Build the environment filter string for env_logger
    pub fn build_filter_string(&self) -> String {
        let mut filter_parts = vec![self.level.clone()];

        let mut subsystems: Vec<_> = self.subsystems.iter().collect();
        subsystems.sort();
        for (name, level) in subsystems {
            match LoggingSubsystem::parse(name) {
                Some(subsystem) => {
                    for prefix in subsystem.module_prefix().split(',') {
                        filter_parts.push(format!("{}={}", prefix.trim(), level));
                    }
                }
                None => filter_parts.push(format!("{}={}", name, level)),
            }
        }

        filter_parts.join(",")
    }

    /// Install the global logger. `RUST_LOG` takes precedence over the file.
    pub fn initialize_logger(&self) -> Result<(), String> {
        let filter_string = self.build_filter_string();

        let mut builder = Builder::new();
        builder
            .parse_filters(&filter_string)
            .parse_env("RUST_LOG")
            .write_style(if self.colors { WriteStyle::Auto } else { WriteStyle::Never })
            .target(match self.target {
                LogTarget::Stdout => Target::Stdout,
                LogTarget::Stderr => Target::Stderr,
            });

        if self.timestamps {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "[{}] [{}] {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.args()
                )
            });
        } else {
            builder.format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));
        }

        builder.try_init()
            .map_err(|e| format!("Failed to initialize logger: {}", e))?;

        debug!("Logging initialized with filter: {}", filter_string);
        Ok(())
    }
}

/// Initialize logging from the config file section and command line flags
pub fn initialize_logging(config: Option<&LoggingConfig>, debug_mode: bool) -> Result<(), String> {
    let mut config = config.cloned().unwrap_or_default();

    if debug_mode {
        config.level = "debug".to_string();
    }

    config.initialize_logger()?;
    if debug_mode {
        info!("Debug mode enabled via command line");
    }
    if config.target == LogTarget::Stdout && config.colors {
        warn!("Colored output on stdout may garble journal logs, consider \"colors\": false");
    }
    Ok(())
}

/// Level of the engine's per-poll and per-command detail traces.
///
/// This replaces a process-wide verbose flag: the engine carries its own value
/// and swaps it when the configuration changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verbosity {
    verbose: bool,
}

impl Verbosity {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Detail traces are promoted to `Info` so they show up with the default filter
    pub fn detail(&self) -> Level {
        if self.verbose {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_string_expands_subsystems() {
        let mut config = LoggingConfig::default();
        config.subsystems.insert("bridge".to_string(), "debug".to_string());
        config.subsystems.insert("http".to_string(), "warn".to_string());
        config.subsystems.insert("my_crate::module".to_string(), "trace".to_string());

        assert_eq!(
            config.build_filter_string(),
            "info,lyrion_mpris::bridge=debug,reqwest=warn,hyper=warn,hyper_util=warn,my_crate::module=trace"
        );
    }

    #[test]
    fn test_parse_partial_config() {
        let config: LoggingConfig = serde_json::from_str(r#"{"level": "warn", "colors": false}"#).unwrap();
        assert_eq!(config.level, "warn");
        assert!(!config.colors);
        assert!(config.timestamps);
        assert_eq!(config.target, LogTarget::Stderr);

        let config: LoggingConfig = serde_json::from_str(r#"{"target": "stdout"}"#).unwrap();
        assert_eq!(config.target, LogTarget::Stdout);
        assert!(serde_json::from_str::<LoggingConfig>(r#"{"target": "syslog"}"#).is_err());
    }

    #[test]
    fn test_every_subsystem_parses_by_name() {
        for subsystem in LoggingSubsystem::all() {
            let name = serde_json::to_value(&subsystem).unwrap();
            let name = name.as_str().unwrap();
            assert!(LoggingSubsystem::parse(name).is_some(), "{} did not parse", name);
        }
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(Verbosity::default().detail(), Level::Debug);
        assert_eq!(Verbosity::new(true).detail(), Level::Info);
        assert!(Verbosity::new(true).is_verbose());
    }
}
