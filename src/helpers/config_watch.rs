use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::bridge::BridgeHandle;
use crate::config::{BridgeConfig, ConfigOverrides};

/// Watches the configuration file and hands changed settings to the engine.
///
/// The parent directory is watched rather than the file itself so that editors
/// which replace the file on save are picked up too. Dropping the watcher stops it.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// `current` is the configuration as read from the file, before `overrides`
    pub fn start(
        path: &Path,
        current: BridgeConfig,
        overrides: ConfigOverrides,
        engine: BridgeHandle,
    ) -> notify::Result<Self> {
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let watched = path.to_path_buf();
        let mut last = current;
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if !concerns(&event, &watched) {
                        return;
                    }
                    if let Some(config) = reload(&watched, &mut last) {
                        if !engine.reconfigure(overrides.apply(config)) {
                            debug!("Engine stopped, ignoring configuration change");
                        }
                    }
                }
                Err(err) => warn!("Config watch error: {}", err),
            }
        })?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        info!("Watching {:?} for configuration changes", path);

        Ok(Self { _watcher: watcher })
    }
}

fn concerns(event: &Event, path: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p.file_name() == path.file_name())
}

/// Re-read the file. Returns the new configuration if it parsed and differs
/// from `last`, which is updated in that case.
pub fn reload(path: &Path, last: &mut BridgeConfig) -> Option<BridgeConfig> {
    match BridgeConfig::from_file(path) {
        Ok(config) if config == *last => {
            debug!("Configuration file touched but unchanged");
            None
        }
        Ok(config) => {
            info!("Configuration reloaded from {:?}", path);
            *last = config.clone();
            Some(config)
        }
        Err(err) => {
            error!("Ignoring invalid configuration in {:?}: {}", path, err);
            None
        }
    }
}
