/// Configuration file handling
pub mod config;

/// Logger setup
pub mod logging;

/// Data structures for the exported player state
pub mod data;

/// Lyrion Music Server client
pub mod players;

/// Status mapping, command translation and the polling engine
pub mod bridge;

/// The exported MPRIS object
pub mod mpris;

/// Helper utilities
pub mod helpers;

pub use bridge::{Bridge, BridgeHandle, EngineChannel};
pub use config::BridgeConfig;
pub use data::{MprisSnapshot, PlayerView};
pub use mpris::ExportSink;
pub use players::lms::LmsRpcClient;
