//! The exported `org.mpris.MediaPlayer2` object.

pub mod surface;

#[cfg(not(windows))]
pub mod dbus_export;

use crate::data::PlayerView;

#[cfg(not(windows))]
pub use dbus_export::{DbusExport, ExportError};

/// Well-known bus name prefix
pub const BUS_NAME_PREFIX: &str = "org.mpris.MediaPlayer2";

/// Object path of the exported player
pub const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";

/// The engine's view of whatever exports its state
pub trait ExportSink: Send {
    /// The state changed; broadcast whatever differs from the last publication
    fn publish(&mut self, view: &PlayerView);

    /// Broadcast `Seeked` with the new position in microseconds
    fn emit_seeked(&mut self, position_us: i64);

    /// Drop the bus registration. Must be idempotent.
    fn release(&mut self);
}

/// Full bus name for a configured suffix
pub fn bus_name(suffix: &str) -> String {
    format!("{}.{}", BUS_NAME_PREFIX, suffix)
}
