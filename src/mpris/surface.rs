//! Property and method tables of the exported MPRIS object.
//!
//! Every property is an explicit entry: a getter over the current
//! [`PlayerView`] and, for writable properties, a setter that turns the written
//! value into a [`PlayerCall`] for the engine. Methods work the same way.

use std::collections::HashMap;
use std::str::FromStr;

use tokio::time::Instant;

use crate::data::snapshot::DEFAULT_VOLUME;
use crate::data::{LoopStatus, Metadata, PlayerCall, PlayerView};

pub const ROOT_INTERFACE: &str = "org.mpris.MediaPlayer2";
pub const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";

/// Rate is pinned, LMS has no variable-rate transport
pub const FIXED_RATE: f64 = 1.0;

/// Typed property value, independent of the bus library
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Double(f64),
    Int64(i64),
    Str(String),
    StrList(Vec<String>),
    Metadata(Metadata),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurfaceError {
    #[error("No such property {0}.{1}")]
    UnknownProperty(String, String),

    #[error("Property {0} is read-only")]
    ReadOnly(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("No such method {0}.{1}")]
    UnknownMethod(String, String),
}

type Getter = fn(&PlayerView, Instant) -> PropValue;
type Setter = fn(&PropValue) -> Result<PlayerCall, SurfaceError>;

pub struct PropertyEntry {
    pub interface: &'static str,
    pub name: &'static str,
    pub get: Getter,
    pub set: Option<Setter>,
}

pub static PROPERTIES: &[PropertyEntry] = &[
    // org.mpris.MediaPlayer2
    PropertyEntry { interface: ROOT_INTERFACE, name: "CanQuit", get: |_, _| PropValue::Bool(false), set: None },
    PropertyEntry { interface: ROOT_INTERFACE, name: "CanRaise", get: |_, _| PropValue::Bool(false), set: None },
    PropertyEntry { interface: ROOT_INTERFACE, name: "HasTrackList", get: |_, _| PropValue::Bool(false), set: None },
    PropertyEntry { interface: ROOT_INTERFACE, name: "Identity", get: |view, _| PropValue::Str(view.identity.clone()), set: None },
    PropertyEntry { interface: ROOT_INTERFACE, name: "DesktopEntry", get: |_, _| PropValue::Str(String::new()), set: None },
    PropertyEntry { interface: ROOT_INTERFACE, name: "SupportedUriSchemes", get: |_, _| PropValue::StrList(Vec::new()), set: None },
    PropertyEntry { interface: ROOT_INTERFACE, name: "SupportedMimeTypes", get: |_, _| PropValue::StrList(Vec::new()), set: None },

    // org.mpris.MediaPlayer2.Player
    PropertyEntry {
        interface: PLAYER_INTERFACE,
        name: "PlaybackStatus",
        get: |view, _| PropValue::Str(view.snapshot.playback_status.as_str().to_string()),
        set: None,
    },
    PropertyEntry {
        interface: PLAYER_INTERFACE,
        name: "LoopStatus",
        get: |view, _| PropValue::Str(view.snapshot.loop_status.as_str().to_string()),
        set: Some(set_loop_status),
    },
    PropertyEntry {
        interface: PLAYER_INTERFACE,
        name: "Rate",
        get: |view, _| PropValue::Double(view.snapshot.clock.rate()),
        set: Some(set_rate),
    },
    PropertyEntry {
        interface: PLAYER_INTERFACE,
        name: "Shuffle",
        get: |view, _| PropValue::Bool(view.snapshot.shuffle),
        set: Some(set_shuffle),
    },
    PropertyEntry {
        interface: PLAYER_INTERFACE,
        name: "Metadata",
        get: |view, _| PropValue::Metadata(view.snapshot.metadata.clone()),
        set: None,
    },
    PropertyEntry {
        interface: PLAYER_INTERFACE,
        name: "Volume",
        get: |view, _| PropValue::Double(view.snapshot.volume.unwrap_or(DEFAULT_VOLUME)),
        set: Some(set_volume),
    },
    PropertyEntry {
        interface: PLAYER_INTERFACE,
        name: "Position",
        get: |view, now| PropValue::Int64(view.snapshot.position(now)),
        set: None,
    },
    PropertyEntry { interface: PLAYER_INTERFACE, name: "MinimumRate", get: |_, _| PropValue::Double(FIXED_RATE), set: None },
    PropertyEntry { interface: PLAYER_INTERFACE, name: "MaximumRate", get: |_, _| PropValue::Double(FIXED_RATE), set: None },
    PropertyEntry { interface: PLAYER_INTERFACE, name: "CanGoNext", get: |view, _| PropValue::Bool(view.snapshot.can_control), set: None },
    PropertyEntry { interface: PLAYER_INTERFACE, name: "CanGoPrevious", get: |view, _| PropValue::Bool(view.snapshot.can_control), set: None },
    PropertyEntry { interface: PLAYER_INTERFACE, name: "CanPlay", get: |view, _| PropValue::Bool(view.snapshot.can_control), set: None },
    PropertyEntry { interface: PLAYER_INTERFACE, name: "CanPause", get: |view, _| PropValue::Bool(view.snapshot.can_control), set: None },
    PropertyEntry { interface: PLAYER_INTERFACE, name: "CanSeek", get: |view, _| PropValue::Bool(view.snapshot.can_seek), set: None },
    PropertyEntry { interface: PLAYER_INTERFACE, name: "CanControl", get: |view, _| PropValue::Bool(view.snapshot.can_control), set: None },
];

fn set_loop_status(value: &PropValue) -> Result<PlayerCall, SurfaceError> {
    match value {
        PropValue::Str(s) => LoopStatus::from_str(s)
            .map(PlayerCall::SetLoopStatus)
            .map_err(|_| SurfaceError::InvalidValue("LoopStatus", s.clone())),
        other => Err(SurfaceError::InvalidValue("LoopStatus", format!("{:?}", other))),
    }
}

fn set_rate(value: &PropValue) -> Result<PlayerCall, SurfaceError> {
    match value {
        PropValue::Double(rate) => Ok(PlayerCall::SetRate(*rate)),
        other => Err(SurfaceError::InvalidValue("Rate", format!("{:?}", other))),
    }
}

fn set_shuffle(value: &PropValue) -> Result<PlayerCall, SurfaceError> {
    match value {
        PropValue::Bool(enabled) => Ok(PlayerCall::SetShuffle(*enabled)),
        other => Err(SurfaceError::InvalidValue("Shuffle", format!("{:?}", other))),
    }
}

fn set_volume(value: &PropValue) -> Result<PlayerCall, SurfaceError> {
    match value {
        PropValue::Double(volume) => Ok(PlayerCall::SetVolume(*volume)),
        other => Err(SurfaceError::InvalidValue("Volume", format!("{:?}", other))),
    }
}

pub fn find_property(interface: &str, name: &str) -> Result<&'static PropertyEntry, SurfaceError> {
    PROPERTIES.iter()
        .find(|p| p.interface == interface && p.name == name)
        .ok_or_else(|| SurfaceError::UnknownProperty(interface.to_string(), name.to_string()))
}

pub fn get_property(view: &PlayerView, interface: &str, name: &str, now: Instant) -> Result<PropValue, SurfaceError> {
    find_property(interface, name).map(|entry| (entry.get)(view, now))
}

/// All properties of one interface, in table order
pub fn get_all(view: &PlayerView, interface: &str, now: Instant) -> Vec<(&'static str, PropValue)> {
    PROPERTIES.iter()
        .filter(|p| p.interface == interface)
        .map(|p| (p.name, (p.get)(view, now)))
        .collect()
}

/// Turn a property write into an engine call
pub fn set_property(interface: &str, name: &str, value: &PropValue) -> Result<PlayerCall, SurfaceError> {
    let entry = find_property(interface, name)?;
    match entry.set {
        Some(set) => set(value),
        None => Err(SurfaceError::ReadOnly(entry.name)),
    }
}

/// Arguments of an inbound method call, already decoded from the bus
#[derive(Debug, Clone, PartialEq)]
pub enum MethodArgs {
    None,
    /// `Seek(x)`
    Offset(i64),
    /// `SetPosition(ox)`
    Position { track_id: String, position_us: i64 },
    /// `OpenUri(s)`
    Uri(String),
}

type Handler = fn(MethodArgs) -> Option<PlayerCall>;

pub struct MethodEntry {
    pub interface: &'static str,
    pub name: &'static str,
    /// D-Bus input signature
    pub signature: &'static str,
    pub handler: Handler,
}

pub static METHODS: &[MethodEntry] = &[
    // Neither is supported; both are accepted as no-ops
    MethodEntry { interface: ROOT_INTERFACE, name: "Raise", signature: "", handler: |_| None },
    MethodEntry { interface: ROOT_INTERFACE, name: "Quit", signature: "", handler: |_| None },

    MethodEntry { interface: PLAYER_INTERFACE, name: "Next", signature: "", handler: |_| Some(PlayerCall::Next) },
    MethodEntry { interface: PLAYER_INTERFACE, name: "Previous", signature: "", handler: |_| Some(PlayerCall::Previous) },
    MethodEntry { interface: PLAYER_INTERFACE, name: "Pause", signature: "", handler: |_| Some(PlayerCall::Pause) },
    MethodEntry { interface: PLAYER_INTERFACE, name: "PlayPause", signature: "", handler: |_| Some(PlayerCall::PlayPause) },
    MethodEntry { interface: PLAYER_INTERFACE, name: "Stop", signature: "", handler: |_| Some(PlayerCall::Stop) },
    MethodEntry { interface: PLAYER_INTERFACE, name: "Play", signature: "", handler: |_| Some(PlayerCall::Play) },
    MethodEntry {
        interface: PLAYER_INTERFACE,
        name: "Seek",
        signature: "x",
        handler: |args| match args {
            MethodArgs::Offset(offset) => Some(PlayerCall::Seek(offset)),
            _ => None,
        },
    },
    MethodEntry {
        interface: PLAYER_INTERFACE,
        name: "SetPosition",
        signature: "ox",
        handler: |args| match args {
            MethodArgs::Position { track_id, position_us } => Some(PlayerCall::SetPosition { track_id, position_us }),
            _ => None,
        },
    },
    MethodEntry {
        interface: PLAYER_INTERFACE,
        name: "OpenUri",
        signature: "s",
        handler: |args| match args {
            MethodArgs::Uri(uri) => Some(PlayerCall::OpenUri(uri)),
            _ => None,
        },
    },
];

pub fn find_method(interface: &str, name: &str) -> Result<&'static MethodEntry, SurfaceError> {
    METHODS.iter()
        .find(|m| m.interface == interface && m.name == name)
        .ok_or_else(|| SurfaceError::UnknownMethod(interface.to_string(), name.to_string()))
}

/// Properties that never go into `PropertiesChanged`; `Seeked` covers position jumps
const UNANNOUNCED: &[&str] = &["Position"];

/// Changed properties of one interface
pub type InterfaceChanges = (&'static str, Vec<(&'static str, PropValue)>);

/// Remembers the values last announced on the bus so that only real changes
/// are broadcast
#[derive(Debug, Default)]
pub struct ChangeTracker {
    announced: HashMap<(&'static str, &'static str), PropValue>,
}

impl ChangeTracker {
    /// Start from the values a client would read right now
    pub fn new(view: &PlayerView, now: Instant) -> Self {
        let mut tracker = Self::default();
        tracker.changes(view, now);
        tracker
    }

    /// Properties whose value differs from the last announcement, grouped by
    /// interface. Interfaces without changes are left out.
    pub fn changes(&mut self, view: &PlayerView, now: Instant) -> Vec<InterfaceChanges> {
        let mut result = Vec::new();
        for interface in [ROOT_INTERFACE, PLAYER_INTERFACE] {
            let mut changed = Vec::new();
            for (name, value) in get_all(view, interface, now) {
                if UNANNOUNCED.contains(&name) {
                    continue;
                }
                if self.announced.get(&(interface, name)) != Some(&value) {
                    self.announced.insert((interface, name), value.clone());
                    changed.push((name, value));
                }
            }
            if !changed.is_empty() {
                result.push((interface, changed));
            }
        }
        result
    }
}
