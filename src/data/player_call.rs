/// Inbound calls and property writes arriving from the MPRIS control surface
use serde::{Serialize, Deserialize};
use super::LoopStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerCall {
    /// Simple playback methods
    PlayPause,
    Play,
    Pause,
    Stop,
    Next,
    Previous,

    /// Relative seek, signed offset in microseconds
    Seek(i64),

    /// Absolute seek within the track identified by `track_id`
    SetPosition {
        track_id: String,
        position_us: i64,
    },

    /// Not supported by the bridge, accepted and ignored
    OpenUri(String),

    /// Property writes
    SetShuffle(bool),
    SetLoopStatus(LoopStatus),
    SetVolume(f64),
    SetRate(f64),
}

impl std::fmt::Display for PlayerCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerCall::PlayPause => write!(f, "PlayPause"),
            PlayerCall::Play => write!(f, "Play"),
            PlayerCall::Pause => write!(f, "Pause"),
            PlayerCall::Stop => write!(f, "Stop"),
            PlayerCall::Next => write!(f, "Next"),
            PlayerCall::Previous => write!(f, "Previous"),
            PlayerCall::Seek(offset) => write!(f, "Seek(offset={})", offset),
            PlayerCall::SetPosition { track_id, position_us } => {
                write!(f, "SetPosition(trackId={}, position={})", track_id, position_us)
            }
            PlayerCall::OpenUri(uri) => write!(f, "OpenUri({})", uri),
            PlayerCall::SetShuffle(enabled) => write!(f, "Shuffle={}", enabled),
            PlayerCall::SetLoopStatus(status) => write!(f, "LoopStatus={}", status),
            PlayerCall::SetVolume(volume) => write!(f, "Volume={}", volume),
            PlayerCall::SetRate(rate) => write!(f, "Rate={}", rate),
        }
    }
}
