/// MPRIS playback status as exported on the bus
use serde::{Serialize, Deserialize};
use strum_macros::EnumString;

/// LMS `mode` value while a track is playing
pub const LMS_MODE_PLAY: &str = "play";
/// LMS `mode` value while playback is paused
pub const LMS_MODE_PAUSE: &str = "pause";
/// LMS `mode` value while playback is stopped
pub const LMS_MODE_STOP: &str = "stop";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString)]
pub enum PlaybackStatus {
    /// A track is playing and the position advances
    Playing,
    /// Playback is paused, position is frozen
    Paused,
    /// Nothing is playing, or the player is unreachable
    Stopped,
}

impl PlaybackStatus {
    /// Map the LMS `mode` field. Anything that is not `play` or `pause` is treated as stopped.
    pub fn from_lms_mode(mode: Option<&str>) -> Self {
        match mode {
            Some(LMS_MODE_PLAY) => PlaybackStatus::Playing,
            Some(LMS_MODE_PAUSE) => PlaybackStatus::Paused,
            _ => PlaybackStatus::Stopped,
        }
    }

    /// MPRIS wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Stopped => "Stopped",
        }
    }
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        PlaybackStatus::Stopped
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_lms_mode() {
        assert_eq!(PlaybackStatus::from_lms_mode(Some("play")), PlaybackStatus::Playing);
        assert_eq!(PlaybackStatus::from_lms_mode(Some("pause")), PlaybackStatus::Paused);
        assert_eq!(PlaybackStatus::from_lms_mode(Some("stop")), PlaybackStatus::Stopped);
        assert_eq!(PlaybackStatus::from_lms_mode(Some("PLAY")), PlaybackStatus::Stopped);
        assert_eq!(PlaybackStatus::from_lms_mode(None), PlaybackStatus::Stopped);
    }

    #[test]
    fn test_wire_strings_round_trip() {
        for status in [PlaybackStatus::Playing, PlaybackStatus::Paused, PlaybackStatus::Stopped] {
            assert_eq!(PlaybackStatus::from_str(status.as_str()).unwrap(), status);
        }
    }
}
