/// MPRIS loop status and its LMS repeat-mode counterpart
use serde::{Serialize, Deserialize};
use strum_macros::EnumString;

// https://lyrion.org/reference/cli/playlist/#playlist-repeat
pub const LMS_REPEAT_OFF: i64 = 0;
pub const LMS_REPEAT_TRACK: i64 = 1;
pub const LMS_REPEAT_PLAYLIST: i64 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString)]
pub enum LoopStatus {
    /// Playback stops at the end of the playlist
    None,
    /// The current track repeats
    Track,
    /// The whole playlist repeats
    Playlist,
}

impl LoopStatus {
    /// Map an LMS `playlist repeat` code. Unknown codes mean no repeat.
    pub fn from_lms_repeat(code: i64) -> Self {
        match code {
            LMS_REPEAT_TRACK => LoopStatus::Track,
            LMS_REPEAT_PLAYLIST => LoopStatus::Playlist,
            _ => LoopStatus::None,
        }
    }

    /// Code sent with `playlist repeat <code>`
    pub fn to_lms_repeat(&self) -> i64 {
        match self {
            LoopStatus::None => LMS_REPEAT_OFF,
            LoopStatus::Track => LMS_REPEAT_TRACK,
            LoopStatus::Playlist => LMS_REPEAT_PLAYLIST,
        }
    }

    /// MPRIS wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopStatus::None => "None",
            LoopStatus::Track => "Track",
            LoopStatus::Playlist => "Playlist",
        }
    }
}

impl Default for LoopStatus {
    fn default() -> Self {
        LoopStatus::None
    }
}

impl std::fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
