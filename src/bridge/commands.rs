//! Translation of inbound MPRIS calls into LMS commands.
//!
//! `translate` is pure: it decides what to send and which optimistic update to
//! make locally, the engine carries both out.

use serde_json::{json, Value};

use crate::config::{ShuffleMode, LMS_SHUFFLE_OFF};
use crate::data::{LoopStatus, PlayerCall, TrackId};
use super::position::{micros_to_seconds, MICROSECONDS_PER_SECOND};

/// Local state change made without waiting for the next poll
#[derive(Debug, Clone, PartialEq)]
pub enum LocalUpdate {
    /// Move the position by this many microseconds and emit `Seeked`
    SeekBy(i64),
    /// Set the position to this many microseconds and emit `Seeked`
    SeekTo(i64),
    Shuffle(bool),
    LoopStatus(LoopStatus),
    /// Already clamped to [0, 1]
    Volume(f64),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Translation {
    /// Command array for `slim.request`, if anything is sent
    pub command: Option<Vec<Value>>,
    pub local: Option<LocalUpdate>,
    /// Poll again once the command has been sent
    pub refresh_after_send: bool,
}

impl Translation {
    /// Nothing to send, nothing to change
    pub fn ignored() -> Self {
        Self::default()
    }

    fn send(command: Vec<Value>) -> Self {
        Self {
            command: Some(command),
            ..Self::default()
        }
    }

    fn with_local(mut self, local: LocalUpdate) -> Self {
        self.local = Some(local);
        self
    }

    pub fn is_ignored(&self) -> bool {
        self.command.is_none() && self.local.is_none()
    }
}

/// What `translate` needs to know about the current state
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    pub current_track: &'a TrackId,
    pub shuffle_mode: ShuffleMode,
}

/// `time +N` / `time -N`, rounded to whole seconds
fn relative_seconds(offset_us: i64) -> i64 {
    micros_to_seconds(offset_us).round() as i64
}

pub fn translate(call: &PlayerCall, context: &CommandContext<'_>) -> Translation {
    match call {
        PlayerCall::PlayPause => Translation {
            command: Some(vec![json!("pause")]),
            local: None,
            refresh_after_send: true,
        },
        PlayerCall::Play => Translation::send(vec![json!("play")]),
        PlayerCall::Pause => Translation::send(vec![json!("pause"), json!(1)]),
        PlayerCall::Stop => Translation::send(vec![json!("stop")]),
        PlayerCall::Next => Translation::send(vec![json!("playlist"), json!("jump"), json!("+1")]),
        PlayerCall::Previous => Translation::send(vec![json!("playlist"), json!("jump"), json!("-1")]),

        PlayerCall::Seek(offset_us) => {
            let seconds = relative_seconds(*offset_us);
            if seconds == 0 {
                return Translation::ignored();
            }
            let formatted = if seconds > 0 {
                format!("+{}", seconds)
            } else {
                seconds.to_string()
            };
            Translation::send(vec![json!("time"), json!(formatted)])
                .with_local(LocalUpdate::SeekBy(seconds.saturating_mul(MICROSECONDS_PER_SECOND)))
        }

        PlayerCall::SetPosition { track_id, position_us } => {
            // Calls aimed at a track that has since changed, or at no track at all, are dropped
            if context.current_track.is_no_track() || track_id.as_str() != context.current_track.as_str() {
                return Translation::ignored();
            }
            let seconds = position_us.div_euclid(MICROSECONDS_PER_SECOND).max(0);
            Translation::send(vec![json!("time"), json!(seconds)])
                .with_local(LocalUpdate::SeekTo(seconds * MICROSECONDS_PER_SECOND))
        }

        PlayerCall::SetShuffle(enabled) => {
            let code = if *enabled {
                context.shuffle_mode.lms_code()
            } else {
                LMS_SHUFFLE_OFF
            };
            Translation::send(vec![json!("playlist"), json!("shuffle"), json!(code)])
                .with_local(LocalUpdate::Shuffle(*enabled))
        }

        PlayerCall::SetLoopStatus(status) => {
            Translation::send(vec![json!("playlist"), json!("repeat"), json!(status.to_lms_repeat())])
                .with_local(LocalUpdate::LoopStatus(*status))
        }

        PlayerCall::SetVolume(volume) => {
            if !volume.is_finite() {
                return Translation::ignored();
            }
            let percent = (volume * 100.0).round().clamp(0.0, 100.0) as i64;
            Translation::send(vec![json!("mixer"), json!("volume"), json!(percent)])
                .with_local(LocalUpdate::Volume(volume.clamp(0.0, 1.0)))
        }

        // LMS has no variable playback rate
        PlayerCall::SetRate(_) => Translation::ignored(),
        PlayerCall::OpenUri(_) => Translation::ignored(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate_with(call: PlayerCall, shuffle_mode: ShuffleMode) -> Translation {
        let track = TrackId::from_raw(Some("42"));
        translate(&call, &CommandContext { current_track: &track, shuffle_mode })
    }

    fn command(call: PlayerCall) -> Value {
        Value::Array(translate_with(call, ShuffleMode::ByTrack).command.unwrap_or_default())
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(command(PlayerCall::Play), json!(["play"]));
        assert_eq!(command(PlayerCall::Pause), json!(["pause", 1]));
        assert_eq!(command(PlayerCall::Stop), json!(["stop"]));
        assert_eq!(command(PlayerCall::Next), json!(["playlist", "jump", "+1"]));
        assert_eq!(command(PlayerCall::Previous), json!(["playlist", "jump", "-1"]));
    }

    #[test]
    fn test_play_pause_toggles_and_refreshes() {
        let translation = translate_with(PlayerCall::PlayPause, ShuffleMode::ByTrack);
        assert_eq!(translation.command, Some(vec![json!("pause")]));
        assert!(translation.refresh_after_send);
        assert!(!translate_with(PlayerCall::Play, ShuffleMode::ByTrack).refresh_after_send);
    }

    #[test]
    fn test_seek_rounds_to_seconds() {
        let forward = translate_with(PlayerCall::Seek(10_400_000), ShuffleMode::ByTrack);
        assert_eq!(forward.command, Some(vec![json!("time"), json!("+10")]));
        assert_eq!(forward.local, Some(LocalUpdate::SeekBy(10_000_000)));

        let back = translate_with(PlayerCall::Seek(-5_000_000), ShuffleMode::ByTrack);
        assert_eq!(back.command, Some(vec![json!("time"), json!("-5")]));
        assert_eq!(back.local, Some(LocalUpdate::SeekBy(-5_000_000)));

        assert!(translate_with(PlayerCall::Seek(400_000), ShuffleMode::ByTrack).is_ignored());
    }

    #[test]
    fn test_set_position_requires_current_track() {
        let current = translate_with(PlayerCall::SetPosition {
            track_id: "/org/mpris/MediaPlayer2/Track/42".to_string(),
            position_us: 61_900_000,
        }, ShuffleMode::ByTrack);
        assert_eq!(current.command, Some(vec![json!("time"), json!(61)]));
        assert_eq!(current.local, Some(LocalUpdate::SeekTo(61_000_000)));

        let stale = translate_with(PlayerCall::SetPosition {
            track_id: "/org/mpris/MediaPlayer2/Track/41".to_string(),
            position_us: 1_000_000,
        }, ShuffleMode::ByTrack);
        assert!(stale.is_ignored());

        let negative = translate_with(PlayerCall::SetPosition {
            track_id: "/org/mpris/MediaPlayer2/Track/42".to_string(),
            position_us: -2_500_000,
        }, ShuffleMode::ByTrack);
        assert_eq!(negative.command, Some(vec![json!("time"), json!(0)]));
    }

    #[test]
    fn test_set_position_without_track_sends_nothing() {
        let no_track = TrackId::no_track();
        let call = PlayerCall::SetPosition {
            track_id: no_track.as_str().to_string(),
            position_us: 10_000_000,
        };
        let context = CommandContext { current_track: &no_track, shuffle_mode: ShuffleMode::ByTrack };
        assert!(translate(&call, &context).is_ignored());
    }

    #[test]
    fn test_shuffle_uses_preferred_mode() {
        let by_album = translate_with(PlayerCall::SetShuffle(true), ShuffleMode::ByAlbum);
        assert_eq!(by_album.command, Some(vec![json!("playlist"), json!("shuffle"), json!(2)]));
        assert_eq!(by_album.local, Some(LocalUpdate::Shuffle(true)));

        let by_track = translate_with(PlayerCall::SetShuffle(true), ShuffleMode::ByTrack);
        assert_eq!(by_track.command, Some(vec![json!("playlist"), json!("shuffle"), json!(1)]));

        let off = translate_with(PlayerCall::SetShuffle(false), ShuffleMode::ByAlbum);
        assert_eq!(off.command, Some(vec![json!("playlist"), json!("shuffle"), json!(0)]));
    }

    #[test]
    fn test_loop_status_codes() {
        assert_eq!(command(PlayerCall::SetLoopStatus(LoopStatus::None)), json!(["playlist", "repeat", 0]));
        assert_eq!(command(PlayerCall::SetLoopStatus(LoopStatus::Track)), json!(["playlist", "repeat", 1]));
        assert_eq!(command(PlayerCall::SetLoopStatus(LoopStatus::Playlist)), json!(["playlist", "repeat", 2]));
    }

    #[test]
    fn test_volume_scaling() {
        let translation = translate_with(PlayerCall::SetVolume(0.42), ShuffleMode::ByTrack);
        assert_eq!(translation.command, Some(vec![json!("mixer"), json!("volume"), json!(42)]));
        assert_eq!(translation.local, Some(LocalUpdate::Volume(0.42)));

        assert_eq!(command(PlayerCall::SetVolume(1.5)), json!(["mixer", "volume", 100]));
        assert_eq!(command(PlayerCall::SetVolume(-1.0)), json!(["mixer", "volume", 0]));
        assert!(translate_with(PlayerCall::SetVolume(f64::NAN), ShuffleMode::ByTrack).is_ignored());
    }

    #[test]
    fn test_unsupported_calls_are_ignored() {
        assert!(translate_with(PlayerCall::SetRate(2.0), ShuffleMode::ByTrack).is_ignored());
        assert!(translate_with(PlayerCall::OpenUri("file:///x.flac".to_string()), ShuffleMode::ByTrack).is_ignored());
    }
}
