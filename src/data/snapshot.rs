/// The normalized player state exported to the bus
use tokio::time::Instant;

use crate::bridge::mapper::MappedStatus;
use crate::bridge::position::PositionClock;
use super::{LoopStatus, Metadata, PlaybackStatus, TrackId};

/// Volume reported while nothing is known about the player
pub const DEFAULT_VOLUME: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MprisSnapshot {
    pub playback_status: PlaybackStatus,
    pub metadata: Metadata,
    pub clock: PositionClock,
    pub loop_status: LoopStatus,
    pub shuffle: bool,
    /// Always within [0, 1]; `None` until the server reported a volume
    pub volume: Option<f64>,
    pub can_seek: bool,
    pub can_control: bool,
}

impl MprisSnapshot {
    /// State shown while the server is unreachable or not configured
    pub fn disconnected() -> Self {
        Self {
            playback_status: PlaybackStatus::Stopped,
            metadata: Metadata::no_track(),
            clock: PositionClock::new(),
            loop_status: LoopStatus::None,
            shuffle: false,
            volume: Some(DEFAULT_VOLUME),
            can_seek: false,
            can_control: false,
        }
    }

    /// Reset to the disconnected state in place
    pub fn disconnect(&mut self, now: Instant) {
        self.set_playback_status(PlaybackStatus::Stopped, now);
        self.clock.set_position(0, now);
        self.metadata = Metadata::no_track();
        self.loop_status = LoopStatus::None;
        self.shuffle = false;
        self.volume = Some(DEFAULT_VOLUME);
        self.can_seek = false;
        self.can_control = false;
    }

    /// Apply a freshly mapped server status
    pub fn apply(&mut self, mapped: &MappedStatus, now: Instant) {
        self.set_playback_status(mapped.playback_status, now);
        self.clock.set_position(mapped.position_us, now);
        self.metadata = mapped.metadata.clone();
        self.loop_status = mapped.loop_status;
        self.shuffle = mapped.shuffle;
        if let Some(volume) = mapped.volume {
            self.set_volume(volume);
        }
        self.can_seek = mapped.can_seek;
        self.can_control = true;
    }

    /// Extrapolated position at `now`, in microseconds
    pub fn position(&self, now: Instant) -> i64 {
        self.clock.extrapolate(self.playback_status, now)
    }

    /// Change the playback status, collapsing elapsed progress under the old status first
    pub fn set_playback_status(&mut self, status: PlaybackStatus, now: Instant) {
        if status != self.playback_status {
            self.clock.reanchor(self.playback_status, now);
        }
        self.playback_status = status;
    }

    pub fn set_position(&mut self, position_us: i64, now: Instant) {
        self.clock.set_position(position_us, now);
    }

    /// Store a volume, clamped to [0, 1]. Non-finite values are ignored.
    pub fn set_volume(&mut self, volume: f64) {
        if volume.is_finite() {
            self.volume = Some(volume.clamp(0.0, 1.0));
        }
    }

    pub fn current_track(&self) -> &TrackId {
        &self.metadata.track_id
    }
}

impl Default for MprisSnapshot {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// Everything the export layer needs to answer property reads
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    /// Root `Identity` property
    pub identity: String,
    pub snapshot: MprisSnapshot,
}

impl PlayerView {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            snapshot: MprisSnapshot::disconnected(),
        }
    }
}
