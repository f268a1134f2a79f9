//! Pure mapping from a raw LMS status to normalized MPRIS state.

use crate::config::ConnectionConfig;
use crate::data::{LoopStatus, Metadata, PlaybackStatus, TrackId};
use crate::players::lms::{resolve_artwork_url, ArtworkOptions, RawStatus, Track};
use super::position::seconds_to_micros;

pub const UNKNOWN_ARTIST: &str = "Unknown artist";
pub const UNKNOWN_TITLE: &str = "Unknown track";

/// Result of mapping one status response
#[derive(Debug, Clone, PartialEq)]
pub struct MappedStatus {
    /// Player display name, if the server reported one
    pub identity: Option<String>,
    pub playback_status: PlaybackStatus,
    pub metadata: Metadata,
    /// Measured position in microseconds, never negative
    pub position_us: i64,
    pub loop_status: LoopStatus,
    pub shuffle: bool,
    /// Within [0, 1]; `None` when the status carried no usable volume
    pub volume: Option<f64>,
    pub can_seek: bool,
}

/// Clamp a raw percentage to [0, 100] and scale it to [0, 1]
pub fn normalize_volume_percent(percent: f64) -> Option<f64> {
    if percent.is_finite() {
        Some(percent.clamp(0.0, 100.0) / 100.0)
    } else {
        None
    }
}

/// First field present in track, then remote metadata, then the status itself
fn first_of<F>(track: Option<&Track>, remote: Option<&Track>, status: &Track, field: F) -> Option<String>
where
    F: Fn(&Track) -> Option<&String>,
{
    track.and_then(&field)
        .or_else(|| remote.and_then(&field))
        .or_else(|| field(status))
        .cloned()
}

fn map_metadata(raw: &RawStatus, config: &ConnectionConfig, duration_s: Option<f64>) -> Metadata {
    let track = raw.track();
    let remote = raw.remote_meta();

    // An empty playlist without a remote stream has no current track at all
    if track.is_none() && remote.is_none() {
        return Metadata::no_track();
    }

    let status = raw.status_fields();
    let (track, remote) = (track.as_ref(), remote.as_ref());

    let raw_id = track.and_then(|t| t.id.as_deref()).or(status.id.as_deref());
    let art_url = resolve_artwork_url(
        track,
        remote,
        &status,
        config,
        ArtworkOptions { include_icon_fallback: true },
    );

    Metadata {
        track_id: TrackId::from_raw(raw_id),
        title: Some(first_of(track, remote, &status, |t| t.title.as_ref())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string())),
        artists: vec![first_of(track, remote, &status, |t| t.artist.as_ref())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())],
        album: first_of(track, remote, &status, |t| t.album.as_ref()),
        art_url,
        length_us: duration_s.map(seconds_to_micros),
    }
}

/// Map a raw status to the normalized state
pub fn map_status(raw: &RawStatus, config: &ConnectionConfig) -> MappedStatus {
    let playback_status = PlaybackStatus::from_lms_mode(raw.mode());
    let duration_s = raw.duration_seconds();
    let can_seek = duration_s.is_some();

    let mut position_us = raw.elapsed_seconds().map(seconds_to_micros).unwrap_or(0).max(0);
    if playback_status == PlaybackStatus::Playing && can_seek && position_us <= 0 {
        // Some consumers treat 0 as "not progressing"
        position_us = 1;
    }

    MappedStatus {
        identity: raw.player_name(),
        playback_status,
        metadata: map_metadata(raw, config, duration_s),
        position_us,
        loop_status: LoopStatus::from_lms_repeat(raw.repeat_code()),
        shuffle: raw.shuffle_code() != 0,
        volume: raw.volume_percent().and_then(normalize_volume_percent),
        can_seek,
    }
}
