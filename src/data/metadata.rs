/// Track identity and the MPRIS metadata map
use serde::{Serialize, Deserialize};

/// Object path prefix for MPRIS track ids
pub const TRACK_ID_PREFIX: &str = "/org/mpris/MediaPlayer2/Track/";

/// Track id reported when there is no current track at all
pub const NO_TRACK_ID: &str = "/org/mpris/MediaPlayer2/Track/NoTrack";

/// Opaque, character-restricted identity of the current track.
///
/// Inbound `SetPosition` calls carry this value back, so it is compared
/// verbatim to reject commands aimed at a track that has since changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(String);

impl TrackId {
    /// Build the identity from the server's raw track id.
    ///
    /// Every character outside `[A-Za-z0-9_]` is replaced with `_`. A missing or
    /// empty id yields the placeholder `0`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some(id) if !id.is_empty() => TrackId(format!("{}{}", TRACK_ID_PREFIX, sanitize_id(id))),
            _ => TrackId(format!("{}0", TRACK_ID_PREFIX)),
        }
    }

    /// The reserved identity used when no track is loaded or the server is unreachable
    pub fn no_track() -> Self {
        TrackId(NO_TRACK_ID.to_string())
    }

    pub fn is_no_track(&self) -> bool {
        self.0 == NO_TRACK_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TrackId {
    fn default() -> Self {
        TrackId::no_track()
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replace anything that is not an ASCII letter, digit or underscore with `_`
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Metadata of the current track. Optional fields are only exported when known.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// `mpris:trackid`
    pub track_id: TrackId,
    /// `xesam:title`
    pub title: Option<String>,
    /// `xesam:artist`
    pub artists: Vec<String>,
    /// `xesam:album`
    pub album: Option<String>,
    /// `mpris:artUrl`
    pub art_url: Option<String>,
    /// `mpris:length` in microseconds
    pub length_us: Option<i64>,
}

impl Metadata {
    /// Metadata carrying only the reserved "no track" identity
    pub fn no_track() -> Self {
        Metadata::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_disallowed_characters() {
        assert_eq!(sanitize_id("abc_123"), "abc_123");
        assert_eq!(sanitize_id("-12:34.5"), "_12_34_5");
        assert_eq!(sanitize_id("file:///Music/ä.flac"), "file____Music___flac");
    }

    #[test]
    fn test_track_id_from_raw() {
        assert_eq!(TrackId::from_raw(Some("42")).as_str(), "/org/mpris/MediaPlayer2/Track/42");
        assert_eq!(TrackId::from_raw(Some("-3")).as_str(), "/org/mpris/MediaPlayer2/Track/_3");
        assert_eq!(TrackId::from_raw(None).as_str(), "/org/mpris/MediaPlayer2/Track/0");
        assert_eq!(TrackId::from_raw(Some("")).as_str(), "/org/mpris/MediaPlayer2/Track/0");
    }

    #[test]
    fn test_no_track_is_distinct() {
        let no_track = TrackId::no_track();
        assert!(no_track.is_no_track());
        assert_ne!(no_track, TrackId::from_raw(None));
        assert_ne!(no_track, TrackId::from_raw(Some("0")));
        assert!(!TrackId::from_raw(Some("12345")).is_no_track());
        assert_eq!(Metadata::no_track().track_id, no_track);
    }
}
