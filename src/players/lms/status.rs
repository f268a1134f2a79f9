//! Raw LMS status payloads.
//!
//! LMS reports the same information under different names depending on the
//! server version and the endpoint (`playlist shuffle`, `playlist_shuffle`,
//! `playlistShuffle`, ...). Every such field is resolved through an explicit,
//! ordered precedence table below instead of probing ad hoc.

use serde_json::{Map, Value};

/// Which block of the status payload a field is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// `playlist_loop[0]`, the current track
    Track,
    /// `remoteMeta`, metadata of a remote stream
    Remote,
    /// Top-level status fields
    Status,
}

/// Duration candidates: track level first, then playlist level
pub const DURATION_FIELDS: &[(Block, &str)] = &[
    (Block::Track, "duration"),
    (Block::Status, "duration"),
    (Block::Remote, "duration"),
    (Block::Status, "playlist_duration"),
    (Block::Status, "playlistDuration"),
    (Block::Status, "playlist duration"),
];

pub const SHUFFLE_FIELDS: &[&[&str]] = &[
    &["playlist_shuffle"],
    &["playlistShuffle"],
    &["playlist shuffle"],
];

pub const REPEAT_FIELDS: &[&[&str]] = &[
    &["playlist_repeat"],
    &["playlistRepeat"],
    &["playlist repeat"],
];

pub const VOLUME_FIELDS: &[&[&str]] = &[
    &["mixer", "volume"],
    &["mixer volume"],
    &["volume"],
];

pub const PLAYER_NAME_FIELDS: &[&[&str]] = &[
    &["player_name"],
    &["playername"],
    &["player name"],
];

/// Elapsed seconds of the current track
pub const ELAPSED_FIELD: &str = "time";

/// Parse a JSON number or numeric string
pub fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// String form of a scalar id, e.g. `42` or `"-140263"`
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// An artwork identifier as reported in `artwork_track_id` or `coverid`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkId(String);

impl ArtworkId {
    pub fn from_value(value: &Value) -> Option<Self> {
        scalar_to_string(value)
            .filter(|s| !s.is_empty())
            .map(ArtworkId)
    }

    /// `0` / `"0"` mean "this track has no artwork"
    pub fn is_no_artwork(&self) -> bool {
        self.0 == "0" || self.0.trim().parse::<f64>().map(|n| n == 0.0).unwrap_or(false)
    }

    /// Negative ids are placeholders LMS hands out for remote streams
    pub fn is_stream_placeholder(&self) -> bool {
        self.0.trim().parse::<f64>().map(|n| n.is_finite() && n < 0.0).unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Track-like fields of one status block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub id: Option<String>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub artwork_url: Option<String>,
    pub icon: Option<String>,
    pub artwork_track_id: Option<ArtworkId>,
    pub coverid: Option<ArtworkId>,
    /// Seconds
    pub duration: Option<f64>,
}

impl Track {
    pub fn from_object(fields: &Map<String, Value>) -> Self {
        Track {
            id: fields.get("id").and_then(scalar_to_string).filter(|s| !s.is_empty()),
            artist: non_empty_string(fields.get("artist")),
            title: non_empty_string(fields.get("title")),
            album: non_empty_string(fields.get("album")),
            artwork_url: non_empty_string(fields.get("artwork_url")),
            icon: non_empty_string(fields.get("icon")),
            artwork_track_id: fields.get("artwork_track_id").and_then(ArtworkId::from_value),
            coverid: fields.get("coverid").and_then(ArtworkId::from_value),
            duration: fields.get("duration").and_then(parse_number),
        }
    }
}

/// The `result` object of a `status` query
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatus {
    fields: Map<String, Value>,
}

impl RawStatus {
    /// Wrap a JSON-RPC `result`; `None` unless it is an object
    pub fn from_result(result: Value) -> Option<Self> {
        match result {
            Value::Object(fields) => Some(RawStatus { fields }),
            _ => None,
        }
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn block(&self, block: Block) -> Option<&Map<String, Value>> {
        match block {
            Block::Status => Some(&self.fields),
            Block::Track => self.fields
                .get("playlist_loop")
                .and_then(Value::as_array)
                .and_then(|tracks| tracks.first())
                .and_then(Value::as_object),
            Block::Remote => self.fields.get("remoteMeta").and_then(Value::as_object),
        }
    }

    /// Follow a nested path through the top-level fields
    fn lookup_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.fields.get(*first)?;
        for key in rest {
            value = value.as_object()?.get(*key)?;
        }
        if value.is_null() {
            None
        } else {
            Some(value)
        }
    }

    /// First numeric value across the alias table
    fn first_number(&self, aliases: &[&[&str]]) -> Option<f64> {
        aliases.iter()
            .filter_map(|path| self.lookup_path(path))
            .find_map(parse_number)
    }

    /// LMS `mode`: play, pause or stop
    pub fn mode(&self) -> Option<&str> {
        self.fields.get("mode").and_then(Value::as_str)
    }

    /// Elapsed seconds within the current track
    pub fn elapsed_seconds(&self) -> Option<f64> {
        self.fields.get(ELAPSED_FIELD).and_then(parse_number)
    }

    /// The current track, if the playlist is not empty
    pub fn track(&self) -> Option<Track> {
        self.block(Block::Track).map(Track::from_object)
    }

    /// Metadata block of a remote stream
    pub fn remote_meta(&self) -> Option<Track> {
        self.block(Block::Remote).map(Track::from_object)
    }

    /// Track-like fields found at the top level of the status
    pub fn status_fields(&self) -> Track {
        Track::from_object(&self.fields)
    }

    /// First finite, positive duration in seconds across `DURATION_FIELDS`
    pub fn duration_seconds(&self) -> Option<f64> {
        DURATION_FIELDS.iter()
            .filter_map(|(block, key)| self.block(*block).and_then(|fields| fields.get(*key)))
            .filter_map(parse_number)
            .find(|seconds| *seconds > 0.0)
    }

    /// Shuffle code (0 off, 1 by track, 2 by album); off when unknown
    pub fn shuffle_code(&self) -> i64 {
        self.first_number(SHUFFLE_FIELDS).map(|n| n as i64).unwrap_or(0)
    }

    /// Repeat code (0 off, 1 track, 2 playlist); off when unknown
    pub fn repeat_code(&self) -> i64 {
        self.first_number(REPEAT_FIELDS).map(|n| n as i64).unwrap_or(0)
    }

    /// Raw volume percent, unclamped
    pub fn volume_percent(&self) -> Option<f64> {
        self.first_number(VOLUME_FIELDS)
    }

    /// Display name of the player, trimmed
    pub fn player_name(&self) -> Option<String> {
        PLAYER_NAME_FIELDS.iter()
            .filter_map(|path| self.lookup_path(path))
            .find_map(Value::as_str)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    }
}
