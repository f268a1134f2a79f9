//! Cover art URL resolution for the current track.
//!
//! Candidates are tried in a fixed order: explicit artwork URLs, then a cover
//! id served by `/music/<id>/cover.jpg`, then the player's current cover, and
//! finally plugin icons.

use urlencoding::encode;

use crate::config::{ConnectionConfig, Credentials};
use super::status::{ArtworkId, Track};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtworkOptions {
    /// Allow `icon` fields as a last resort
    pub include_icon_fallback: bool,
}

/// `user:pass@`, `user@` or `:pass@`, percent-encoded
pub fn auth_segment(credentials: &Credentials) -> String {
    let username = encode(credentials.username());
    if credentials.password().is_empty() && !username.is_empty() {
        format!("{}@", username)
    } else {
        format!("{}:{}@", username, encode(credentials.password()))
    }
}

/// Base URL of the server, with credentials embedded when sharing is enabled
pub fn credentialed_base_url(config: &ConnectionConfig) -> String {
    match config.artwork_credentials() {
        Some(credentials) => format!("{}://{}{}:{}", config.scheme, auth_segment(credentials), config.host, config.port),
        None => config.base_url(),
    }
}

fn is_absolute(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Turn an explicit artwork value into a fetchable URL
fn absolutize(candidate: &str, config: &ConnectionConfig) -> String {
    let base = config.base_url();
    let credentialed = credentialed_base_url(config);

    if is_absolute(candidate) {
        if config.artwork_credentials().is_some() {
            if let Some(rest) = candidate.strip_prefix(base.as_str()) {
                if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') {
                    return format!("{}{}", credentialed, rest);
                }
            }
        }
        return candidate.to_string();
    }

    if candidate.starts_with('/') {
        format!("{}{}", credentialed, candidate)
    } else {
        format!("{}/{}", credentialed, candidate.trim_start_matches('/'))
    }
}

fn first_artwork_id<'a>(candidates: &[Option<&'a ArtworkId>]) -> Option<&'a ArtworkId> {
    candidates.iter()
        .flatten()
        .copied()
        .find(|id| !id.is_no_artwork())
}

/// Resolve the artwork URL for the current track.
///
/// `status` carries the track-like fields found at the top level of the
/// status result.
pub fn resolve_artwork_url(
    track: Option<&Track>,
    remote_meta: Option<&Track>,
    status: &Track,
    config: &ConnectionConfig,
    options: ArtworkOptions,
) -> Option<String> {
    let explicit = [
        track.and_then(|t| t.artwork_url.as_deref()),
        remote_meta.and_then(|t| t.artwork_url.as_deref()),
        status.artwork_url.as_deref(),
    ];
    if let Some(candidate) = explicit.iter().flatten().next() {
        return Some(absolutize(candidate, config));
    }

    let base = credentialed_base_url(config);
    let player = encode(&config.player_id);

    let artwork_id = first_artwork_id(&[
        track.and_then(|t| t.artwork_track_id.as_ref()),
        status.artwork_track_id.as_ref(),
        remote_meta.and_then(|t| t.artwork_track_id.as_ref()),
        track.and_then(|t| t.coverid.as_ref()),
        status.coverid.as_ref(),
        remote_meta.and_then(|t| t.coverid.as_ref()),
    ]);
    if let Some(id) = artwork_id {
        if !id.is_stream_placeholder() && !config.player_id.is_empty() {
            return Some(format!("{}/music/{}/cover.jpg?player={}", base, encode(id.as_str()), player));
        }
    }

    if !config.player_id.is_empty() {
        return Some(format!("{}/music/current/cover.jpg?player={}", base, player));
    }

    if options.include_icon_fallback {
        let icons = [
            remote_meta.and_then(|t| t.icon.as_deref()),
            status.icon.as_deref(),
        ];
        if let Some(icon) = icons.iter().flatten().next() {
            return Some(absolutize(icon, config));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use serde_json::{json, Value};

    fn config(username: &str, password: &str, share: bool) -> ConnectionConfig {
        let mut config = BridgeConfig::default();
        config.server_address = "lms.local".to_string();
        config.player_id = "00:04:20:ab:cd:ef".to_string();
        config.server_username = username.to_string();
        config.server_password = password.to_string();
        config.allow_artwork_credentials = share;
        config.connection()
    }

    fn track(value: Value) -> Track {
        match value {
            Value::Object(fields) => Track::from_object(&fields),
            _ => Track::default(),
        }
    }

    const PLAYER: &str = "00%3A04%3A20%3Aab%3Acd%3Aef";

    #[test]
    fn test_auth_segment_forms() {
        let full = Credentials::from_parts("us er", "p@ss").unwrap();
        assert_eq!(auth_segment(&full), "us%20er:p%40ss@");
        let user_only = Credentials::from_parts("admin", "").unwrap();
        assert_eq!(auth_segment(&user_only), "admin@");
        let password_only = Credentials::from_parts("", "secret").unwrap();
        assert_eq!(auth_segment(&password_only), ":secret@");
    }

    #[test]
    fn test_explicit_url_wins() {
        let config = config("", "", false);
        let current = track(json!({"artwork_url": "/imageproxy/abc/image.jpg", "coverid": "99"}));
        let url = resolve_artwork_url(Some(&current), None, &Track::default(), &config, ArtworkOptions::default());
        assert_eq!(url.as_deref(), Some("http://lms.local:9000/imageproxy/abc/image.jpg"));

        let relative = track(json!({"artwork_url": "html/images/radio.png"}));
        let url = resolve_artwork_url(None, Some(&relative), &Track::default(), &config, ArtworkOptions::default());
        assert_eq!(url.as_deref(), Some("http://lms.local:9000/html/images/radio.png"));

        let external = track(json!({"artwork_url": "https://cdn.example.com/a.jpg"}));
        let url = resolve_artwork_url(None, None, &external, &config, ArtworkOptions::default());
        assert_eq!(url.as_deref(), Some("https://cdn.example.com/a.jpg"));
    }

    #[test]
    fn test_absolute_server_url_gets_credentials() {
        let config = config("admin", "pw", true);
        let current = track(json!({"artwork_url": "http://lms.local:9000/music/5/cover.jpg"}));
        let url = resolve_artwork_url(Some(&current), None, &Track::default(), &config, ArtworkOptions::default());
        assert_eq!(url.as_deref(), Some("http://admin:pw@lms.local:9000/music/5/cover.jpg"));

        let external = track(json!({"artwork_url": "http://other.host/x.jpg"}));
        let url = resolve_artwork_url(Some(&external), None, &Track::default(), &config, ArtworkOptions::default());
        assert_eq!(url.as_deref(), Some("http://other.host/x.jpg"));
    }

    #[test]
    fn test_artwork_id_order_and_sentinels() {
        let config = config("", "", false);
        let current = track(json!({"artwork_track_id": 0, "coverid": "c0ffee"}));
        let status = track(json!({"artwork_track_id": "0"}));
        let url = resolve_artwork_url(Some(&current), None, &status, &config, ArtworkOptions::default());
        assert_eq!(url, Some(format!("http://lms.local:9000/music/c0ffee/cover.jpg?player={}", PLAYER)));

        let status = track(json!({"artwork_track_id": "77"}));
        let url = resolve_artwork_url(Some(&current), None, &status, &config, ArtworkOptions::default());
        assert_eq!(url, Some(format!("http://lms.local:9000/music/77/cover.jpg?player={}", PLAYER)));
    }

    #[test]
    fn test_stream_placeholder_uses_current_cover() {
        let config = config("admin", "", true);
        let current = track(json!({"coverid": "-140263", "artwork_track_id": "5"}));
        let remote = track(json!({"artwork_track_id": -1}));
        let url = resolve_artwork_url(None, Some(&remote), &Track::default(), &config, ArtworkOptions::default());
        assert_eq!(url, Some(format!("http://admin@lms.local:9000/music/current/cover.jpg?player={}", PLAYER)));

        // A non-negative id earlier in the order still wins
        let url = resolve_artwork_url(Some(&current), Some(&remote), &Track::default(), &config, ArtworkOptions::default());
        assert_eq!(url, Some(format!("http://admin@lms.local:9000/music/5/cover.jpg?player={}", PLAYER)));
    }

    #[test]
    fn test_icon_fallback_without_player() {
        let mut config = config("", "", false);
        config.player_id = String::new();
        let remote = track(json!({"icon": "plugins/radio/icon.png"}));

        let url = resolve_artwork_url(None, Some(&remote), &Track::default(), &config, ArtworkOptions::default());
        assert_eq!(url, None);

        let options = ArtworkOptions { include_icon_fallback: true };
        let url = resolve_artwork_url(None, Some(&remote), &Track::default(), &config, options);
        assert_eq!(url.as_deref(), Some("http://lms.local:9000/plugins/radio/icon.png"));
    }
}
