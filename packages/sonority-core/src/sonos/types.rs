//! Domain types for speakers, groups, tracks and transport state.
//!
//! These types are the vocabulary shared by the protocol facades and the
//! coordinator. All of them serialize to camelCase so that the coordinator's
//! snapshot can be handed straight to a presentation layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Devices
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse product category derived from a speaker's model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DeviceCategory {
    Subwoofer,
    Soundbar,
    Portable,
    HomeTheater,
    Amplifier,
    #[default]
    Speaker,
}

impl DeviceCategory {
    /// Classifies a model name by case-insensitive substring match.
    ///
    /// Rules are checked in a fixed order so that, for example, a name
    /// containing both "sub" and "amp" is a subwoofer.
    #[must_use]
    pub fn from_model_name(model_name: &str) -> Self {
        let name = model_name.to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

        if has(&["sub"]) {
            Self::Subwoofer
        } else if has(&["beam", "arc", "ray"]) {
            Self::Soundbar
        } else if has(&["move", "roam"]) {
            Self::Portable
        } else if has(&["five"]) {
            Self::HomeTheater
        } else if has(&["port", "amp", "connect"]) {
            Self::Amplifier
        } else {
            Self::Speaker
        }
    }

    /// Icon tag for presentation layers.
    #[must_use]
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Subwoofer => "hifispeaker.and.homepod",
            Self::Soundbar => "tv.and.hifispeaker.fill",
            Self::Portable => "speaker.wave.2.circle",
            Self::HomeTheater => "hifispeaker.2.fill",
            Self::Amplifier => "amplifier",
            Self::Speaker => "hifispeaker.fill",
        }
    }
}

/// A speaker resolved from its device description.
///
/// Identity (`id`, address) never changes after the first successful
/// description fetch. `name` and `is_coordinator` are refreshed from topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Unique identifier in RINCON_xxxxx format (`uuid:` prefix stripped).
    pub id: String,
    /// Host name or IP address.
    pub host: String,
    /// Control port (1400 on every shipping speaker).
    pub port: u16,
    /// User-configured room name.
    pub name: String,
    pub model_name: String,
    pub model_number: String,
    pub software_version: String,
    pub hardware_version: String,
    pub category: DeviceCategory,
    /// Whether this device currently coordinates its group.
    pub is_coordinator: bool,
}

impl Device {
    /// Base URL every control and event path is appended to.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Groups
// ─────────────────────────────────────────────────────────────────────────────

/// A set of speakers playing in sync, addressed through its coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Display name: coordinator's room first, then the other rooms.
    pub name: String,
    pub coordinator: Device,
    /// Every member including the coordinator, coordinator first.
    pub members: Vec<Device>,
    /// Group volume (0-100).
    pub volume: u8,
    pub muted: bool,
}

impl Group {
    /// Group identity is the coordinator's device id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.coordinator.id
    }

    /// Returns true if `device_id` is a member of this group.
    #[must_use]
    pub fn contains(&self, device_id: &str) -> bool {
        self.members.iter().any(|m| m.id == device_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Playback state reported by the AVTransport service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
    Transitioning,
}

impl PlaybackState {
    /// Maps a `CurrentTransportState` value. Unrecognized strings are `Stopped`.
    #[must_use]
    pub fn from_upnp(s: &str) -> Self {
        s.parse().unwrap_or(Self::Stopped)
    }
}

/// Error returned when parsing an unknown transport state string.
#[derive(Debug, Clone, Error)]
#[error("unknown transport state")]
pub struct ParsePlaybackStateError;

impl std::str::FromStr for PlaybackState {
    type Err = ParsePlaybackStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLAYING" => Ok(Self::Playing),
            "PAUSED_PLAYBACK" | "PAUSED" => Ok(Self::Paused),
            "STOPPED" => Ok(Self::Stopped),
            "TRANSITIONING" => Ok(Self::Transitioning),
            _ => Err(ParsePlaybackStateError),
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Playing => write!(f, "Playing"),
            Self::Paused => write!(f, "Paused"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Transitioning => write!(f, "Transitioning"),
        }
    }
}

/// Repeat/shuffle mode of the coordinator's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlayMode {
    #[default]
    Normal,
    RepeatAll,
    RepeatOne,
    /// Shuffle and repeat the whole queue.
    Shuffle,
    /// Shuffle and repeat the current track.
    ShuffleRepeatOne,
    ShuffleNoRepeat,
}

impl PlayMode {
    /// Maps a `PlayMode` value. Unrecognized strings are `Normal`.
    #[must_use]
    pub fn from_upnp(s: &str) -> Self {
        match s {
            "REPEAT_ALL" => Self::RepeatAll,
            "REPEAT_ONE" => Self::RepeatOne,
            "SHUFFLE" => Self::Shuffle,
            "SHUFFLE_REPEAT_ONE" => Self::ShuffleRepeatOne,
            "SHUFFLE_NOREPEAT" => Self::ShuffleNoRepeat,
            _ => Self::Normal,
        }
    }

    /// The wire value for `SetPlayMode`.
    #[must_use]
    pub fn as_upnp(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::RepeatAll => "REPEAT_ALL",
            Self::RepeatOne => "REPEAT_ONE",
            Self::Shuffle => "SHUFFLE",
            Self::ShuffleRepeatOne => "SHUFFLE_REPEAT_ONE",
            Self::ShuffleNoRepeat => "SHUFFLE_NOREPEAT",
        }
    }
}

/// A playable item decoded from DIDL-Lite metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// DIDL item id (queue items are `Q:0/<n>`).
    pub id: Option<String>,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Absolute or device-relative album art reference.
    pub album_art_uri: Option<String>,
    /// Source URI of the resource.
    pub uri: Option<String>,
    /// `upnp:class` of the item.
    pub item_class: Option<String>,
    /// Duration in whole seconds (0 when unknown).
    pub duration_secs: u64,
    /// 1-based position within the containing queue or album.
    pub track_number: Option<u32>,
}

impl Track {
    /// Resolves the album art reference against the device's base URL.
    ///
    /// Speakers report art for local content as a path such as
    /// `/getaa?s=1&u=...`, which is only reachable through the speaker.
    #[must_use]
    pub fn album_art_url(&self, base_url: &str) -> Option<String> {
        let art = self.album_art_uri.as_deref()?;
        if art.starts_with("http://") || art.starts_with("https://") {
            Some(art.to_string())
        } else if art.starts_with('/') {
            Some(format!("{}{}", base_url.trim_end_matches('/'), art))
        } else {
            Some(format!("{}/{}", base_url.trim_end_matches('/'), art))
        }
    }
}

/// Raw result of `GetPositionInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PositionInfo {
    /// Current track number within the queue (1-based, 0 when none).
    pub track: u32,
    pub track_duration_secs: u64,
    /// Decoded DIDL-Lite fragment describing the current track.
    pub track_metadata: Option<String>,
    pub track_uri: Option<String>,
    /// Elapsed position in seconds.
    pub rel_time_secs: u64,
}

/// Merged transport snapshot of a coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransportInfo {
    pub state: PlaybackState,
    pub track: Option<Track>,
    pub play_mode: PlayMode,
    /// Elapsed seconds within the current track.
    pub position_secs: f64,
    /// Number of tracks in the queue.
    pub track_count: u32,
    /// Current track number (1-based, 0 when nothing is loaded).
    pub track_index: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Queue
// ─────────────────────────────────────────────────────────────────────────────

/// One page of the coordinator's queue as returned by `Browse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueuePage {
    pub tracks: Vec<Track>,
    pub number_returned: u32,
    pub total_matches: u32,
}

/// Result of `AddURIToQueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueueAddResult {
    /// 1-based queue position of the first added track.
    pub first_track_number: u32,
    pub tracks_added: u32,
    pub queue_length: u32,
    /// True when the item was enqueued to play next rather than appended.
    pub play_next: bool,
}

/// Where an enqueued URI lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnqueueMode {
    /// Insert after the current track and start playing it.
    PlayNow,
    /// Insert after the current track.
    PlayNext,
    /// Append to the end of the queue.
    AddToEnd,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

/// Audio channel addressed by RenderingControl actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Channel {
    #[default]
    Master,
    LF,
    RF,
}

impl Channel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "Master",
            Self::LF => "LF",
            Self::RF => "RF",
        }
    }
}

/// Equalizer settings of one speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EqSettings {
    /// Bass (-10..=10).
    pub bass: i32,
    /// Treble (-10..=10).
    pub treble: i32,
    pub loudness: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Sonos Sub", DeviceCategory::Subwoofer)]
    #[case("Sonos Sub Mini", DeviceCategory::Subwoofer)]
    #[case("Sonos Beam", DeviceCategory::Soundbar)]
    #[case("Sonos Arc Ultra", DeviceCategory::Soundbar)]
    #[case("Sonos Ray", DeviceCategory::Soundbar)]
    #[case("Sonos Move 2", DeviceCategory::Portable)]
    #[case("Sonos Roam", DeviceCategory::Portable)]
    #[case("Sonos Five", DeviceCategory::HomeTheater)]
    #[case("Sonos Port", DeviceCategory::Amplifier)]
    #[case("Sonos Amp", DeviceCategory::Amplifier)]
    #[case("Sonos Connect:Amp", DeviceCategory::Amplifier)]
    #[case("Sonos One", DeviceCategory::Speaker)]
    #[case("", DeviceCategory::Speaker)]
    fn category_from_model_name(#[case] model: &str, #[case] expected: DeviceCategory) {
        assert_eq!(DeviceCategory::from_model_name(model), expected);
    }

    #[test]
    fn category_match_is_case_insensitive() {
        assert_eq!(
            DeviceCategory::from_model_name("SONOS BEAM"),
            DeviceCategory::Soundbar
        );
    }

    #[test]
    fn unknown_transport_state_is_stopped() {
        assert_eq!(PlaybackState::from_upnp("PLAYING"), PlaybackState::Playing);
        assert_eq!(
            PlaybackState::from_upnp("PAUSED_PLAYBACK"),
            PlaybackState::Paused
        );
        assert_eq!(PlaybackState::from_upnp("garbage"), PlaybackState::Stopped);
        assert_eq!(PlaybackState::from_upnp(""), PlaybackState::Stopped);
    }

    #[test]
    fn play_mode_round_trips_wire_values() {
        for mode in [
            PlayMode::Normal,
            PlayMode::RepeatAll,
            PlayMode::RepeatOne,
            PlayMode::Shuffle,
            PlayMode::ShuffleRepeatOne,
            PlayMode::ShuffleNoRepeat,
        ] {
            assert_eq!(PlayMode::from_upnp(mode.as_upnp()), mode);
        }
        assert_eq!(PlayMode::from_upnp("CROSSFADE"), PlayMode::Normal);
    }

    #[test]
    fn album_art_resolution() {
        let mut track = Track {
            album_art_uri: Some("/getaa?s=1&u=x".into()),
            ..Default::default()
        };
        assert_eq!(
            track.album_art_url("http://10.0.0.2:1400").as_deref(),
            Some("http://10.0.0.2:1400/getaa?s=1&u=x")
        );

        track.album_art_uri = Some("https://cdn.example/a.jpg".into());
        assert_eq!(
            track.album_art_url("http://10.0.0.2:1400").as_deref(),
            Some("https://cdn.example/a.jpg")
        );

        track.album_art_uri = None;
        assert_eq!(track.album_art_url("http://10.0.0.2:1400"), None);
    }
}
