//! Trait abstractions for speaker operations.
//!
//! The coordinator depends on these traits rather than on the concrete
//! reqwest-backed client, so its state machine can be driven by an
//! in-process fake.

use std::time::Duration;

use async_trait::async_trait;

use super::soap::SoapResult;
use super::ssdp::{DiscoveryState, OnFound};
use super::types::{
    Channel, Device, EqSettings, PlayMode, PositionInfo, QueueAddResult, QueuePage, TransportInfo,
};

/// Multicast device discovery.
pub trait SonosDiscovery: Send + Sync {
    /// Starts a search. `on_found` may be called more than once per host.
    fn search(&self, on_found: OnFound);

    /// Stops a running search. Idempotent.
    fn stop_search(&self);

    fn discovery_state(&self) -> DiscoveryState;
}

/// Device description retrieval.
#[async_trait]
pub trait SonosDescription: Send + Sync {
    /// Resolves a host into a device; `Ok(None)` for non-conforming responders.
    async fn fetch_device(&self, host: &str, port: u16) -> SoapResult<Option<Device>>;
}

/// Group topology and grouping commands.
#[async_trait]
pub trait SonosTopology: Send + Sync {
    /// Fetches the raw topology document from any speaker.
    async fn get_topology(&self, base_url: &str) -> SoapResult<String>;

    /// Makes the speaker at `base_url` follow `coordinator_id`.
    async fn join_group(&self, base_url: &str, coordinator_id: &str) -> SoapResult<()>;

    /// Makes the speaker at `base_url` standalone.
    async fn leave_group(&self, base_url: &str) -> SoapResult<()>;
}

/// Volume, mute and equalizer control.
#[async_trait]
pub trait SonosRendering: Send + Sync {
    async fn get_group_volume(&self, coordinator_url: &str) -> SoapResult<u8>;
    async fn set_group_volume(&self, coordinator_url: &str, volume: i32) -> SoapResult<()>;
    async fn get_group_mute(&self, coordinator_url: &str) -> SoapResult<bool>;
    async fn set_group_mute(&self, coordinator_url: &str, mute: bool) -> SoapResult<()>;
    async fn get_volume(&self, base_url: &str, channel: Channel) -> SoapResult<u8>;
    async fn set_volume(&self, base_url: &str, channel: Channel, volume: i32) -> SoapResult<()>;
    async fn set_mute(&self, base_url: &str, channel: Channel, mute: bool) -> SoapResult<()>;
    async fn set_bass(&self, base_url: &str, level: i32) -> SoapResult<()>;
    async fn set_treble(&self, base_url: &str, level: i32) -> SoapResult<()>;
    async fn set_loudness(&self, base_url: &str, channel: Channel, loudness: bool) -> SoapResult<()>;
    async fn get_eq(&self, base_url: &str) -> SoapResult<EqSettings>;
}

/// Playback, queue, sleep timer and crossfade control.
///
/// Every call addresses a group coordinator.
#[async_trait]
pub trait SonosTransport: Send + Sync {
    async fn play(&self, base_url: &str) -> SoapResult<()>;
    async fn pause(&self, base_url: &str) -> SoapResult<()>;
    async fn stop(&self, base_url: &str) -> SoapResult<()>;
    async fn next(&self, base_url: &str) -> SoapResult<()>;
    async fn previous(&self, base_url: &str) -> SoapResult<()>;
    async fn seek(&self, base_url: &str, position_secs: u64) -> SoapResult<()>;
    async fn seek_track(&self, base_url: &str, track_number: u32) -> SoapResult<()>;
    async fn set_play_mode(&self, base_url: &str, mode: PlayMode) -> SoapResult<()>;
    async fn set_transport_uri(&self, base_url: &str, uri: &str, metadata: &str) -> SoapResult<()>;
    async fn play_from_queue(&self, base_url: &str, coordinator_id: &str) -> SoapResult<()>;
    async fn configure_sleep_timer(&self, base_url: &str, duration: Option<Duration>) -> SoapResult<()>;
    async fn get_sleep_timer(&self, base_url: &str) -> SoapResult<Option<Duration>>;
    async fn get_crossfade(&self, base_url: &str) -> SoapResult<bool>;
    async fn set_crossfade(&self, base_url: &str, enabled: bool) -> SoapResult<()>;
    async fn browse_queue(&self, base_url: &str, start: u32, count: u32) -> SoapResult<QueuePage>;

    /// `position` is 1-based; 0 enqueues after the current track.
    async fn add_uri_to_queue(
        &self,
        base_url: &str,
        uri: &str,
        metadata: &str,
        position: u32,
    ) -> SoapResult<QueueAddResult>;

    async fn remove_track(&self, base_url: &str, track_number: u32) -> SoapResult<()>;
    async fn clear_queue(&self, base_url: &str) -> SoapResult<()>;
    async fn reorder_queue(
        &self,
        base_url: &str,
        starting_index: u32,
        count: u32,
        insert_before: u32,
    ) -> SoapResult<()>;
    async fn get_position_info(&self, base_url: &str) -> SoapResult<PositionInfo>;
    async fn get_transport_info(&self, base_url: &str) -> SoapResult<TransportInfo>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined Traits (for trait objects)
// ─────────────────────────────────────────────────────────────────────────────

/// Combined trait for all speaker operations.
///
/// Used by the coordinator to hold a single client for everything.
pub trait SonosClient:
    SonosDiscovery + SonosDescription + SonosTopology + SonosRendering + SonosTransport
{
}

/// Blanket implementation for any type implementing all traits.
impl<T> SonosClient for T where
    T: SonosDiscovery + SonosDescription + SonosTopology + SonosRendering + SonosTransport
{
}
