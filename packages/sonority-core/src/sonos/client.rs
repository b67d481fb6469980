//! Concrete speaker client.
//!
//! `SonosClientImpl` implements every trait in [`traits`](super::traits) by
//! delegating to the stateless protocol functions, sharing one reqwest
//! client (and so one connection pool and one set of timeouts).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::description;
use super::grouping;
use super::rendering;
use super::soap::SoapResult;
use super::ssdp::{DiscoveryState, OnFound, SsdpConfig, SsdpDiscovery};
use super::traits::{
    SonosDescription, SonosDiscovery, SonosRendering, SonosTopology, SonosTransport,
};
use super::transport;
use super::types::{
    Channel, Device, EqSettings, PlayMode, PositionInfo, QueueAddResult, QueuePage, TransportInfo,
};
use super::zone_groups;
use crate::state::Config;

/// Builds the HTTP client used for every SOAP, description and GENA request.
///
/// # Errors
/// Fails only if the TLS backend cannot be initialised.
pub fn build_http_client(config: &Config) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(config.soap_connect_timeout())
        .timeout(config.soap_timeout())
        .build()
}

/// Concrete implementation of the speaker client traits.
#[derive(Clone)]
pub struct SonosClientImpl {
    client: Client,
    discovery: Arc<SsdpDiscovery>,
}

impl std::fmt::Debug for SonosClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SonosClientImpl")
            .field("discovery_state", &self.discovery.state())
            .finish_non_exhaustive()
    }
}

impl SonosClientImpl {
    /// Creates a client with the default discovery settings.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_discovery_config(client, SsdpConfig::default())
    }

    #[must_use]
    pub fn with_discovery_config(client: Client, config: SsdpConfig) -> Self {
        Self {
            client,
            discovery: Arc::new(SsdpDiscovery::new(config)),
        }
    }

    /// The underlying HTTP client, shared with the GENA manager.
    #[must_use]
    pub fn http_client(&self) -> &Client {
        &self.client
    }
}

impl SonosDiscovery for SonosClientImpl {
    fn search(&self, on_found: OnFound) {
        self.discovery.search(on_found);
    }

    fn stop_search(&self) {
        self.discovery.stop();
    }

    fn discovery_state(&self) -> DiscoveryState {
        self.discovery.state()
    }
}

#[async_trait]
impl SonosDescription for SonosClientImpl {
    async fn fetch_device(&self, host: &str, port: u16) -> SoapResult<Option<Device>> {
        description::fetch_device(&self.client, host, port).await
    }
}

#[async_trait]
impl SonosTopology for SonosClientImpl {
    async fn get_topology(&self, base_url: &str) -> SoapResult<String> {
        zone_groups::get_topology(&self.client, base_url).await
    }

    async fn join_group(&self, base_url: &str, coordinator_id: &str) -> SoapResult<()> {
        grouping::join_group(&self.client, base_url, coordinator_id).await
    }

    async fn leave_group(&self, base_url: &str) -> SoapResult<()> {
        grouping::leave_group(&self.client, base_url).await
    }
}

#[async_trait]
impl SonosRendering for SonosClientImpl {
    async fn get_group_volume(&self, coordinator_url: &str) -> SoapResult<u8> {
        rendering::get_group_volume(&self.client, coordinator_url).await
    }

    async fn set_group_volume(&self, coordinator_url: &str, volume: i32) -> SoapResult<()> {
        rendering::set_group_volume(&self.client, coordinator_url, volume).await
    }

    async fn get_group_mute(&self, coordinator_url: &str) -> SoapResult<bool> {
        rendering::get_group_mute(&self.client, coordinator_url).await
    }

    async fn set_group_mute(&self, coordinator_url: &str, mute: bool) -> SoapResult<()> {
        rendering::set_group_mute(&self.client, coordinator_url, mute).await
    }

    async fn get_volume(&self, base_url: &str, channel: Channel) -> SoapResult<u8> {
        rendering::get_volume(&self.client, base_url, channel).await
    }

    async fn set_volume(&self, base_url: &str, channel: Channel, volume: i32) -> SoapResult<()> {
        rendering::set_volume(&self.client, base_url, channel, volume).await
    }

    async fn set_mute(&self, base_url: &str, channel: Channel, mute: bool) -> SoapResult<()> {
        rendering::set_mute(&self.client, base_url, channel, mute).await
    }

    async fn set_bass(&self, base_url: &str, level: i32) -> SoapResult<()> {
        rendering::set_bass(&self.client, base_url, level).await
    }

    async fn set_treble(&self, base_url: &str, level: i32) -> SoapResult<()> {
        rendering::set_treble(&self.client, base_url, level).await
    }

    async fn set_loudness(&self, base_url: &str, channel: Channel, loudness: bool) -> SoapResult<()> {
        rendering::set_loudness(&self.client, base_url, channel, loudness).await
    }

    async fn get_eq(&self, base_url: &str) -> SoapResult<EqSettings> {
        rendering::get_eq(&self.client, base_url).await
    }
}

#[async_trait]
impl SonosTransport for SonosClientImpl {
    async fn play(&self, base_url: &str) -> SoapResult<()> {
        transport::play(&self.client, base_url).await
    }

    async fn pause(&self, base_url: &str) -> SoapResult<()> {
        transport::pause(&self.client, base_url).await
    }

    async fn stop(&self, base_url: &str) -> SoapResult<()> {
        transport::stop(&self.client, base_url).await
    }

    async fn next(&self, base_url: &str) -> SoapResult<()> {
        transport::next(&self.client, base_url).await
    }

    async fn previous(&self, base_url: &str) -> SoapResult<()> {
        transport::previous(&self.client, base_url).await
    }

    async fn seek(&self, base_url: &str, position_secs: u64) -> SoapResult<()> {
        transport::seek(&self.client, base_url, position_secs).await
    }

    async fn seek_track(&self, base_url: &str, track_number: u32) -> SoapResult<()> {
        transport::seek_track(&self.client, base_url, track_number).await
    }

    async fn set_play_mode(&self, base_url: &str, mode: PlayMode) -> SoapResult<()> {
        transport::set_play_mode(&self.client, base_url, mode).await
    }

    async fn set_transport_uri(&self, base_url: &str, uri: &str, metadata: &str) -> SoapResult<()> {
        transport::set_transport_uri(&self.client, base_url, uri, metadata).await
    }

    async fn play_from_queue(&self, base_url: &str, coordinator_id: &str) -> SoapResult<()> {
        transport::play_from_queue(&self.client, base_url, coordinator_id).await
    }

    async fn configure_sleep_timer(&self, base_url: &str, duration: Option<Duration>) -> SoapResult<()> {
        transport::configure_sleep_timer(&self.client, base_url, duration).await
    }

    async fn get_sleep_timer(&self, base_url: &str) -> SoapResult<Option<Duration>> {
        transport::get_sleep_timer(&self.client, base_url).await
    }

    async fn get_crossfade(&self, base_url: &str) -> SoapResult<bool> {
        transport::get_crossfade(&self.client, base_url).await
    }

    async fn set_crossfade(&self, base_url: &str, enabled: bool) -> SoapResult<()> {
        transport::set_crossfade(&self.client, base_url, enabled).await
    }

    async fn browse_queue(&self, base_url: &str, start: u32, count: u32) -> SoapResult<QueuePage> {
        transport::browse_queue(&self.client, base_url, start, count).await
    }

    async fn add_uri_to_queue(
        &self,
        base_url: &str,
        uri: &str,
        metadata: &str,
        position: u32,
    ) -> SoapResult<QueueAddResult> {
        transport::add_uri_to_queue(&self.client, base_url, uri, metadata, position).await
    }

    async fn remove_track(&self, base_url: &str, track_number: u32) -> SoapResult<()> {
        transport::remove_track(&self.client, base_url, track_number).await
    }

    async fn clear_queue(&self, base_url: &str) -> SoapResult<()> {
        transport::clear_queue(&self.client, base_url).await
    }

    async fn reorder_queue(
        &self,
        base_url: &str,
        starting_index: u32,
        count: u32,
        insert_before: u32,
    ) -> SoapResult<()> {
        transport::reorder_queue(&self.client, base_url, starting_index, count, insert_before).await
    }

    async fn get_position_info(&self, base_url: &str) -> SoapResult<PositionInfo> {
        transport::get_position_info(&self.client, base_url).await
    }

    async fn get_transport_info(&self, base_url: &str) -> SoapResult<TransportInfo> {
        transport::get_transport_info(&self.client, base_url).await
    }
}
