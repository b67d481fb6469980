//! In-process fake speaker client for coordinator tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::services::queue_ops;
use crate::sonos::soap::{SoapError, SoapResult};
use crate::sonos::ssdp::{DiscoveredHost, DiscoveryState, OnFound};
use crate::sonos::traits::{
    SonosDescription, SonosDiscovery, SonosRendering, SonosTopology, SonosTransport,
};
use crate::sonos::types::{
    Channel, Device, EqSettings, PlayMode, PositionInfo, QueueAddResult, QueuePage, Track,
    TransportInfo,
};
use crate::sonos::zone_groups::tests::{group_xml, member_xml, zone_group_state_response};

pub(crate) fn track(title: &str) -> Track {
    Track {
        title: title.to_string(),
        duration_secs: 180,
        ..Default::default()
    }
}

#[derive(Default)]
struct FakeState {
    hosts: Vec<(String, Option<Device>)>,
    topology: String,
    failing: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
    searching: bool,
    group_volume: u8,
    queue: Vec<Track>,
    sleep_remaining: Option<Duration>,
    last_group_volume: Option<i32>,
    last_reorder: Option<(u32, u32, u32)>,
    last_enqueue_position: Option<u32>,
}

/// Scriptable stand-in for every speaker trait.
#[derive(Default)]
pub(crate) struct FakeSonosClient {
    inner: Mutex<FakeState>,
}

impl FakeSonosClient {
    /// Registers a host reported by discovery. `None` makes its description
    /// non-conforming.
    pub fn add_host(&self, host: &str, device: Option<Device>) {
        self.inner.lock().hosts.push((host.to_string(), device));
    }

    /// One group; the first id is the coordinator.
    pub fn set_topology(&self, ids: &[&str]) {
        let members: Vec<String> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| member_xml(id, &format!("10.0.0.{}", i + 1), id))
            .collect();
        let coordinator = ids.first().copied().unwrap_or_default();
        let group = group_xml(&format!("{coordinator}:1"), coordinator, &members);
        self.inner.lock().topology = zone_group_state_response(&[group]);
    }

    pub fn fail(&self, method: &'static str) {
        self.inner.lock().failing.insert(method);
    }

    pub fn calls(&self, method: &'static str) -> usize {
        self.inner.lock().calls.get(method).copied().unwrap_or(0)
    }

    pub fn discovery_stopped(&self) -> bool {
        let inner = self.inner.lock();
        !inner.searching && inner.calls.contains_key("search")
    }

    pub fn set_group_volume_value(&self, volume: u8) {
        self.inner.lock().group_volume = volume;
    }

    pub fn set_queue(&self, queue: Vec<Track>) {
        self.inner.lock().queue = queue;
    }

    pub fn set_sleep_remaining(&self, remaining: Option<Duration>) {
        self.inner.lock().sleep_remaining = remaining;
    }

    pub fn last_group_volume(&self) -> Option<i32> {
        self.inner.lock().last_group_volume
    }

    pub fn last_reorder(&self) -> Option<(u32, u32, u32)> {
        self.inner.lock().last_reorder
    }

    pub fn last_enqueue_position(&self) -> Option<u32> {
        self.inner.lock().last_enqueue_position
    }

    /// Counts a call and fails it if scripted to.
    fn record(&self, method: &'static str) -> SoapResult<()> {
        let mut inner = self.inner.lock();
        *inner.calls.entry(method).or_default() += 1;
        if inner.failing.contains(method) {
            return Err(SoapError::HttpStatus(500, format!("{method} scripted failure")));
        }
        Ok(())
    }
}

impl SonosDiscovery for FakeSonosClient {
    fn search(&self, on_found: OnFound) {
        let hosts: Vec<String> = {
            let mut inner = self.inner.lock();
            *inner.calls.entry("search").or_default() += 1;
            inner.searching = true;
            inner.hosts.iter().map(|(h, _)| h.clone()).collect()
        };
        for host in hosts {
            on_found(DiscoveredHost {
                location: format!("http://{host}:1400/xml/device_description.xml"),
                host,
                port: 1400,
            });
        }
    }

    fn stop_search(&self) {
        self.inner.lock().searching = false;
    }

    fn discovery_state(&self) -> DiscoveryState {
        if self.inner.lock().searching {
            DiscoveryState::Searching
        } else {
            DiscoveryState::Idle
        }
    }
}

#[async_trait]
impl SonosDescription for FakeSonosClient {
    async fn fetch_device(&self, host: &str, _port: u16) -> SoapResult<Option<Device>> {
        self.record("fetch_device")?;
        let inner = self.inner.lock();
        Ok(inner
            .hosts
            .iter()
            .find(|(h, _)| h == host)
            .and_then(|(_, d)| d.clone()))
    }
}

#[async_trait]
impl SonosTopology for FakeSonosClient {
    async fn get_topology(&self, _base_url: &str) -> SoapResult<String> {
        self.record("get_topology")?;
        Ok(self.inner.lock().topology.clone())
    }

    async fn join_group(&self, _base_url: &str, _coordinator_id: &str) -> SoapResult<()> {
        self.record("join_group")
    }

    async fn leave_group(&self, _base_url: &str) -> SoapResult<()> {
        self.record("leave_group")
    }
}

#[async_trait]
impl SonosRendering for FakeSonosClient {
    async fn get_group_volume(&self, _url: &str) -> SoapResult<u8> {
        self.record("get_group_volume")?;
        Ok(self.inner.lock().group_volume)
    }

    async fn set_group_volume(&self, _url: &str, volume: i32) -> SoapResult<()> {
        self.record("set_group_volume")?;
        self.inner.lock().last_group_volume = Some(volume);
        Ok(())
    }

    async fn get_group_mute(&self, _url: &str) -> SoapResult<bool> {
        self.record("get_group_mute")?;
        Ok(false)
    }

    async fn set_group_mute(&self, _url: &str, _mute: bool) -> SoapResult<()> {
        self.record("set_group_mute")
    }

    async fn get_volume(&self, _url: &str, _channel: Channel) -> SoapResult<u8> {
        self.record("get_volume")?;
        Ok(0)
    }

    async fn set_volume(&self, _url: &str, _channel: Channel, _volume: i32) -> SoapResult<()> {
        self.record("set_volume")
    }

    async fn set_mute(&self, _url: &str, _channel: Channel, _mute: bool) -> SoapResult<()> {
        self.record("set_mute")
    }

    async fn set_bass(&self, _url: &str, _level: i32) -> SoapResult<()> {
        self.record("set_bass")
    }

    async fn set_treble(&self, _url: &str, _level: i32) -> SoapResult<()> {
        self.record("set_treble")
    }

    async fn set_loudness(&self, _url: &str, _channel: Channel, _on: bool) -> SoapResult<()> {
        self.record("set_loudness")
    }

    async fn get_eq(&self, _url: &str) -> SoapResult<EqSettings> {
        self.record("get_eq")?;
        Ok(EqSettings::default())
    }
}

#[async_trait]
impl SonosTransport for FakeSonosClient {
    async fn play(&self, _url: &str) -> SoapResult<()> {
        self.record("play")
    }

    async fn pause(&self, _url: &str) -> SoapResult<()> {
        self.record("pause")
    }

    async fn stop(&self, _url: &str) -> SoapResult<()> {
        self.record("stop")
    }

    async fn next(&self, _url: &str) -> SoapResult<()> {
        self.record("next")
    }

    async fn previous(&self, _url: &str) -> SoapResult<()> {
        self.record("previous")
    }

    async fn seek(&self, _url: &str, _position_secs: u64) -> SoapResult<()> {
        self.record("seek")
    }

    async fn seek_track(&self, _url: &str, _track_number: u32) -> SoapResult<()> {
        self.record("seek_track")
    }

    async fn set_play_mode(&self, _url: &str, _mode: PlayMode) -> SoapResult<()> {
        self.record("set_play_mode")
    }

    async fn set_transport_uri(&self, _url: &str, _uri: &str, _metadata: &str) -> SoapResult<()> {
        self.record("set_transport_uri")
    }

    async fn play_from_queue(&self, _url: &str, _coordinator_id: &str) -> SoapResult<()> {
        self.record("play_from_queue")
    }

    async fn configure_sleep_timer(&self, _url: &str, _d: Option<Duration>) -> SoapResult<()> {
        self.record("configure_sleep_timer")
    }

    async fn get_sleep_timer(&self, _url: &str) -> SoapResult<Option<Duration>> {
        self.record("get_sleep_timer")?;
        Ok(self.inner.lock().sleep_remaining)
    }

    async fn get_crossfade(&self, _url: &str) -> SoapResult<bool> {
        self.record("get_crossfade")?;
        Ok(false)
    }

    async fn set_crossfade(&self, _url: &str, _enabled: bool) -> SoapResult<()> {
        self.record("set_crossfade")
    }

    async fn browse_queue(&self, _url: &str, start: u32, count: u32) -> SoapResult<QueuePage> {
        self.record("browse_queue")?;
        let queue = self.inner.lock().queue.clone();
        let tracks: Vec<Track> = queue
            .into_iter()
            .enumerate()
            .skip(start as usize)
            .take(count as usize)
            .map(|(i, mut t)| {
                t.track_number = Some(i as u32 + 1);
                t
            })
            .collect();
        let total = self.inner.lock().queue.len() as u32;
        Ok(QueuePage {
            number_returned: tracks.len() as u32,
            tracks,
            total_matches: total,
        })
    }

    async fn add_uri_to_queue(
        &self,
        _url: &str,
        _uri: &str,
        _metadata: &str,
        position: u32,
    ) -> SoapResult<QueueAddResult> {
        self.record("add_uri_to_queue")?;
        let mut inner = self.inner.lock();
        inner.last_enqueue_position = Some(position);
        let length = inner.queue.len() as u32 + 1;
        Ok(QueueAddResult {
            first_track_number: if position == 0 { 1 } else { position },
            tracks_added: 1,
            queue_length: length,
            play_next: position == 0,
        })
    }

    async fn remove_track(&self, _url: &str, _track_number: u32) -> SoapResult<()> {
        self.record("remove_track")
    }

    async fn clear_queue(&self, _url: &str) -> SoapResult<()> {
        self.record("clear_queue")
    }

    async fn reorder_queue(
        &self,
        _url: &str,
        starting_index: u32,
        count: u32,
        insert_before: u32,
    ) -> SoapResult<()> {
        self.record("reorder_queue")?;
        let mut inner = self.inner.lock();
        inner.last_reorder = Some((starting_index, count, insert_before));
        queue_ops::move_track(
            &mut inner.queue,
            starting_index.saturating_sub(1) as usize,
            insert_before.saturating_sub(1) as usize,
        );
        Ok(())
    }

    async fn get_position_info(&self, _url: &str) -> SoapResult<PositionInfo> {
        self.record("get_position_info")?;
        Ok(PositionInfo::default())
    }

    async fn get_transport_info(&self, _url: &str) -> SoapResult<TransportInfo> {
        self.record("get_transport_info")?;
        Ok(TransportInfo::default())
    }
}
