//! Control-point coordinator.
//!
//! Single owner of the device set, the group set, the selection and the
//! transport/queue snapshots. Every mutation goes through the
//! `watch::Sender` held here, so completions of concurrent protocol calls
//! fold into the state one at a time.
//!
//! Lifecycle: `Idle -> Discovering -> Idle (+ polling)`.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreResult, SonorityError};
use crate::events::{EventEmitter, NoticeEvent, TopologyEvent, TransportEvent};
use crate::protocol_constants::QUEUE_PAGE_SIZE;
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::sonos::catalog::CatalogBridge;
use crate::sonos::gena::GenaSubscriptionManager;
use crate::sonos::rendering::{clamp_eq, clamp_volume};
use crate::sonos::soap::{SoapError, SoapResult};
use crate::sonos::ssdp::{DiscoveredHost, OnFound};
use crate::sonos::types::{
    Channel, Device, EnqueueMode, EqSettings, Group, PlayMode, PlaybackState, QueueAddResult,
};
use crate::sonos::zone_groups::parse_groups;
use crate::sonos::{SonosClient, SonosService};
use crate::state::{Config, ControlState, Phase};
use crate::utils::now_millis;

use super::{poller, queue_ops, sleep_timer};

type StateFn = Box<dyn FnOnce(&mut ControlState) + Send>;

/// An optimistic state change and its inverse.
struct Optimistic {
    apply: StateFn,
    revert: StateFn,
    always_revert: bool,
}

impl Optimistic {
    fn new(
        apply: impl FnOnce(&mut ControlState) + Send + 'static,
        revert: impl FnOnce(&mut ControlState) + Send + 'static,
    ) -> Self {
        Self {
            apply: Box::new(apply),
            revert: Box::new(revert),
            always_revert: false,
        }
    }

    /// Reverts on failure even when rollback is not configured.
    fn always_revert(mut self) -> Self {
        self.always_revert = true;
        self
    }
}

/// The selected group's id and its coordinator's base URL.
struct Target {
    group_id: String,
    url: String,
}

/// Applies `f` to the group with `group_id`, if it still exists.
fn on_group(
    group_id: String,
    f: impl FnOnce(&mut Group) + Send + 'static,
) -> impl FnOnce(&mut ControlState) + Send + 'static {
    move |s| {
        if let Some(group) = s.groups.iter_mut().find(|g| g.id() == group_id) {
            f(group);
        }
    }
}

/// Orchestrates discovery, topology, selection, polling and commands.
pub struct Coordinator {
    client: Arc<dyn SonosClient>,
    emitter: Arc<dyn EventEmitter>,
    config: Config,
    spawner: TokioSpawner,
    state: watch::Sender<ControlState>,
    /// Hosts already handed to the description resolver this round.
    known_hosts: Mutex<HashSet<String>>,
    /// Token shared by every timer of the current round.
    timers: Mutex<CancellationToken>,
    gena: Option<Arc<GenaSubscriptionManager>>,
    catalog: Option<Arc<dyn CatalogBridge>>,
}

impl Coordinator {
    pub fn new(
        client: Arc<dyn SonosClient>,
        emitter: Arc<dyn EventEmitter>,
        config: Config,
        spawner: TokioSpawner,
    ) -> Self {
        let (state, _) = watch::channel(ControlState::default());
        Self {
            client,
            emitter,
            config,
            spawner,
            state,
            known_hosts: Mutex::new(HashSet::new()),
            timers: Mutex::new(CancellationToken::new()),
            gena: None,
            catalog: None,
        }
    }

    /// Enables GENA subscriptions. Only used when a callback URL is configured.
    #[must_use]
    pub fn with_event_subscriptions(mut self, gena: Arc<GenaSubscriptionManager>) -> Self {
        self.gena = Some(gena);
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogBridge>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────

    /// Returns a receiver that sees every published snapshot.
    pub fn subscribe_state(&self) -> watch::Receiver<ControlState> {
        self.state.subscribe()
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> ControlState {
        self.state.borrow().clone()
    }

    /// Returns the state as a stream of snapshots, starting with the current one.
    pub fn state_stream(&self) -> WatchStream<ControlState> {
        WatchStream::new(self.state.subscribe())
    }

    pub fn has_selection(&self) -> bool {
        self.state.borrow().selected_group().is_some()
    }

    /// Clears the last user-facing message.
    pub fn dismiss_message(&self) {
        self.state.send_if_modified(|s| s.message.take().is_some());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Discovery
    // ─────────────────────────────────────────────────────────────────────

    /// Starts a discovery round.
    ///
    /// Cancels every running timer, clears the host dedup set and launches
    /// the discovery engine. When the discovery window closes, discovery is
    /// stopped, topology is refreshed once and polling starts.
    pub fn start_discovery(self: &Arc<Self>) {
        let token = self.reset_timers();
        self.known_hosts.lock().clear();
        self.client.stop_search();

        self.state.send_modify(|s| {
            s.phase = Phase::Discovering;
            s.polling = false;
        });
        self.emitter.emit_topology(TopologyEvent::DiscoveryStarted {
            timestamp: now_millis(),
        });
        log::info!(
            "[Coordinator] Discovery started ({:?} window)",
            self.config.discovery_window()
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let on_found: OnFound = Arc::new(move |host: DiscoveredHost| {
            if tx.send(host).is_err() {
                log::trace!("[Coordinator] Discovery round already closed");
            }
        });
        self.client.search(on_found);

        let coordinator = Arc::clone(self);
        self.spawner.spawn_until_cancelled(
            token.clone(),
            coordinator.run_discovery_round(rx, token),
        );
    }

    async fn run_discovery_round(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<DiscoveredHost>,
        token: CancellationToken,
    ) {
        let window = tokio::time::sleep(self.config.discovery_window());
        tokio::pin!(window);
        let mut pending = FuturesUnordered::new();

        loop {
            tokio::select! {
                _ = &mut window => break,
                Some(host) = rx.recv() => {
                    let is_new = self.known_hosts.lock().insert(host.host.clone());
                    if is_new {
                        pending.push(self.resolve_host(host));
                    }
                }
                Some(()) = pending.next(), if !pending.is_empty() => {}
            }
        }

        self.client.stop_search();
        // Descriptions already in flight still count for this round.
        while pending.next().await.is_some() {}
        drop(pending);

        let device_count = self.state.borrow().devices.len();
        self.state.send_modify(|s| s.phase = Phase::Idle);
        self.emitter.emit_topology(TopologyEvent::DiscoveryFinished {
            device_count,
            timestamp: now_millis(),
        });
        log::info!(
            "[Coordinator] Discovery finished, {} known device(s)",
            device_count
        );

        if let Err(e) = self.refresh_groups().await {
            log::warn!("[Coordinator] Topology refresh after discovery failed: {}", e);
        }
        self.start_polling(&token);
    }

    /// Resolves one discovered host into a known device.
    async fn resolve_host(&self, host: DiscoveredHost) {
        match self.client.fetch_device(&host.host, host.port).await {
            Ok(Some(device)) => {
                log::info!(
                    "[Coordinator] Resolved {} ({}) at {}",
                    device.name,
                    device.id,
                    host.host
                );
                let added = device.clone();
                self.state.send_modify(|s| {
                    s.devices.insert(added.id.clone(), added);
                });
                self.emitter.emit_topology(TopologyEvent::DeviceFound {
                    device,
                    timestamp: now_millis(),
                });
            }
            Ok(None) => {
                log::debug!(
                    "[Coordinator] Ignoring non-conforming responder at {}",
                    host.host
                );
            }
            Err(e) => {
                log::warn!(
                    "[Coordinator] Description fetch from {} failed: {}",
                    host.host,
                    e
                );
            }
        }
    }

    fn start_polling(self: &Arc<Self>, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }
        self.state.send_modify(|s| s.polling = true);
        poller::start(self, &self.spawner, token);

        if let Some(gena) = &self.gena {
            let _renewal = gena.start_renewal_task(
                Duration::from_secs(self.config.gena_renewal_check_secs),
                token.clone(),
            );
        }
    }

    /// Cancels the current timer group and returns a fresh token.
    fn reset_timers(&self) -> CancellationToken {
        let mut timers = self.timers.lock();
        timers.cancel();
        *timers = CancellationToken::new();
        timers.clone()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Topology and selection
    // ─────────────────────────────────────────────────────────────────────

    /// Refetches topology and replaces the group set.
    ///
    /// A failed fetch leaves the previous groups untouched. Group volumes
    /// are fetched concurrently; a group whose fetch fails keeps its
    /// previous volume.
    pub async fn refresh_groups(&self) -> CoreResult<()> {
        let (devices, query) = {
            let state = self.state.borrow();
            let query = state
                .selected_group()
                .map(|g| g.coordinator.clone())
                .or_else(|| state.devices.values().min_by(|a, b| a.id.cmp(&b.id)).cloned());
            (state.devices.clone(), query)
        };
        let Some(query) = query else {
            log::debug!("[Topology] No known devices, skipping refresh");
            return Ok(());
        };

        let query_url = query.base_url();
        let xml = match self.client.get_topology(&query_url).await {
            Ok(xml) => xml,
            Err(e) => {
                log::warn!(
                    "[Topology] Fetch from {} failed, keeping previous groups: {}",
                    query.host,
                    e
                );
                return Err(e.into());
            }
        };

        let mut groups = parse_groups(&xml, &devices);
        let client = &self.client;
        let volumes = futures::future::join_all(groups.iter().map(|g| {
            let url = g.coordinator.base_url();
            async move { client.get_group_volume(&url).await }
        }))
        .await;

        let previous: HashMap<String, (u8, bool)> = self
            .state
            .borrow()
            .groups
            .iter()
            .map(|g| (g.id().to_string(), (g.volume, g.muted)))
            .collect();
        for (group, volume) in groups.iter_mut().zip(volumes) {
            let (previous_volume, previous_muted) =
                previous.get(group.id()).copied().unwrap_or_default();
            group.muted = previous_muted;
            group.volume = match volume {
                Ok(v) => v,
                Err(e) => {
                    log::warn!(
                        "[Topology] Group volume fetch for {} failed: {}",
                        group.name,
                        e
                    );
                    previous_volume
                }
            };
        }

        let mut selection_changed = false;
        let published = groups.clone();
        self.state.send_modify(|s| {
            for device in s.devices.values_mut() {
                device.is_coordinator = groups.iter().any(|g| g.id() == device.id);
            }
            for member in groups.iter().flat_map(|g| g.members.iter()) {
                if let Some(device) = s.devices.get_mut(&member.id) {
                    device.name = member.name.clone();
                }
            }

            let still_present = s
                .selected_group_id
                .as_deref()
                .is_some_and(|id| groups.iter().any(|g| g.id() == id));
            if !still_present {
                let next = groups.first().map(|g| g.id().to_string());
                selection_changed = next != s.selected_group_id;
                s.selected_group_id = next;
            }
            s.groups = groups;
        });

        log::info!("[Topology] {} group(s) from {}", published.len(), query.host);
        self.emitter.emit_topology(TopologyEvent::GroupsUpdated {
            groups: published,
            timestamp: now_millis(),
        });

        if selection_changed {
            let selected = self.state.borrow().selected_group_id.clone();
            log::info!("[Coordinator] Selection moved to {:?}", selected);
            self.clear_selection_state();
            self.emitter.emit_topology(TopologyEvent::GroupSelected {
                group_id: selected.clone(),
                timestamp: now_millis(),
            });
            if selected.is_some() {
                self.load_selection().await;
            }
        }

        self.subscribe_events(&query_url).await;
        Ok(())
    }

    /// Selects a group and refreshes everything shown for it.
    pub async fn select_group(&self, group_id: &str) -> CoreResult<()> {
        let exists = self.state.borrow().groups.iter().any(|g| g.id() == group_id);
        if !exists {
            return Err(SonorityError::GroupNotFound(group_id.to_string()));
        }

        self.state
            .send_modify(|s| s.selected_group_id = Some(group_id.to_string()));
        self.clear_selection_state();
        self.emitter.emit_topology(TopologyEvent::GroupSelected {
            group_id: Some(group_id.to_string()),
            timestamp: now_millis(),
        });
        self.load_selection().await;
        Ok(())
    }

    fn clear_selection_state(&self) {
        self.state.send_modify(|s| {
            s.transport = Default::default();
            s.queue.clear();
            s.eq = None;
            s.crossfade = false;
            s.sleep_timer_end_ms = None;
        });
    }

    /// Fans out every per-selection refresh. Each failure is reported on its own.
    async fn load_selection(&self) {
        let (transport, queue, volume, eq, crossfade, sleep) = tokio::join!(
            self.refresh_transport(),
            self.refresh_queue(),
            self.refresh_volume(),
            self.refresh_eq(),
            self.refresh_crossfade(),
            self.refresh_sleep_timer(),
        );
        for (action, result) in [
            ("Loading playback state", transport),
            ("Loading queue", queue),
            ("Loading volume", volume),
            ("Loading equalizer", eq),
            ("Loading crossfade", crossfade),
            ("Loading sleep timer", sleep),
        ] {
            if let Err(e) = result {
                self.report_failure(action, &e.to_string());
            }
        }
    }

    fn target(&self) -> CoreResult<Target> {
        let state = self.state.borrow();
        let group = state.selected_group().ok_or(SonorityError::NoGroupSelected)?;
        Ok(Target {
            group_id: group.id().to_string(),
            url: group.coordinator.base_url(),
        })
    }

    fn device(&self, device_id: &str) -> CoreResult<Device> {
        self.state
            .borrow()
            .devices
            .get(device_id)
            .cloned()
            .ok_or_else(|| SonorityError::DeviceNotFound(device_id.to_string()))
    }

    /// Applies `f` only if `group_id` is still the selection.
    fn update_selected(&self, group_id: &str, f: impl FnOnce(&mut ControlState)) -> bool {
        self.state.send_if_modified(|s| {
            if s.selected_group_id.as_deref() != Some(group_id) {
                return false;
            }
            f(s);
            true
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Refreshes
    // ─────────────────────────────────────────────────────────────────────

    /// Refreshes transport info of the selected group from its coordinator.
    pub async fn refresh_transport(&self) -> CoreResult<()> {
        let target = self.target()?;
        let mut info = self.client.get_transport_info(&target.url).await?;

        let mut changed = false;
        self.update_selected(&target.group_id, |s| {
            info.track_count = s.transport.track_count;
            changed = s.transport != info;
            s.transport = info.clone();
        });
        if changed {
            self.emitter.emit_transport(TransportEvent::StateChanged {
                group_id: target.group_id,
                info,
                timestamp: now_millis(),
            });
        }
        Ok(())
    }

    /// Reloads the whole queue, page by page.
    pub async fn refresh_queue(&self) -> CoreResult<()> {
        let target = self.target()?;
        let mut tracks = Vec::new();
        let total = loop {
            let page = self
                .client
                .browse_queue(&target.url, tracks.len() as u32, QUEUE_PAGE_SIZE)
                .await?;
            let returned = page.tracks.len();
            tracks.extend(page.tracks);
            if returned == 0 || tracks.len() as u32 >= page.total_matches {
                break page.total_matches;
            }
        };

        let length = tracks.len();
        self.update_selected(&target.group_id, |s| {
            s.queue = tracks;
            s.transport.track_count = total;
        });
        self.emitter.emit_transport(TransportEvent::QueueUpdated {
            group_id: target.group_id,
            length,
            timestamp: now_millis(),
        });
        Ok(())
    }

    async fn refresh_volume(&self) -> CoreResult<()> {
        let target = self.target()?;
        let (volume, muted) = tokio::try_join!(
            self.client.get_group_volume(&target.url),
            self.client.get_group_mute(&target.url),
        )?;
        self.state.send_modify(on_group(target.group_id.clone(), move |g| {
            g.volume = volume;
            g.muted = muted;
        }));
        self.emit_volume(&target.group_id);
        Ok(())
    }

    async fn refresh_eq(&self) -> CoreResult<()> {
        let target = self.target()?;
        let eq = self.client.get_eq(&target.url).await?;
        self.update_selected(&target.group_id, |s| s.eq = Some(eq));
        Ok(())
    }

    async fn refresh_crossfade(&self) -> CoreResult<()> {
        let target = self.target()?;
        let enabled = self.client.get_crossfade(&target.url).await?;
        self.update_selected(&target.group_id, |s| s.crossfade = enabled);
        Ok(())
    }

    async fn refresh_sleep_timer(&self) -> CoreResult<()> {
        let target = self.target()?;
        let remaining = self.client.get_sleep_timer(&target.url).await?;
        let end = remaining.map(|d| sleep_timer::end_ms(now_millis(), d));
        self.update_selected(&target.group_id, |s| s.sleep_timer_end_ms = end);
        Ok(())
    }

    /// Local position extrapolation, driven by the poller.
    pub(crate) fn advance_position(&self, elapsed: Duration) {
        self.state
            .send_if_modified(|s| poller::advance_position(&mut s.transport, elapsed));
    }

    /// Sleep-timer countdown, driven by the poller.
    pub(crate) fn tick_sleep_timer(&self, now_ms: u64) {
        let mut expired = None;
        self.state.send_if_modified(|s| {
            if sleep_timer::tick(&mut s.sleep_timer_end_ms, now_ms) {
                expired = s.selected_group_id.clone();
                true
            } else {
                false
            }
        });
        if let Some(group_id) = expired {
            log::info!("[Coordinator] Sleep timer for {} expired", group_id);
            self.emitter.emit_transport(TransportEvent::SleepTimerChanged {
                group_id,
                end_ms: None,
                timestamp: now_millis(),
            });
        }
    }

    fn emit_volume(&self, group_id: &str) {
        let current = self
            .state
            .borrow()
            .groups
            .iter()
            .find(|g| g.id() == group_id)
            .map(|g| (g.volume, g.muted));
        if let Some((volume, muted)) = current {
            self.emitter.emit_transport(TransportEvent::VolumeChanged {
                group_id: group_id.to_string(),
                volume,
                muted,
                timestamp: now_millis(),
            });
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Command plumbing
    // ─────────────────────────────────────────────────────────────────────

    /// Applies an optimistic update, runs `call`, and reports failure.
    ///
    /// The update is reverted on failure only when it is marked
    /// `always_revert` or `rollback_on_failure` is configured.
    async fn execute<T, F>(
        &self,
        action: &str,
        optimistic: Option<Optimistic>,
        call: F,
    ) -> CoreResult<T>
    where
        F: Future<Output = SoapResult<T>>,
    {
        let revert = optimistic.map(|o| {
            self.state.send_modify(o.apply);
            (o.revert, o.always_revert)
        });

        match call.await {
            Ok(value) => Ok(value),
            Err(e) => {
                if let Some((revert, always)) = revert {
                    if always || self.config.rollback_on_failure {
                        log::debug!("[Coordinator] Reverting optimistic update of {}", action);
                        self.state.send_modify(revert);
                    }
                }
                self.report_failure(action, &e.to_string());
                Err(e.into())
            }
        }
    }

    /// Surfaces a single human-readable message for a failed action.
    fn report_failure(&self, action: &str, error: &str) {
        let message = format!("{action} failed: {error}");
        log::warn!("[Coordinator] {}", message);
        let published = message.clone();
        self.state.send_modify(|s| s.message = Some(published));
        self.emitter.emit_notice(NoticeEvent::CommandFailed {
            action: action.to_string(),
            message,
            timestamp: now_millis(),
        });
    }

    /// Applies a playback-state change locally.
    fn playback_change(&self, next: PlaybackState) -> Optimistic {
        let previous = self.state.borrow().transport.state;
        Optimistic::new(
            move |s| s.transport.state = next,
            move |s| s.transport.state = previous,
        )
    }

    /// Applies a track change locally: new index, position back to 0.
    fn track_change(&self, index: u32, state: Option<PlaybackState>) -> Optimistic {
        let previous = self.state.borrow().transport.clone();
        Optimistic::new(
            move |s| {
                s.transport.track_index = index;
                s.transport.position_secs = 0.0;
                if let Some(state) = state {
                    s.transport.state = state;
                }
            },
            move |s| s.transport = previous,
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport commands
    // ─────────────────────────────────────────────────────────────────────

    pub async fn play(&self) -> CoreResult<()> {
        let target = self.target()?;
        let update = self.playback_change(PlaybackState::Playing);
        self.execute("Play", Some(update), self.client.play(&target.url))
            .await
    }

    pub async fn pause(&self) -> CoreResult<()> {
        let target = self.target()?;
        let update = self.playback_change(PlaybackState::Paused);
        self.execute("Pause", Some(update), self.client.pause(&target.url))
            .await
    }

    pub async fn stop(&self) -> CoreResult<()> {
        let target = self.target()?;
        let previous = self.state.borrow().transport.clone();
        let update = Optimistic::new(
            |s| {
                s.transport.state = PlaybackState::Stopped;
                s.transport.position_secs = 0.0;
            },
            move |s| s.transport = previous,
        );
        self.execute("Stop", Some(update), self.client.stop(&target.url))
            .await
    }

    pub async fn next(&self) -> CoreResult<()> {
        let target = self.target()?;
        let (index, count) = {
            let state = self.state.borrow();
            (state.transport.track_index, state.transport.track_count)
        };
        let next = if count > 0 { (index + 1).min(count) } else { index + 1 };
        let update = self.track_change(next, None);
        self.execute("Next track", Some(update), self.client.next(&target.url))
            .await
    }

    pub async fn previous(&self) -> CoreResult<()> {
        let target = self.target()?;
        let index = self.state.borrow().transport.track_index;
        let update = self.track_change(index.saturating_sub(1).max(1), None);
        self.execute(
            "Previous track",
            Some(update),
            self.client.previous(&target.url),
        )
        .await
    }

    /// Seeks within the current track.
    pub async fn seek(&self, position_secs: u64) -> CoreResult<()> {
        let target = self.target()?;
        let previous = self.state.borrow().transport.position_secs;
        let update = Optimistic::new(
            move |s| s.transport.position_secs = position_secs as f64,
            move |s| s.transport.position_secs = previous,
        );
        self.execute(
            "Seek",
            Some(update),
            self.client.seek(&target.url, position_secs),
        )
        .await
    }

    /// Plays the queue entry at 0-based `index`.
    pub async fn play_track(&self, index: usize) -> CoreResult<()> {
        let target = self.target()?;
        let track_number = index as u32 + 1;
        let update = self.track_change(track_number, Some(PlaybackState::Playing));
        let client = &self.client;
        let url = target.url.as_str();
        let group_id = target.group_id.as_str();
        self.execute("Play track", Some(update), async move {
            client.play_from_queue(url, group_id).await?;
            client.seek_track(url, track_number).await?;
            client.play(url).await
        })
        .await
    }

    pub async fn set_play_mode(&self, mode: PlayMode) -> CoreResult<()> {
        let target = self.target()?;
        let previous = self.state.borrow().transport.play_mode;
        let update = Optimistic::new(
            move |s| s.transport.play_mode = mode,
            move |s| s.transport.play_mode = previous,
        );
        self.execute(
            "Set play mode",
            Some(update),
            self.client.set_play_mode(&target.url, mode),
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Rendering commands
    // ─────────────────────────────────────────────────────────────────────

    pub async fn set_group_volume(&self, volume: i32) -> CoreResult<()> {
        let target = self.target()?;
        let level = clamp_volume(volume);
        let previous = self
            .state
            .borrow()
            .selected_group()
            .map(|g| g.volume)
            .unwrap_or_default();
        let update = Optimistic::new(
            on_group(target.group_id.clone(), move |g| g.volume = level),
            on_group(target.group_id.clone(), move |g| g.volume = previous),
        );
        self.execute(
            "Set volume",
            Some(update),
            self.client.set_group_volume(&target.url, i32::from(level)),
        )
        .await?;
        self.emit_volume(&target.group_id);
        Ok(())
    }

    /// Sets one device's own volume, independent of its group.
    pub async fn set_device_volume(&self, device_id: &str, volume: i32) -> CoreResult<()> {
        let device = self.device(device_id)?;
        self.execute(
            "Set speaker volume",
            None,
            self.client
                .set_volume(&device.base_url(), Channel::Master, volume),
        )
        .await
    }

    /// Flips the selected group's mute. Always reverts on failure.
    pub async fn toggle_group_mute(&self) -> CoreResult<()> {
        let target = self.target()?;
        let muted = self
            .state
            .borrow()
            .selected_group()
            .map(|g| g.muted)
            .unwrap_or_default();
        let update = Optimistic::new(
            on_group(target.group_id.clone(), move |g| g.muted = !muted),
            on_group(target.group_id.clone(), move |g| g.muted = muted),
        )
        .always_revert();
        self.execute(
            "Mute",
            Some(update),
            self.client.set_group_mute(&target.url, !muted),
        )
        .await?;
        self.emit_volume(&target.group_id);
        Ok(())
    }

    fn eq_change(&self, f: impl FnOnce(&mut EqSettings) + Send + 'static) -> Optimistic {
        let previous = self.state.borrow().eq;
        Optimistic::new(
            move |s| f(s.eq.get_or_insert_with(Default::default)),
            move |s| s.eq = previous,
        )
    }

    pub async fn set_bass(&self, level: i32) -> CoreResult<()> {
        let target = self.target()?;
        let level = clamp_eq(level);
        let update = self.eq_change(move |eq| eq.bass = level);
        self.execute(
            "Set bass",
            Some(update),
            self.client.set_bass(&target.url, level),
        )
        .await
    }

    pub async fn set_treble(&self, level: i32) -> CoreResult<()> {
        let target = self.target()?;
        let level = clamp_eq(level);
        let update = self.eq_change(move |eq| eq.treble = level);
        self.execute(
            "Set treble",
            Some(update),
            self.client.set_treble(&target.url, level),
        )
        .await
    }

    pub async fn set_loudness(&self, enabled: bool) -> CoreResult<()> {
        let target = self.target()?;
        let update = self.eq_change(move |eq| eq.loudness = enabled);
        self.execute(
            "Set loudness",
            Some(update),
            self.client
                .set_loudness(&target.url, Channel::Master, enabled),
        )
        .await
    }

    /// Sets crossfade. Always reverts on failure.
    pub async fn set_crossfade(&self, enabled: bool) -> CoreResult<()> {
        let target = self.target()?;
        let previous = self.state.borrow().crossfade;
        let update = Optimistic::new(
            move |s| s.crossfade = enabled,
            move |s| s.crossfade = previous,
        )
        .always_revert();
        self.execute(
            "Crossfade",
            Some(update),
            self.client.set_crossfade(&target.url, enabled),
        )
        .await
    }

    pub async fn toggle_crossfade(&self) -> CoreResult<()> {
        let enabled = !self.state.borrow().crossfade;
        self.set_crossfade(enabled).await
    }

    /// Starts (`Some(minutes)`) or cancels (`None` or `Some(0)`) the sleep timer.
    pub async fn set_sleep_timer(&self, minutes: Option<u32>) -> CoreResult<()> {
        let target = self.target()?;
        let duration = sleep_timer::from_minutes(minutes);
        let end = duration.map(|d| sleep_timer::end_ms(now_millis(), d));
        let previous = self.state.borrow().sleep_timer_end_ms;
        let update = Optimistic::new(
            move |s| s.sleep_timer_end_ms = end,
            move |s| s.sleep_timer_end_ms = previous,
        );
        self.execute(
            "Sleep timer",
            Some(update),
            self.client.configure_sleep_timer(&target.url, duration),
        )
        .await?;
        self.emitter.emit_transport(TransportEvent::SleepTimerChanged {
            group_id: target.group_id,
            end_ms: end,
            timestamp: now_millis(),
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queue commands
    // ─────────────────────────────────────────────────────────────────────

    fn queue_change(&self, f: impl FnOnce(&mut ControlState) + Send + 'static) -> Optimistic {
        let (queue, count) = {
            let state = self.state.borrow();
            (state.queue.clone(), state.transport.track_count)
        };
        Optimistic::new(f, move |s| {
            s.queue = queue;
            s.transport.track_count = count;
        })
    }

    /// Re-syncs the queue after an edit; failures only leave it stale.
    async fn resync_queue(&self) {
        if let Err(e) = self.refresh_queue().await {
            log::warn!("[Coordinator] Queue refresh after edit failed: {}", e);
        }
    }

    /// Removes the queue entry at 0-based `index`.
    pub async fn remove_from_queue(&self, index: usize) -> CoreResult<()> {
        let target = self.target()?;
        let length = self.state.borrow().queue.len();
        if index >= length {
            return Err(SonorityError::InvalidRequest(format!(
                "queue index {index} out of range ({length} tracks)"
            )));
        }
        let update = self.queue_change(move |s| {
            if queue_ops::remove_track(&mut s.queue, index) {
                s.transport.track_count = s.transport.track_count.saturating_sub(1);
            }
        });
        self.execute(
            "Remove from queue",
            Some(update),
            self.client.remove_track(&target.url, index as u32 + 1),
        )
        .await?;
        self.resync_queue().await;
        Ok(())
    }

    pub async fn clear_queue(&self) -> CoreResult<()> {
        let target = self.target()?;
        let update = self.queue_change(|s| {
            s.queue.clear();
            s.transport.track_count = 0;
        });
        self.execute(
            "Clear queue",
            Some(update),
            self.client.clear_queue(&target.url),
        )
        .await
    }

    /// Moves the entry at 0-based `source` before the entry at `destination`.
    pub async fn move_queue_item(&self, source: usize, destination: usize) -> CoreResult<()> {
        let target = self.target()?;
        let length = self.state.borrow().queue.len();
        if source >= length || destination > length {
            return Err(SonorityError::InvalidRequest(format!(
                "cannot move {source} to {destination} in a queue of {length}"
            )));
        }
        let request = queue_ops::reorder_request(source, destination);
        let update = self.queue_change(move |s| {
            queue_ops::move_track(&mut s.queue, source, destination);
        });
        self.execute(
            "Reorder queue",
            Some(update),
            self.client.reorder_queue(
                &target.url,
                request.starting_index,
                request.number_of_tracks,
                request.insert_before,
            ),
        )
        .await?;
        self.resync_queue().await;
        Ok(())
    }

    /// Enqueues a URI on the selected group.
    ///
    /// `PlayNow` inserts after the current track, points the transport at
    /// the queue and starts the new entry.
    pub async fn enqueue_uri(
        &self,
        uri: &str,
        metadata: &str,
        mode: EnqueueMode,
    ) -> CoreResult<QueueAddResult> {
        let target = self.target()?;
        let track_count = self.state.borrow().transport.track_count;
        let position = queue_ops::enqueue_position(mode, track_count);
        let client = &self.client;
        let url = target.url.as_str();
        let group_id = target.group_id.as_str();

        let added = self
            .execute("Add to queue", None, async move {
                let added = client.add_uri_to_queue(url, uri, metadata, position).await?;
                if mode == EnqueueMode::PlayNow {
                    client.play_from_queue(url, group_id).await?;
                    client.seek_track(url, added.first_track_number).await?;
                    client.play(url).await?;
                }
                Ok::<_, SoapError>(added)
            })
            .await?;

        log::info!(
            "[Coordinator] Enqueued {} track(s) at {} ({:?})",
            added.tracks_added,
            added.first_track_number,
            mode
        );
        self.resync_queue().await;
        if mode == EnqueueMode::PlayNow {
            if let Err(e) = self.refresh_transport().await {
                log::debug!("[Coordinator] Transport refresh after play failed: {}", e);
            }
        }
        Ok(added)
    }

    /// Enqueues an item from the configured external catalog.
    pub async fn enqueue_catalog_item(
        &self,
        item_id: &str,
        title: &str,
        mode: EnqueueMode,
    ) -> CoreResult<QueueAddResult> {
        let catalog = self.catalog.as_ref().ok_or_else(|| {
            SonorityError::Configuration("no catalog bridge configured".to_string())
        })?;
        let uri = catalog.playable_uri(item_id);
        let metadata = catalog.metadata(item_id, title);
        self.enqueue_uri(&uri, &metadata, mode).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Grouping commands
    // ─────────────────────────────────────────────────────────────────────

    /// Adds a device to a group, then re-syncs topology.
    pub async fn join_group(&self, device_id: &str, group_id: &str) -> CoreResult<()> {
        let device = self.device(device_id)?;
        let exists = self.state.borrow().groups.iter().any(|g| g.id() == group_id);
        if !exists {
            return Err(SonorityError::GroupNotFound(group_id.to_string()));
        }
        self.execute(
            "Join group",
            None,
            self.client.join_group(&device.base_url(), group_id),
        )
        .await?;
        self.resync_groups().await;
        Ok(())
    }

    /// Makes a device a standalone group, then re-syncs topology.
    pub async fn leave_group(&self, device_id: &str) -> CoreResult<()> {
        let device = self.device(device_id)?;
        self.execute(
            "Leave group",
            None,
            self.client.leave_group(&device.base_url()),
        )
        .await?;
        self.resync_groups().await;
        Ok(())
    }

    async fn resync_groups(&self) {
        if let Err(e) = self.refresh_groups().await {
            log::warn!("[Coordinator] Topology refresh after grouping failed: {}", e);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Eventing
    // ─────────────────────────────────────────────────────────────────────

    /// Subscribes to topology on the queried device and to transport and
    /// group rendering on every coordinator. Best-effort.
    async fn subscribe_events(&self, query_url: &str) {
        let (Some(gena), Some(callback)) = (&self.gena, &self.config.event_callback_url) else {
            return;
        };

        let mut targets = vec![(query_url.to_string(), SonosService::ZoneGroupTopology)];
        let coordinators: Vec<String> = self
            .state
            .borrow()
            .groups
            .iter()
            .map(|g| g.coordinator.base_url())
            .collect();
        for url in coordinators {
            targets.push((url.clone(), SonosService::AVTransport));
            targets.push((url, SonosService::GroupRenderingControl));
        }

        let results = futures::future::join_all(
            targets
                .iter()
                .map(|(url, service)| gena.subscribe(url, *service, callback)),
        )
        .await;
        for ((url, service), result) in targets.iter().zip(results) {
            if let Err(e) = result {
                log::warn!(
                    "[GENA] Subscribe to {} on {} failed: {}",
                    service.name(),
                    url,
                    e
                );
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Forgets every device, group and selection.
    pub fn reset(&self) {
        self.reset_timers();
        self.client.stop_search();
        self.known_hosts.lock().clear();

        if let Some(gena) = &self.gena {
            let urls: Vec<String> = self
                .state
                .borrow()
                .devices
                .values()
                .map(Device::base_url)
                .collect();
            let dropped: usize = urls.iter().map(|url| gena.unsubscribe_all(url)).sum();
            log::debug!("[Coordinator] Dropped {} subscription(s) on reset", dropped);
        }

        self.state.send_replace(ControlState::default());
        let timestamp = now_millis();
        self.emitter.emit_topology(TopologyEvent::GroupsUpdated {
            groups: Vec::new(),
            timestamp,
        });
        self.emitter.emit_topology(TopologyEvent::GroupSelected {
            group_id: None,
            timestamp,
        });
        log::info!("[Coordinator] Reset");
    }

    /// Stops every timer, discovery, and tears down event subscriptions.
    pub async fn shutdown(&self) {
        log::info!("[Coordinator] Shutting down");
        self.timers.lock().cancel();
        self.client.stop_search();
        if let Some(gena) = &self.gena {
            gena.shutdown().await;
        }
        self.state.send_modify(|s| {
            s.phase = Phase::Idle;
            s.polling = false;
        });
    }
}
