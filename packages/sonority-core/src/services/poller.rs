//! Wall-clock timer loops driving the coordinator while a group is selected.
//!
//! Three independent loops share one cancellation token:
//! - transport refresh (device round-trip)
//! - position extrapolation (local only)
//! - sleep-timer countdown (local only)

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::runtime::TaskSpawner;
use crate::sonos::types::{PlaybackState, TransportInfo};
use crate::utils::now_millis;

use super::coordinator::Coordinator;

/// Advances the cached position by `elapsed` while playing.
///
/// The position never passes the track duration when one is known.
/// Returns true when the position changed.
pub fn advance_position(info: &mut TransportInfo, elapsed: Duration) -> bool {
    if info.state != PlaybackState::Playing {
        return false;
    }
    let mut next = info.position_secs + elapsed.as_secs_f64();
    if let Some(duration) = info.track.as_ref().map(|t| t.duration_secs) {
        if duration > 0 {
            next = next.min(duration as f64);
        }
    }
    if next == info.position_secs {
        return false;
    }
    info.position_secs = next;
    true
}

fn interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Spawns every polling loop. All of them end when `token` is cancelled.
pub(crate) fn start<S: TaskSpawner>(coordinator: &Arc<Coordinator>, spawner: &S, token: &CancellationToken) {
    let config = coordinator.config();
    log::info!(
        "[Poller] Starting (transport every {:?}, position every {:?})",
        config.transport_poll_interval(),
        config.position_tick()
    );

    spawner.spawn_until_cancelled(
        token.clone(),
        transport_loop(Arc::clone(coordinator), config.transport_poll_interval()),
    );
    spawner.spawn_until_cancelled(
        token.clone(),
        position_loop(Arc::clone(coordinator), config.position_tick()),
    );
    spawner.spawn_until_cancelled(
        token.clone(),
        sleep_timer_loop(Arc::clone(coordinator), config.sleep_timer_tick()),
    );
}

async fn transport_loop(coordinator: Arc<Coordinator>, period: Duration) {
    let mut ticker = interval(period);
    loop {
        ticker.tick().await;
        if !coordinator.has_selection() {
            continue;
        }
        if let Err(e) = coordinator.refresh_transport().await {
            log::debug!("[Poller] Transport refresh failed: {}", e);
        }
    }
}

async fn position_loop(coordinator: Arc<Coordinator>, period: Duration) {
    let mut ticker = interval(period);
    let mut last = Instant::now();
    loop {
        ticker.tick().await;
        let now = Instant::now();
        coordinator.advance_position(now - last);
        last = now;
    }
}

async fn sleep_timer_loop(coordinator: Arc<Coordinator>, period: Duration) {
    let mut ticker = interval(period);
    loop {
        ticker.tick().await;
        coordinator.tick_sleep_timer(now_millis());
    }
}
