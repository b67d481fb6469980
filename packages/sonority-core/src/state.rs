//! Core configuration and the observable control state.
//!
//! [`Config`] holds every tunable of the control point. [`ControlState`] is
//! the snapshot the coordinator publishes after every mutation.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::protocol_constants::{
    DEFAULT_SEARCH_DEVICE_TYPE, EVENT_CHANNEL_CAPACITY, GENA_RENEWAL_BUFFER_SECS,
    GENA_RENEWAL_CHECK_SECS, GENA_SUBSCRIPTION_TIMEOUT_SECS, HTTP_CONNECT_TIMEOUT_SECS,
    HTTP_TOTAL_TIMEOUT_SECS,
};
use crate::sonos::ssdp::SsdpConfig;
use crate::sonos::types::{Device, EqSettings, Group, Track, TransportInfo};

/// Configuration for the control point.
///
/// All fields have sensible defaults; a partial config file only overrides
/// what it names.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    // Discovery
    /// How long discovery runs before topology is refreshed (seconds).
    pub discovery_window_secs: u64,

    /// Total time SSDP replies are received for (seconds).
    pub ssdp_receive_window_secs: u64,

    /// Number of M-SEARCH packets to send during discovery.
    pub ssdp_send_count: u32,

    /// Delay between M-SEARCH packet retries (milliseconds).
    pub ssdp_retry_delay_ms: u64,

    /// MX header value (seconds).
    pub ssdp_mx: u8,

    /// Device type searched for, e.g. `ZonePlayer`.
    pub search_device_type: String,

    // SOAP
    pub soap_connect_timeout_secs: u64,
    pub soap_timeout_secs: u64,

    // Polling
    /// Interval between full transport refreshes (milliseconds).
    pub transport_poll_interval_ms: u64,

    /// Interval of the local position extrapolation tick (milliseconds).
    pub position_tick_ms: u64,

    /// Interval of the sleep-timer countdown tick (milliseconds).
    pub sleep_timer_tick_ms: u64,

    // Eventing
    pub gena_timeout_secs: u64,
    pub gena_renewal_buffer_secs: u64,
    pub gena_renewal_check_secs: u64,

    /// Callback URL for GENA NOTIFY requests. Eventing is off when unset.
    ///
    /// Only the subscription lifecycle is managed here. Whatever listens on
    /// this URL must be run by the embedding application; polling keeps the
    /// state current either way.
    pub event_callback_url: Option<String>,

    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,

    /// Revert optimistic updates when a command fails.
    ///
    /// Mute and crossfade toggles always revert regardless of this flag.
    pub rollback_on_failure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_window_secs: 5,
            ssdp_receive_window_secs: 10,
            ssdp_send_count: 3,
            ssdp_retry_delay_ms: 1000,
            ssdp_mx: 3,
            search_device_type: DEFAULT_SEARCH_DEVICE_TYPE.to_string(),
            soap_connect_timeout_secs: HTTP_CONNECT_TIMEOUT_SECS,
            soap_timeout_secs: HTTP_TOTAL_TIMEOUT_SECS,
            transport_poll_interval_ms: 3000,
            position_tick_ms: 1000,
            sleep_timer_tick_ms: 1000,
            gena_timeout_secs: GENA_SUBSCRIPTION_TIMEOUT_SECS,
            gena_renewal_buffer_secs: GENA_RENEWAL_BUFFER_SECS,
            gena_renewal_check_secs: GENA_RENEWAL_CHECK_SECS,
            event_callback_url: None,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
            rollback_on_failure: false,
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        let non_zero = [
            ("discovery_window_secs", self.discovery_window_secs),
            ("ssdp_receive_window_secs", self.ssdp_receive_window_secs),
            ("ssdp_send_count", u64::from(self.ssdp_send_count)),
            ("soap_timeout_secs", self.soap_timeout_secs),
            ("transport_poll_interval_ms", self.transport_poll_interval_ms),
            ("position_tick_ms", self.position_tick_ms),
            ("sleep_timer_tick_ms", self.sleep_timer_tick_ms),
            ("gena_timeout_secs", self.gena_timeout_secs),
            ("gena_renewal_check_secs", self.gena_renewal_check_secs),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(format!("{name} must be >= 1"));
            }
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        if self.search_device_type.trim().is_empty() {
            return Err("search_device_type must not be empty".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn discovery_window(&self) -> Duration {
        Duration::from_secs(self.discovery_window_secs)
    }

    #[must_use]
    pub fn soap_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.soap_connect_timeout_secs)
    }

    #[must_use]
    pub fn soap_timeout(&self) -> Duration {
        Duration::from_secs(self.soap_timeout_secs)
    }

    #[must_use]
    pub fn transport_poll_interval(&self) -> Duration {
        Duration::from_millis(self.transport_poll_interval_ms)
    }

    #[must_use]
    pub fn position_tick(&self) -> Duration {
        Duration::from_millis(self.position_tick_ms)
    }

    #[must_use]
    pub fn sleep_timer_tick(&self) -> Duration {
        Duration::from_millis(self.sleep_timer_tick_ms)
    }

    #[must_use]
    pub fn ssdp_config(&self) -> SsdpConfig {
        SsdpConfig {
            send_count: self.ssdp_send_count,
            retry_delay: Duration::from_millis(self.ssdp_retry_delay_ms),
            receive_window: Duration::from_secs(self.ssdp_receive_window_secs),
            mx: self.ssdp_mx,
            device_type: self.search_device_type.clone(),
            ..SsdpConfig::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Control State
// ─────────────────────────────────────────────────────────────────────────────

/// Coordinator lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Discovering,
}

/// Snapshot of everything the coordinator knows.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    pub phase: Phase,
    /// True while the poll timers run.
    pub polling: bool,
    /// Known devices keyed by device id. Never pruned automatically.
    pub devices: HashMap<String, Device>,
    /// Groups in topology order, replaced wholesale on refresh.
    pub groups: Vec<Group>,
    pub selected_group_id: Option<String>,
    pub transport: TransportInfo,
    pub queue: Vec<Track>,
    /// Equalizer of the selected group's coordinator.
    pub eq: Option<EqSettings>,
    pub crossfade: bool,
    /// Absolute sleep-timer end, in epoch milliseconds.
    pub sleep_timer_end_ms: Option<u64>,
    /// Last user-facing message (usually a command failure).
    pub message: Option<String>,
}

impl ControlState {
    #[must_use]
    pub fn selected_group(&self) -> Option<&Group> {
        let id = self.selected_group_id.as_deref()?;
        self.groups.iter().find(|g| g.id() == id)
    }

    pub fn selected_group_mut(&mut self) -> Option<&mut Group> {
        let id = self.selected_group_id.clone()?;
        self.groups.iter_mut().find(|g| g.id() == id)
    }

    /// Remaining sleep time at `now_ms`, `None` when no timer is set.
    #[must_use]
    pub fn sleep_timer_remaining(&self, now_ms: u64) -> Option<Duration> {
        self.sleep_timer_end_ms
            .map(|end| Duration::from_millis(end.saturating_sub(now_ms)))
    }

    /// Serializes the state to JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut devices: Vec<&Device> = self.devices.values().collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        json!({
            "phase": self.phase,
            "polling": self.polling,
            "devices": devices,
            "groups": self.groups,
            "selectedGroupId": self.selected_group_id,
            "transport": self.transport,
            "queue": self.queue,
            "eq": self.eq,
            "crossfade": self.crossfade,
            "sleepTimerEndMs": self.sleep_timer_end_ms,
            "message": self.message,
        })
    }
}
