//! Outbound event system.
//!
//! This module provides:
//! - [`EventEmitter`] trait the coordinator emits through
//! - [`BroadcastEventBridge`] fanning events out over a broadcast channel
//! - Event types for topology, transport and user-facing notices

mod bridge;
pub(crate) mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::sonos::types::{Device, Group, TransportInfo};

/// Events broadcast to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Discovery and group topology changes.
    Topology(TopologyEvent),

    /// Playback state of the selected group.
    Transport(TransportEvent),

    /// Messages meant for the user.
    Notice(NoticeEvent),
}

/// Events from discovery and topology refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TopologyEvent {
    DiscoveryStarted {
        timestamp: u64,
    },
    /// A device description was resolved for the first time.
    DeviceFound {
        device: Device,
        timestamp: u64,
    },
    DiscoveryFinished {
        #[serde(rename = "deviceCount")]
        device_count: usize,
        timestamp: u64,
    },
    /// Groups were recomputed from topology.
    GroupsUpdated {
        groups: Vec<Group>,
        timestamp: u64,
    },
    GroupSelected {
        #[serde(rename = "groupId")]
        group_id: Option<String>,
        timestamp: u64,
    },
}

/// Events about the selected group's playback.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransportEvent {
    /// Transport info was refreshed from the device.
    StateChanged {
        #[serde(rename = "groupId")]
        group_id: String,
        info: TransportInfo,
        timestamp: u64,
    },
    QueueUpdated {
        #[serde(rename = "groupId")]
        group_id: String,
        length: usize,
        timestamp: u64,
    },
    VolumeChanged {
        #[serde(rename = "groupId")]
        group_id: String,
        volume: u8,
        muted: bool,
        timestamp: u64,
    },
    SleepTimerChanged {
        #[serde(rename = "groupId")]
        group_id: String,
        #[serde(rename = "endMs")]
        end_ms: Option<u64>,
        timestamp: u64,
    },
}

/// User-facing notices.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NoticeEvent {
    /// A user-initiated command failed.
    CommandFailed {
        action: String,
        message: String,
        timestamp: u64,
    },
}

impl From<TopologyEvent> for BroadcastEvent {
    fn from(event: TopologyEvent) -> Self {
        BroadcastEvent::Topology(event)
    }
}

impl From<TransportEvent> for BroadcastEvent {
    fn from(event: TransportEvent) -> Self {
        BroadcastEvent::Transport(event)
    }
}

impl From<NoticeEvent> for BroadcastEvent {
    fn from(event: NoticeEvent) -> Self {
        BroadcastEvent::Notice(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_category_and_type() {
        let event: BroadcastEvent = NoticeEvent::CommandFailed {
            action: "play".into(),
            message: "HTTP error 500".into(),
            timestamp: 1,
        }
        .into();

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["category"], "notice");
        assert_eq!(json["type"], "commandFailed");
        assert_eq!(json["action"], "play");
    }

    #[test]
    fn selection_event_renames_fields() {
        let json = serde_json::to_value(BroadcastEvent::from(TopologyEvent::GroupSelected {
            group_id: Some("RINCON_A".into()),
            timestamp: 2,
        }))
        .unwrap();
        assert_eq!(json["groupId"], "RINCON_A");
    }
}
