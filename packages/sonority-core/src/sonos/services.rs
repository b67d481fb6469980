//! UPnP service definitions.
//!
//! This module provides a single source of truth for service URNs,
//! control paths, and event paths used by both SOAP commands and GENA subscriptions.

use serde::Serialize;

/// UPnP services used for control and event subscriptions.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SonosService {
    /// Audio/Video transport control (play, pause, seek, queue, sleep timer).
    AVTransport,
    /// Per-speaker volume, mute, bass, treble and loudness.
    RenderingControl,
    /// Media browsing; the current queue lives under container `Q:0`.
    ContentDirectory,
    /// Zone group topology and membership information.
    ZoneGroupTopology,
    /// Device-level properties (names, LEDs, household).
    DeviceProperties,
    /// Group volume and mute control (for coordinator speakers).
    GroupRenderingControl,
}

impl SonosService {
    /// Every known service, in a stable order.
    pub const ALL: [SonosService; 6] = [
        Self::AVTransport,
        Self::RenderingControl,
        Self::ContentDirectory,
        Self::ZoneGroupTopology,
        Self::DeviceProperties,
        Self::GroupRenderingControl,
    ];

    /// Returns the UPnP service URN for SOAP requests.
    #[must_use]
    pub fn urn(&self) -> &'static str {
        match self {
            Self::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
            Self::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:1",
            Self::ContentDirectory => "urn:schemas-upnp-org:service:ContentDirectory:1",
            Self::ZoneGroupTopology => "urn:schemas-upnp-org:service:ZoneGroupTopology:1",
            Self::DeviceProperties => "urn:schemas-upnp-org:service:DeviceProperties:1",
            Self::GroupRenderingControl => "urn:schemas-upnp-org:service:GroupRenderingControl:1",
        }
    }

    /// Returns the UPnP control endpoint path for SOAP requests.
    #[must_use]
    pub fn control_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/MediaRenderer/AVTransport/Control",
            Self::RenderingControl => "/MediaRenderer/RenderingControl/Control",
            Self::ContentDirectory => "/MediaServer/ContentDirectory/Control",
            Self::ZoneGroupTopology => "/ZoneGroupTopology/Control",
            Self::DeviceProperties => "/DeviceProperties/Control",
            Self::GroupRenderingControl => "/MediaRenderer/GroupRenderingControl/Control",
        }
    }

    /// Returns the UPnP event endpoint path for GENA subscriptions.
    #[must_use]
    pub fn event_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/MediaRenderer/AVTransport/Event",
            Self::RenderingControl => "/MediaRenderer/RenderingControl/Event",
            Self::ContentDirectory => "/MediaServer/ContentDirectory/Event",
            Self::ZoneGroupTopology => "/ZoneGroupTopology/Event",
            Self::DeviceProperties => "/DeviceProperties/Event",
            Self::GroupRenderingControl => "/MediaRenderer/GroupRenderingControl/Event",
        }
    }

    /// Returns a human-readable name for this service.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AVTransport => "AVTransport",
            Self::RenderingControl => "RenderingControl",
            Self::ContentDirectory => "ContentDirectory",
            Self::ZoneGroupTopology => "ZoneGroupTopology",
            Self::DeviceProperties => "DeviceProperties",
            Self::GroupRenderingControl => "GroupRenderingControl",
        }
    }
}
