//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by UPnP, SSDP and the speakers' own firmware.
//! Tunable timings live in [`Config`](crate::state::Config) instead.

// ─────────────────────────────────────────────────────────────────────────────
// SSDP
// ─────────────────────────────────────────────────────────────────────────────

/// Reserved SSDP multicast group and port.
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";

/// Device type searched for when no other target is configured.
pub const DEFAULT_SEARCH_DEVICE_TYPE: &str = "ZonePlayer";

/// Largest datagram read from the discovery socket.
pub const SSDP_MAX_DATAGRAM: usize = 2048;

/// UPnP 1.0 recommends a multicast TTL of 4 for SSDP.
pub const SSDP_MULTICAST_TTL: u32 = 4;

/// Builds the full `ST` search target for a device type.
#[must_use]
pub fn search_target(device_type: &str) -> String {
    format!("urn:schemas-upnp-org:device:{}:1", device_type)
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP/SOAP
// ─────────────────────────────────────────────────────────────────────────────

/// Well-known path of the UPnP device description document.
pub const DEVICE_DESCRIPTION_PATH: &str = "/xml/device_description.xml";

/// Default control port of the speakers.
pub const DEFAULT_DEVICE_PORT: u16 = 1400;

/// Connection timeout for SOAP and description requests (seconds).
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total timeout for a single SOAP or description request (seconds).
pub const HTTP_TOTAL_TIMEOUT_SECS: u64 = 15;

/// Prefix the speakers put in front of their unique device name.
pub const UDN_PREFIX: &str = "uuid:";

// ─────────────────────────────────────────────────────────────────────────────
// AVTransport / ContentDirectory
// ─────────────────────────────────────────────────────────────────────────────

/// ContentDirectory object id of the coordinator's current play queue.
pub const QUEUE_CONTAINER_ID: &str = "Q:0";

/// URI scheme that makes a speaker follow another coordinator.
pub const GROUP_FOLLOW_SCHEME: &str = "x-rincon:";

/// URI scheme of a coordinator's own queue.
pub const QUEUE_URI_SCHEME: &str = "x-rincon-queue:";

/// Queue page size requested when browsing the current queue.
pub const QUEUE_PAGE_SIZE: u32 = 500;

// ─────────────────────────────────────────────────────────────────────────────
// GENA (UPnP General Event Notification Architecture)
// ─────────────────────────────────────────────────────────────────────────────

/// Subscription timeout requested from the speaker (seconds).
pub const GENA_SUBSCRIPTION_TIMEOUT_SECS: u64 = 600;

/// Time before subscription expiry to trigger renewal (seconds).
pub const GENA_RENEWAL_BUFFER_SECS: u64 = 60;

/// Interval between subscription renewal checks (seconds).
pub const GENA_RENEWAL_CHECK_SECS: u64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Rendering ranges
// ─────────────────────────────────────────────────────────────────────────────

/// Upper bound for device and group volume.
pub const MAX_VOLUME: i32 = 100;

/// Lower/upper bound for bass and treble.
pub const EQ_RANGE: i32 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of the outbound event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;
