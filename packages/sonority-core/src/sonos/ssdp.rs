//! SSDP multicast discovery.
//!
//! One UDP socket bound to an ephemeral port sends the M-SEARCH request to
//! 239.255.255.250:1900 a few times and receives the unicast replies on the
//! same socket. Every reply carrying a `LOCATION` header is reported through
//! the caller's callback as it arrives. The engine does not deduplicate:
//! a speaker answering each of the three searches is reported three times.
//!
//! A search runs on its own tokio task and can be stopped from any context.
//! The socket is owned by that task, so it is closed exactly once, when the
//! task observes cancellation or the receive window ends.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::protocol_constants::{
    search_target, DEFAULT_SEARCH_DEVICE_TYPE, SSDP_MAX_DATAGRAM, SSDP_MULTICAST_ADDR,
    SSDP_MULTICAST_TTL,
};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to create or bind the UDP socket.
    #[error("failed to bind UDP socket: {0}")]
    SocketBind(#[source] std::io::Error),

    /// Failed to send the SSDP multicast search.
    #[error("failed to send SSDP search: {0}")]
    SendSearch(#[source] std::io::Error),
}

/// Convenient Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

// ─────────────────────────────────────────────────────────────────────────────
// ASCII Case-Insensitive Helpers
// ─────────────────────────────────────────────────────────────────────────────
//
// HTTP headers are ASCII, so byte-level comparison is safe and avoids
// allocating a lowercased copy of every datagram.

/// Checks if `haystack` contains `needle` (ASCII case-insensitive, no allocation).
#[inline]
fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Checks if `s` starts with `prefix` (ASCII case-insensitive, no allocation).
#[inline]
fn starts_with_ignore_ascii_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// A device location reported by an SSDP reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredHost {
    pub host: String,
    pub port: u16,
    /// Full `LOCATION` URL (the device description).
    pub location: String,
}

/// Builds the M-SEARCH message.
fn build_msearch_message(mx: u8, search_target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\r\n",
        SSDP_MULTICAST_ADDR, mx, search_target
    )
}

/// Parses an SSDP reply into the host and port of its `LOCATION` header.
///
/// A reply is considered when it mentions the expected device type or
/// carries a `LOCATION` header at all. Returns `None` when no usable
/// location can be read.
fn parse_ssdp_response(response: &str, device_type: &str) -> Option<DiscoveredHost> {
    let location = response
        .lines()
        .find(|l| starts_with_ignore_ascii_case(l, "location:"))
        .and_then(|l| l.find(':').map(|idx| l[idx + 1..].trim().to_string()));

    if location.is_none() && !contains_ignore_ascii_case(response, device_type) {
        return None;
    }

    let location = location?;
    let url = reqwest::Url::parse(&location).ok()?;
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default()?;

    Some(DiscoveredHost {
        host,
        port,
        location,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Socket
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the discovery socket on an ephemeral port.
///
/// Sets up socket options for SSDP discovery:
/// - SO_REUSEADDR for rapid restarts
/// - Multicast TTL of 4 per UPnP 1.0
/// - Non-blocking, as required by tokio
fn create_socket() -> DiscoveryResult<UdpSocket> {
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;

    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEADDR: {}", e);
    }

    if let Err(e) = socket.set_multicast_ttl_v4(SSDP_MULTICAST_TTL) {
        log::warn!("[SSDP] Failed to set multicast TTL: {}", e);
    }

    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketBind)?;

    socket
        .bind(&bind_addr.into())
        .map_err(DiscoveryError::SocketBind)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(DiscoveryError::SocketBind)
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for SSDP discovery.
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Number of M-SEARCH packets to send.
    pub send_count: u32,
    /// Delay between M-SEARCH sends.
    pub retry_delay: Duration,
    /// Total time replies are received for.
    pub receive_window: Duration,
    /// MX value (max response delay in seconds).
    pub mx: u8,
    /// Device type searched for, e.g. `ZonePlayer`.
    pub device_type: String,
    /// Where M-SEARCH datagrams are sent. The reserved multicast group unless overridden.
    pub search_addr: String,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            send_count: 3,
            retry_delay: Duration::from_millis(1000),
            receive_window: Duration::from_secs(10),
            mx: 3,
            device_type: DEFAULT_SEARCH_DEVICE_TYPE.to_string(),
            search_addr: SSDP_MULTICAST_ADDR.to_string(),
        }
    }
}

/// Whether a search is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscoveryState {
    Idle,
    Searching,
}

/// Callback invoked for every reply with a usable location.
pub type OnFound = Arc<dyn Fn(DiscoveredHost) + Send + Sync>;

struct SearchSlot {
    /// Incremented per search so a finished task never clears a newer one.
    generation: u64,
    token: Option<CancellationToken>,
}

/// Stoppable SSDP search engine.
pub struct SsdpDiscovery {
    config: SsdpConfig,
    slot: Arc<Mutex<SearchSlot>>,
}

impl SsdpDiscovery {
    #[must_use]
    pub fn new(config: SsdpConfig) -> Self {
        Self {
            config,
            slot: Arc::new(Mutex::new(SearchSlot {
                generation: 0,
                token: None,
            })),
        }
    }

    #[must_use]
    pub fn state(&self) -> DiscoveryState {
        if self.slot.lock().token.is_some() {
            DiscoveryState::Searching
        } else {
            DiscoveryState::Idle
        }
    }

    /// Starts a search, stopping any search already in progress.
    ///
    /// Must be called from within a tokio runtime. Socket failures are
    /// logged and the search simply finds nothing.
    pub fn search(&self, on_found: OnFound) {
        let token = CancellationToken::new();
        let generation = {
            let mut slot = self.slot.lock();
            if let Some(previous) = slot.token.take() {
                previous.cancel();
            }
            slot.generation += 1;
            slot.token = Some(token.clone());
            slot.generation
        };

        let config = self.config.clone();
        let slot = Arc::clone(&self.slot);

        tokio::spawn(async move {
            run_search(&config, &token, on_found).await;

            let mut slot = slot.lock();
            if slot.generation == generation {
                slot.token = None;
            }
        });
    }

    /// Stops the current search. Idempotent and safe to call in any state.
    ///
    /// An in-progress receive is interrupted immediately rather than
    /// waiting for the receive window to end.
    pub fn stop(&self) {
        if let Some(token) = self.slot.lock().token.take() {
            log::debug!("[SSDP] Stopping search");
            token.cancel();
        }
    }
}

impl Drop for SsdpDiscovery {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sends the searches and receives replies until cancelled or the window ends.
async fn run_search(config: &SsdpConfig, token: &CancellationToken, on_found: OnFound) {
    let socket = match create_socket() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("[SSDP] Discovery unavailable: {}", e);
            return;
        }
    };

    let msg = build_msearch_message(config.mx, &search_target(&config.device_type));
    let deadline = Instant::now() + config.receive_window;
    let mut next_send = Instant::now();
    let mut sends_done = 0;
    let mut buf = [0u8; SSDP_MAX_DATAGRAM];

    log::info!(
        "[SSDP] Searching for {} ({} sends, {}s window)",
        config.device_type,
        config.send_count,
        config.receive_window.as_secs()
    );

    loop {
        if sends_done < config.send_count && Instant::now() >= next_send {
            sends_done += 1;
            next_send += config.retry_delay;
            if let Err(e) = socket.send_to(msg.as_bytes(), config.search_addr.as_str()).await {
                log::warn!(
                    "[SSDP] {} (attempt {})",
                    DiscoveryError::SendSearch(e),
                    sends_done
                );
            }
        }

        let wake = if sends_done < config.send_count {
            next_send.min(deadline)
        } else {
            deadline
        };

        tokio::select! {
            _ = token.cancelled() => {
                log::debug!("[SSDP] Search cancelled");
                break;
            }
            _ = tokio::time::sleep_until(wake) => {
                if Instant::now() >= deadline {
                    break;
                }
            }
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((amt, src)) => {
                        let response = String::from_utf8_lossy(&buf[..amt]);
                        if let Some(found) = parse_ssdp_response(&response, &config.device_type) {
                            log::debug!("[SSDP] Reply from {} -> {}", src, found.location);
                            on_found(found);
                        }
                    }
                    Err(e) => log::warn!("[SSDP] Socket recv error: {}", e),
                }
            }
        }
    }

    log::info!("[SSDP] Search finished");
}
