//! Speaker control and discovery.
//!
//! This module speaks the UPnP control protocol: SSDP discovery, device
//! descriptions, SOAP actions and GENA eventing.
//!
//! # Module Structure
//!
//! - `xml` - Tolerant substring XML extraction and duration helpers
//! - `didl` - DIDL-Lite decoding and building
//! - `types` - Domain types (devices, groups, tracks, transport state)
//! - `services` - UPnP service definitions (URNs, paths)
//! - `soap` - Low-level SOAP protocol implementation
//! - `retry` - Backoff for transient UPnP faults
//! - `ssdp` - Multicast discovery engine
//! - `description` - Device description retrieval
//! - `zone_groups` - Zone group topology parsing and retrieval
//! - `grouping` - Group join/leave commands
//! - `rendering` - Volume, mute and equalizer control
//! - `transport` - Playback, queue, sleep timer and crossfade control
//! - `gena` - GENA subscription lifecycle (manager)
//! - `gena_client` - GENA HTTP operations
//! - `gena_store` - GENA subscription state management
//! - `catalog` - External catalog bridge
//! - `traits` - Trait abstractions for testability
//! - `client` - `SonosClientImpl` concrete trait implementation

pub mod catalog;
pub mod client;
pub mod description;
pub mod didl;
pub mod gena;
pub mod gena_client;
pub mod gena_store;
pub mod grouping;
pub mod rendering;
pub(crate) mod retry;
pub mod services;
pub mod soap;
pub mod ssdp;
pub mod traits;
pub mod transport;
pub mod types;
pub mod xml;
pub mod zone_groups;

// Re-export domain types
pub use services::SonosService;
pub use types::{
    Channel, Device, DeviceCategory, EnqueueMode, EqSettings, Group, PlayMode, PlaybackState,
    QueueAddResult, QueuePage, Track, TransportInfo,
};

// Re-export trait abstractions
pub use traits::{
    SonosClient, SonosDescription, SonosDiscovery, SonosRendering, SonosTopology, SonosTransport,
};

// Re-export concrete implementations
pub use catalog::{CatalogBridge, VendorCatalogBridge};
pub use client::{build_http_client, SonosClientImpl};
pub use gena::GenaSubscriptionManager;
