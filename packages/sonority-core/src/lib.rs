//! Sonority Core - UPnP control-point engine for networked speakers.
//!
//! This crate discovers speakers over SSDP, resolves their device
//! descriptions, drives them through SOAP actions, tracks group topology and
//! keeps a polled view of the selected group's playback.
//!
//! # Architecture
//!
//! - [`sonos`]: protocol facades (XML, SOAP, SSDP, topology, rendering, transport, GENA)
//! - [`services`]: the [`Coordinator`](services::Coordinator) state machine and poller
//! - [`events`]: outbound events for observers
//! - [`state`]: configuration and the observable control state
//! - [`bootstrap`]: composition root
//! - [`runtime`]: task spawning abstraction
//! - [`error`]: centralized error types
//!
//! # Abstraction Traits
//!
//! - [`SonosClient`](sonos::SonosClient): every speaker operation, for testing with fakes
//! - [`EventEmitter`](events::EventEmitter): emitting domain events
//! - [`TaskSpawner`](runtime::TaskSpawner): spawning background tasks
//! - [`CatalogBridge`](sonos::CatalogBridge): resolving external catalog items

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod runtime;
pub mod services;
pub mod sonos;
pub mod state;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{CoreResult, DiscoveryResult, ErrorCode, GenaResult, SoapResult, SonorityError};
pub use events::{
    BroadcastEvent, BroadcastEventBridge, EventEmitter, LoggingEventEmitter, NoopEventEmitter,
    NoticeEvent, TopologyEvent, TransportEvent,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::{Config, ControlState, Phase};
pub use utils::now_millis;

// Re-export speaker types
pub use sonos::types::{
    Device, EnqueueMode, Group, PlayMode, PlaybackState, QueueAddResult, Track, TransportInfo,
};
pub use sonos::{CatalogBridge, SonosClient, SonosClientImpl, SonosService, VendorCatalogBridge};

// Re-export service types
pub use services::Coordinator;

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, bootstrap_services_with_catalog, BootstrappedServices};
