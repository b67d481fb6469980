//! Dependency wiring.
//!
//! This module is the composition root: the single place where the HTTP
//! client, the speaker client, the event bridge and the coordinator are
//! instantiated and wired together.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::broadcast;

use crate::error::{CoreResult, SonorityError};
use crate::events::{BroadcastEvent, BroadcastEventBridge, EventEmitter};
use crate::runtime::TokioSpawner;
use crate::services::Coordinator;
use crate::sonos::{
    build_http_client, CatalogBridge, GenaSubscriptionManager, SonosClient, SonosClientImpl,
};
use crate::state::Config;

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Speaker client shared by every protocol call.
    pub sonos: Arc<dyn SonosClient>,
    /// Owner of the control state.
    pub coordinator: Arc<Coordinator>,
    /// Event bridge fanning coordinator events out over a broadcast channel.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Shared HTTP client for connection pooling.
    http_client: Client,
}

impl BootstrappedServices {
    /// Returns the shared HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Returns a new receiver of every coordinator event.
    pub fn subscribe_events(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.event_bridge.subscribe()
    }

    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.coordinator.shutdown().await;
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Bootstraps all services without a catalog bridge.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the HTTP client cannot
/// be built, or no Tokio runtime is running.
pub fn bootstrap_services(config: &Config) -> CoreResult<BootstrappedServices> {
    bootstrap_services_with_catalog(config, None)
}

/// Bootstraps all services, optionally wiring an external catalog bridge.
///
/// Wiring order:
///
/// 1. Config validation
/// 2. Shared HTTP client
/// 3. Speaker client (depends on HTTP client, discovery settings)
/// 4. Event bridge
/// 5. GENA manager, only when an event callback URL is configured
/// 6. Coordinator (depends on all of the above)
pub fn bootstrap_services_with_catalog(
    config: &Config,
    catalog: Option<Arc<dyn CatalogBridge>>,
) -> CoreResult<BootstrappedServices> {
    config.validate().map_err(SonorityError::Configuration)?;

    let handle = tokio::runtime::Handle::try_current()
        .map_err(|e| SonorityError::Internal(format!("No Tokio runtime: {}", e)))?;
    let spawner = TokioSpawner::new(handle);

    let http_client = build_http_client(config)
        .map_err(|e| SonorityError::Internal(format!("Failed to create HTTP client: {}", e)))?;

    let sonos: Arc<dyn SonosClient> = Arc::new(SonosClientImpl::with_discovery_config(
        http_client.clone(),
        config.ssdp_config(),
    ));

    let event_bridge = Arc::new(BroadcastEventBridge::new(config.event_channel_capacity));

    let mut coordinator = Coordinator::new(
        Arc::clone(&sonos),
        Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
        config.clone(),
        spawner,
    );

    if let Some(callback) = &config.event_callback_url {
        log::info!("[Bootstrap] GENA callback URL: {}", callback);
        coordinator = coordinator.with_event_subscriptions(Arc::new(GenaSubscriptionManager::new(
            http_client.clone(),
            config.gena_timeout_secs,
            Duration::from_secs(config.gena_renewal_buffer_secs),
        )));
    }
    if let Some(catalog) = catalog {
        coordinator = coordinator.with_catalog(catalog);
    }

    Ok(BootstrappedServices {
        sonos,
        coordinator: Arc::new(coordinator),
        event_bridge,
        http_client,
    })
}
