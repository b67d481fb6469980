//! UPnP GENA event subscription lifecycle.
//!
//! `GenaSubscriptionManager` composes the HTTP half ([`GenaClient`]) with the
//! state half ([`GenaSubscriptionStore`]). Subscribe failures surface to the
//! caller; unsubscribe and renewal failures are logged and the local entry is
//! dropped.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::gena_client::GenaClient;
use super::gena_store::{GenaSubscriptionStore, SubscriptionKey};
use super::services::SonosService;

/// Errors that can occur during GENA operations.
#[derive(Debug, Error)]
pub enum GenaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Subscription failed with status {0}")]
    SubscriptionFailed(u16),

    #[error("Renewal failed with status {0}")]
    RenewalFailed(u16),

    #[error("Response did not include a SID header")]
    MissingSid,

    #[error("No subscription for {0}")]
    NotSubscribed(String),

    #[error("Subscription already in flight for {0}")]
    Pending(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),
}

/// Convenient Result alias for GENA operations.
pub type GenaResult<T> = Result<T, GenaError>;

/// Owns every event subscription this control point holds.
pub struct GenaSubscriptionManager {
    client: GenaClient,
    store: GenaSubscriptionStore,
    timeout_secs: u64,
    renewal_buffer: Duration,
}

impl GenaSubscriptionManager {
    /// # Arguments
    /// * `client` - The HTTP client used for SUBSCRIBE/UNSUBSCRIBE
    /// * `timeout_secs` - Requested subscription lifetime
    /// * `renewal_buffer` - Renew subscriptions expiring within this window
    #[must_use]
    pub fn new(client: Client, timeout_secs: u64, renewal_buffer: Duration) -> Self {
        Self {
            client: GenaClient::new(client),
            store: GenaSubscriptionStore::new(),
            timeout_secs,
            renewal_buffer,
        }
    }

    #[must_use]
    pub fn store(&self) -> &GenaSubscriptionStore {
        &self.store
    }

    /// Subscribes to a service's events and records the returned SID.
    ///
    /// Returns the existing SID when the key is already subscribed.
    pub async fn subscribe(
        &self,
        device: &str,
        service: SonosService,
        callback_url: &str,
    ) -> GenaResult<String> {
        let key = SubscriptionKey::new(device, service);
        if let Some(existing) = self.store.get(&key) {
            return Ok(existing.sid);
        }
        if !self.store.try_mark_pending(&key) {
            return Err(GenaError::Pending(format!("{} {}", device, service.name())));
        }

        match self
            .client
            .subscribe(device, service, callback_url, self.timeout_secs)
            .await
        {
            Ok(response) => {
                log::info!(
                    "[GENA] Subscribed to {} on {} (sid={}, timeout={}s)",
                    service.name(),
                    device,
                    response.sid,
                    response.timeout_secs
                );
                self.store.insert(
                    key,
                    response.sid.clone(),
                    callback_url.to_string(),
                    response.timeout_secs,
                );
                Ok(response.sid)
            }
            Err(e) => {
                self.store.clear_pending(&key);
                Err(e)
            }
        }
    }

    /// Renews one subscription with its existing SID.
    ///
    /// # Errors
    /// `NotSubscribed` when no entry exists; any renewal failure, in which
    /// case the entry is dropped.
    pub async fn renew(&self, device: &str, service: SonosService) -> GenaResult<()> {
        let key = SubscriptionKey::new(device, service);
        let sub = self
            .store
            .get(&key)
            .ok_or_else(|| GenaError::NotSubscribed(format!("{} {}", device, service.name())))?;

        match self
            .client
            .renew(device, service, &sub.sid, self.timeout_secs)
            .await
        {
            Ok(timeout_secs) => {
                log::debug!("[GENA] Renewed {} ({}s)", sub.sid, timeout_secs);
                self.store.update_expiry(&key, timeout_secs);
                Ok(())
            }
            Err(e) => {
                log::warn!("[GENA] Renewal of {} failed, dropping: {}", sub.sid, e);
                self.store.remove(&key);
                Err(e)
            }
        }
    }

    /// Unsubscribes and always clears the local entry.
    pub async fn unsubscribe(&self, device: &str, service: SonosService) {
        let key = SubscriptionKey::new(device, service);
        let Some(sid) = self.store.remove(&key) else {
            return;
        };

        if !self.client.unsubscribe(device, service, &sid).await {
            log::warn!("[GENA] UNSUBSCRIBE {} on {} was not acknowledged", sid, device);
        }
    }

    /// Drops every local entry for a device without contacting it.
    ///
    /// # Returns
    /// The number of entries dropped.
    pub fn unsubscribe_all(&self, device: &str) -> usize {
        let removed = self.store.remove_device(device);
        if !removed.is_empty() {
            log::debug!("[GENA] Dropped {} subscription(s) for {}", removed.len(), device);
        }
        removed.len()
    }

    /// Renews every subscription that expires within the renewal buffer.
    pub async fn renew_expiring(&self) {
        for (key, _) in self.store.expiring(self.renewal_buffer) {
            // Failures are logged and dropped inside renew.
            let _ = self.renew(&key.device, key.service).await;
        }
    }

    /// Sends UNSUBSCRIBE for every held subscription and empties the table.
    pub async fn shutdown(&self) {
        let drained = self.store.drain();
        if drained.is_empty() {
            return;
        }
        log::info!("[GENA] Tearing down {} subscription(s)", drained.len());

        let requests = drained.iter().map(|(key, sid)| {
            self.client.unsubscribe(&key.device, key.service, sid)
        });
        futures::future::join_all(requests).await;
    }

    /// Spawns the background renewal loop. It stops when `cancel` fires.
    pub fn start_renewal_task(
        self: &Arc<Self>,
        check_interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => manager.renew_expiring().await,
                }
            }
            log::debug!("[GENA] Renewal task stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> GenaSubscriptionManager {
        GenaSubscriptionManager::new(Client::new(), 600, Duration::from_secs(60))
    }

    async fn subscribe_mock(server: &mut mockito::ServerGuard, path: &str, sid: &str) -> mockito::Mock {
        server
            .mock("SUBSCRIBE", path)
            .match_header("nt", "upnp:event")
            .with_status(200)
            .with_header("SID", sid)
            .with_header("TIMEOUT", "Second-600")
            .create_async()
            .await
    }

    #[tokio::test]
    async fn subscribe_stores_sid_and_is_idempotent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("SUBSCRIBE", "/MediaRenderer/AVTransport/Event")
            .with_status(200)
            .with_header("SID", "uuid:s1")
            .expect(1)
            .create_async()
            .await;
        let device = server.url();
        let gena = manager();

        let sid = gena
            .subscribe(&device, SonosService::AVTransport, "http://cb/notify")
            .await
            .unwrap();
        assert_eq!(sid, "uuid:s1");

        let again = gena
            .subscribe(&device, SonosService::AVTransport, "http://cb/notify")
            .await
            .unwrap();
        assert_eq!(again, "uuid:s1");
        assert_eq!(gena.store().len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn subscribe_failure_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("SUBSCRIBE", "/MediaRenderer/AVTransport/Event")
            .with_status(503)
            .create_async()
            .await;
        let gena = manager();

        let err = gena
            .subscribe(&server.url(), SonosService::AVTransport, "http://cb")
            .await
            .unwrap_err();
        assert!(matches!(err, GenaError::SubscriptionFailed(503)));
        assert!(gena.store().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_clears_state_even_when_network_fails() {
        let mut server = mockito::Server::new_async().await;
        subscribe_mock(&mut server, "/MediaRenderer/AVTransport/Event", "uuid:s1").await;
        server
            .mock("UNSUBSCRIBE", "/MediaRenderer/AVTransport/Event")
            .with_status(500)
            .create_async()
            .await;
        let device = server.url();
        let gena = manager();

        gena.subscribe(&device, SonosService::AVTransport, "http://cb")
            .await
            .unwrap();
        gena.unsubscribe(&device, SonosService::AVTransport).await;
        assert!(gena.store().is_empty());
    }

    #[tokio::test]
    async fn failed_renewal_drops_entry() {
        let mut server = mockito::Server::new_async().await;
        subscribe_mock(&mut server, "/MediaRenderer/RenderingControl/Event", "uuid:r1").await;
        let device = server.url();
        let gena = manager();
        gena.subscribe(&device, SonosService::RenderingControl, "http://cb")
            .await
            .unwrap();

        server.reset();
        server
            .mock("SUBSCRIBE", "/MediaRenderer/RenderingControl/Event")
            .match_header("sid", "uuid:r1")
            .with_status(412)
            .create_async()
            .await;

        assert!(gena.renew(&device, SonosService::RenderingControl).await.is_err());
        assert!(gena.store().is_empty());
    }

    #[tokio::test]
    async fn renew_without_subscription_is_not_subscribed() {
        let gena = manager();
        let err = gena
            .renew("http://10.0.0.1:1400", SonosService::AVTransport)
            .await
            .unwrap_err();
        assert!(matches!(err, GenaError::NotSubscribed(_)));
    }

    #[test]
    fn unsubscribe_all_is_local_only() {
        let gena = manager();
        let device = "http://10.0.0.1:1400";
        for (i, service) in SonosService::ALL.iter().enumerate() {
            gena.store().insert(
                SubscriptionKey::new(device, *service),
                format!("uuid:{i}"),
                "http://cb".into(),
                600,
            );
        }
        gena.store().insert(
            SubscriptionKey::new("http://10.0.0.2:1400", SonosService::AVTransport),
            "uuid:other".into(),
            "http://cb".into(),
            600,
        );

        assert_eq!(gena.unsubscribe_all(device), SonosService::ALL.len());
        assert_eq!(gena.store().len(), 1);
    }
}
