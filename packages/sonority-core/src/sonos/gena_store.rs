//! GENA subscription state management.
//!
//! Pure data structure for tracking active subscriptions without I/O.
//! Entries are keyed by (device base URL, service).

use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::time::Instant;

use super::services::SonosService;

/// Identifies one subscription: a device and one of its event paths.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct SubscriptionKey {
    pub device: String,
    pub service: SonosService,
}

impl SubscriptionKey {
    pub fn new(device: impl Into<String>, service: SonosService) -> Self {
        Self {
            device: device.into(),
            service,
        }
    }
}

/// A live subscription as granted by the speaker.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub sid: String,
    pub callback_url: String,
    pub expires_at: Instant,
}

/// Pure state container for GENA subscriptions.
///
/// All HTTP operations are delegated to `GenaClient`.
#[derive(Debug, Default)]
pub struct GenaSubscriptionStore {
    subscriptions: DashMap<SubscriptionKey, Subscription>,
    /// In-flight SUBSCRIBE requests, so one key is never subscribed twice.
    pending: DashSet<SubscriptionKey>,
}

impl GenaSubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_subscribed(&self, key: &SubscriptionKey) -> bool {
        self.subscriptions.contains_key(key)
    }

    /// Marks a key as pending.
    ///
    /// Returns `false` if the key is already subscribed or pending.
    pub fn try_mark_pending(&self, key: &SubscriptionKey) -> bool {
        if self.subscriptions.contains_key(key) {
            return false;
        }
        self.pending.insert(key.clone())
    }

    pub fn clear_pending(&self, key: &SubscriptionKey) {
        self.pending.remove(key);
    }

    /// Records a subscription and clears its pending flag.
    pub fn insert(&self, key: SubscriptionKey, sid: String, callback_url: String, timeout_secs: u64) {
        self.pending.remove(&key);
        self.subscriptions.insert(
            key,
            Subscription {
                sid,
                callback_url,
                expires_at: Instant::now() + Duration::from_secs(timeout_secs),
            },
        );
    }

    #[must_use]
    pub fn get(&self, key: &SubscriptionKey) -> Option<Subscription> {
        self.subscriptions.get(key).map(|s| s.value().clone())
    }

    /// Removes a subscription, returning its SID.
    pub fn remove(&self, key: &SubscriptionKey) -> Option<String> {
        self.subscriptions.remove(key).map(|(_, sub)| sub.sid)
    }

    /// Removes every subscription held for one device.
    pub fn remove_device(&self, device: &str) -> Vec<(SubscriptionKey, String)> {
        let keys: Vec<SubscriptionKey> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.key().device == device)
            .map(|entry| entry.key().clone())
            .collect();

        keys.into_iter()
            .filter_map(|key| self.subscriptions.remove(&key).map(|(k, sub)| (k, sub.sid)))
            .collect()
    }

    /// Removes every subscription.
    pub fn drain(&self) -> Vec<(SubscriptionKey, String)> {
        let keys: Vec<SubscriptionKey> = self.subscriptions.iter().map(|e| e.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| self.subscriptions.remove(&key).map(|(k, sub)| (k, sub.sid)))
            .collect()
    }

    pub fn update_expiry(&self, key: &SubscriptionKey, timeout_secs: u64) {
        if let Some(mut sub) = self.subscriptions.get_mut(key) {
            sub.expires_at = Instant::now() + Duration::from_secs(timeout_secs);
        }
    }

    /// Returns (key, sid) for subscriptions expiring within `buffer`.
    #[must_use]
    pub fn expiring(&self, buffer: Duration) -> Vec<(SubscriptionKey, String)> {
        let now = Instant::now();
        self.subscriptions
            .iter()
            .filter(|e| e.value().expires_at.saturating_duration_since(now) < buffer)
            .map(|e| (e.key().clone(), e.value().sid.clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "http://192.168.1.100:1400";
    const B: &str = "http://192.168.1.101:1400";

    fn key(device: &str, service: SonosService) -> SubscriptionKey {
        SubscriptionKey::new(device, service)
    }

    #[test]
    fn insert_and_lookup() {
        let store = GenaSubscriptionStore::new();
        store.insert(
            key(A, SonosService::AVTransport),
            "uuid:123".into(),
            "http://callback".into(),
            300,
        );

        assert!(store.is_subscribed(&key(A, SonosService::AVTransport)));
        assert!(!store.is_subscribed(&key(A, SonosService::GroupRenderingControl)));
        assert!(!store.is_subscribed(&key(B, SonosService::AVTransport)));
        assert_eq!(store.get(&key(A, SonosService::AVTransport)).unwrap().sid, "uuid:123");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn pending_prevents_duplicate() {
        let store = GenaSubscriptionStore::new();
        let k = key(A, SonosService::AVTransport);

        assert!(store.try_mark_pending(&k));
        assert!(!store.try_mark_pending(&k));
        assert!(store.try_mark_pending(&key(A, SonosService::RenderingControl)));

        store.clear_pending(&k);
        assert!(store.try_mark_pending(&k));
    }

    #[test]
    fn existing_subscription_prevents_pending() {
        let store = GenaSubscriptionStore::new();
        let k = key(A, SonosService::AVTransport);
        store.insert(k.clone(), "uuid:1".into(), "http://cb".into(), 300);
        assert!(!store.try_mark_pending(&k));
    }

    #[test]
    fn remove_device_only_touches_that_device() {
        let store = GenaSubscriptionStore::new();
        store.insert(key(A, SonosService::AVTransport), "uuid:1".into(), "cb".into(), 300);
        store.insert(key(A, SonosService::RenderingControl), "uuid:2".into(), "cb".into(), 300);
        store.insert(key(B, SonosService::AVTransport), "uuid:3".into(), "cb".into(), 300);

        let mut removed: Vec<String> = store.remove_device(A).into_iter().map(|(_, sid)| sid).collect();
        removed.sort();
        assert_eq!(removed, vec!["uuid:1", "uuid:2"]);
        assert_eq!(store.len(), 1);
        assert!(store.is_subscribed(&key(B, SonosService::AVTransport)));
    }

    #[tokio::test(start_paused = true)]
    async fn expiring_honours_buffer() {
        let store = GenaSubscriptionStore::new();
        store.insert(key(A, SonosService::AVTransport), "uuid:short".into(), "cb".into(), 90);
        store.insert(key(B, SonosService::AVTransport), "uuid:long".into(), "cb".into(), 600);

        assert!(store.expiring(Duration::from_secs(60)).is_empty());

        tokio::time::advance(Duration::from_secs(40)).await;
        let expiring = store.expiring(Duration::from_secs(60));
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].1, "uuid:short");

        store.update_expiry(&key(A, SonosService::AVTransport), 600);
        assert!(store.expiring(Duration::from_secs(60)).is_empty());
    }
}
