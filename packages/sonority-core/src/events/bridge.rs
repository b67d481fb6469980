//! Bridge implementation that maps domain events to broadcast transport.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{BroadcastEvent, NoticeEvent, TopologyEvent, TransportEvent};

/// Bridges domain events to a broadcast channel.
///
/// Also forwards to an optional external emitter that can be set after
/// construction (the daemon installs a logging emitter this way).
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
    external_emitter: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    ///
    /// `capacity` must be at least 1; see [`Config::validate`](crate::state::Config::validate).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            external_emitter: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets an external emitter that receives every event as well.
    pub fn set_external_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.external_emitter.write() = Some(emitter);
    }

    /// Returns a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }
}

/// Generates an [`EventEmitter`] method that forwards to the external emitter
/// (if set) and then sends to the broadcast channel.
macro_rules! impl_emit {
    ($method:ident, $event_ty:ty, $variant:ident) => {
        fn $method(&self, event: $event_ty) {
            if let Some(ref emitter) = *self.external_emitter.read() {
                emitter.$method(event.clone());
            }
            if let Err(e) = self.tx.send(BroadcastEvent::$variant(event)) {
                log::trace!("[EventBridge] No broadcast receivers: {}", e);
            }
        }
    };
}

impl EventEmitter for BroadcastEventBridge {
    impl_emit!(emit_topology, TopologyEvent, Topology);
    impl_emit!(emit_transport, TransportEvent, Transport);
    impl_emit!(emit_notice, NoticeEvent, Notice);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::emitter::tests::RecordingEventEmitter;

    #[tokio::test]
    async fn fans_out_to_subscribers_and_external_emitter() {
        let bridge = BroadcastEventBridge::new(8);
        let mut rx = bridge.subscribe();
        let external = Arc::new(RecordingEventEmitter::default());
        bridge.set_external_emitter(external.clone());

        bridge.emit_topology(TopologyEvent::DiscoveryStarted { timestamp: 7 });

        match rx.recv().await.unwrap() {
            BroadcastEvent::Topology(TopologyEvent::DiscoveryStarted { timestamp }) => {
                assert_eq!(timestamp, 7)
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(external.topology.lock().len(), 1);
    }

    #[test]
    fn sending_without_receivers_is_not_an_error() {
        let bridge = BroadcastEventBridge::new(1);
        bridge.emit_notice(NoticeEvent::CommandFailed {
            action: "stop".into(),
            message: "x".into(),
            timestamp: 0,
        });
    }
}
