//! Event emitter abstraction for decoupling the coordinator from transport.
//!
//! The coordinator depends on the [`EventEmitter`] trait rather than on a
//! concrete channel, so headless runs and tests can swap the delivery.

use super::{NoticeEvent, TopologyEvent, TransportEvent};

/// Trait for emitting domain events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    /// Emits a discovery or topology event.
    fn emit_topology(&self, event: TopologyEvent);

    /// Emits a playback event for the selected group.
    fn emit_transport(&self, event: TransportEvent);

    /// Emits a user-facing notice.
    fn emit_notice(&self, event: NoticeEvent);
}

/// No-op emitter for headless use or testing.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_topology(&self, _event: TopologyEvent) {}

    fn emit_transport(&self, _event: TransportEvent) {}

    fn emit_notice(&self, _event: NoticeEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_topology(&self, event: TopologyEvent) {
        tracing::debug!(?event, "topology_event");
    }

    fn emit_transport(&self, event: TransportEvent) {
        tracing::debug!(?event, "transport_event");
    }

    fn emit_notice(&self, event: NoticeEvent) {
        tracing::debug!(?event, "notice_event");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Test emitter that records every event.
    #[derive(Default)]
    pub(crate) struct RecordingEventEmitter {
        pub topology: Mutex<Vec<TopologyEvent>>,
        pub transport: Mutex<Vec<TransportEvent>>,
        pub notices: Mutex<Vec<NoticeEvent>>,
    }

    impl EventEmitter for RecordingEventEmitter {
        fn emit_topology(&self, event: TopologyEvent) {
            self.topology.lock().push(event);
        }

        fn emit_transport(&self, event: TransportEvent) {
            self.transport.lock().push(event);
        }

        fn emit_notice(&self, event: NoticeEvent) {
            self.notices.lock().push(event);
        }
    }

    #[test]
    fn recording_emitter_tracks_events() {
        let emitter = RecordingEventEmitter::default();

        emitter.emit_topology(TopologyEvent::DiscoveryStarted { timestamp: 0 });
        emitter.emit_notice(NoticeEvent::CommandFailed {
            action: "pause".into(),
            message: "timeout".into(),
            timestamp: 0,
        });
        NoopEventEmitter.emit_topology(TopologyEvent::DiscoveryStarted { timestamp: 0 });
        LoggingEventEmitter.emit_topology(TopologyEvent::DiscoveryStarted { timestamp: 0 });

        assert_eq!(emitter.topology.lock().len(), 1);
        assert_eq!(emitter.notices.lock().len(), 1);
        assert!(emitter.transport.lock().is_empty());
    }
}
