// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph event notification.
//!
//! Events flow from the graph (and from nodes, possibly on their own
//! delivery threads) to a host-supplied [`EventSink`]. The sink is bound to
//! one graph through an [`EventRegistration`]. A buffered registration holds
//! events back until it is activated; once released every outstanding
//! [`EventHandle`] goes silent.

use crate::controller::PlaybackState;
use crate::format::MediaFormat;
use crate::node::NodeId;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Notification emitted by a graph or one of its nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GraphEvent {
    /// The controller moved to a new state
    StateChanged(PlaybackState),
    /// A node was inserted
    NodeAdded {
        /// Node instance
        node: NodeId,
        /// Node type ID
        node_type: String,
    },
    /// A node was removed and released
    NodeRemoved {
        /// Node instance
        node: NodeId,
        /// Node type ID
        node_type: String,
    },
    /// A source output reached a renderer
    StreamRendered {
        /// Source port name
        port: String,
        /// Format negotiated on the first link
        format: MediaFormat,
    },
    /// A source output could not be rendered and was skipped
    StreamSkipped {
        /// Source port name
        port: String,
        /// Last failure seen for the port
        reason: String,
    },
    /// A renderer reached the end of its stream
    Complete(NodeId),
    /// A node hit an unrecoverable runtime error
    ErrorAbort(String),
}

/// Receiver of graph events.
///
/// `notify` must not block; it may be called from any thread.
pub trait EventSink: Send + Sync {
    /// Deliver one event
    fn notify(&self, event: GraphEvent);
}

/// Receiving end of a [`ChannelEventSink`]
pub type EventReceiver = mpsc::UnboundedReceiver<GraphEvent>;

/// Sink that forwards events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<GraphEvent>,
}

impl ChannelEventSink {
    /// Create a new sink and return `(sink, receiver)`.
    pub fn new() -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn notify(&self, event: GraphEvent) {
        // Receiver dropped: the host stopped listening.
        let _ = self.sender.send(event);
    }
}

enum Delivery {
    /// Held back until the registration is activated
    Buffered {
        sink: Arc<dyn EventSink>,
        pending: Vec<GraphEvent>,
    },
    Live(Arc<dyn EventSink>),
    Released,
}

type SinkSlot = Arc<RwLock<Delivery>>;

/// Binding of a sink to one graph, released on drop
pub struct EventRegistration {
    slot: SinkSlot,
}

impl EventRegistration {
    /// Bind a sink and deliver immediately
    pub fn register(sink: Arc<dyn EventSink>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Delivery::Live(sink))),
        }
    }

    /// Bind a sink but hold events back until [`activate`](Self::activate).
    /// Releasing first discards everything held.
    pub fn buffered(sink: Arc<dyn EventSink>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Delivery::Buffered {
                sink,
                pending: Vec::new(),
            })),
        }
    }

    /// Handle that delivers through this registration while it is active
    pub fn handle(&self) -> EventHandle {
        EventHandle {
            slot: Some(Arc::clone(&self.slot)),
        }
    }

    /// Flush held events in order and deliver live from now on
    pub fn activate(&self) {
        let mut delivery = self.slot.write();
        if let Delivery::Buffered { sink, pending } = &mut *delivery {
            let sink = Arc::clone(sink);
            for event in pending.drain(..) {
                sink.notify(event);
            }
            *delivery = Delivery::Live(sink);
        }
    }

    /// Whether events are delivered live
    pub fn is_active(&self) -> bool {
        matches!(*self.slot.read(), Delivery::Live(_))
    }

    /// Stop delivering events.
    ///
    /// Waits for any in-flight `notify` to return; nothing is delivered after.
    pub fn release(&self) {
        *self.slot.write() = Delivery::Released;
    }
}

impl Drop for EventRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for EventRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistration")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Cloneable, non-owning path to the graph's sink
#[derive(Clone, Default)]
pub struct EventHandle {
    slot: Option<SinkSlot>,
}

impl EventHandle {
    /// A handle that drops every event
    pub fn detached() -> Self {
        Self::default()
    }

    /// Deliver an event if the registration is active, hold it if the
    /// registration is still buffering
    pub fn notify(&self, event: GraphEvent) {
        let Some(slot) = &self.slot else {
            return;
        };
        match &*slot.read() {
            Delivery::Live(sink) => return sink.notify(event),
            Delivery::Released => return,
            Delivery::Buffered { .. } => {}
        }
        // Re-checked under the write lock: activation may have raced us.
        match &mut *slot.write() {
            Delivery::Buffered { pending, .. } => pending.push(event),
            Delivery::Live(sink) => sink.notify(event),
            Delivery::Released => {}
        }
    }
}

impl fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self
            .slot
            .as_ref()
            .is_some_and(|s| matches!(*s.read(), Delivery::Live(_)));
        f.debug_struct("EventHandle").field("active", &active).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_delivers_while_registered() {
        let (sink, mut rx) = ChannelEventSink::new();
        let registration = EventRegistration::register(Arc::new(sink));
        let handle = registration.handle();

        handle.notify(GraphEvent::StateChanged(PlaybackState::Stopped));
        assert_eq!(
            rx.try_recv().unwrap(),
            GraphEvent::StateChanged(PlaybackState::Stopped)
        );
    }

    #[test]
    fn test_release_silences_outstanding_handles() {
        let (sink, mut rx) = ChannelEventSink::new();
        let registration = EventRegistration::register(Arc::new(sink));
        let handle = registration.handle();

        registration.release();
        assert!(!registration.is_active());
        handle.notify(GraphEvent::ErrorAbort("late".into()));
        assert!(rx.try_recv().is_err());

        // Releasing twice is harmless
        registration.release();
    }

    #[test]
    fn test_drop_releases_and_delivery_crosses_threads() {
        let (sink, mut rx) = ChannelEventSink::new();
        let registration = EventRegistration::register(Arc::new(sink));
        let handle = registration.handle();

        let remote = handle.clone();
        std::thread::spawn(move || remote.notify(GraphEvent::Complete(NodeId::new())))
            .join()
            .unwrap();
        assert!(matches!(rx.try_recv().unwrap(), GraphEvent::Complete(_)));

        drop(registration);
        handle.notify(GraphEvent::ErrorAbort("late".into()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_buffered_events_flush_on_activate() {
        let (sink, mut rx) = ChannelEventSink::new();
        let registration = EventRegistration::buffered(Arc::new(sink));
        let handle = registration.handle();

        handle.notify(GraphEvent::ErrorAbort("first".into()));
        handle.notify(GraphEvent::ErrorAbort("second".into()));
        assert!(!registration.is_active());
        assert!(rx.try_recv().is_err());

        registration.activate();
        handle.notify(GraphEvent::ErrorAbort("third".into()));
        let delivered: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            delivered,
            vec![
                GraphEvent::ErrorAbort("first".into()),
                GraphEvent::ErrorAbort("second".into()),
                GraphEvent::ErrorAbort("third".into()),
            ]
        );
    }

    #[test]
    fn test_release_discards_buffered_events() {
        let (sink, mut rx) = ChannelEventSink::new();
        let registration = EventRegistration::buffered(Arc::new(sink));
        registration.handle().notify(GraphEvent::ErrorAbort("partial".into()));

        registration.release();
        registration.activate();
        assert!(!registration.is_active());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_detached_handle_is_silent() {
        EventHandle::detached().notify(GraphEvent::ErrorAbort("nobody listens".into()));
    }
}
