//! Typed analysis events and the dispatch bus.
//!
//! One enum of event variants, each carrying its payload type; subscription
//! returns a handle whose drop unsubscribes. Components never hold a
//! back-reference to the bus beyond that handle.
//!
//! Delivery policy: emission never blocks. Each subscriber owns a bounded
//! channel; a subscriber that stops draining (full channel) or goes away
//! (disconnected) is removed from the registry at the next emit, and the
//! removal is counted. With a single producing coordinator and few
//! consumers this keeps the hot parse path free of back-pressure stalls.

use core_model::{SnapshotId, ToolId};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Bounded per-subscriber channel capacity.
pub const EVENT_CHANNEL_CAP: usize = 1024;

/// Subscribers dropped because their channel was full or disconnected.
pub static SUBSCRIBERS_DROPPED: AtomicU64 = AtomicU64::new(0);
/// Total events emitted across all buses.
pub static EVENTS_EMITTED: AtomicU64 = AtomicU64::new(0);

/// Progress report for an in-flight parse; emitted between chunk reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseProgress {
    pub bytes_read: u64,
    pub total_bytes: Option<u64>,
    pub lines: u64,
    /// Highest 0-based layer seen so far.
    pub layer: u32,
}

/// Events produced by the analysis pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    ParseStarted {
        file_name: String,
    },
    ParseProgress(ParseProgress),
    ParseCompleted {
        file_name: String,
        total_layers: u32,
        color_count: usize,
        parse_time_ms: u64,
    },
    OptimizationCompleted {
        strategy: String,
        swap_count: usize,
        required_slots: u32,
    },
    ConstraintReport {
        violation_count: usize,
    },
    MergeApplied {
        target: ToolId,
        sources: Vec<ToolId>,
    },
    TimelineChanged {
        snapshot: SnapshotId,
        branch: String,
        depth: usize,
    },
}

struct SubscriberSlot {
    id: u64,
    tx: Sender<AnalysisEvent>,
}

#[derive(Default)]
struct Registry {
    slots: Vec<SubscriberSlot>,
}

/// Multi-subscriber dispatch for [`AnalysisEvent`]s.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. The returned handle carries the receiving end
    /// and unsubscribes when dropped.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = bounded(EVENT_CHANNEL_CAP);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .registry
            .lock()
            .expect("event registry poisoned")
            .slots
            .push(SubscriberSlot { id, tx });
        debug!(target: "events", subscriber = id, "subscribed");
        Subscription {
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every live subscriber. Subscribers whose channel
    /// is full or disconnected are dropped from the registry.
    pub fn emit(&self, event: AnalysisEvent) {
        EVENTS_EMITTED.fetch_add(1, Ordering::Relaxed);
        let mut registry = self.inner.registry.lock().expect("event registry poisoned");
        registry.slots.retain(|slot| {
            match slot.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    SUBSCRIBERS_DROPPED.fetch_add(1, Ordering::Relaxed);
                    warn!(target: "events", subscriber = slot.id, "subscriber_channel_full");
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    SUBSCRIBERS_DROPPED.fetch_add(1, Ordering::Relaxed);
                    false
                }
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .registry
            .lock()
            .expect("event registry poisoned")
            .slots
            .len()
    }

    fn unsubscribe(inner: &BusInner, id: u64) {
        let mut registry = inner.registry.lock().expect("event registry poisoned");
        registry.slots.retain(|slot| slot.id != id);
    }
}

/// Live subscription to an [`EventBus`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: Receiver<AnalysisEvent>,
    bus: std::sync::Weak<BusInner>,
}

impl Subscription {
    /// Non-blocking drain of everything currently queued.
    pub fn drain(&self) -> Vec<AnalysisEvent> {
        self.rx.try_iter().collect()
    }

    pub fn try_recv(&self) -> Option<AnalysisEvent> {
        self.rx.try_recv().ok()
    }

    pub fn receiver(&self) -> &Receiver<AnalysisEvent> {
        &self.rx
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            EventBus::unsubscribe(&inner, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_emitted_events() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        bus.emit(AnalysisEvent::ParseStarted {
            file_name: "a.gcode".into(),
        });
        let events = sub.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AnalysisEvent::ParseStarted { .. }));
    }

    #[test]
    fn drop_unsubscribes() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn emit_to_empty_bus_is_fine() {
        let bus = EventBus::new();
        bus.emit(AnalysisEvent::ConstraintReport { violation_count: 0 });
    }

    #[test]
    fn full_subscriber_is_pruned_on_emit() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        for _ in 0..EVENT_CHANNEL_CAP {
            bus.emit(AnalysisEvent::ConstraintReport { violation_count: 0 });
        }
        assert_eq!(bus.subscriber_count(), 1);
        // One past capacity: the stalled subscriber is dropped, not blocked on.
        bus.emit(AnalysisEvent::ConstraintReport { violation_count: 0 });
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(sub.drain().len(), EVENT_CHANNEL_CAP);
    }

    #[test]
    fn two_subscribers_both_see_events() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.emit(AnalysisEvent::TimelineChanged {
            snapshot: SnapshotId::new(0),
            branch: "main".into(),
            depth: 1,
        });
        assert_eq!(a.drain().len(), 1);
        assert_eq!(b.drain().len(), 1);
    }
}
