//! Debounced persistence writer.
//!
//! Saves ride a dedicated thread fed by a channel: the first request opens
//! a debounce window, later requests inside the window replace the pending
//! payload, and the newest state is written once when the window closes.
//! Dropping the sender flushes whatever is pending and ends the thread.

use crate::store::TimelineStore;
use core_model::MergeTimeline;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Minimal summary kept when a write fails, so the session still knows
/// where it is after a storage outage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub current_index: usize,
    pub branch: String,
    pub snapshot_count: usize,
}

#[derive(Debug, Default, Clone)]
pub struct SaveStatus {
    pub saves_attempted: u64,
    pub saves_failed: u64,
    pub saves_coalesced: u64,
    /// Present after a failed write; cleared by the next success.
    pub fallback: Option<SaveSummary>,
}

pub struct DebouncedSaver {
    tx: Option<Sender<MergeTimeline>>,
    handle: Option<JoinHandle<()>>,
    status: Arc<Mutex<SaveStatus>>,
}

impl DebouncedSaver {
    pub fn spawn(store: Arc<dyn TimelineStore>, key: String, debounce: Duration) -> Self {
        let (tx, rx) = unbounded::<MergeTimeline>();
        let status = Arc::new(Mutex::new(SaveStatus::default()));
        let thread_status = status.clone();
        let handle = std::thread::Builder::new()
            .name("timeline-saver".to_string())
            .spawn(move || run(store, &key, debounce, rx, thread_status))
            .expect("spawn timeline saver thread");
        Self {
            tx: Some(tx),
            handle: Some(handle),
            status,
        }
    }

    /// Queue a save; coalesces with any save already pending in the
    /// debounce window.
    pub fn request(&self, timeline: MergeTimeline) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(timeline);
        }
    }

    pub fn status(&self) -> SaveStatus {
        self.status.lock().expect("save status poisoned").clone()
    }
}

impl Drop for DebouncedSaver {
    fn drop(&mut self) {
        // Closing the channel flushes the pending payload.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    store: Arc<dyn TimelineStore>,
    key: &str,
    debounce: Duration,
    rx: Receiver<MergeTimeline>,
    status: Arc<Mutex<SaveStatus>>,
) {
    while let Ok(mut latest) = rx.recv() {
        // Debounce window: newer payloads replace the pending one.
        loop {
            match rx.recv_timeout(debounce) {
                Ok(newer) => {
                    latest = newer;
                    status
                        .lock()
                        .expect("save status poisoned")
                        .saves_coalesced += 1;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        persist(store.as_ref(), key, &latest, &status);
    }
}

fn persist(
    store: &dyn TimelineStore,
    key: &str,
    timeline: &MergeTimeline,
    status: &Mutex<SaveStatus>,
) {
    let mut status = status.lock().expect("save status poisoned");
    status.saves_attempted += 1;
    match store.save(key, timeline) {
        Ok(()) => {
            status.fallback = None;
            debug!(target: "timeline.store", key, snapshots = timeline.snapshots.len(), "timeline_saved");
        }
        Err(e) => {
            status.saves_failed += 1;
            status.fallback = Some(SaveSummary {
                current_index: timeline.current,
                branch: timeline.current_branch.clone(),
                snapshot_count: timeline.snapshots.len(),
            });
            warn!(target: "timeline.store", key, error = %e, "timeline_save_failed_degrading");
        }
    }
}
