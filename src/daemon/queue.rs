//! Status queue and dedup history
//!
//! Polling workers push whole batches through a flume channel; the single
//! dispatcher owns the receiving end and pops one item at a time. Sending a
//! batch as one message keeps it contiguous and in order even when several
//! workers push concurrently.

use crate::sources::StatusItem;
use flume::{Receiver, Sender};
use std::collections::{HashSet, VecDeque};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Create a connected producer/consumer pair
pub fn status_queue() -> (StatusSender, StatusReceiver) {
    let (sender, receiver) = flume::unbounded();
    let pending = Arc::new(AtomicUsize::new(0));
    (
        StatusSender {
            sender,
            pending: pending.clone(),
        },
        StatusReceiver {
            receiver,
            current: VecDeque::new(),
            pending,
        },
    )
}

/// Producer half, cloned into every polling worker
#[derive(Clone)]
pub struct StatusSender {
    sender: Sender<Vec<StatusItem>>,
    pending: Arc<AtomicUsize>,
}

impl StatusSender {
    /// Enqueue a batch atomically. Empty batches are dropped.
    ///
    /// Returns false once the dispatcher is gone.
    pub fn push_batch(&self, batch: Vec<StatusItem>) -> bool {
        if batch.is_empty() {
            return true;
        }
        let count = batch.len();
        self.pending.fetch_add(count, Ordering::Relaxed);
        if self.sender.send(batch).is_err() {
            self.pending.fetch_sub(count, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Items enqueued but not yet popped
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer half, owned by the dispatcher
pub struct StatusReceiver {
    receiver: Receiver<Vec<StatusItem>>,
    current: VecDeque<StatusItem>,
    pending: Arc<AtomicUsize>,
}

impl StatusReceiver {
    /// Take the oldest pending item without waiting
    pub fn pop(&mut self) -> Option<StatusItem> {
        if self.current.is_empty() {
            let batch = self.receiver.try_recv().ok()?;
            self.current.extend(batch);
        }
        let item = self.current.pop_front()?;
        self.pending.fetch_sub(1, Ordering::Relaxed);
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Recently dispatched ids, evicted strictly in insertion order
#[derive(Debug)]
pub struct DedupHistory {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl DedupHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            seen: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Record `id`, evicting the oldest entry when over capacity
    pub fn insert(&mut self, id: &str) {
        if !self.seen.insert(id.to_string()) {
            return;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
