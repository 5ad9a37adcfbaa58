//! Source registry: per-type slot arenas and their polling workers
//!
//! Slots are never compacted. Deleting an adapter leaves a tombstone so the
//! `type:index` addresses of its siblings stay valid. The first adapter of a
//! type spawns that type's polling worker; the worker lives until shutdown
//! even if every slot is later tombstoned.

use super::queue::StatusSender;
use super::worker::PollingWorker;
use crate::errors::AppResult;
use crate::sources::{SourceAdapter, SourceFactories};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// An adapter shared between the registry and its worker
pub type AdapterHandle = Arc<tokio::sync::Mutex<Box<dyn SourceAdapter>>>;

/// One `(type, index, description)` row of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub source_type: String,
    pub index: usize,
    pub description: String,
}

/// A live slot; the description is captured when the adapter is added
#[derive(Clone)]
pub struct Slot {
    pub description: String,
    pub adapter: AdapterHandle,
}

/// Slot arena for a single source type
pub struct SourceGroup {
    source_type: String,
    slots: Mutex<Vec<Option<Slot>>>,
}

impl SourceGroup {
    fn new(source_type: &str) -> Self {
        Self {
            source_type: source_type.to_string(),
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// `None` past the end, `Some(None)` for a tombstone
    pub fn slot(&self, index: usize) -> Option<Option<AdapterHandle>> {
        self.slots
            .lock()
            .get(index)
            .map(|slot| slot.as_ref().map(|s| s.adapter.clone()))
    }

    fn push(&self, adapter: Box<dyn SourceAdapter>) -> usize {
        let description = adapter.describe();
        let mut slots = self.slots.lock();
        slots.push(Some(Slot {
            description,
            adapter: Arc::new(tokio::sync::Mutex::new(adapter)),
        }));
        slots.len() - 1
    }

    fn live_slots(&self) -> Vec<(usize, String)> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|s| (index, s.description.clone())))
            .collect()
    }

    fn tombstone(&self, index: usize) -> bool {
        match self.slots.lock().get_mut(index) {
            Some(slot @ Some(_)) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}

pub struct SourceRegistry {
    factories: SourceFactories,
    groups: Mutex<BTreeMap<String, Arc<SourceGroup>>>,
    queue: StatusSender,
    poll_interval: Duration,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SourceRegistry {
    pub fn new(
        factories: SourceFactories,
        queue: StatusSender,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            factories,
            groups: Mutex::new(BTreeMap::new()),
            queue,
            poll_interval,
            shutdown,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Construct an adapter and append it to its type's arena
    ///
    /// Must be called from within a tokio runtime: the first adapter of a
    /// type spawns that type's worker.
    ///
    /// # Errors
    ///
    /// `InvalidSourceType` or `InvalidParameters`; the registry is left
    /// untouched in both cases.
    pub fn add(&self, source_type: &str, params: &[String]) -> AppResult<usize> {
        let source_type = source_type.to_ascii_lowercase();
        let adapter = self.factories.build(&source_type, params)?;
        let description = adapter.describe();

        let mut groups = self.groups.lock();
        let (group, created) = match groups.get(&source_type) {
            Some(group) => (group.clone(), false),
            None => {
                let group = Arc::new(SourceGroup::new(&source_type));
                groups.insert(source_type.clone(), group.clone());
                (group, true)
            }
        };
        let index = group.push(adapter);
        drop(groups);

        info!("Added [{}:{}] {}", source_type, index, description);
        if created {
            self.spawn_worker(group);
        }
        Ok(index)
    }

    fn spawn_worker(&self, group: Arc<SourceGroup>) {
        debug!("Starting polling worker for '{}'", group.source_type());
        let worker = PollingWorker::new(
            group,
            self.queue.clone(),
            self.poll_interval,
            self.shutdown.clone(),
        );
        self.workers.lock().push(tokio::spawn(worker.run()));
    }

    /// Tombstone a slot. Unknown types, out-of-range indices and slots that
    /// are already empty are ignored.
    pub fn delete(&self, source_type: &str, index: usize) -> bool {
        let group = self.groups.lock().get(&source_type.to_ascii_lowercase()).cloned();
        let deleted = group.map_or(false, |g| g.tombstone(index));
        if deleted {
            info!("Deleted [{}:{}]", source_type, index);
        }
        deleted
    }

    /// Delete by `type:index` address; malformed addresses are ignored
    pub fn delete_address(&self, address: &str) -> bool {
        match parse_address(address) {
            Some((source_type, index)) => self.delete(source_type, index),
            None => {
                debug!("Ignoring malformed source address '{}'", address);
                false
            }
        }
    }

    /// Every live slot, ordered by type name then index
    pub fn list(&self) -> Vec<ListingEntry> {
        let groups = self.groups.lock();
        groups
            .values()
            .flat_map(|group| {
                group
                    .live_slots()
                    .into_iter()
                    .map(move |(index, description)| ListingEntry {
                        source_type: group.source_type().to_string(),
                        index,
                        description,
                    })
            })
            .collect()
    }

    /// Listing text: one `[type:index] description` line per live slot
    pub fn render_listing(&self) -> String {
        self.list()
            .iter()
            .map(|e| format!("[{}:{}] {}\n", e.source_type, e.index, e.description))
            .collect()
    }

    /// Number of polling workers ever started
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Wait for every worker to observe cancellation
    pub async fn join_workers(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

fn parse_address(address: &str) -> Option<(&str, usize)> {
    let (source_type, index) = address.rsplit_once(':')?;
    if source_type.is_empty() {
        return None;
    }
    Some((source_type, index.trim().parse().ok()?))
}
