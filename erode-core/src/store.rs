//! The memory registry, sole owner of entity identity and canonical text.
//!
//! Every read returns snapshots (clones). The only mutation paths are
//! [`MemoryStore::create`], [`MemoryStore::import`] and the crate-private
//! commit used by the [`DegradationScheduler`](crate::scheduler::DegradationScheduler).
//!
//! Each mutation serializes the whole registry to the durable backend under
//! one fixed key. Nothing here returns an error to the caller: decode failures
//! at load time yield an empty registry, and write failures are logged while
//! the in-memory registry stays authoritative.
//!
//! Observers subscribe through a broadcast channel. The store never calls
//! consumer code synchronously, so a consumer reacting to an event cannot
//! re-enter a commit that is still in progress.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, info_span, warn};

use crate::codec;
use crate::config::{ErodeConfig, StoreConfig};
use crate::decay::{DecayOutcome, LostChar};
use crate::entity::{MemoryEntity, normalize};
use crate::metrics::{EngineCounters, spans};
use crate::persistence::{KeyValueStore, MemoryKv};
use crate::types::{Clock, MemoryId, SystemClock};

/// Handle through which consumers and the scheduler share one store.
///
/// The lock is not re-entrant. Scheduler calls made while a guard is still
/// alive on the same thread give up after
/// [`STORE_LOCK_WAIT`](crate::scheduler::STORE_LOCK_WAIT) and do nothing.
pub type SharedStore = Arc<Mutex<MemoryStore>>;

/// Change notifications published by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEvent {
    /// A memory was created or imported.
    Created {
        /// The new memory.
        id: MemoryId,
    },
    /// A memory's canonical text or degradation changed.
    Decayed {
        /// The memory that changed.
        id: MemoryId,
        /// Degradation after the change.
        degradation: f64,
        /// Characters lost in this change.
        lost: Vec<LostChar>,
    },
}

/// In-process registry of every memory in the session.
pub struct MemoryStore {
    memories: Vec<MemoryEntity>,
    index: HashMap<MemoryId, usize>,
    backend: Box<dyn KeyValueStore>,
    storage_key: String,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<MemoryEvent>,
    counters: Arc<EngineCounters>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("count", &self.memories.len())
            .field("storage_key", &self.storage_key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Open a store on `backend`, restoring any previously persisted registry.
    #[must_use]
    pub fn open(backend: impl KeyValueStore + 'static, config: &ErodeConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    /// Open a store with an explicit clock.
    #[must_use]
    pub fn with_clock(
        backend: impl KeyValueStore + 'static,
        config: &ErodeConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.store.event_capacity.max(1));
        let mut store = Self {
            memories: Vec::new(),
            index: HashMap::new(),
            backend: Box::new(backend),
            storage_key: config.persistence.storage_key.clone(),
            config: config.store.clone(),
            clock,
            events,
            counters: Arc::new(EngineCounters::new()),
        };
        store.restore();
        store
    }

    /// A store on a fresh in-process backend with default configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::open(MemoryKv::new(), &ErodeConfig::default())
    }

    /// Wrap the store in the shared handle consumers hold.
    #[must_use]
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    // ------------------------------------------------------------------
    // Write paths
    // ------------------------------------------------------------------

    /// Create a memory from user input.
    ///
    /// Empty or whitespace-only input is ignored and yields `None`. Input
    /// longer than the configured limit is cut to that many characters.
    pub fn create(&mut self, text: &str) -> Option<MemoryEntity> {
        let _span = info_span!(spans::MEMORY_CREATE).entered();

        let mut normalized = normalize(text);
        if normalized.chars().count() > self.config.max_text_chars {
            normalized = normalized
                .chars()
                .take(self.config.max_text_chars)
                .collect::<String>()
                .trim_end()
                .to_string();
        }
        if normalized.is_empty() {
            EngineCounters::bump(&self.counters.submissions_rejected, 1);
            debug!("Ignoring empty submission");
            return None;
        }

        let entity = MemoryEntity::new(MemoryId::new(), normalized, self.clock.now());
        self.insert(entity.clone());
        EngineCounters::bump(&self.counters.memories_created, 1);
        info!(id = %entity.id, chars = entity.char_len(), "Memory created");

        self.persist();
        let _ = self.events.send(MemoryEvent::Created { id: entity.id });
        Some(entity)
    }

    /// Import a record from another session.
    ///
    /// Returns `false` (and changes nothing) if the id is already present or
    /// the record breaks an entity invariant.
    pub fn import(&mut self, entity: MemoryEntity) -> bool {
        if self.index.contains_key(&entity.id) {
            debug!(id = %entity.id, "Import skipped: id already present");
            return false;
        }
        if let Err(e) = entity.validate() {
            warn!(error = %e, "Import skipped: invalid record");
            return false;
        }

        let id = entity.id;
        self.insert(entity);
        self.persist();
        let _ = self.events.send(MemoryEvent::Created { id });
        true
    }

    /// Apply a decay outcome to the canonical record without persisting.
    ///
    /// Degradation becomes `old + increment`, clamped to `[old, 1]`, and is
    /// forced to `1.0` once the text is illegible. Returns `true` if anything
    /// changed. Outcomes that would change the text length are refused.
    pub(crate) fn apply(&mut self, id: MemoryId, outcome: &DecayOutcome, increment: f64) -> bool {
        let _span = info_span!(spans::COMMIT, id = %id).entered();

        let Some(&slot) = self.index.get(&id) else {
            debug!(id = %id, "Commit for unknown memory ignored");
            return false;
        };
        let entity = &mut self.memories[slot];

        if outcome.text.chars().count() != entity.char_len() {
            warn!(id = %id, "Refusing commit that changes text length");
            return false;
        }

        let was_illegible = entity.is_illegible();
        let old = entity.degradation;
        let increment = if increment.is_finite() { increment.max(0.0) } else { 0.0 };

        entity.current_text.clone_from(&outcome.text);
        entity.degradation = (old + increment).clamp(old, 1.0);
        if entity.is_illegible() {
            entity.degradation = 1.0;
            if !was_illegible {
                EngineCounters::bump(&self.counters.memories_erased, 1);
                info!(id = %id, "Memory became illegible");
            }
        }

        let changed = !outcome.is_unchanged() || entity.degradation > old;
        if changed {
            EngineCounters::bump(&self.counters.chars_lost, outcome.lost.len() as u64);
            let _ = self.events.send(MemoryEvent::Decayed {
                id,
                degradation: entity.degradation,
                lost: outcome.lost.clone(),
            });
        }
        changed
    }

    /// Apply a decay outcome and persist the registry.
    pub(crate) fn commit(&mut self, id: MemoryId, outcome: &DecayOutcome, increment: f64) -> bool {
        let changed = self.apply(id, outcome, increment);
        if changed {
            self.persist();
        }
        changed
    }

    // ------------------------------------------------------------------
    // Read paths
    // ------------------------------------------------------------------

    /// All memories in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<MemoryEntity> {
        self.memories.clone()
    }

    /// All memories, oldest first (most decayed surfaces first).
    #[must_use]
    pub fn list_oldest_first(&self) -> Vec<MemoryEntity> {
        let mut memories = self.list();
        memories.sort_by_key(|m| m.created_at);
        memories
    }

    /// Look up one memory.
    #[must_use]
    pub fn get(&self, id: MemoryId) -> Option<MemoryEntity> {
        self.index.get(&id).map(|&slot| self.memories[slot].clone())
    }

    /// Number of memories held.
    #[must_use]
    pub fn count(&self) -> usize {
        self.memories.len()
    }

    /// Ids of every memory that still has legible text.
    #[must_use]
    pub fn live_ids(&self) -> Vec<MemoryId> {
        self.memories
            .iter()
            .filter(|m| !m.is_illegible())
            .map(|m| m.id)
            .collect()
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.events.subscribe()
    }

    /// Engine counters shared by the store and its scheduler.
    #[must_use]
    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    /// Current time on the store's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write the whole registry to the durable backend.
    ///
    /// Failures are logged and counted, never returned.
    pub(crate) fn persist(&mut self) {
        let _span = info_span!(spans::PERSIST_SAVE).entered();
        let start = Instant::now();

        let result = codec::encode(&self.memories)
            .and_then(|bytes| self.backend.put(&self.storage_key, &bytes).map(|()| bytes.len()));

        match result {
            Ok(bytes) => {
                EngineCounters::bump(&self.counters.saves_completed, 1);
                debug!(
                    memories = self.memories.len(),
                    bytes,
                    elapsed_us = start.elapsed().as_micros(),
                    "Registry persisted"
                );
            }
            Err(e) => {
                EngineCounters::bump(&self.counters.save_failures, 1);
                warn!(error = %e, "Registry write failed; keeping in-memory state");
            }
        }
    }

    fn restore(&mut self) {
        let _span = info_span!(spans::PERSIST_LOAD).entered();

        let bytes = match self.backend.get(&self.storage_key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key = %self.storage_key, "No persisted registry; starting empty");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Registry read failed; starting empty");
                return;
            }
        };

        match codec::decode(&bytes) {
            Ok(memories) => {
                for entity in memories {
                    self.insert(entity);
                }
                info!(memories = self.memories.len(), "Registry restored");
            }
            Err(e) => {
                warn!(error = %e, "Persisted registry undecodable; starting empty");
            }
        }
    }

    fn insert(&mut self, entity: MemoryEntity) {
        self.index.insert(entity.id, self.memories.len());
        self.memories.push(entity);
    }
}
