//! Per-entity task queue with update coalescing.
//!
//! Every managed object produces at most one outstanding update per key at a
//! time: `CLEAN -> PENDING -> APPLYING -> CLEAN | FAILED`. A new update that
//! arrives while the previous one for the same key is still `APPLYING`
//! replaces whatever is queued rather than being appended, so a burst of
//! rapid changes to one object collapses to its latest value before the
//! handler ever sees it.

use opflex_types::Uri;
use std::collections::{HashMap, HashSet};

/// An update to an entity identified by its [`Uri`].
#[derive(Debug, Clone)]
pub enum Update<T> {
    /// The entity now exists (or changed) with this resolved value.
    Upsert(T),
    /// The entity's MODB lookup resolved to absent; clear its state.
    Remove,
}

impl<T> Update<T> {
    /// Returns true if this is an [`Update::Upsert`].
    pub fn is_upsert(&self) -> bool {
        matches!(self, Update::Upsert(_))
    }

    /// Returns true if this is an [`Update::Remove`].
    pub fn is_remove(&self) -> bool {
        matches!(self, Update::Remove)
    }

    /// Returns the upserted value, if any.
    pub fn as_upsert(&self) -> Option<&T> {
        match self {
            Update::Upsert(v) => Some(v),
            Update::Remove => None,
        }
    }
}

/// A single-writer-per-key task queue keyed by entity [`Uri`].
///
/// `push` always coalesces: pushing a second update for a key that is
/// already `PENDING` or `APPLYING` simply overwrites the queued value,
/// matching the "further updates for the same key queue and coalesce to the
/// latest" rule of the task-queue scheduling model. There is no field-level
/// merge (unlike a Redis hash consumer) because `T` is an opaque resolved
/// value, not a set of field-value pairs.
#[derive(Debug)]
pub struct UpdateQueue<T> {
    /// Keys that are `PENDING`: queued but not yet dispatched.
    pending: HashMap<Uri, Update<T>>,
    /// Keys that are `APPLYING`: dispatched, handler running.
    in_flight: HashSet<Uri>,
}

impl<T> UpdateQueue<T> {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            in_flight: HashSet::new(),
        }
    }

    /// Queues an update for `key`, coalescing with anything already queued.
    ///
    /// If `key` is currently `APPLYING`, this does not affect the running
    /// handler; it sets up the next `PENDING` update that will be dispatched
    /// once that handler completes.
    pub fn push(&mut self, key: Uri, update: Update<T>) {
        self.pending.insert(key, update);
    }

    /// Returns true if `key` is `PENDING` (queued, not yet handed to a
    /// handler).
    pub fn is_pending(&self, key: &Uri) -> bool {
        self.pending.contains_key(key)
    }

    /// Returns true if `key` is `APPLYING` (a handler currently owns it).
    pub fn is_applying(&self, key: &Uri) -> bool {
        self.in_flight.contains(key)
    }

    /// Returns the number of keys with a queued (not yet dispatched) update.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if there is at least one queued update.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Dispatches every `PENDING` key that is not already `APPLYING`,
    /// transitioning it to `APPLYING` and removing it from the pending set.
    ///
    /// Per-key single-writer serialization falls out of this: a key already
    /// `APPLYING` is left in `pending` (if a new update arrived for it) and
    /// is only dispatched again after [`UpdateQueue::complete`] is called for
    /// it.
    pub fn dispatch_ready(&mut self) -> Vec<(Uri, Update<T>)> {
        let ready_keys: Vec<Uri> = self
            .pending
            .keys()
            .filter(|k| !self.in_flight.contains(*k))
            .cloned()
            .collect();

        let mut dispatched = Vec::with_capacity(ready_keys.len());
        for key in ready_keys {
            if let Some(update) = self.pending.remove(&key) {
                self.in_flight.insert(key.clone());
                dispatched.push((key, update));
            }
        }
        dispatched
    }

    /// Marks `key`'s handler as finished successfully, transitioning it from
    /// `APPLYING` to `CLEAN` (or straight back to `PENDING` if another update
    /// coalesced in while it ran).
    pub fn complete(&mut self, key: &Uri) {
        self.in_flight.remove(key);
    }

    /// Marks `key`'s handler as failed, transitioning it from `APPLYING` to
    /// `FAILED`. The caller is expected to route the failure through a retry
    /// cache if the error is retryable; this queue does not retry on its
    /// own.
    pub fn fail(&mut self, key: &Uri) {
        self.in_flight.remove(key);
    }

    /// Drops all queued and in-flight state without running any handlers.
    /// Used on daemon shutdown.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_flight.clear();
    }
}

impl<T> Default for UpdateQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
