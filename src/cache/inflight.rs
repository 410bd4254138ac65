//! Per-key regeneration tickets.
//!
//! At most one rebuild per key is in flight at any time. The ticket's
//! existence is the sole mechanism preventing a thundering herd of
//! duplicate rebuilds.

use std::sync::Arc;

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::artifact::Generation;
use crate::domain::key::RouteKey;

struct Slot {
    done: watch::Receiver<()>,
}

/// Marker that a rebuild for one key is currently in progress.
///
/// Dropping the ticket releases the key and wakes any waiters — on success,
/// failure, and panic paths alike.
pub struct RegenTicket {
    id: Uuid,
    key: RouteKey,
    started_at: OffsetDateTime,
    generation_at_start: Generation,
    slots: Arc<DashMap<RouteKey, Slot>>,
    // Held so waiters observe channel closure only after the slot is freed;
    // dropped after `Drop::drop` removes the entry.
    _done: watch::Sender<()>,
}

impl RegenTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &RouteKey {
        &self.key
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    /// The stored generation observed when the ticket was issued; the
    /// rebuild commits `generation_at_start + 1`.
    pub fn generation_at_start(&self) -> Generation {
        self.generation_at_start
    }
}

impl Drop for RegenTicket {
    fn drop(&mut self) {
        self.slots.remove(&self.key);
    }
}

/// Handle held by losers of the acquisition race.
///
/// `Block`-policy callers await it; stale-path callers drop it and serve
/// the existing artifact.
#[derive(Clone, Debug)]
pub struct RegenInProgress {
    done: watch::Receiver<()>,
}

impl RegenInProgress {
    /// Resolve once the in-flight rebuild releases its ticket.
    pub async fn finished(mut self) {
        // The sender only ever closes; an error from `changed` is the
        // completion signal.
        let _ = self.done.changed().await;
    }
}

/// Tracks keys with an in-flight rebuild.
#[derive(Clone, Default)]
pub struct InFlightRegenerations {
    slots: Arc<DashMap<RouteKey, Slot>>,
}

impl InFlightRegenerations {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Try to start a rebuild for `key`.
    ///
    /// Exactly one concurrent caller obtains the ticket; every other caller
    /// receives a wait handle for the holder's completion.
    pub fn try_begin(
        &self,
        key: &RouteKey,
        generation_at_start: Generation,
    ) -> Result<RegenTicket, RegenInProgress> {
        use dashmap::mapref::entry::Entry;

        match self.slots.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(());
                vacant.insert(Slot { done: rx });
                Ok(RegenTicket {
                    id: Uuid::new_v4(),
                    key: key.clone(),
                    started_at: OffsetDateTime::now_utc(),
                    generation_at_start,
                    slots: Arc::clone(&self.slots),
                    _done: tx,
                })
            }
            Entry::Occupied(occupied) => Err(RegenInProgress {
                done: occupied.get().done.clone(),
            }),
        }
    }

    pub fn in_flight(&self, key: &RouteKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
