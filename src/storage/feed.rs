use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{Note, OwnerId};

pub type NotesCallback = Arc<dyn Fn(&[Note]) + Send + Sync>;

struct Listener {
    id: u64,
    owner: OwnerId,
    callback: NotesCallback,
}

/// Per-owner change listeners shared by a store implementation.
#[derive(Default)]
pub struct FeedRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl FeedRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(self: &Arc<Self>, owner: &OwnerId, callback: NotesCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(Listener {
            id,
            owner: owner.clone(),
            callback,
        });
        tracing::debug!(owner = %owner, id, "note feed subscribed");
        Subscription {
            id,
            registry: Arc::downgrade(self),
            active: true,
        }
    }

    pub fn is_watching(&self, owner: &OwnerId) -> bool {
        self.listeners
            .lock()
            .iter()
            .any(|listener| &listener.owner == owner)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Delivers `notes` to every listener for `owner`. Callbacks run outside the lock.
    pub fn publish(&self, owner: &OwnerId, notes: &[Note]) {
        let callbacks: Vec<NotesCallback> = self
            .listeners
            .lock()
            .iter()
            .filter(|listener| &listener.owner == owner)
            .map(|listener| listener.callback.clone())
            .collect();
        for callback in callbacks {
            callback(notes);
        }
    }

    fn remove(&self, id: u64) {
        self.listeners.lock().retain(|listener| listener.id != id);
    }
}

/// Live-feed handle. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    registry: Weak<FeedRegistry>,
    active: bool,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
            tracing::debug!(id = self.id, "note feed unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
