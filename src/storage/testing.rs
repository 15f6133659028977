use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;

use super::{FeedRegistry, Note, NoteId, NoteStore, NotesCallback, OwnerId, StoreError, Subscription};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Create {
        title: String,
        body: String,
        source_url: String,
    },
    Update {
        id: NoteId,
        title: String,
        body: String,
    },
    Remove {
        id: NoteId,
    },
}

/// In-memory store that records mutations and can be told to fail or stall.
#[derive(Default)]
pub struct RecordingStore {
    notes: Mutex<Vec<Note>>,
    calls: Mutex<Vec<StoreCall>>,
    failing_creates: AtomicUsize,
    failing_updates: AtomicUsize,
    latency: Mutex<Duration>,
    feed: Arc<FeedRegistry>,
}

impl RecordingStore {
    pub fn with_note(note: Note) -> Self {
        let store = Self::default();
        store.insert(note);
        store
    }

    /// Seeds a document directly, bypassing call recording and the feed.
    pub fn insert(&self, note: Note) {
        self.notes.lock().push(note);
    }

    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn note(&self, id: &NoteId) -> Option<Note> {
        self.notes.lock().iter().find(|note| &note.id == id).cloned()
    }

    pub fn fail_creates(&self, count: usize) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn feed(&self) -> &Arc<FeedRegistry> {
        &self.feed
    }

    async fn stall(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn owned_by(&self, owner: &OwnerId) -> Vec<Note> {
        self.notes
            .lock()
            .iter()
            .filter(|note| &note.owner_id == owner)
            .cloned()
            .collect()
    }

    fn publish(&self, owner: &OwnerId) {
        let notes = self.owned_by(owner);
        self.feed.publish(owner, &notes);
    }
}

#[async_trait]
impl NoteStore for RecordingStore {
    async fn create(
        &self,
        owner: &OwnerId,
        title: &str,
        body: &str,
        source_url: &str,
    ) -> Result<NoteId, StoreError> {
        self.calls.lock().push(StoreCall::Create {
            title: title.to_string(),
            body: body.to_string(),
            source_url: source_url.to_string(),
        });
        self.stall().await;
        if Self::take_failure(&self.failing_creates) {
            return Err(StoreError::Backend(anyhow!("network unavailable")));
        }
        let now = OffsetDateTime::now_utc();
        let id = NoteId::generate(owner, now);
        self.notes.lock().push(Note {
            id: id.clone(),
            owner_id: owner.clone(),
            title: title.to_string(),
            body: body.to_string(),
            source_url: source_url.to_string(),
            created_at: now,
            updated_at: now,
        });
        self.publish(owner);
        Ok(id)
    }

    async fn update(
        &self,
        owner: &OwnerId,
        note_id: &NoteId,
        title: &str,
        body: &str,
    ) -> Result<(), StoreError> {
        self.calls.lock().push(StoreCall::Update {
            id: note_id.clone(),
            title: title.to_string(),
            body: body.to_string(),
        });
        self.stall().await;
        if Self::take_failure(&self.failing_updates) {
            return Err(StoreError::Backend(anyhow!("network unavailable")));
        }
        {
            let mut notes = self.notes.lock();
            let note = notes
                .iter_mut()
                .find(|note| &note.id == note_id && &note.owner_id == owner)
                .ok_or_else(|| StoreError::NotFound(note_id.clone()))?;
            note.title = title.to_string();
            note.body = body.to_string();
            note.updated_at = OffsetDateTime::now_utc();
        }
        self.publish(owner);
        Ok(())
    }

    async fn remove(&self, owner: &OwnerId, note_id: &NoteId) -> Result<(), StoreError> {
        self.calls.lock().push(StoreCall::Remove {
            id: note_id.clone(),
        });
        self.stall().await;
        let removed = {
            let mut notes = self.notes.lock();
            let position = notes
                .iter()
                .position(|note| &note.id == note_id && &note.owner_id == owner);
            position.map(|idx| notes.remove(idx))
        };
        match removed {
            Some(_) => {
                self.publish(owner);
                Ok(())
            }
            None => Err(StoreError::NotFound(note_id.clone())),
        }
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Note>, StoreError> {
        Ok(self.owned_by(owner))
    }

    async fn subscribe(
        &self,
        owner: &OwnerId,
        on_change: NotesCallback,
    ) -> Result<Subscription, StoreError> {
        let subscription = self.feed.register(owner, on_change.clone());
        on_change(&self.owned_by(owner));
        Ok(subscription)
    }
}
