use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::{Note, NoteAdapter, NoteId, NotesCallback, StoreError, Subscription};

/// The signed-in owner's notes, kept current by the store's live feed.
pub struct NoteLibrary {
    adapter: NoteAdapter,
    notes: Arc<Mutex<Vec<Note>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl NoteLibrary {
    pub async fn open(adapter: NoteAdapter) -> Result<Self, StoreError> {
        let notes = Arc::new(Mutex::new(Vec::new()));
        let cache = notes.clone();
        let on_change: NotesCallback = Arc::new(move |latest: &[Note]| {
            replace(&cache, latest.to_vec());
        });
        let subscription = adapter.subscribe(on_change).await?;
        tracing::debug!(count = notes.lock().len(), "note library opened");
        Ok(Self {
            adapter,
            notes,
            subscription: Mutex::new(Some(subscription)),
        })
    }

    /// Newest first.
    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.notes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.lock().is_empty()
    }

    /// Case-insensitive title match. A blank query returns everything.
    pub fn search(&self, query: &str) -> Vec<Note> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.notes();
        }
        self.notes
            .lock()
            .iter()
            .filter(|note| note.title.trim().to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub async fn refresh(&self) -> Result<(), StoreError> {
        let latest = self.adapter.list().await?;
        replace(&self.notes, latest);
        Ok(())
    }

    pub async fn delete(&self, note_id: &NoteId) -> Result<(), StoreError> {
        self.adapter.remove(note_id).await?;
        self.notes.lock().retain(|note| &note.id != note_id);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.subscription.lock().is_some()
    }

    pub fn close(&self) {
        if let Some(mut subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
            tracing::debug!("note library closed");
        }
    }
}

impl Drop for NoteLibrary {
    fn drop(&mut self) {
        self.close();
    }
}

fn replace(cache: &Mutex<Vec<Note>>, mut notes: Vec<Note>) {
    notes.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    *cache.lock() = notes;
}
