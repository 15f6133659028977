use std::sync::Arc;

use super::{Note, NoteId, NoteStore, NotesCallback, OwnerId, StoreError, Subscription};
use crate::identity::Identity;
use crate::messages::{EMPTY_NOTE, NOTE_ID_REQUIRED};

/// Identity-checked front door to a [`NoteStore`].
///
/// Every call resolves the signed-in owner first and fails with
/// [`StoreError::Unauthenticated`] before touching the store when there is none.
#[derive(Clone)]
pub struct NoteAdapter {
    store: Arc<dyn NoteStore>,
    identity: Arc<dyn Identity>,
}

impl NoteAdapter {
    pub fn new(store: Arc<dyn NoteStore>, identity: Arc<dyn Identity>) -> Self {
        Self { store, identity }
    }

    pub fn owner(&self) -> Result<OwnerId, StoreError> {
        if !self.identity.is_authenticated() {
            return Err(StoreError::Unauthenticated);
        }
        self.identity
            .current_user_id()
            .and_then(OwnerId::new)
            .ok_or(StoreError::Unauthenticated)
    }

    pub async fn create(
        &self,
        title: &str,
        body: &str,
        source_url: &str,
    ) -> Result<NoteId, StoreError> {
        let owner = self.owner()?;
        ensure_not_empty(title, body)?;
        if source_url.trim().is_empty() {
            return Err(StoreError::Validation("a source URL is required for new notes"));
        }
        let id = self
            .store
            .create(&owner, title.trim(), body, source_url)
            .await?;
        tracing::info!(owner = %owner, note_id = %id, "created note");
        Ok(id)
    }

    pub async fn update(&self, note_id: &NoteId, title: &str, body: &str) -> Result<(), StoreError> {
        let owner = self.owner()?;
        ensure_not_empty(title, body)?;
        self.store.update(&owner, note_id, title.trim(), body).await?;
        tracing::debug!(note_id = %note_id, "updated note");
        Ok(())
    }

    pub async fn remove(&self, note_id: &NoteId) -> Result<(), StoreError> {
        let owner = self.owner()?;
        if note_id.as_str().trim().is_empty() {
            return Err(StoreError::Validation(NOTE_ID_REQUIRED));
        }
        match self.store.remove(&owner, note_id).await {
            Ok(()) => {
                tracing::info!(note_id = %note_id, "deleted note");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(note_id = %note_id, "note already absent");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn list(&self) -> Result<Vec<Note>, StoreError> {
        let owner = self.owner()?;
        self.store.list_by_owner(&owner).await
    }

    pub async fn subscribe(&self, on_change: NotesCallback) -> Result<Subscription, StoreError> {
        let owner = self.owner()?;
        self.store.subscribe(&owner, on_change).await
    }
}

fn ensure_not_empty(title: &str, body: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() && body.trim().is_empty() {
        return Err(StoreError::Validation(EMPTY_NOTE));
    }
    Ok(())
}
