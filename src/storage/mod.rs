use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

mod adapter;
mod feed;
mod schema;
mod sqlite;
#[cfg(test)]
pub(crate) mod testing;

pub use adapter::NoteAdapter;
pub use feed::{FeedRegistry, NotesCallback, Subscription};
pub use sqlite::{init, SqliteNoteStore};

const ID_SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Client-side composite id: `<owner>_<unix millis>_<random suffix>`.
    pub fn generate(owner: &OwnerId, at: OffsetDateTime) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}_{}_{}",
            owner.as_str(),
            unix_millis(at),
            &suffix[..ID_SUFFIX_LEN]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// `None` for blank ids; an owner always names somebody.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub owner_id: OwnerId,
    pub title: String,
    pub body: String,
    pub source_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user must be authenticated to access notes")]
    Unauthenticated,

    #[error("{0}")]
    Validation(&'static str),

    #[error("note {0} not found")]
    NotFound(NoteId),

    #[error("note database query failed: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Document store holding notes keyed by id and queried by owner.
///
/// Implementations stamp `created_at` / `updated_at` themselves and never
/// rewrite `owner_id`, `source_url` or `created_at` after creation. Identity
/// checks happen one layer up in [`NoteAdapter`].
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn create(
        &self,
        owner: &OwnerId,
        title: &str,
        body: &str,
        source_url: &str,
    ) -> Result<NoteId, StoreError>;

    /// Merges `title`, `body` and a fresh `updated_at` into a note `owner` holds.
    ///
    /// A note held by somebody else is reported as [`StoreError::NotFound`].
    async fn update(
        &self,
        owner: &OwnerId,
        note_id: &NoteId,
        title: &str,
        body: &str,
    ) -> Result<(), StoreError>;

    /// Deletes a note `owner` holds; other owners' notes are left alone.
    async fn remove(&self, owner: &OwnerId, note_id: &NoteId) -> Result<(), StoreError>;

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Note>, StoreError>;

    /// Calls `on_change` with the owner's full note set now and after every change.
    async fn subscribe(
        &self,
        owner: &OwnerId,
        on_change: NotesCallback,
    ) -> Result<Subscription, StoreError>;
}

pub(crate) fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_unix_millis(millis: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn generated_ids_embed_owner_and_time() {
        let owner = OwnerId::new("user-7").expect("owner");
        let at = datetime!(2024-03-01 12:00:00 UTC);
        let id = NoteId::generate(&owner, at);
        let parts: Vec<_> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "user-7");
        assert_eq!(parts[1], unix_millis(at).to_string());
        assert_eq!(parts[2].len(), ID_SUFFIX_LEN);
        assert_ne!(id, NoteId::generate(&owner, at));
    }

    #[test]
    fn blank_owner_is_rejected() {
        assert!(OwnerId::new("  ").is_none());
        assert_eq!(OwnerId::new(" u1 ").map(|o| o.to_string()), Some("u1".into()));
    }

    #[test]
    fn millis_round_trip_drops_sub_millisecond_precision() {
        let at = datetime!(2024-03-01 12:00:00.123456 UTC);
        assert_eq!(
            from_unix_millis(unix_millis(at)),
            datetime!(2024-03-01 12:00:00.123 UTC)
        );
    }

    #[test]
    fn note_serializes_with_camel_case_keys() -> anyhow::Result<()> {
        let note = Note {
            id: NoteId::new("n1"),
            owner_id: OwnerId::new("u1").expect("owner"),
            title: "Intro".into(),
            body: String::new(),
            source_url: "https://youtu.be/abc".into(),
            created_at: datetime!(2024-03-01 12:00:00 UTC),
            updated_at: datetime!(2024-03-01 12:05:00 UTC),
        };
        let json = serde_json::to_value(&note)?;
        assert_eq!(json["ownerId"], "u1");
        assert_eq!(json["sourceUrl"], "https://youtu.be/abc");
        assert_eq!(json["updatedAt"], "2024-03-01T12:05:00Z");
        Ok(())
    }
}
