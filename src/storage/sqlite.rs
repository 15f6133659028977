use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use time::OffsetDateTime;

use super::{
    from_unix_millis, schema, unix_millis, FeedRegistry, Note, NoteId, NoteStore, NotesCallback,
    OwnerId, StoreError, Subscription,
};
use crate::config::{ConfigPaths, StorageOptions};

const NOTE_COLUMNS: &str = "id, owner_id, title, body, source_url, created_at, updated_at";

/// SQLite-backed document store. Each call opens its own connection.
#[derive(Clone)]
pub struct SqliteNoteStore {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
    feed: Arc<FeedRegistry>,
}

impl SqliteNoteStore {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&SqliteNoteStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|err| StoreError::Backend(anyhow!("note store worker failed: {err}")))?
    }

    pub fn fetch_note(&self, note_id: &NoteId) -> Result<Option<Note>, StoreError> {
        self.with_connection(|conn| {
            let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1");
            let note = conn
                .query_row(&sql, params![note_id.as_str()], note_from_row)
                .optional()?;
            Ok(note)
        })
    }

    fn fetch_by_owner(&self, owner: &OwnerId) -> Result<Vec<Note>, StoreError> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {NOTE_COLUMNS}
                 FROM notes
                 WHERE owner_id = ?1
                 ORDER BY updated_at DESC, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let notes = stmt
                .query_map(params![owner.as_str()], note_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(notes)
        })
    }

    fn insert_note(&self, note: &Note) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO notes (id, owner_id, title, body, source_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    note.id.as_str(),
                    note.owner_id.as_str(),
                    note.title,
                    note.body,
                    note.source_url,
                    unix_millis(note.created_at),
                ],
            )?;
            Ok(())
        })
    }

    fn merge_note(
        &self,
        owner: &OwnerId,
        note_id: &NoteId,
        title: &str,
        body: &str,
    ) -> Result<(), StoreError> {
        let now = unix_millis(OffsetDateTime::now_utc());
        self.with_connection(|conn| {
            let changed = conn.execute(
                "UPDATE notes
                 SET title = ?1, body = ?2, updated_at = MAX(?3, updated_at + 1)
                 WHERE id = ?4 AND owner_id = ?5",
                params![title, body, now, note_id.as_str(), owner.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(note_id.clone()));
            }
            Ok(())
        })
    }

    fn delete_note(&self, owner: &OwnerId, note_id: &NoteId) -> Result<bool, StoreError> {
        self.with_connection(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notes WHERE id = ?1 AND owner_id = ?2",
                params![note_id.as_str(), owner.as_str()],
            )?;
            Ok(deleted > 0)
        })
    }

    fn notify(&self, owner: &OwnerId) {
        if !self.feed.is_watching(owner) {
            return;
        }
        match self.fetch_by_owner(owner) {
            Ok(notes) => self.feed.publish(owner, &notes),
            Err(err) => tracing::warn!(?err, owner = %owner, "failed to refresh note feed"),
        }
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn create(
        &self,
        owner: &OwnerId,
        title: &str,
        body: &str,
        source_url: &str,
    ) -> Result<NoteId, StoreError> {
        let now = OffsetDateTime::now_utc();
        let note = Note {
            id: NoteId::generate(owner, now),
            owner_id: owner.clone(),
            title: title.to_string(),
            body: body.to_string(),
            source_url: source_url.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.blocking(move |store| {
            store.insert_note(&note)?;
            store.notify(&note.owner_id);
            Ok(note.id)
        })
        .await
    }

    async fn update(
        &self,
        owner: &OwnerId,
        note_id: &NoteId,
        title: &str,
        body: &str,
    ) -> Result<(), StoreError> {
        let owner = owner.clone();
        let note_id = note_id.clone();
        let title = title.to_string();
        let body = body.to_string();
        self.blocking(move |store| {
            store.merge_note(&owner, &note_id, &title, &body)?;
            store.notify(&owner);
            Ok(())
        })
        .await
    }

    async fn remove(&self, owner: &OwnerId, note_id: &NoteId) -> Result<(), StoreError> {
        let owner = owner.clone();
        let note_id = note_id.clone();
        self.blocking(move |store| {
            if store.delete_note(&owner, &note_id)? {
                store.notify(&owner);
            }
            Ok(())
        })
        .await
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Note>, StoreError> {
        let owner = owner.clone();
        self.blocking(move |store| store.fetch_by_owner(&owner))
            .await
    }

    async fn subscribe(
        &self,
        owner: &OwnerId,
        on_change: NotesCallback,
    ) -> Result<Subscription, StoreError> {
        let initial = self.list_by_owner(owner).await?;
        let subscription = self.feed.register(owner, on_change.clone());
        on_change(&initial);
        Ok(subscription)
    }
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    let owner: String = row.get(1)?;
    let owner_id = OwnerId::new(owner).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, "blank owner_id".into())
    })?;
    Ok(Note {
        id: NoteId::new(row.get::<_, String>(0)?),
        owner_id,
        title: row.get(2)?,
        body: row.get(3)?,
        source_url: row.get(4)?,
        created_at: from_unix_millis(row.get(5)?),
        updated_at: from_unix_millis(row.get(6)?),
    })
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<SqliteNoteStore> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        paths.database_path.clone()
    } else {
        storage.database_path.clone()
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    tracing::debug!(path = %db_path.display(), "note store ready");
    Ok(SqliteNoteStore {
        db_path: Arc::new(db_path),
        options: Arc::new(storage.clone()),
        feed: FeedRegistry::new(),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}
