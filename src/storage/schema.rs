use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            source_url TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS notes_owner_idx ON notes(owner_id);

        CREATE TRIGGER IF NOT EXISTS notes_write_once
        BEFORE UPDATE OF owner_id, source_url, created_at ON notes
        BEGIN
            SELECT RAISE(ABORT, 'owner_id, source_url and created_at are write-once');
        END;
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
