pub mod autosave;
pub mod cli;
pub mod config;
pub mod editor;
pub mod gate;
pub mod identity;
pub mod library;
pub mod messages;
pub mod storage;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use editor::{NoteEditorSession, SaveOutcome, SessionOptions, SkipReason};
pub use storage::{Note, NoteAdapter, NoteId, NoteStore, OwnerId, StoreError};
