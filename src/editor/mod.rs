use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::autosave::{Debouncer, SaveFailure, SaveState, StatusMachine, StatusView};
use crate::config::AutoSaveConfig;
use crate::gate::{is_video_page, ActiveTab};
use crate::storage::{Note, NoteAdapter, NoteId, NotesCallback, StoreError, Subscription};

mod draft;

pub use draft::EditorDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub debounce: Duration,
    /// How long `Saved` / `Error` stay visible before reverting to `Idle`.
    pub status_display: Duration,
    /// Re-check the video-page gate on updates too, not only on creation.
    pub gate_updates: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&AutoSaveConfig::default())
    }
}

impl From<&AutoSaveConfig> for SessionOptions {
    fn from(config: &AutoSaveConfig) -> Self {
        Self {
            debounce: config.debounce_duration(),
            status_display: config.status_display_duration(),
            gate_updates: config.gate_updates,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    Unchanged,
    Disposed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Skipped(SkipReason),
    Failed(SaveFailure),
}

/// Editing session for one note: draft, debounced auto-save and save status.
///
/// Edits go through [`NoteEditorSession::set_title`] / [`NoteEditorSession::set_body`]
/// and are persisted after the configured quiet period. The first successful
/// save of a new note creates it (only while the active tab is a video page)
/// and binds the session to it; every later save is an update. Failures never
/// escape: they show up as [`SaveState::Error`] and the draft is kept so the
/// next edit retries.
pub struct NoteEditorSession {
    inner: Arc<SessionInner>,
    debouncer: Debouncer,
    subscription: Mutex<Option<Subscription>>,
}

struct SessionInner {
    adapter: NoteAdapter,
    tabs: Arc<dyn ActiveTab>,
    options: SessionOptions,
    draft: Mutex<EditorDraft>,
    status: Mutex<StatusMachine>,
    status_tx: watch::Sender<StatusView>,
    save_lock: tokio::sync::Mutex<()>,
    revert: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl NoteEditorSession {
    /// Opens a session seeded from `existing`, or blank for a new note.
    pub async fn open(
        adapter: NoteAdapter,
        tabs: Arc<dyn ActiveTab>,
        existing: Option<Note>,
        options: SessionOptions,
    ) -> Self {
        let draft = existing
            .as_ref()
            .map(EditorDraft::from_note)
            .unwrap_or_else(EditorDraft::blank);
        let status = StatusMachine::new(existing.as_ref().map(|note| note.updated_at));
        let (status_tx, _) = watch::channel(status.view());

        let inner = Arc::new(SessionInner {
            adapter,
            tabs,
            options,
            draft: Mutex::new(draft),
            status: Mutex::new(status),
            status_tx,
            save_lock: tokio::sync::Mutex::new(()),
            revert: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        let runner = inner.clone();
        let debouncer = Debouncer::new(options.debounce, move || {
            let inner = runner.clone();
            async move {
                inner.save().await;
            }
        });

        let weak = Arc::downgrade(&inner);
        let on_change: NotesCallback = Arc::new(move |notes: &[Note]| {
            if let Some(inner) = weak.upgrade() {
                inner.observe(notes);
            }
        });
        let subscription = match inner.adapter.subscribe(on_change).await {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                debug!(error = %err, "editor opened without a live note feed");
                None
            }
        };

        debug!(
            note_id = ?existing.as_ref().map(|note| note.id.as_str()),
            debounce_ms = options.debounce.as_millis() as u64,
            "editor session opened"
        );
        Self {
            inner,
            debouncer,
            subscription: Mutex::new(subscription),
        }
    }

    pub fn title(&self) -> String {
        self.inner.draft.lock().title().to_string()
    }

    pub fn body(&self) -> String {
        self.inner.draft.lock().body().to_string()
    }

    pub fn note_id(&self) -> Option<NoteId> {
        self.inner.draft.lock().bound_note_id().cloned()
    }

    pub fn source_url(&self) -> Option<String> {
        self.inner.draft.lock().source_url().map(str::to_string)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.inner.draft.lock().has_unsaved_changes()
    }

    pub fn status(&self) -> SaveState {
        self.inner.status.lock().state()
    }

    pub fn status_view(&self) -> StatusView {
        self.inner.status.lock().view()
    }

    pub fn last_saved_at(&self) -> Option<OffsetDateTime> {
        self.inner.status.lock().view().last_saved_at
    }

    /// Every visible status change, for rendering without polling.
    pub fn status_feed(&self) -> watch::Receiver<StatusView> {
        self.inner.status_tx.subscribe()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.edit(|draft| draft.set_title(title));
    }

    pub fn set_body(&self, body: impl Into<String>) {
        self.edit(|draft| draft.set_body(body));
    }

    /// Saves immediately, waiting behind any save already in flight.
    pub async fn save_now(&self) -> SaveOutcome {
        self.inner.save().await
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Stops auto-save and releases the live feed. Safe to call repeatedly.
    ///
    /// A store call already in flight still completes, but its result no
    /// longer changes the visible status.
    pub fn dispose(&self) {
        {
            let _status = self.inner.status.lock();
            if self.inner.disposed.swap(true, Ordering::SeqCst) {
                return;
            }
        }
        self.debouncer.cancel();
        if let Some(mut subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        if let Some(revert) = self.inner.revert.lock().take() {
            revert.abort();
        }
        debug!(note_id = ?self.note_id().map(|id| id.to_string()), "editor session disposed");
    }

    fn edit(&self, change: impl FnOnce(&mut EditorDraft)) {
        if self.inner.is_disposed() {
            return;
        }
        change(&mut self.inner.draft.lock());
        self.debouncer.schedule();
    }
}

impl Drop for NoteEditorSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl SessionInner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    async fn save(self: &Arc<Self>) -> SaveOutcome {
        let _serial = self.save_lock.lock().await;
        if self.is_disposed() {
            return SaveOutcome::Skipped(SkipReason::Disposed);
        }

        let draft = self.draft.lock().clone();
        if draft.is_empty() {
            debug!("skipping save of an empty note");
            return SaveOutcome::Skipped(SkipReason::Empty);
        }
        if !draft.has_unsaved_changes() {
            debug!("skipping save, nothing changed since the last one");
            return SaveOutcome::Skipped(SkipReason::Unchanged);
        }
        if self.adapter.owner().is_err() {
            warn!("save attempted without a signed-in user");
            return self.reject(SaveFailure::Unauthenticated);
        }

        let creating = draft.bound_note_id().is_none();
        let mut tab_url = None;
        if creating || self.options.gate_updates {
            let url = self.tabs.active_tab_url().await;
            if !is_video_page(url.as_deref()) {
                warn!(url = url.as_deref().unwrap_or("<none>"), "save refused outside a video page");
                return self.reject(SaveFailure::GateRejected);
            }
            tab_url = url;
        }

        let Some(attempt) = self.update_status(StatusMachine::begin) else {
            return SaveOutcome::Skipped(SkipReason::Disposed);
        };

        let result = match draft.bound_note_id() {
            Some(note_id) => self
                .adapter
                .update(note_id, draft.title(), draft.body())
                .await
                .map(|()| None),
            None => {
                let source_url = tab_url.unwrap_or_default();
                self.adapter
                    .create(draft.title(), draft.body(), &source_url)
                    .await
                    .map(|note_id| Some((note_id, source_url)))
            }
        };

        match result {
            Ok(created) => {
                {
                    let mut current = self.draft.lock();
                    if let Some((note_id, source_url)) = created {
                        current.bind(note_id, source_url);
                    }
                    current.mark_persisted(draft.title(), draft.body());
                }
                let saved_at = OffsetDateTime::now_utc();
                match self.update_status(|machine| machine.succeed(attempt, saved_at)) {
                    Some(true) => {}
                    Some(false) => warn!(?attempt, "dropped stale save resolution"),
                    None => debug!("save finished after the session was disposed"),
                }
                SaveOutcome::Saved
            }
            Err(err) => {
                warn!(error = %err, creating, "note save failed");
                let failure = save_failure(&err);
                let shown = failure.clone();
                if self.update_status(|machine| machine.fail(attempt, shown)) == Some(false) {
                    warn!(?attempt, "dropped stale save failure");
                }
                SaveOutcome::Failed(failure)
            }
        }
    }

    fn reject(self: &Arc<Self>, failure: SaveFailure) -> SaveOutcome {
        let shown = failure.clone();
        match self.update_status(|machine| machine.reject(shown)) {
            Some(_) => SaveOutcome::Failed(failure),
            None => SaveOutcome::Skipped(SkipReason::Disposed),
        }
    }

    /// Runs `change` against the status machine and publishes the new view.
    ///
    /// Returns `None` without touching anything once the session is disposed.
    fn update_status<R>(self: &Arc<Self>, change: impl FnOnce(&mut StatusMachine) -> R) -> Option<R> {
        let (result, before, after, epoch, moved) = {
            let mut machine = self.status.lock();
            if self.is_disposed() {
                return None;
            }
            let before = machine.view();
            let epoch = machine.epoch();
            let result = change(&mut machine);
            (result, before, machine.view(), machine.epoch(), machine.epoch() != epoch)
        };
        if after == before {
            return Some(result);
        }
        let settled = matches!(after.state, SaveState::Saved | SaveState::Error);
        self.status_tx.send_replace(after);
        if moved && settled {
            self.arm_revert(epoch);
        }
        Some(result)
    }

    fn arm_revert(self: &Arc<Self>, epoch: u64) {
        let window = self.options.status_display;
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(inner) = weak.upgrade() {
                inner.update_status(|machine| machine.expire(epoch));
            }
        });
        if let Some(previous) = self.revert.lock().replace(task) {
            previous.abort();
        }
    }

    fn observe(self: &Arc<Self>, notes: &[Note]) {
        let Some(note_id) = self.draft.lock().bound_note_id().cloned() else {
            return;
        };
        if let Some(note) = notes.iter().find(|note| note.id == note_id) {
            let updated_at = note.updated_at;
            self.update_status(|machine| machine.observe_saved_at(updated_at));
        }
    }
}

fn save_failure(err: &StoreError) -> SaveFailure {
    match err {
        StoreError::Unauthenticated => SaveFailure::Unauthenticated,
        other => SaveFailure::Store(other.to_string()),
    }
}
