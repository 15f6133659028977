use crate::storage::{Note, NoteId};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Persisted {
    title: String,
    body: String,
}

/// Working copy of one note, owned by a single editor session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorDraft {
    title: String,
    body: String,
    bound_note_id: Option<NoteId>,
    source_url: Option<String>,
    last_persisted: Option<Persisted>,
}

impl EditorDraft {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn from_note(note: &Note) -> Self {
        Self {
            title: note.title.clone(),
            body: note.body.clone(),
            bound_note_id: Some(note.id.clone()),
            source_url: Some(note.source_url.clone()),
            last_persisted: Some(Persisted {
                title: note.title.clone(),
                body: note.body.clone(),
            }),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn bound_note_id(&self) -> Option<&NoteId> {
        self.bound_note_id.as_ref()
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.body.trim().is_empty()
    }

    /// A blank draft that was never saved has nothing to lose.
    pub fn has_unsaved_changes(&self) -> bool {
        match &self.last_persisted {
            Some(persisted) => persisted.title != self.title || persisted.body != self.body,
            None => !self.is_empty(),
        }
    }

    pub fn mark_persisted(&mut self, title: &str, body: &str) {
        self.last_persisted = Some(Persisted {
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    /// Binds the draft to the note created from it. The first binding wins.
    pub fn bind(&mut self, note_id: NoteId, source_url: String) {
        if self.bound_note_id.is_some() {
            return;
        }
        self.bound_note_id = Some(note_id);
        self.source_url = Some(source_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::OwnerId;
    use time::macros::datetime;

    fn note() -> Note {
        Note {
            id: NoteId::new("n1"),
            owner_id: OwnerId::new("u1").expect("owner"),
            title: "Old".into(),
            body: "text".into(),
            source_url: "https://youtube.com/watch?v=old".into(),
            created_at: datetime!(2024-05-01 09:00:00 UTC),
            updated_at: datetime!(2024-05-01 09:30:00 UTC),
        }
    }

    #[test]
    fn blank_draft_is_clean_until_typed_into() {
        let mut draft = EditorDraft::blank();
        assert!(draft.is_empty());
        assert!(!draft.has_unsaved_changes());

        draft.set_body("   ");
        assert!(draft.is_empty());
        assert!(!draft.has_unsaved_changes());

        draft.set_title("Intro");
        assert!(draft.has_unsaved_changes());
    }

    #[test]
    fn seeded_draft_compares_against_the_stored_note() {
        let mut draft = EditorDraft::from_note(&note());
        assert_eq!(draft.bound_note_id(), Some(&NoteId::new("n1")));
        assert!(!draft.has_unsaved_changes());

        draft.set_title("New");
        assert!(draft.has_unsaved_changes());
        draft.set_title("Old");
        assert!(!draft.has_unsaved_changes());
    }

    #[test]
    fn whitespace_edits_count_as_changes() {
        let mut draft = EditorDraft::from_note(&note());
        draft.set_title("Old ");
        assert!(draft.has_unsaved_changes());
    }

    #[test]
    fn mark_persisted_records_the_saved_pair_not_the_current_one() {
        let mut draft = EditorDraft::blank();
        draft.set_title("A");
        draft.mark_persisted("A", "");
        assert!(!draft.has_unsaved_changes());

        draft.set_title("AB");
        draft.mark_persisted("A", "");
        assert!(draft.has_unsaved_changes());
    }

    #[test]
    fn bind_keeps_the_first_note_and_url() {
        let mut draft = EditorDraft::blank();
        draft.bind(NoteId::new("n1"), "https://youtu.be/a".into());
        draft.bind(NoteId::new("n2"), "https://youtu.be/b".into());
        assert_eq!(draft.bound_note_id(), Some(&NoteId::new("n1")));
        assert_eq!(draft.source_url(), Some("https://youtu.be/a"));
    }
}
