use time::macros::format_description;
use time::OffsetDateTime;

use crate::autosave::{SaveFailure, SaveState, StatusView};

pub const SAVING: &str = "Saving...";
pub const LAST_SAVED_PREFIX: &str = "Last Saved: ";
pub const SAVE_FAILED: &str = "Save failed";
pub const YOUTUBE_REQUIRED: &str = "You can only create new notes on YouTube videos";
pub const NOT_YOUTUBE_TITLE: &str = "Not a YouTube video";
pub const EMPTY_NOTE: &str = "Cannot save empty notes";
pub const NOTE_ID_REQUIRED: &str = "Note ID is required";
pub const SIGN_IN_REQUIRED: &str = "User must be authenticated to access notes";
pub const NO_NOTES: &str = "No notes found";
pub const NO_SEARCH_RESULTS: &str = "Try a different search!";

/// One-line save indicator shown under the editor, if anything should be shown.
pub fn status_line(view: &StatusView) -> Option<String> {
    match view.state {
        SaveState::Saving => Some(SAVING.to_string()),
        SaveState::Error => Some(
            match view.failure {
                Some(SaveFailure::GateRejected) => YOUTUBE_REQUIRED,
                Some(SaveFailure::Unauthenticated) => SIGN_IN_REQUIRED,
                _ => SAVE_FAILED,
            }
            .to_string(),
        ),
        SaveState::Idle | SaveState::Saved => view
            .last_saved_at
            .map(|at| format!("{LAST_SAVED_PREFIX}{}", format_clock(at))),
    }
}

/// `3:04:05 PM` in the timestamp's own offset.
pub fn format_clock(at: OffsetDateTime) -> String {
    at.format(&format_description!(
        "[hour repr:12 padding:none]:[minute]:[second] [period]"
    ))
    .unwrap_or_else(|_| at.unix_timestamp().to_string())
}
