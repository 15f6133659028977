use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::autosave::SaveFailure;
use crate::config::AppConfig;
use crate::editor::{NoteEditorSession, SaveOutcome, SessionOptions, SkipReason};
use crate::gate::{FixedTab, VideoPageProbe};
use crate::library::NoteLibrary;
use crate::messages;
use crate::storage::{Note, NoteAdapter, NoteId};

const UNTITLED: &str = "Untitled";

#[derive(Args, Debug, Clone)]
pub struct CheckUrlArgs {
    /// URL to check
    pub url: String,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Only show notes whose title contains these words
    #[arg()]
    pub query: Vec<String>,
    /// Print the notes as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// The video page the note belongs to
    #[arg(long)]
    pub url: String,
    #[arg(long, default_value = "")]
    pub title: String,
    #[arg(long, default_value = "")]
    pub body: String,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Note identifier
    pub note_id: String,
    /// Replace the title (kept when omitted)
    #[arg(long)]
    pub title: Option<String>,
    /// Replace the body (kept when omitted)
    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Note identifier
    pub note_id: String,
}

pub struct CommandContext {
    pub config: Arc<AppConfig>,
    pub adapter: NoteAdapter,
}

impl CommandContext {
    fn session_options(&self) -> SessionOptions {
        SessionOptions::from(&self.config.auto_save)
    }
}

pub async fn check_url(args: &CheckUrlArgs) -> String {
    let tab = FixedTab::new(Some(args.url.clone()));
    if VideoPageProbe::new(&tab).check().await.is_video_page {
        format!("{} is a video page\n", args.url.trim())
    } else {
        format!("{}: {}\n", messages::NOT_YOUTUBE_TITLE, args.url.trim())
    }
}

pub async fn list_notes(ctx: &CommandContext, args: &ListArgs) -> Result<String> {
    let library = NoteLibrary::open(ctx.adapter.clone())
        .await
        .context("loading notes")?;
    library.close();
    let query = args.query.join(" ");
    let notes = library.search(&query);

    if args.json {
        let mut out = serde_json::to_string_pretty(&notes).context("encoding notes as JSON")?;
        out.push('\n');
        return Ok(out);
    }
    Ok(format_notes(&notes, !query.trim().is_empty()))
}

pub async fn new_note(ctx: &CommandContext, args: NewArgs) -> Result<String> {
    let tab = Arc::new(FixedTab::new(Some(args.url)));
    let session =
        NoteEditorSession::open(ctx.adapter.clone(), tab, None, ctx.session_options()).await;
    session.set_title(args.title);
    session.set_body(args.body);
    let outcome = session.save_now().await;
    session.dispose();

    match (outcome, session.note_id()) {
        (SaveOutcome::Saved, Some(id)) => Ok(format!("Created note {id}\n")),
        (outcome, _) => Err(outcome_error(outcome)),
    }
}

pub async fn edit_note(ctx: &CommandContext, args: EditArgs) -> Result<String> {
    let note = find_note(ctx, &args.note_id).await?;
    let id = note.id.clone();
    let tab = Arc::new(FixedTab::new(Some(note.source_url.clone())));
    let session =
        NoteEditorSession::open(ctx.adapter.clone(), tab, Some(note), ctx.session_options())
            .await;
    if let Some(title) = args.title {
        session.set_title(title);
    }
    if let Some(body) = args.body {
        session.set_body(body);
    }
    let outcome = session.save_now().await;
    session.dispose();

    match outcome {
        SaveOutcome::Saved => Ok(format!("Updated note {id}\n")),
        SaveOutcome::Skipped(SkipReason::Unchanged) => Ok(format!("Note {id} unchanged\n")),
        other => Err(outcome_error(other)),
    }
}

pub async fn delete_note(ctx: &CommandContext, args: &DeleteArgs) -> Result<String> {
    let id = NoteId::new(args.note_id.trim());
    ctx.adapter
        .remove(&id)
        .await
        .with_context(|| format!("deleting note {id}"))?;
    Ok(format!("Deleted note {id}\n"))
}

async fn find_note(ctx: &CommandContext, note_id: &str) -> Result<Note> {
    let note_id = note_id.trim();
    let notes = ctx.adapter.list().await.context("loading notes")?;
    match notes.into_iter().find(|note| note.id.as_str() == note_id) {
        Some(note) => Ok(note),
        None => bail!("note {note_id} not found"),
    }
}

fn outcome_error(outcome: SaveOutcome) -> anyhow::Error {
    let message = match outcome {
        SaveOutcome::Failed(SaveFailure::GateRejected) => messages::YOUTUBE_REQUIRED.to_string(),
        SaveOutcome::Failed(SaveFailure::Unauthenticated) => {
            format!("{} (pass --user or set identity.user_id)", messages::SIGN_IN_REQUIRED)
        }
        SaveOutcome::Failed(failure) => failure.to_string(),
        SaveOutcome::Skipped(SkipReason::Empty) => messages::EMPTY_NOTE.to_string(),
        SaveOutcome::Skipped(reason) => format!("note was not saved ({reason:?})"),
        SaveOutcome::Saved => "note saved without an id".to_string(),
    };
    anyhow::anyhow!(message)
}

fn format_notes(notes: &[Note], filtered: bool) -> String {
    if notes.is_empty() {
        let hint = if filtered {
            messages::NO_SEARCH_RESULTS
        } else {
            messages::NO_NOTES
        };
        return format!("{hint}\n");
    }
    let mut out = String::new();
    for note in notes {
        let title = note.title.trim();
        let title = if title.is_empty() { UNTITLED } else { title };
        let _ = writeln!(&mut out, "{}  {}", note.id, title);
        let _ = writeln!(&mut out, "    updated {}", format_timestamp(note.updated_at));
        let _ = writeln!(&mut out, "    video   {}", note.source_url);
        if let Some(snippet) = build_snippet(&note.body) {
            let _ = writeln!(&mut out, "    {snippet}");
        }
        out.push('\n');
    }
    out
}

fn build_snippet(body: &str) -> Option<String> {
    let segments: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(2)
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join(" ").chars().take(160).collect())
    }
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}
