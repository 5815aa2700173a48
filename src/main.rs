use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ssp::config::ensure_parent_directory;
use ssp::export::{self, DEFAULT_EXPORT_FILE, NoteFormat};
use ssp::import::{self, ImportError};
use ssp::{
    ChatBackend, ChatClientBuilder, Config, Database, ListingSource, LocalCollection, NoteId,
    NoteStore, RemoteTableClient, Session, StoreError, SyncOutcome,
};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

const CHAT_FAILURE_REPLY: &str =
    "Sorry, there was an error connecting to the server. Please try again.";
const QUIZ_FAILURE_REPLY: &str = "Sorry, I couldn't generate the quiz due to a server problem.";

/// ssp - smart study partner CLI
#[derive(Parser)]
#[command(name = "ssp")]
#[command(about = "Save study notes, sync them to the cloud and quiz yourself on them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Save a new note
    Save(SaveCommand),
    /// List notes, from the cloud when it has any
    List,
    /// Select a note as the chat context
    Select(IdCommand),
    /// Delete a note
    Delete(IdCommand),
    /// Create a note from a text, markdown, image or PDF file
    Import(ImportCommand),
    /// Export all local notes as JSON
    Export(ExportCommand),
    /// Ask a question about the selected note
    Ask(AskCommand),
    /// Generate a quiz from the selected note
    Quiz,
    /// Show recent activity
    Activity(ActivityCommand),
    /// Show study statistics
    Stats,
}

#[derive(Parser)]
struct SaveCommand {
    /// The note text
    #[arg(value_name = "TEXT")]
    text: String,

    /// Note title (defaults to "Untitled")
    #[arg(short, long, value_name = "TITLE", default_value = "")]
    title: String,

    /// Also write the note to a file: txt or doc
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<String>,

    /// Directory for the note file (defaults to the current directory)
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,
}

#[derive(Parser)]
struct IdCommand {
    /// Note ID as shown by `ssp list`
    #[arg(value_name = "ID")]
    id: String,
}

#[derive(Parser)]
struct ImportCommand {
    /// File to import
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

#[derive(Parser)]
struct ExportCommand {
    /// Destination file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_EXPORT_FILE)]
    out: PathBuf,
}

#[derive(Parser)]
struct AskCommand {
    /// The question
    #[arg(value_name = "MESSAGE")]
    message: String,
}

#[derive(Parser)]
struct ActivityCommand {
    /// Number of entries to show
    #[arg(short = 'n', long, value_name = "N", default_value_t = 10)]
    limit: usize,
}

/// Mistakes in how the CLI was invoked.
#[derive(Debug, Error)]
enum UsageError {
    #[error("Select or load a note first")]
    NoSelection,

    #[error("Message cannot be empty")]
    EmptyMessage,
}

/// Everything a command needs.
struct App {
    store: NoteStore,
    session: Session,
    chat: Box<dyn ChatBackend>,
}

impl App {
    /// Opens the database and connects the remote table and chat backend.
    fn open(config: &Config) -> Result<Self> {
        let db_path = config.database_path();
        ensure_parent_directory(&db_path)?;

        let local =
            LocalCollection::new(Database::open(&db_path).context("Failed to open database")?);
        let session = Session::new(Database::open(&db_path).context("Failed to open database")?);
        let remote = RemoteTableClient::connect(config.remote.as_ref());
        let chat = ChatClientBuilder::new()
            .base_url(&config.chat_url)
            .build()
            .context("Failed to create chat client")?;

        Ok(Self {
            store: NoteStore::new(local, remote),
            session,
            chat: Box::new(chat),
        })
    }
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = Config::from_env()
        .and_then(|config| App::open(&config))
        .and_then(|app| run(&app, &cli.command));

    if let Err(e) = result {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

fn run(app: &App, command: &Commands) -> Result<()> {
    match command {
        Commands::Save(cmd) => execute_save(app, cmd),
        Commands::List => execute_list(app),
        Commands::Select(cmd) => execute_select(app, &cmd.id),
        Commands::Delete(cmd) => execute_delete(app, &cmd.id),
        Commands::Import(cmd) => execute_import(app, &cmd.path),
        Commands::Export(cmd) => execute_export(app, &cmd.out),
        Commands::Ask(cmd) => execute_ask(app, &cmd.message),
        Commands::Quiz => execute_quiz(app),
        Commands::Activity(cmd) => execute_activity(app, cmd.limit),
        Commands::Stats => execute_stats(app),
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are bad input: empty text, unknown IDs, unsupported files and
/// commands that need a selected note.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.downcast_ref::<UsageError>().is_some()
            || cause
                .downcast_ref::<StoreError>()
                .is_some_and(StoreError::is_user_error)
            || cause
                .downcast_ref::<ImportError>()
                .is_some_and(ImportError::is_user_error)
    })
}

fn execute_save(app: &App, cmd: &SaveCommand) -> Result<()> {
    let saved = app.store.save(&cmd.title, &cmd.text)?;
    let note = &saved.note;
    println!("Note saved (id: {})", note.id());
    app.session.record(format!("Saved note: {}", note.title()))?;

    if cmd.format.is_some() || cmd.out.is_some() {
        let format = cmd
            .format
            .as_deref()
            .map(NoteFormat::parse_lenient)
            .unwrap_or_default();
        let dir = cmd.out.as_deref().unwrap_or(Path::new("."));
        let path = export::write_note_file(dir, note.title(), note.text(), format)?;
        println!("Wrote {}", path.display());
    }

    finish_sync(app, saved.sync.wait())
}

/// Reports the outcome of a background remote write.
fn finish_sync(app: &App, outcome: SyncOutcome) -> Result<()> {
    match outcome {
        SyncOutcome::LocalOnly { .. } => {}
        SyncOutcome::Synced { remote_id, .. } => println!("Synced to cloud (id: {remote_id})"),
        SyncOutcome::Orphaned { remote_id, .. } => {
            tracing::warn!(remote_id = %remote_id, "note was deleted locally before its cloud copy was created");
        }
        SyncOutcome::Failed { error, .. } => {
            eprintln!("Cloud save failed: {error}. The note is kept locally.");
            app.session.record("Cloud save failed")?;
        }
        SyncOutcome::ReconcileFailed {
            local_id,
            remote_id,
            error,
        } => {
            tracing::warn!(local_id = %local_id, remote_id = %remote_id, error = %error, "failed to record cloud ID locally");
        }
    }
    Ok(())
}

fn execute_list(app: &App) -> Result<()> {
    let listing = app.store.list();
    if listing.notes.is_empty() {
        println!("No notes yet. Save one with `ssp save`.");
        return Ok(());
    }

    if listing.source == ListingSource::Local {
        println!("(local notes)");
    }
    for note in &listing.notes {
        let date = note.created_at().date();
        println!("{:<16} {}  {}", note.id().as_str(), date, note.title());
    }
    Ok(())
}

fn execute_select(app: &App, id: &str) -> Result<()> {
    let note = app.store.select_by_id(&NoteId::new(id))?;
    let selected = app.session.select(&note)?;
    app.session
        .record(format!("Selected note: {}", selected.title))?;

    println!("Selected note: {}", selected.title);
    println!();
    println!("{}", selected.text);
    Ok(())
}

fn execute_delete(app: &App, id: &str) -> Result<()> {
    let id = NoteId::new(id);
    let listed_remotely = app.store.list().source == ListingSource::Remote;

    let outcome = app.store.delete_by_id(&id, listed_remotely)?;
    if let Some(error) = outcome.remote_error() {
        eprintln!("Error deleting from cloud: {error}");
    }
    app.session.clear_selection_if(&id)?;
    app.session.record("Deleted a note")?;

    println!("Note deleted.");
    Ok(())
}

fn execute_import(app: &App, path: &Path) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let imported = match import::import_file(path) {
        Ok(imported) => imported,
        Err(e) => {
            let entry = match &e {
                ImportError::Unsupported { .. } => format!("Picked unsupported file: {file_name}"),
                ImportError::Pdf(_) => format!("PDF text extraction failed: {file_name}"),
                ImportError::Read { .. } => format!("Failed to read file: {file_name}"),
            };
            app.session.record(entry)?;
            return Err(e.into());
        }
    };

    let saved = app.store.save_imported(&imported.title, &imported.text)?;
    app.session.select(&saved.note)?;
    let entry = match imported.kind {
        import::ImportKind::Image => format!("Loaded image {}", imported.file_name),
        _ => format!("Loaded text from {}", imported.file_name),
    };
    app.session.record(entry)?;

    println!(
        "Imported {} as \"{}\" (id: {})",
        imported.file_name,
        saved.note.title(),
        saved.note.id()
    );
    finish_sync(app, saved.sync.wait())
}

fn execute_export(app: &App, out: &Path) -> Result<()> {
    let notes = app.store.local_notes();
    export::export_notes(&notes, out)?;
    app.session.record("Exported local notes")?;

    println!("Exported {} notes to {}", notes.len(), out.display());
    Ok(())
}

fn execute_ask(app: &App, message: &str) -> Result<()> {
    let message = message.trim();
    if message.is_empty() {
        return Err(UsageError::EmptyMessage.into());
    }

    match app.chat.ask(message, &app.session.selected_text()) {
        Ok(reply) => {
            println!("{reply}");
            app.session.record(format!("Asked: {message}"))?;
        }
        Err(e) => {
            tracing::warn!(error = %e, "chat request failed");
            println!("{CHAT_FAILURE_REPLY}");
            app.session.record("Error: Failed to get response")?;
        }
    }
    Ok(())
}

fn execute_quiz(app: &App) -> Result<()> {
    let note_text = app.session.selected_text();
    if note_text.trim().is_empty() {
        return Err(UsageError::NoSelection.into());
    }

    println!("Generating your personalized quiz...");
    match app.chat.quiz(&note_text) {
        Ok(quiz) => {
            println!("{quiz}");
            app.session.record("Generated AI-based quiz")?;
        }
        Err(e) => {
            tracing::warn!(error = %e, "quiz request failed");
            println!("{QUIZ_FAILURE_REPLY}");
            app.session.record("Error: Failed to generate quiz")?;
        }
    }
    Ok(())
}

fn execute_activity(app: &App, limit: usize) -> Result<()> {
    let entries = app.session.activity(limit);
    if entries.is_empty() {
        println!("No activity yet");
        return Ok(());
    }

    for entry in entries {
        let at = entry.at.format(&Rfc3339).context("Failed to format timestamp")?;
        println!("{at}  {}", entry.text);
    }
    Ok(())
}

fn execute_stats(app: &App) -> Result<()> {
    let stats = app.session.stats(app.store.local_notes().len());
    println!("Focus:        {}%", stats.focus_percent);
    println!("Topics:       {}", stats.topics);
    println!("Interactions: {}", stats.interactions);
    Ok(())
}
