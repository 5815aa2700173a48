use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::local::{LocalCollection, LocalError};
use crate::models::{LocalIdGenerator, Note, NoteBuilder, NoteId, now_millis};
use crate::remote::{RemoteError, RemoteRow, RemoteTableClient};

/// Errors returned by [`NoteStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Note text cannot be empty")]
    EmptyText,

    #[error("Note not found: {0}")]
    NotFound(NoteId),

    #[error(transparent)]
    Local(#[from] LocalError),
}

impl StoreError {
    /// Whether the error was caused by user input rather than the system.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::EmptyText | Self::NotFound(_))
    }
}

/// Where a [`Listing`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSource {
    Remote,
    Local,
}

/// The unified note listing shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub source: ListingSource,
    pub notes: Vec<Note>,
}

/// Result of the background remote write started by [`NoteStore::save`].
#[derive(Debug)]
pub enum SyncOutcome {
    /// The remote table was not ready; the note stays local-only.
    LocalOnly { local_id: NoteId },
    /// The row was inserted and the local record now carries the remote ID.
    Synced { local_id: NoteId, remote_id: NoteId },
    /// The row was inserted but the local record was deleted in the meantime.
    Orphaned { local_id: NoteId, remote_id: NoteId },
    /// The insert failed; the note keeps its local ID permanently.
    Failed { local_id: NoteId, error: RemoteError },
    /// The insert succeeded but the local ID could not be rewritten.
    ReconcileFailed {
        local_id: NoteId,
        remote_id: NoteId,
        error: LocalError,
    },
}

/// Handle to a note's background remote write.
///
/// Dropping the handle detaches the write; [`PendingSync::wait`] blocks until
/// it finishes. There is no cancellation and no retry.
#[derive(Debug)]
pub struct PendingSync {
    inner: Pending,
}

#[derive(Debug)]
enum Pending {
    Done(SyncOutcome),
    Running {
        local_id: NoteId,
        handle: JoinHandle<SyncOutcome>,
    },
}

impl PendingSync {
    fn done(outcome: SyncOutcome) -> Self {
        Self {
            inner: Pending::Done(outcome),
        }
    }

    /// Whether a background write was started.
    pub fn is_running(&self) -> bool {
        matches!(self.inner, Pending::Running { .. })
    }

    /// Waits for the background write and returns its outcome.
    pub fn wait(self) -> SyncOutcome {
        match self.inner {
            Pending::Done(outcome) => outcome,
            Pending::Running { local_id, handle } => {
                handle.join().unwrap_or_else(|_| SyncOutcome::Failed {
                    local_id,
                    error: RemoteError::Api {
                        message: "background sync panicked".to_string(),
                    },
                })
            }
        }
    }
}

/// A note that has been written locally, plus its pending remote write.
#[derive(Debug)]
pub struct SavedNote {
    pub note: Note,
    pub sync: PendingSync,
}

/// What happened on the remote side of a delete.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// No remote delete was attempted.
    LocalOnly,
    /// The remote row was deleted as well.
    RemoteDeleted,
    /// The remote delete succeeded but matched no row.
    RemoteMissing,
    /// The remote delete failed; only the local record was removed.
    RemoteFailed(RemoteError),
}

impl DeleteOutcome {
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            Self::RemoteFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// Note persistence over a local collection and an optional remote table.
///
/// Writes land locally first and are pushed to the remote table in the
/// background. Reads prefer the remote table when it has rows and fall back
/// to the local collection otherwise.
///
/// # Examples
///
/// ```
/// use ssp::{Database, LocalCollection, NoteStore, RemoteTableClient};
///
/// # fn main() -> anyhow::Result<()> {
/// let local = LocalCollection::new(Database::in_memory()?);
/// let store = NoteStore::new(local, RemoteTableClient::unready("offline"));
///
/// let saved = store.save("Biology", "Mitosis notes")?;
/// assert!(!saved.note.id().as_str().is_empty());
/// assert_eq!(store.list().notes, vec![saved.note]);
/// # Ok(())
/// # }
/// ```
pub struct NoteStore {
    local: Arc<Mutex<LocalState>>,
    remote: RemoteTableClient,
    ids: LocalIdGenerator,
}

/// The local collection and the renames applied to it by remote syncs.
struct LocalState {
    notes: LocalCollection,
    /// Local ID handed out by `save` → remote row ID it was replaced with.
    synced: HashMap<NoteId, NoteId>,
}

impl LocalState {
    fn resolve(&self, id: &NoteId) -> NoteId {
        self.synced.get(id).cloned().unwrap_or_else(|| id.clone())
    }
}

impl NoteStore {
    pub fn new(local: LocalCollection, remote: RemoteTableClient) -> Self {
        Self {
            local: Arc::new(Mutex::new(LocalState {
                notes: local,
                synced: HashMap::new(),
            })),
            remote,
            ids: LocalIdGenerator::new(),
        }
    }

    pub fn remote(&self) -> &RemoteTableClient {
        &self.remote
    }

    /// Saves a new note.
    ///
    /// The note is written to the local collection before this returns. If
    /// the remote table is ready, a background task inserts it remotely and,
    /// on success, rewrites the local ID to the remote row ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyText`] for blank text and
    /// [`StoreError::Local`] if the local write fails, in which case nothing
    /// is sent remotely.
    pub fn save(&self, title: &str, text: &str) -> Result<SavedNote, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }
        self.insert_new(title, text)
    }

    /// Saves a note built from an imported file.
    ///
    /// Unlike [`NoteStore::save`], the text is stored exactly as read: it is
    /// not trimmed and may be empty. Syncing works the same way.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Local`] if the local write fails.
    pub fn save_imported(&self, title: &str, text: &str) -> Result<SavedNote, StoreError> {
        self.insert_new(title, text)
    }

    fn insert_new(&self, title: &str, text: &str) -> Result<SavedNote, StoreError> {
        let created_at = now_millis();
        let note = NoteBuilder::new()
            .id(self.ids.next_id(created_at))
            .title(title)
            .text(text)
            .created_at(created_at)
            .build();

        self.local().notes.insert_first(note.clone())?;
        tracing::debug!(id = %note.id(), title = note.title(), "note saved locally");

        let sync = self.spawn_remote_insert(&note);
        Ok(SavedNote { note, sync })
    }

    /// Lists notes for display.
    ///
    /// Uses the remote rows when the remote table is ready and returns at
    /// least one row. An empty remote table is treated like an unavailable
    /// one, so local notes are shown instead.
    pub fn list(&self) -> Listing {
        if self.remote.is_ready() {
            match self.remote.list_all() {
                Ok(rows) if !rows.is_empty() => {
                    return Listing {
                        source: ListingSource::Remote,
                        notes: rows.into_iter().map(RemoteRow::into_note).collect(),
                    };
                }
                Ok(_) => tracing::debug!("remote table is empty, listing local notes"),
                Err(e) => tracing::warn!(error = %e, "remote listing failed, listing local notes"),
            }
        }

        Listing {
            source: ListingSource::Local,
            notes: self.local().notes.list(),
        }
    }

    /// Returns the local collection, newest first.
    pub fn local_notes(&self) -> Vec<Note> {
        self.local().notes.list()
    }

    /// Finds a note by ID, locally first and then remotely.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if neither side has the note. Remote
    /// lookup failures count as "not found".
    pub fn select_by_id(&self, id: &NoteId) -> Result<Note, StoreError> {
        if let Some(note) = self.local().notes.find(id) {
            return Ok(note);
        }

        if self.remote.is_ready() {
            match self.remote.get_by_id(id) {
                Ok(Some(row)) => return Ok(row.into_note()),
                Ok(None) => {}
                Err(e) => tracing::warn!(id = %id, error = %e, "remote lookup failed"),
            }
        }

        Err(StoreError::NotFound(id.clone()))
    }

    /// Deletes a note.
    ///
    /// `id` may be the local ID returned by [`NoteStore::save`] even after the
    /// background sync has replaced it with the remote row ID; it is resolved
    /// to the current ID first.
    ///
    /// The remote row is deleted first when `hint_is_remote` is set or the
    /// note is known to have been synced, provided the remote table is ready.
    /// A failure there is reported in the outcome and does not stop the local
    /// delete. Any local record with the given or resolved ID is always
    /// removed.
    pub fn delete_by_id(
        &self,
        id: &NoteId,
        hint_is_remote: bool,
    ) -> Result<DeleteOutcome, StoreError> {
        let resolved = self.local().resolve(id);
        let synced = &resolved != id;

        let outcome = if (hint_is_remote || synced) && self.remote.is_ready() {
            match self.remote.delete_by_id(&resolved) {
                Ok(true) => DeleteOutcome::RemoteDeleted,
                Ok(false) => {
                    tracing::debug!(id = %resolved, "no remote row to delete");
                    DeleteOutcome::RemoteMissing
                }
                Err(e) => {
                    tracing::warn!(id = %resolved, error = %e, "remote delete failed, deleting locally only");
                    DeleteOutcome::RemoteFailed(e)
                }
            }
        } else {
            DeleteOutcome::LocalOnly
        };

        let mut local = self.local();
        local.notes.remove_by_id(id)?;
        if synced {
            local.notes.remove_by_id(&resolved)?;
            local.synced.remove(id);
        }
        Ok(outcome)
    }

    fn local(&self) -> MutexGuard<'_, LocalState> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_remote_insert(&self, note: &Note) -> PendingSync {
        let local_id = note.id().clone();
        if !self.remote.is_ready() {
            return PendingSync::done(SyncOutcome::LocalOnly { local_id });
        }

        let remote = self.remote.clone();
        let local = Arc::clone(&self.local);
        let note = note.clone();

        let spawned = thread::Builder::new()
            .name("ssp-remote-insert".to_string())
            .spawn(move || sync_to_remote(&remote, &local, &note));

        match spawned {
            Ok(handle) => PendingSync {
                inner: Pending::Running { local_id, handle },
            },
            Err(e) => {
                tracing::warn!(id = %local_id, error = %e, "could not start remote insert");
                PendingSync::done(SyncOutcome::Failed {
                    local_id,
                    error: RemoteError::Api {
                        message: format!("could not start remote insert: {e}"),
                    },
                })
            }
        }
    }
}

fn sync_to_remote(
    remote: &RemoteTableClient,
    local: &Mutex<LocalState>,
    note: &Note,
) -> SyncOutcome {
    let local_id = note.id().clone();

    let remote_id = match remote.insert(note) {
        Ok(row) => row.id,
        Err(error) => {
            tracing::warn!(id = %local_id, error = %error, "remote insert failed, note stays local-only");
            return SyncOutcome::Failed { local_id, error };
        }
    };

    let mut local = local.lock().unwrap_or_else(PoisonError::into_inner);
    match local.notes.update_id(&local_id, &remote_id) {
        Ok(true) => {
            local.synced.insert(local_id.clone(), remote_id.clone());
            tracing::debug!(local_id = %local_id, remote_id = %remote_id, "note synced");
            SyncOutcome::Synced {
                local_id,
                remote_id,
            }
        }
        Ok(false) => {
            tracing::info!(local_id = %local_id, remote_id = %remote_id, "note deleted before remote insert finished");
            SyncOutcome::Orphaned {
                local_id,
                remote_id,
            }
        }
        Err(error) => {
            tracing::warn!(local_id = %local_id, error = %error, "failed to record remote id locally");
            SyncOutcome::ReconcileFailed {
                local_id,
                remote_id,
                error,
            }
        }
    }
}
