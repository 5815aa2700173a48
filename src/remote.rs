//! Remote note table.
//!
//! [`RemoteTableClient`] wraps an optional [`RemoteTable`] behind a one-shot
//! availability state: it is initialized once at startup and either becomes
//! ready or stays unready for the rest of the session. Every operation on an
//! unready client returns [`RemoteError::Unavailable`].
mod client;
mod row;

use std::fmt;
use std::sync::Arc;

pub use client::{DEFAULT_TABLE, PostgrestTable, PostgrestTableBuilder, RemoteError, RemoteTable};
pub use row::{NewRow, RemoteRow};

use crate::config::RemoteConfig;
use crate::models::{Note, NoteId};

/// Availability of the remote table.
///
/// Transitions only from `Uninitialized` to one of the other two states.
#[derive(Clone, Default)]
pub enum RemoteState {
    #[default]
    Uninitialized,
    Ready(Arc<dyn RemoteTable>),
    Unready(String),
}

impl fmt::Debug for RemoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("Uninitialized"),
            Self::Ready(_) => f.write_str("Ready"),
            Self::Unready(reason) => f.debug_tuple("Unready").field(reason).finish(),
        }
    }
}

/// Remote table handle that fails closed when the table is not available.
#[derive(Debug, Clone, Default)]
pub struct RemoteTableClient {
    state: RemoteState,
}

impl RemoteTableClient {
    /// Creates an uninitialized client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client that is already ready with the given table.
    pub fn ready(table: Arc<dyn RemoteTable>) -> Self {
        Self {
            state: RemoteState::Ready(table),
        }
    }

    /// Creates a client that is permanently unready.
    pub fn unready(reason: impl Into<String>) -> Self {
        Self {
            state: RemoteState::Unready(reason.into()),
        }
    }

    /// Builds and initializes a client from configuration.
    ///
    /// Without configuration the client is unready.
    pub fn connect(config: Option<&RemoteConfig>) -> Self {
        let mut client = Self::new();
        client.initialize(|| {
            let config = config.ok_or_else(|| {
                RemoteError::InvalidUrl("remote table not configured".to_string())
            })?;
            let table = PostgrestTableBuilder::new()
                .base_url(&config.url)
                .api_key(&config.api_key)
                .table(&config.table)
                .build()?;
            Ok(Arc::new(table) as Arc<dyn RemoteTable>)
        });
        client
    }

    /// Runs `connect` once to obtain the table.
    ///
    /// Only acts while uninitialized; later calls are no-ops. A failure leaves
    /// the client unready for good.
    pub fn initialize<F>(&mut self, connect: F)
    where
        F: FnOnce() -> Result<Arc<dyn RemoteTable>, RemoteError>,
    {
        if !matches!(self.state, RemoteState::Uninitialized) {
            return;
        }

        self.state = match connect() {
            Ok(table) => {
                tracing::info!("remote table ready");
                RemoteState::Ready(table)
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote table unavailable, continuing local-only");
                RemoteState::Unready(e.to_string())
            }
        };
    }

    pub fn state(&self) -> &RemoteState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, RemoteState::Ready(_))
    }

    fn table(&self) -> Result<&dyn RemoteTable, RemoteError> {
        match &self.state {
            RemoteState::Ready(table) => Ok(table.as_ref()),
            _ => Err(RemoteError::Unavailable),
        }
    }

    pub fn insert(&self, note: &Note) -> Result<RemoteRow, RemoteError> {
        self.table()?.insert(note)
    }

    pub fn list_all(&self) -> Result<Vec<RemoteRow>, RemoteError> {
        self.table()?.list_all()
    }

    pub fn get_by_id(&self, id: &NoteId) -> Result<Option<RemoteRow>, RemoteError> {
        self.table()?.get_by_id(id)
    }

    pub fn delete_by_id(&self, id: &NoteId) -> Result<bool, RemoteError> {
        self.table()?.delete_by_id(id)
    }
}
