pub mod chat;
pub mod config;
pub mod db;
pub mod export;
pub mod import;
pub mod local;
pub mod models;
pub mod remote;
pub mod session;
pub mod store;

pub use chat::{ChatBackend, ChatClient, ChatClientBuilder, ChatError};
pub use config::Config;
pub use db::Database;
pub use local::{LocalCollection, LocalError};
pub use models::{Note, NoteBuilder, NoteId};
pub use remote::{RemoteError, RemoteTable, RemoteTableClient};
pub use session::Session;
pub use store::{
    DeleteOutcome, Listing, ListingSource, NoteStore, PendingSync, SavedNote, StoreError,
    SyncOutcome,
};
