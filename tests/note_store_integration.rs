use std::sync::Arc;

use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use ssp::remote::{PostgrestTableBuilder, RemoteTable};
use ssp::{
    Database, DeleteOutcome, ListingSource, LocalCollection, NoteId, NoteStore,
    RemoteTableClient, Session, StoreError, SyncOutcome,
};
use tempfile::tempdir;

fn remote_for(server: &MockServer) -> RemoteTableClient {
    let table = PostgrestTableBuilder::new()
        .base_url(server.base_url())
        .api_key("anon-key")
        .build()
        .expect("failed to build table client");
    RemoteTableClient::ready(Arc::new(table) as Arc<dyn RemoteTable>)
}

fn online_store(server: &MockServer) -> Result<NoteStore> {
    Ok(NoteStore::new(
        LocalCollection::new(Database::in_memory()?),
        remote_for(server),
    ))
}

#[test]
fn saved_notes_survive_reopening_the_database() -> Result<()> {
    // Arrange: file-backed database, no remote
    let dir = tempdir()?;
    let db_path = dir.path().join("notes.db");

    // Act: save in one store, read in another
    let id = {
        let store = NoteStore::new(
            LocalCollection::new(Database::open(&db_path)?),
            RemoteTableClient::unready("offline"),
        );
        let saved = store.save("Biology", "Mitosis")?;
        assert!(matches!(saved.sync.wait(), SyncOutcome::LocalOnly { .. }));
        saved.note.id().clone()
    };

    let reopened = NoteStore::new(
        LocalCollection::new(Database::open(&db_path)?),
        RemoteTableClient::unready("offline"),
    );

    // Assert
    let listing = reopened.list();
    assert_eq!(listing.source, ListingSource::Local);
    assert_eq!(listing.notes.len(), 1);
    assert_eq!(reopened.select_by_id(&id)?.text(), "Mitosis");

    Ok(())
}

#[test]
fn save_reconciles_local_id_with_remote_row() -> Result<()> {
    // Arrange: remote answers the insert with row 99
    let server = MockServer::start();
    let insert = server.mock(|when, then| {
        when.method(POST).path("/rest/v1/notes");
        then.status(201).json_body(json!([{
            "id": 99,
            "title": "Biology",
            "content": "Mitosis",
            "created_at": "2024-03-01T10:00:00Z"
        }]));
    });
    let store = online_store(&server)?;

    // Act
    let saved = store.save("Biology", "Mitosis")?;
    let local_id = saved.note.id().clone();
    let outcome = saved.sync.wait();

    // Assert: the local record now carries the remote ID
    insert.assert();
    match outcome {
        SyncOutcome::Synced {
            local_id: from,
            remote_id,
        } => {
            assert_eq!(from, local_id);
            assert_eq!(remote_id, NoteId::new("99"));
        }
        other => panic!("expected synced outcome, got {other:?}"),
    }
    let local = store.local_notes();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].id(), &NoteId::new("99"));
    assert_eq!(local[0].text(), "Mitosis");

    Ok(())
}

#[test]
fn delete_with_id_from_save_removes_remote_row() -> Result<()> {
    // Arrange: a saved note that has finished syncing as row 99
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/rest/v1/notes");
        then.status(201).json_body(json!([{
            "id": 99,
            "title": "Biology",
            "content": "Mitosis",
            "created_at": "2024-03-01T10:00:00Z"
        }]));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE)
            .path("/rest/v1/notes")
            .query_param("id", "eq.99");
        then.status(200).json_body(json!([{
            "id": 99,
            "title": "Biology",
            "content": "Mitosis",
            "created_at": "2024-03-01T10:00:00Z"
        }]));
    });
    let store = online_store(&server)?;
    let saved = store.save("Biology", "Mitosis")?;
    saved.sync.wait();

    // Act: delete with the ID `save` handed back
    let outcome = store.delete_by_id(saved.note.id(), true)?;

    // Assert
    delete.assert();
    assert!(matches!(outcome, DeleteOutcome::RemoteDeleted));
    assert!(store.local_notes().is_empty());

    Ok(())
}

#[test]
fn failed_remote_insert_keeps_note_local() -> Result<()> {
    let server = MockServer::start();
    let insert = server.mock(|when, then| {
        when.method(POST).path("/rest/v1/notes");
        then.status(500)
            .json_body(json!({"message": "relation \"notes\" does not exist"}));
    });
    let store = online_store(&server)?;

    let saved = store.save("Biology", "Mitosis")?;
    let local_id = saved.note.id().clone();

    assert!(matches!(saved.sync.wait(), SyncOutcome::Failed { .. }));
    insert.assert();
    assert_eq!(store.local_notes()[0].id(), &local_id);

    Ok(())
}

#[test]
fn empty_remote_table_falls_back_to_local_notes() -> Result<()> {
    // Insert fails, then the listing comes back empty
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/rest/v1/notes");
        then.status(503);
    });
    let list = server.mock(|when, then| {
        when.method(GET).path("/rest/v1/notes");
        then.status(200).json_body(json!([]));
    });
    let store = online_store(&server)?;
    store.save("Biology", "Mitosis")?.sync.wait();

    let listing = store.list();

    list.assert();
    assert_eq!(listing.source, ListingSource::Local);
    assert_eq!(listing.notes.len(), 1);

    Ok(())
}

#[test]
fn remote_listing_wins_when_it_has_rows() -> Result<()> {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/rest/v1/notes");
        then.status(200).json_body(json!([{
            "id": 1,
            "title": "Cloud",
            "content": "from the table",
            "created_at": "2024-03-01T10:00:00Z"
        }]));
    });
    let store = online_store(&server)?;

    let listing = store.list();

    list.assert();
    assert_eq!(listing.source, ListingSource::Remote);
    assert_eq!(listing.notes[0].title(), "Cloud");
    assert_eq!(listing.notes[0].text(), "from the table");

    Ok(())
}

#[test]
fn blank_text_is_rejected_before_any_request() -> Result<()> {
    let store = NoteStore::new(
        LocalCollection::new(Database::in_memory()?),
        RemoteTableClient::unready("offline"),
    );

    let err = store.save("Biology", " \n\t ").unwrap_err();

    assert!(matches!(err, StoreError::EmptyText));
    assert!(store.local_notes().is_empty());
    Ok(())
}

#[test]
fn session_and_store_share_one_database_file() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("notes.db");
    let store = NoteStore::new(
        LocalCollection::new(Database::open(&db_path)?),
        RemoteTableClient::unready("offline"),
    );
    let session = Session::new(Database::open(&db_path)?);

    let saved = store.save("Biology", "Mitosis")?;
    session.select(&saved.note)?;
    session.record("Saved note: Biology")?;

    let later = Session::new(Database::open(&db_path)?);
    assert_eq!(later.selected_text(), "Mitosis");
    assert_eq!(later.stats(store.local_notes().len()).topics, 1);
    assert_eq!(later.stats(1).focus_percent, 40);

    Ok(())
}
