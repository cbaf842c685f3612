//! End-to-end scenarios across the session, façades, registry and cache.
//!
//! These tests run the complete binding stack against the in-memory engine
//! and assert the leak-freedom property after every scenario: whatever a
//! façade operation opened, the engine sees closed again when it finishes,
//! successfully or not.

use std::sync::Arc;

use grove_api::{CacheConfig, GroveError, GroveSession};
use grove_ffi::MockEngine;

const USER: &str = "CN=Alice Kilgore/OU=Eng/O=Grove";
const SERVER: &str = "CN=Mail01/O=Grove";

fn session_with_engine() -> (Arc<MockEngine>, GroveSession) {
    let engine = Arc::new(MockEngine::new());
    let session = GroveSession::new(Arc::clone(&engine) as _, CacheConfig::default());
    (engine, session)
}

#[test]
fn test_full_vault_lifecycle() {
    let (engine, session) = session_with_engine();
    engine.add_id_file("alice.id", "secret", USER);
    let scope = session.context();
    let vault = session.vault_api();

    // Upload, then sync, then download to a fresh path.
    let server = vault
        .put_user_id_into_vault(&scope, SERVER, USER, "secret", "alice.id")
        .unwrap();
    assert_eq!(server, "CN=Vault01/O=Grove");

    let sync = vault
        .sync_user_id_with_vault(&scope, SERVER, USER, "secret", "alice.id")
        .unwrap();
    assert!(sync.is_sync_done());
    assert!(sync.is_found_in_vault());

    vault
        .extract_user_id_from_vault(SERVER, USER, "secret", "alice-copy.id")
        .unwrap();
    assert!(engine.has_id_file("alice-copy.id"));

    // The downloaded copy opens with the vault password.
    session
        .id_file_api()
        .check_id_password(&scope, "alice-copy.id", "secret")
        .unwrap();

    assert_eq!(scope.live_handles(), 0);
    assert_eq!(engine.open_handle_count(), 0);
}

#[test]
fn test_short_info_record_surfaces_without_leaking() {
    let (engine, session) = session_with_engine();
    engine.add_id_file("alice.id", "secret", USER);
    // Engine build that writes 60 of the declared 64 bytes.
    engine.set_id_info_len(60);
    let scope = session.context();
    let api = session.id_file_api();

    let err = api
        .with_open_id_file(&scope, "alice.id", "secret", |handle| api.id_file_info(handle))
        .unwrap_err();
    assert!(matches!(err, GroveError::MalformedRecord { actual: 60, .. }));

    // The handle opened for the info call was released exactly once.
    assert_eq!(scope.live_handles(), 0);
    assert_eq!(engine.open_handle_count(), 0);
}

#[test]
fn test_wrong_password_paths_leak_nothing() {
    let (engine, session) = session_with_engine();
    engine.add_id_file("alice.id", "secret", USER);
    engine.add_vault_user(USER, "secret");
    let scope = session.context();

    assert!(session
        .id_file_api()
        .check_id_password(&scope, "alice.id", "wrong")
        .is_err());
    assert!(session
        .vault_api()
        .get_user_id_from_vault(&scope, SERVER, USER, "wrong")
        .is_err());
    assert!(session
        .vault_api()
        .put_user_id_into_vault(&scope, SERVER, USER, "wrong", "alice.id")
        .is_err());

    assert_eq!(scope.live_handles(), 0);
    assert_eq!(engine.open_handle_count(), 0);
}

#[test]
fn test_abandoned_scope_sweeps_in_memory_id() {
    let (engine, session) = session_with_engine();
    engine.add_vault_user(USER, "secret");

    {
        let scope = session.context();
        let user_id = session
            .vault_api()
            .get_user_id_from_vault(&scope, SERVER, USER, "secret")
            .unwrap();
        assert_eq!(engine.open_handle_count(), 1);
        // Deliberately not released; the scope's drop must reclaim it.
        let _ = user_id;
    }

    assert_eq!(engine.open_handle_count(), 0);
    assert_eq!(session.registry().total_live(), 0);
}

#[test]
fn test_release_through_wrong_path_is_reported() {
    let (engine, session) = session_with_engine();
    engine.add_vault_user(USER, "secret");
    let scope = session.context();
    let vault = session.vault_api();

    let user_id = vault
        .get_user_id_from_vault(&scope, SERVER, USER, "secret")
        .unwrap();
    let token = user_id.token();
    vault.release_user_id(user_id).unwrap();

    let err = session.registry().release(token).unwrap_err();
    assert!(err.is_caller_bug());
    assert!(matches!(err, GroveError::DoubleRelease { .. }));
}

#[test]
fn test_non_ascii_server_name_survives_the_round_trip() {
    let (engine, session) = session_with_engine();
    engine.add_vault_user(USER, "secret");
    // Vault server with characters outside ASCII, in engine encoding.
    let server_name = "CN=Tréz-Vault/OU=Výcho/O=Grove";
    engine.set_vault_server_bytes(&grove_api::lmbcs::encode(server_name, false));
    let vault = session.vault_api();

    let answered = vault
        .extract_user_id_from_vault(SERVER, USER, "secret", "copy.id")
        .unwrap();
    assert_eq!(answered, server_name);

    // Second sight of the same out-buffer bytes is served by the cache.
    let cached = vault
        .extract_user_id_from_vault(SERVER, USER, "secret", "copy2.id")
        .unwrap();
    assert_eq!(cached, server_name);
    assert!(session.cache().len() >= 1);
    assert_eq!(engine.open_handle_count(), 0);
}
