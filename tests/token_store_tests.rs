//! Token persistence: round-trip, permissions and overwrite semantics.

use std::fs;

use chrono::{Duration, SubsecRound, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use oauth_login::auth::{FileTokenStore, Token, TokenStore};

fn temp_store() -> (TempDir, FileTokenStore) {
    let dir = TempDir::new().expect("tempdir");
    let store = FileTokenStore::new(dir.path().join("token.json"));
    (dir, store)
}

fn full_token() -> Token {
    Token {
        access_token: "acc-123".to_string(),
        token_type: "bearer".to_string(),
        refresh_token: Some("ref-456".to_string()),
        expiry: Some((Utc::now() + Duration::hours(2)).trunc_subsecs(6)),
        expires_in: Some(7200),
        scope: Some("read:user,gist".to_string()),
    }
}

#[test]
fn round_trip_preserves_every_field() {
    let (_dir, store) = temp_store();
    let original = full_token();

    store.save(&original).expect("save should succeed");
    let loaded = store
        .load()
        .expect("load should succeed")
        .expect("token should exist");

    assert_eq!(loaded, original);
}

#[cfg(unix)]
#[test]
fn saved_file_is_owner_read_write_only() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, store) = temp_store();
    store.save(&full_token()).unwrap();

    let mode = fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert_eq!(mode & 0o077, 0, "group/other bits must be clear");
}

#[test]
fn second_save_replaces_the_whole_file() {
    let (_dir, store) = temp_store();
    store.save(&full_token()).unwrap();

    let replacement = Token {
        access_token: "new".to_string(),
        token_type: "bearer".to_string(),
        refresh_token: None,
        expiry: None,
        expires_in: None,
        scope: None,
    };
    store.save(&replacement).unwrap();

    let raw = fs::read_to_string(store.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert_eq!(json["access_token"], "new");
    assert!(!raw.contains("ref-456"));
    assert!(!raw.contains("acc-123"));
    assert_eq!(store.load().unwrap().unwrap(), replacement);
}

#[test]
fn file_is_human_readable_json() {
    let (_dir, store) = temp_store();
    store.save(&full_token()).unwrap();

    let raw = fs::read_to_string(store.path()).unwrap();
    assert!(raw.contains("\n  \"access_token\": \"acc-123\""));
    assert!(raw.ends_with('\n'));
}
