//! Integration tests for the account protocol.
//!
//! Endpoint tests against a live server require a running PostgreSQL
//! database; set DATABASE_URL and start the server first. The tests below
//! pin the wire shapes both sides must agree on, without a database.

use serde_json::json;
use stash_engine::{
    store::read_all, CookieSnapshot, KeyValueStore, LocalSnapshot, MemoryStore, RemoteRecord,
    DEFAULT_IDENTITY_KEY,
};

/// Test helper to build the snapshots an engine push would carry.
fn sample_snapshots() -> (LocalSnapshot, CookieSnapshot) {
    let mut local = LocalSnapshot::new();
    local.insert("stash_settings", json!({"theme": "dark", "volume": 0.8}));
    local.insert("stash_favorites", json!(["A", "B"]));

    let mut cookies = CookieSnapshot::new();
    cookies.insert("lang", "en");

    (local, cookies)
}

#[test]
fn upsert_body_wire_shape() {
    let (local, cookies) = sample_snapshots();

    // The engine's http client sends exactly this body on PUT /account/{id}.
    let body = json!({
        "localStorage": local,
        "cookies": cookies,
    });

    assert_eq!(body["localStorage"]["stash_settings"]["theme"], "dark");
    assert_eq!(body["cookies"]["lang"], "en");
}

#[test]
fn fetch_response_parses_into_remote_record() {
    // A GET /account/{id} response body, as the server serializes it.
    let response = json!({
        "userId": "u1",
        "localStorage": {"stash_favorites": ["A", "B"]},
        "cookies": {"lang": "en"},
        "updatedAt": "2026-08-29T12:00:00Z",
    });

    // The engine client only consumes the snapshot fields.
    let record = RemoteRecord {
        user_id: response["userId"].as_str().unwrap().to_string(),
        local_storage: serde_json::from_value(response["localStorage"].clone()).unwrap(),
        cookies: serde_json::from_value(response["cookies"].clone()).unwrap(),
    };

    assert_eq!(record.user_id, "u1");
    assert_eq!(
        record.local_storage.get("stash_favorites"),
        Some(&json!(["A", "B"]))
    );
    assert_eq!(record.cookies.get("lang"), Some("en"));
}

#[test]
fn upsert_request_deserialization() {
    let json = r#"{
        "localStorage": {
            "stash_settings": {"theme": "dark"},
            "stash_favorites": ["A"]
        }
    }"#;

    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct UpsertRequest {
        local_storage: LocalSnapshot,
        #[serde(default)]
        cookies: CookieSnapshot,
    }

    let request: UpsertRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.local_storage.len(), 2);
    // Omitted cookies default to an empty snapshot.
    assert!(request.cookies.is_empty());
}

#[test]
fn snapshot_blobs_survive_json_round_trip() {
    let (local, cookies) = sample_snapshots();

    // What lands in the JSONB columns and comes back out.
    let local_blob = serde_json::to_value(&local).unwrap();
    let cookie_blob = serde_json::to_value(&cookies).unwrap();

    let restored_local: LocalSnapshot = serde_json::from_value(local_blob).unwrap();
    let restored_cookies: CookieSnapshot = serde_json::from_value(cookie_blob).unwrap();

    assert_eq!(restored_local, local);
    assert_eq!(restored_cookies, cookies);
}

#[test]
fn pushed_snapshots_never_contain_the_identity_record() {
    // The server rejects snapshots carrying the identity key; this pins
    // that the engine can never produce one.
    let store = MemoryStore::new();
    store
        .set(DEFAULT_IDENTITY_KEY, r#"{"id":"u1"}"#)
        .unwrap();
    store.set("stash_settings", r#"{"theme":"dark"}"#).unwrap();

    let snapshot = read_all(&store, DEFAULT_IDENTITY_KEY);
    assert!(!snapshot.contains_key(DEFAULT_IDENTITY_KEY));
    assert!(snapshot.contains_key("stash_settings"));
}
