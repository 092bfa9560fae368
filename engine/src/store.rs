//! Storage substrate traits and the snapshot adapter.
//!
//! [`KeyValueStore`] and [`CookieJar`] model the browser's persistent
//! key-value storage and cookie store. The engine is a privileged but
//! non-exclusive writer of both: implementations use interior mutability so
//! the whole application can share them. The free functions at the bottom
//! translate between the raw stores and the snapshot types, applying the
//! identity-key filter and the JSON fallback rules.

use crate::error::{Error, Result};
use crate::snapshot::{format_set_cookie, CookieSnapshot, LocalSnapshot};
use crate::Timestamp;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Persistent string-keyed storage, in the shape of browser localStorage.
///
/// `set` is fallible because real backends can refuse a write (quota); a
/// failed write never fires a change notification.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// The cookie store, in the shape of `document.cookie`.
pub trait CookieJar: Send + Sync {
    /// The full cookie header string, e.g. `"a=1; b=2"`.
    fn header(&self) -> String;
    /// Apply a set-cookie string (`name=value; attributes...`).
    fn set(&self, cookie: &str) -> Result<()>;
}

/// In-memory [`KeyValueStore`]. Clones share state, the way every script on
/// a page shares one localStorage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

/// In-memory [`CookieJar`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieJar {
    cookies: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a single cookie value by name.
    pub fn get(&self, name: &str) -> Option<String> {
        self.cookies.lock().unwrap().get(name).cloned()
    }
}

impl CookieJar for MemoryCookieJar {
    fn header(&self) -> String {
        self.cookies
            .lock()
            .unwrap()
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn set(&self, cookie: &str) -> Result<()> {
        // Only the leading name=value pair matters to the jar; the expiry
        // attribute decides whether this is a write or a deletion.
        let pair = cookie.split(';').next().unwrap_or("").trim();
        let (name, value) = pair.split_once('=').ok_or_else(|| Error::CookieWrite {
            name: pair.to_string(),
            reason: "missing '='".to_string(),
        })?;

        let expired = cookie
            .to_ascii_lowercase()
            .contains("expires=thu, 01 jan 1970");

        let mut cookies = self.cookies.lock().unwrap();
        if expired {
            cookies.remove(name);
        } else {
            cookies.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Read every stored key except the identity record into a snapshot.
///
/// Per value, a JSON decode is attempted first; values that fail to decode
/// are carried as raw strings, matching how they will be written back.
pub fn read_all<S: KeyValueStore + ?Sized>(store: &S, identity_key: &str) -> LocalSnapshot {
    let mut snapshot = LocalSnapshot::new();
    for key in store.keys() {
        if key.contains(identity_key) {
            continue;
        }
        if let Some(raw) = store.get(&key) {
            let value = serde_json::from_str(&raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.clone()));
            snapshot.insert(key, value);
        }
    }
    snapshot
}

/// Apply a snapshot to the store, never touching the identity record.
///
/// Strings are written raw, everything else as JSON text. A per-key failure
/// is logged and skipped; it does not abort the remaining keys.
pub fn write_all<S: KeyValueStore + ?Sized>(
    store: &S,
    snapshot: &LocalSnapshot,
    identity_key: &str,
) {
    for (key, value) in snapshot.iter() {
        if key.contains(identity_key) {
            continue;
        }
        let raw = match value {
            serde_json::Value::String(s) => s.clone(),
            other => match serde_json::to_string(other) {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "skipping unserializable value");
                    continue;
                }
            },
        };
        if let Err(err) = store.set(key, &raw) {
            tracing::warn!(key = %key, error = %err, "failed to restore key");
        }
    }
}

/// Snapshot the full cookie jar.
pub fn read_cookies<C: CookieJar + ?Sized>(jar: &C) -> CookieSnapshot {
    CookieSnapshot::parse(&jar.header())
}

/// Restore a cookie snapshot with a one-year expiry per cookie.
///
/// A failure on one cookie does not block the others.
pub fn write_cookies<C: CookieJar + ?Sized>(jar: &C, snapshot: &CookieSnapshot, now: Timestamp) {
    for (name, value) in snapshot.iter() {
        if let Err(err) = jar.set(&format_set_cookie(name, value, now)) {
            tracing::warn!(cookie = %name, error = %err, "failed to restore cookie");
        }
    }
}
