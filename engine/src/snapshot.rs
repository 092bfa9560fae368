//! Snapshot types for the local key-value store and the cookie jar.
//!
//! A snapshot is a full point-in-time copy of one of the two local stores.
//! Both types use BTreeMap so that serialization order is deterministic and
//! round-trips through the account store compare equal.

use crate::Timestamp;
use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything persisted in the local key-value store, minus the identity
/// record. Values are whatever JSON the application stored; values that were
/// never valid JSON are carried as raw strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalSnapshot(BTreeMap<String, serde_json::Value>);

impl LocalSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    /// Get an entry by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl FromIterator<(String, serde_json::Value)> for LocalSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, serde_json::Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A full copy of the cookie store: cookie name to cookie value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieSnapshot(BTreeMap<String, String>);

impl CookieSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie:`-style header string ("a=1; b=2") into a snapshot.
    ///
    /// Names are unique; when a name occurs more than once the last
    /// occurrence wins, consistent with standard cookie semantics. Empty
    /// segments are skipped, and values may themselves contain `=`.
    pub fn parse(header: &str) -> Self {
        let mut cookies = BTreeMap::new();
        for segment in header.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.split_once('=') {
                Some((name, value)) => {
                    cookies.insert(name.trim().to_string(), value.trim().to_string());
                }
                None => {
                    cookies.insert(segment.to_string(), String::new());
                }
            }
        }
        Self(cookies)
    }

    /// Insert a cookie.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Get a cookie value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Iterate cookies in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Cookie names in order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for CookieSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Render a set-cookie string with a one-year expiry, root path and a lax
/// same-site policy, relative to `now` (milliseconds since epoch).
pub fn format_set_cookie(name: &str, value: &str, now: Timestamp) -> String {
    let base = Utc
        .timestamp_millis_opt(now as i64)
        .single()
        .unwrap_or_else(Utc::now);
    let expires = base + Duration::days(365);
    format!(
        "{}={}; expires={}; path=/; SameSite=Lax",
        name,
        value,
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

/// Render a set-cookie string that expires the named cookie immediately.
pub fn format_expired_cookie(name: &str) -> String {
    format!("{}=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/", name)
}
