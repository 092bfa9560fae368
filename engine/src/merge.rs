//! Union merge for array-valued preferences.
//!
//! The favorites list is the canonical case: the effective value after
//! reconciling local and remote copies is the deduplicated union of both.
//! A merge never removes an entry present in either source; removal is a
//! deliberate local mutation that syncs normally afterward.

use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Deduplicated union of two JSON arrays.
///
/// Local order is preserved; entries only present remotely are appended in
/// remote order. Monotonic, idempotent, and commutative as a set.
pub fn union_merge(local: &[serde_json::Value], remote: &[serde_json::Value]) -> Vec<serde_json::Value> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(local.len() + remote.len());
    for value in local.iter().chain(remote.iter()) {
        // serde_json renders maps in key order, so equal values always
        // produce equal strings.
        if seen.insert(value.to_string()) {
            merged.push(value.clone());
        }
    }
    merged
}

/// Same-page change notification, broadcast when a merged preference
/// actually changed so other open views update without a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    /// The local storage key that changed.
    pub key: String,
    /// The value now stored under that key.
    pub value: serde_json::Value,
}

/// Result of reconciling one array preference against a remote copy.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The merged array, as written back to local storage.
    pub merged: Vec<serde_json::Value>,
    /// Whether the merge changed what was stored locally.
    pub changed: bool,
}

/// Read the local copy of an array preference.
///
/// A missing key or a value that is not a JSON array reads as empty.
pub fn read_array<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Vec<serde_json::Value> {
    store
        .get(key)
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .and_then(|value| match value {
            serde_json::Value::Array(items) => Some(items),
            _ => None,
        })
        .unwrap_or_default()
}

/// Reconcile a named array preference with an authoritative remote copy and
/// write the union back under the same key.
///
/// The remote store is never mutated here; only a later explicit push
/// overwrites the remote copy with the new union.
pub fn merge_into_store<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
    remote: &[serde_json::Value],
) -> MergeOutcome {
    let local = read_array(store, key);
    let merged = union_merge(&local, remote);
    let changed = merged != local;

    if changed {
        match serde_json::to_string(&merged) {
            Ok(raw) => {
                if let Err(err) = store.set(key, &raw) {
                    tracing::warn!(key = %key, error = %err, "failed to write merged preference");
                }
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "failed to serialize merged preference");
            }
        }
    }

    MergeOutcome { merged, changed }
}
