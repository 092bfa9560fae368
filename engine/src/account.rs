//! The remote account store seam.
//!
//! One logical table, one row per user identity, two opaque JSON blobs per
//! row. The engine assumes last-writer-wins at the row level; push replaces
//! the stored snapshots wholesale, pull returns them if the row exists.

use crate::error::Result;
use crate::snapshot::{CookieSnapshot, LocalSnapshot};
use crate::UserId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One row of the remote account store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub user_id: UserId,
    pub local_storage: LocalSnapshot,
    pub cookies: CookieSnapshot,
}

/// The remote account store, keyed by user identity.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    /// Upsert the record for `user_id`, replacing both snapshots wholesale.
    async fn push(
        &self,
        user_id: &str,
        local: &LocalSnapshot,
        cookies: &CookieSnapshot,
    ) -> Result<()>;

    /// Fetch the record for `user_id`. An absent row is `None`, not an error.
    async fn pull(&self, user_id: &str) -> Result<Option<RemoteRecord>>;
}

/// In-memory [`AccountStore`], used in tests and offline embeddings.
///
/// Keeps a push counter so tests can assert on coalescing behavior.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountStore {
    records: Arc<Mutex<HashMap<UserId, RemoteRecord>>>,
    push_count: Arc<AtomicUsize>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pushes performed since construction.
    pub fn push_count(&self) -> usize {
        self.push_count.load(Ordering::SeqCst)
    }

    /// Direct read of a stored record, bypassing the pull path.
    pub fn record(&self, user_id: &str) -> Option<RemoteRecord> {
        self.records.lock().unwrap().get(user_id).cloned()
    }

    /// Seed a record, bypassing the push path.
    pub fn seed(&self, record: RemoteRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.user_id.clone(), record);
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn push(
        &self,
        user_id: &str,
        local: &LocalSnapshot,
        cookies: &CookieSnapshot,
    ) -> Result<()> {
        self.push_count.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().insert(
            user_id.to_string(),
            RemoteRecord {
                user_id: user_id.to_string(),
                local_storage: local.clone(),
                cookies: cookies.clone(),
            },
        );
        Ok(())
    }

    async fn pull(&self, user_id: &str) -> Result<Option<RemoteRecord>> {
        Ok(self.records.lock().unwrap().get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn push_then_pull_roundtrip() {
        let store = MemoryAccountStore::new();

        let mut local = LocalSnapshot::new();
        local.insert("theme", json!("dark"));
        let mut cookies = CookieSnapshot::new();
        cookies.insert("lang", "en");

        store.push("u1", &local, &cookies).await.unwrap();

        let record = store.pull("u1").await.unwrap().unwrap();
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.local_storage, local);
        assert_eq!(record.cookies, cookies);
    }

    #[tokio::test]
    async fn pull_missing_row_is_none() {
        let store = MemoryAccountStore::new();
        assert_eq!(store.pull("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn push_upserts_wholesale() {
        let store = MemoryAccountStore::new();

        let mut first = LocalSnapshot::new();
        first.insert("a", json!(1));
        first.insert("b", json!(2));
        store
            .push("u1", &first, &CookieSnapshot::new())
            .await
            .unwrap();

        // Second push drops "b": replacement, not field-level merge.
        let mut second = LocalSnapshot::new();
        second.insert("a", json!(1));
        store
            .push("u1", &second, &CookieSnapshot::new())
            .await
            .unwrap();

        let record = store.record("u1").unwrap();
        assert_eq!(record.local_storage, second);
        assert_eq!(store.push_count(), 2);
    }

    #[test]
    fn remote_record_wire_shape() {
        let record = RemoteRecord {
            user_id: "u1".to_string(),
            local_storage: LocalSnapshot::new(),
            cookies: CookieSnapshot::new(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("userId"));
        assert!(json.contains("localStorage"));
        assert!(json.contains("cookies"));
    }
}
