//! Behavioral tests for the sync engine.
//!
//! These run on a paused tokio clock, so the debounce quiet period, the
//! cookie poll and the logout cooldown all elapse deterministically.

use std::time::Duration;

use serde_json::json;
use stash_engine::{
    AccountStore, CookieJar, CookieSnapshot, KeyValueStore, LocalSnapshot, MemoryAccountStore,
    MemoryCookieJar, MemoryStore, RemoteRecord, SyncEngine, SyncOptions, DEFAULT_IDENTITY_KEY,
};
use tokio::time::sleep;

type TestEngine = SyncEngine<MemoryStore, MemoryCookieJar, MemoryAccountStore>;

/// Account store whose pushes take real time, for exercising in-flight
/// push behavior.
#[derive(Clone)]
struct SlowAccountStore {
    inner: MemoryAccountStore,
    delay: Duration,
}

#[async_trait::async_trait]
impl AccountStore for SlowAccountStore {
    async fn push(
        &self,
        user_id: &str,
        local: &LocalSnapshot,
        cookies: &CookieSnapshot,
    ) -> stash_engine::Result<()> {
        sleep(self.delay).await;
        self.inner.push(user_id, local, cookies).await
    }

    async fn pull(&self, user_id: &str) -> stash_engine::Result<Option<RemoteRecord>> {
        self.inner.pull(user_id).await
    }
}

fn build_engine(account: MemoryAccountStore) -> (TestEngine, MemoryStore, MemoryCookieJar) {
    let store = MemoryStore::new();
    let jar = MemoryCookieJar::new();
    let engine = SyncEngine::new(store.clone(), jar.clone(), account, SyncOptions::default());
    (engine, store, jar)
}

fn log_in(engine: &TestEngine, id: &str) {
    engine
        .store()
        .set(DEFAULT_IDENTITY_KEY, &format!(r#"{{"id":"{}"}}"#, id))
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn burst_of_writes_coalesces_into_one_push() {
    let account = MemoryAccountStore::new();
    let (engine, _, _) = build_engine(account.clone());
    log_in(&engine, "u1");
    engine.start();

    // Five writes 200ms apart: a 1000ms span, all within rolling quiet
    // periods of each other.
    for i in 0..5 {
        engine
            .store()
            .set(&format!("pref_{}", i), &format!("{}", i))
            .unwrap();
        sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(account.push_count(), 0);

    // The quiet period runs from the last write.
    sleep(Duration::from_millis(900)).await;
    assert_eq!(account.push_count(), 1);

    let record = account.record("u1").unwrap();
    for i in 0..5 {
        assert_eq!(
            record.local_storage.get(&format!("pref_{}", i)),
            Some(&json!(i))
        );
    }

    // Quiet afterwards: nothing else fires.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(account.push_count(), 1);

    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn each_new_write_buys_a_fresh_quiet_period() {
    let account = MemoryAccountStore::new();
    let (engine, _, _) = build_engine(account.clone());
    log_in(&engine, "u1");
    engine.start();

    engine.store().set("a", "1").unwrap();
    sleep(Duration::from_millis(900)).await;
    engine.store().set("b", "2").unwrap();
    sleep(Duration::from_millis(900)).await;
    assert_eq!(account.push_count(), 0);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(account.push_count(), 1);

    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn cookie_changes_are_detected_by_polling() {
    let account = MemoryAccountStore::new();
    let (engine, _, jar) = build_engine(account.clone());
    log_in(&engine, "u1");
    engine.start();

    // Cookies have no change event; the poll has to notice this.
    jar.set("session_pref=compact; path=/").unwrap();

    // One poll interval to observe, one quiet period to fire.
    sleep(Duration::from_millis(2200)).await;
    assert_eq!(account.push_count(), 1);

    let record = account.record("u1").unwrap();
    assert_eq!(record.cookies.get("session_pref"), Some("compact"));

    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn logout_suppression_window() {
    let account = MemoryAccountStore::new();
    let (engine, _, _) = build_engine(account.clone());
    log_in(&engine, "u1");
    engine.start();

    engine.set_logging_out(true);
    engine.store().set("theme", "dark").unwrap();

    // The write is observed but produces no push, before or after the
    // debounce would have fired.
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(account.push_count(), 0);

    // Past the cooldown, a new write syncs normally.
    engine.store().set("theme", "light").unwrap();
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(account.push_count(), 1);
    assert_eq!(
        account.record("u1").unwrap().local_storage.get("theme"),
        Some(&json!("light"))
    );

    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn flag_set_after_timer_armed_still_suppresses() {
    let account = MemoryAccountStore::new();
    let (engine, _, _) = build_engine(account.clone());
    log_in(&engine, "u1");
    engine.start();

    engine.store().set("theme", "dark").unwrap();
    sleep(Duration::from_millis(500)).await;
    // Timer is halfway through its quiet period; the fire-time check must
    // catch this.
    engine.set_logging_out(true);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(account.push_count(), 0);

    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn mutation_during_push_does_not_cancel_it() {
    let account = MemoryAccountStore::new();
    let slow = SlowAccountStore {
        inner: account.clone(),
        delay: Duration::from_millis(500),
    };
    let engine = SyncEngine::new(
        MemoryStore::new(),
        MemoryCookieJar::new(),
        slow,
        SyncOptions::default(),
    );
    engine
        .store()
        .set(DEFAULT_IDENTITY_KEY, r#"{"id":"u1"}"#)
        .unwrap();
    engine.start();

    engine.store().set("first", "1").unwrap();
    // The quiet period ends at 1s; the push itself runs until 1.5s. This
    // write lands in that window and must only re-arm the timer, never
    // cancel the started save.
    sleep(Duration::from_millis(1200)).await;
    engine.store().set("second", "2").unwrap();

    sleep(Duration::from_millis(400)).await;
    assert_eq!(account.push_count(), 1);
    let record = account.record("u1").unwrap();
    assert_eq!(record.local_storage.get("first"), Some(&json!(1)));
    assert_eq!(record.local_storage.get("second"), None);

    // The mid-push write gets its own quiet period and push.
    sleep(Duration::from_secs(2)).await;
    assert_eq!(account.push_count(), 2);
    assert_eq!(
        account.record("u1").unwrap().local_storage.get("second"),
        Some(&json!(2))
    );

    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn clear_local_data_does_not_repersist_cleared_state() {
    let account = MemoryAccountStore::new();
    let (engine, store, jar) = build_engine(account.clone());
    log_in(&engine, "u1");
    engine.start();

    engine.store().set("theme", r#""dark""#).unwrap();
    jar.set("lang=en; path=/").unwrap();
    engine.save_to_account().await;
    assert_eq!(account.push_count(), 1);

    engine.clear_local_data();
    // The bulk deletions above and this straggler land inside the
    // cooldown window.
    engine.store().set("straggler", "1").unwrap();

    sleep(Duration::from_secs(3)).await;
    assert_eq!(account.push_count(), 1);
    assert_eq!(store.get("theme"), None);

    // The remote record still holds the last state saved before logout.
    let record = account.record("u1").unwrap();
    assert_eq!(record.local_storage.get("theme"), Some(&json!("dark")));

    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn explicit_save_is_suppressed_during_logout() {
    let account = MemoryAccountStore::new();
    let (engine, _, _) = build_engine(account.clone());
    log_in(&engine, "u1");

    engine.set_logging_out(true);
    engine.save_to_account().await;
    assert_eq!(account.push_count(), 0);

    engine.set_logging_out(false);
    engine.save_to_account().await;
    assert_eq!(account.push_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn push_pull_round_trip_preserves_snapshots() {
    let account = MemoryAccountStore::new();
    let (engine, store, jar) = build_engine(account.clone());
    log_in(&engine, "u1");

    engine.store().set("settings", r#"{"volume":0.8}"#).unwrap();
    engine.store().set("plain", "not json {").unwrap();
    jar.set("lang=en; path=/").unwrap();
    engine.save_to_account().await;

    // Wipe local state without touching the remote record.
    store.remove("settings");
    store.remove("plain");
    jar.set("lang=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/")
        .unwrap();

    engine.load_from_account().await;

    assert_eq!(store.get("settings"), Some(r#"{"volume":0.8}"#.to_string()));
    assert_eq!(store.get("plain"), Some("not json {".to_string()));
    assert_eq!(jar.get("lang"), Some("en".to_string()));
}

#[tokio::test(start_paused = true)]
async fn no_identity_means_no_account_traffic() {
    let account = MemoryAccountStore::new();
    let (engine, _, _) = build_engine(account.clone());
    engine.start();

    engine.store().set("theme", "dark").unwrap();
    sleep(Duration::from_secs(2)).await;

    engine.save_to_account().await;
    engine.load_from_account().await;

    assert_eq!(account.push_count(), 0);
    assert!(account.record("u1").is_none());

    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn restore_writes_reschedule_a_push() {
    // Restoring from a pull goes through the interceptor like any other
    // write, so a load eventually re-saves. This mirrors the reference
    // behavior and keeps freshly merged unions durable remotely.
    let account = MemoryAccountStore::new();
    let (engine, _, _) = build_engine(account.clone());
    log_in(&engine, "u1");

    engine.store().set("theme", r#""dark""#).unwrap();
    engine.save_to_account().await;
    assert_eq!(account.push_count(), 1);

    engine.start();
    engine.load_from_account().await;
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(account.push_count(), 2);

    engine.shutdown();
}
