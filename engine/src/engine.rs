//! The synchronization engine.
//!
//! [`SyncEngine`] owns the intercepted store, the cookie jar, the account
//! store seam and all timer state. Control flow: a local mutation reaches
//! [`SyncEngine::notify_change`] through the interceptor channel or the
//! cookie poll, which arms (or re-arms) the debounce timer; when a full
//! quiet period elapses uninterrupted, one push carries the current
//! snapshots to the account store, gated by the logout guard.
//!
//! Every public operation is best-effort: remote failures are logged and
//! swallowed, local state stays authoritative.

use crate::account::{AccountStore, RemoteRecord};
use crate::guard::LogoutGuard;
use crate::identity::{self, DEFAULT_IDENTITY_KEY};
use crate::intercept::{CookieWatcher, InterceptedStore, Mutation};
use crate::merge::{self, StorageEvent};
use crate::snapshot::{format_expired_cookie, LocalSnapshot};
use crate::store::{self, CookieJar, KeyValueStore};
use crate::{Timestamp, UserId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default local storage key for the favorites list, the canonical
/// union-merged preference.
pub const FAVORITES_KEY: &str = "stash_favorites";

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Reserved key holding the identity record. Keys containing this
    /// string are invisible to sync.
    pub identity_key: String,
    /// Quiet period before a burst of mutations becomes one push.
    pub debounce: Duration,
    /// How often the cookie header is compared against the last observed
    /// value.
    pub cookie_poll_interval: Duration,
    /// How long persistence stays suppressed after a logout begins.
    pub logout_cooldown: Duration,
    /// Array-valued preferences reconciled by set union instead of
    /// overwrite on restore.
    pub merge_keys: Vec<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            identity_key: DEFAULT_IDENTITY_KEY.to_string(),
            debounce: Duration::from_secs(1),
            cookie_poll_interval: Duration::from_secs(1),
            logout_cooldown: Duration::from_secs(2),
            merge_keys: vec![FAVORITES_KEY.to_string()],
        }
    }
}

/// Timer and task state, one per engine instance.
struct SyncState {
    /// At most one outstanding debounce timer; re-armed on every
    /// qualifying mutation and cleared by the timer itself when it fires.
    pending: Option<JoinHandle<()>>,
    /// Bumped on every arm; lets a fired timer tell whether the handle in
    /// `pending` is still its own before clearing it.
    timer_epoch: u64,
    /// Mutation pump and cookie poll, held for teardown.
    watchers: Vec<JoinHandle<()>>,
    started: bool,
}

struct Inner<S, C, A> {
    store: InterceptedStore<S>,
    session: Option<Arc<dyn KeyValueStore>>,
    cookies: C,
    account: A,
    options: SyncOptions,
    guard: LogoutGuard,
    state: Mutex<SyncState>,
    /// Taken by `start`; holds the interceptor's mutation stream until then.
    mutations: Mutex<Option<UnboundedReceiver<Mutation>>>,
    /// Serializes every push, debounced or explicit.
    push_queue: tokio::sync::Mutex<()>,
    events: broadcast::Sender<StorageEvent>,
}

/// The local/remote synchronization engine. Cheap to clone; clones share
/// one engine instance.
pub struct SyncEngine<S, C, A> {
    inner: Arc<Inner<S, C, A>>,
}

impl<S, C, A> Clone for SyncEngine<S, C, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C, A> SyncEngine<S, C, A>
where
    S: KeyValueStore + 'static,
    C: CookieJar + 'static,
    A: AccountStore,
{
    /// Build an engine around the given stores. The key-value store is
    /// wrapped in the change interceptor here, exactly once; route all
    /// application writes through [`SyncEngine::store`].
    pub fn new(store: S, cookies: C, account: A, options: SyncOptions) -> Self {
        Self::with_session_store(store, cookies, account, None, options)
    }

    /// Like [`SyncEngine::new`], with a session-scoped store consulted as
    /// the identity fallback.
    pub fn with_session_store(
        store: S,
        cookies: C,
        account: A,
        session: Option<Arc<dyn KeyValueStore>>,
        options: SyncOptions,
    ) -> Self {
        let (store, mutations) = InterceptedStore::new(store, options.identity_key.clone());
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                store,
                session,
                cookies,
                account,
                options,
                guard: LogoutGuard::new(),
                state: Mutex::new(SyncState {
                    pending: None,
                    timer_epoch: 0,
                    watchers: Vec::new(),
                    started: false,
                }),
                mutations: Mutex::new(Some(mutations)),
                push_queue: tokio::sync::Mutex::new(()),
                events,
            }),
        }
    }

    /// The intercepted store; every write through it is observed by the
    /// scheduler.
    pub fn store(&self) -> &InterceptedStore<S> {
        &self.inner.store
    }

    /// The cookie jar.
    pub fn cookies(&self) -> &C {
        &self.inner.cookies
    }

    /// Start the mutation pump and the cookie poll. Idempotent; the
    /// watchers are wired at most once per engine instance.
    pub fn start(&self) {
        let mut rx = {
            let mut state = self.inner.state.lock().unwrap();
            if state.started {
                return;
            }
            state.started = true;
            match self.inner.mutations.lock().unwrap().take() {
                Some(rx) => rx,
                None => return,
            }
        };

        let pump = {
            let engine = self.clone();
            tokio::spawn(async move {
                while let Some(mutation) = rx.recv().await {
                    tracing::trace!(key = mutation.key(), "local mutation observed");
                    engine.notify_change();
                }
            })
        };

        // Baseline the watcher now, not at the task's first run, so writes
        // landing in between are observed as changes.
        let mut watcher = CookieWatcher::new(&self.inner.cookies);
        let poll = {
            let engine = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(engine.inner.options.cookie_poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if watcher.check(&engine.inner.cookies) {
                        tracing::trace!("cookie change observed");
                        engine.notify_change();
                    }
                }
            })
        };

        let mut state = self.inner.state.lock().unwrap();
        state.watchers.push(pump);
        state.watchers.push(poll);
    }

    /// Abort the watchers and any pending debounce timer.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        for watcher in state.watchers.drain(..) {
            watcher.abort();
        }
    }

    /// Arm (or re-arm) the debounce timer: cancel-and-replace, so every
    /// notification buys a fresh full quiet period. Only the waiting timer
    /// is ever cancelled; a push that already started runs to completion,
    /// because the timer removes its own handle at the moment it fires.
    ///
    /// Suppression is checked here when the timer is armed and again at
    /// the moment it fires, closing the race between "timer already
    /// running" and "flag just set".
    pub fn notify_change(&self) {
        if self.inner.guard.is_suppressed() {
            tracing::debug!("persistence suppressed, not scheduling push");
            return;
        }
        if self.user_id().is_none() {
            return;
        }

        let mut state = self.inner.state.lock().unwrap();
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        state.timer_epoch = state.timer_epoch.wrapping_add(1);
        let epoch = state.timer_epoch;
        let engine = self.clone();
        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(engine.inner.options.debounce).await;
            {
                let mut state = engine.inner.state.lock().unwrap();
                if state.timer_epoch != epoch {
                    return;
                }
                state.pending = None;
            }
            if engine.inner.guard.is_suppressed() {
                tracing::debug!("push suppressed at fire time");
                return;
            }
            engine.push_now().await;
        }));
    }

    /// Push both snapshots to the account record, serialized behind the
    /// push queue. No-op when suppressed or logged out.
    async fn push_now(&self) {
        let _queued = self.inner.push_queue.lock().await;
        if self.inner.guard.is_suppressed() {
            return;
        }
        let Some(user_id) = self.user_id() else {
            tracing::debug!("not logged in, skipping save to account");
            return;
        };

        let local = store::read_all(&self.inner.store, &self.inner.options.identity_key);
        let cookies = store::read_cookies(&self.inner.cookies);

        match self.inner.account.push(&user_id, &local, &cookies).await {
            Ok(()) => {
                tracing::debug!(user = %user_id, keys = local.len(), "saved data to account");
            }
            Err(err) => {
                tracing::warn!(user = %user_id, error = %err, "failed to save data to account");
            }
        }
    }

    /// Explicitly persist the current local state to the account record.
    ///
    /// Best-effort: resolves without error when logged out, suppressed, or
    /// when the account store fails.
    pub async fn save_to_account(&self) {
        self.push_now().await;
    }

    /// Pull the account record and restore it locally. Ordinary keys are
    /// overwritten wholesale; merge keys are reconciled by set union, and a
    /// changed union is broadcast to same-page listeners.
    pub async fn load_from_account(&self) {
        let Some(user_id) = self.user_id() else {
            tracing::debug!("not logged in, skipping load from account");
            return;
        };

        let record = match self.inner.account.pull(&user_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(user = %user_id, "no account record yet");
                return;
            }
            Err(err) => {
                tracing::warn!(user = %user_id, error = %err, "failed to load data from account");
                return;
            }
        };

        self.restore(record);
        tracing::debug!(user = %user_id, "loaded data from account");
    }

    fn restore(&self, record: RemoteRecord) {
        let options = &self.inner.options;

        // Everything that is not union-merged restores by overwrite.
        let plain: LocalSnapshot = record
            .local_storage
            .iter()
            .filter(|(key, _)| !options.merge_keys.iter().any(|m| m == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        store::write_all(&self.inner.store, &plain, &options.identity_key);
        store::write_cookies(&self.inner.cookies, &record.cookies, now_ms());

        for key in &options.merge_keys {
            let Some(serde_json::Value::Array(remote)) = record.local_storage.get(key) else {
                continue;
            };
            let outcome = merge::merge_into_store(&self.inner.store, key, remote);
            if outcome.changed {
                let _ = self.inner.events.send(StorageEvent {
                    key: key.clone(),
                    value: serde_json::Value::Array(outcome.merged),
                });
            }
        }
    }

    /// Remove every local key-value entry and every cookie except the
    /// identity record. The logout guard is activated first so the bulk
    /// deletions cannot schedule a push that re-persists cleared data.
    pub fn clear_local_data(&self) {
        self.inner
            .guard
            .begin_cooldown(self.inner.options.logout_cooldown);

        let identity_key = &self.inner.options.identity_key;
        for key in self.inner.store.keys() {
            if key.contains(identity_key) {
                continue;
            }
            self.inner.store.remove(&key);
        }

        for name in store::read_cookies(&self.inner.cookies).names() {
            if name.contains(identity_key) {
                continue;
            }
            if let Err(err) = self.inner.cookies.set(&format_expired_cookie(name)) {
                tracing::warn!(cookie = %name, error = %err, "failed to expire cookie");
            }
        }

        tracing::info!("cleared all local data");
    }

    /// Control the suppression flag directly. Raising it starts the same
    /// fixed cooldown as the logout path; lowering it resumes persistence
    /// immediately.
    pub fn set_logging_out(&self, logging_out: bool) {
        if logging_out {
            self.inner
                .guard
                .begin_cooldown(self.inner.options.logout_cooldown);
        } else {
            self.inner.guard.set(false);
        }
    }

    /// Whether a readable identity record exists.
    pub fn is_logged_in(&self) -> bool {
        self.user_id().is_some()
    }

    /// Subscribe to same-page storage change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.inner.events.subscribe()
    }

    /// Cross-tab path: another tab changed `key`, re-read it and rebroadcast
    /// so views in this context update as well. Values that never were JSON
    /// are carried as raw strings, the same fallback the snapshot reader
    /// applies; a missing key broadcasts as null.
    pub fn apply_external_change(&self, key: &str) {
        let value = match self.inner.store.get(key) {
            Some(raw) => {
                serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
            }
            None => serde_json::Value::Null,
        };
        let _ = self.inner.events.send(StorageEvent {
            key: key.to_string(),
            value,
        });
    }

    fn user_id(&self) -> Option<UserId> {
        identity::resolve_user_id(
            &self.inner.store,
            self.inner.session.as_ref().map(|s| s.as_ref()),
            &self.inner.options.identity_key,
        )
    }
}

fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}
