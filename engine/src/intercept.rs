//! Change interception for the local stores.
//!
//! Every application-level write has to reach the persistence scheduler
//! without call sites knowing the engine exists. For the key-value store
//! this is an explicit decorator around the two mutating entry points,
//! composed once at startup. Cookies expose no change notification at all,
//! so [`CookieWatcher`] detects changes by comparing the full header string
//! on a fixed poll interval.

use crate::store::{CookieJar, KeyValueStore};
use crate::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A single observed mutation of the key-value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Set(String),
    Removed(String),
}

impl Mutation {
    /// The key the mutation touched.
    pub fn key(&self) -> &str {
        match self {
            Mutation::Set(key) | Mutation::Removed(key) => key,
        }
    }
}

/// Decorator that makes every `set`/`remove` observable.
///
/// Delegates to the wrapped store first and emits a [`Mutation`] only after
/// the inner operation succeeded, so interception never changes the store's
/// observable behavior. Mutations of the identity record are not reported;
/// the identity record is owned by the auth flow, not the sync engine.
#[derive(Debug, Clone)]
pub struct InterceptedStore<S> {
    inner: S,
    identity_key: String,
    tx: UnboundedSender<Mutation>,
}

impl<S: KeyValueStore> InterceptedStore<S> {
    /// Wrap a store. Returns the decorator and the mutation stream the
    /// engine consumes.
    pub fn new(inner: S, identity_key: impl Into<String>) -> (Self, UnboundedReceiver<Mutation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                inner,
                identity_key: identity_key.into(),
                tx,
            },
            rx,
        )
    }

    /// Access the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn observe(&self, mutation: Mutation) {
        if mutation.key().contains(&self.identity_key) {
            return;
        }
        // The receiver being gone just means nobody is syncing anymore.
        let _ = self.tx.send(mutation);
    }
}

impl<S: KeyValueStore> KeyValueStore for InterceptedStore<S> {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value)?;
        self.observe(Mutation::Set(key.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.inner.remove(key);
        self.observe(Mutation::Removed(key.to_string()));
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

/// Poll-based change detection for the cookie jar.
pub struct CookieWatcher {
    last_observed: String,
}

impl CookieWatcher {
    /// Start watching from the jar's current state.
    pub fn new<C: CookieJar + ?Sized>(jar: &C) -> Self {
        Self {
            last_observed: jar.header(),
        }
    }

    /// Compare the current header against the last observed value.
    /// Returns true exactly when something changed, and remembers the new
    /// value either way.
    pub fn check<C: CookieJar + ?Sized>(&mut self, jar: &C) -> bool {
        let current = jar.header();
        if current == self.last_observed {
            return false;
        }
        self.last_observed = current;
        true
    }

    /// The last header value seen by the poll.
    pub fn last_observed(&self) -> &str {
        &self.last_observed
    }
}
