//! # Stash Engine
//!
//! The local/remote state synchronization engine for Stash.
//!
//! This crate keeps a user's locally stored preferences (key-value
//! settings, cookies, favorites) consistent with a per-user record in a
//! remote account store, while the application mutates local state through
//! ordinary storage APIs.
//!
//! ## Design Principles
//!
//! - **Transparent interception**: application code writes to its stores
//!   normally; the engine observes every mutation through an explicit
//!   decorator layer, never a runtime patch.
//! - **Coalesced persistence**: bursts of local writes become one remote
//!   upsert after a quiet period, never a storm of racing upserts.
//! - **Best-effort boundary**: no public operation fails. Remote errors are
//!   logged and swallowed; local state stays authoritative.
//! - **Monotonic merges**: array preferences reconcile by set union, never
//!   a destructive overwrite at merge time.
//!
//! ## Core Concepts
//!
//! ### Snapshots
//!
//! A [`LocalSnapshot`] is a full copy of the key-value store minus the
//! identity record; a [`CookieSnapshot`] is a full copy of the cookie jar.
//! Push replaces the remote record's snapshots wholesale; pull restores
//! them, with union-merged keys as the exception.
//!
//! ### Scheduling
//!
//! Every observed mutation re-arms a cancel-and-replace debounce timer
//! (default quiet period one second). Cookies have no native change event,
//! so they are polled on a fixed interval and compared against the last
//! observed header string.
//!
//! ### Logout suppression
//!
//! During logout, bulk deletions must not schedule a push that would
//! re-persist cleared data. The [`LogoutGuard`] suppresses both the arming
//! and the firing of the debounce timer, and auto-clears after a fixed
//! cooldown.
//!
//! ## Quick Start
//!
//! ```rust
//! use stash_engine::{
//!     KeyValueStore, MemoryAccountStore, MemoryCookieJar, MemoryStore,
//!     SyncEngine, SyncOptions,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = SyncEngine::new(
//!     MemoryStore::new(),
//!     MemoryCookieJar::new(),
//!     MemoryAccountStore::new(),
//!     SyncOptions::default(),
//! );
//! engine.start();
//!
//! // Application code writes through the intercepted store.
//! engine.store().set("stash_settings", r#"{"theme":"dark"}"#).unwrap();
//!
//! // Not logged in: sync operations are silent no-ops.
//! assert!(!engine.is_logged_in());
//! engine.save_to_account().await;
//! engine.shutdown();
//! # }
//! ```

pub mod account;
pub mod engine;
pub mod error;
pub mod guard;
pub mod identity;
pub mod intercept;
pub mod merge;
#[cfg(feature = "http")]
pub mod rest;
pub mod snapshot;
pub mod store;

// Re-export main types at crate root
pub use account::{AccountStore, MemoryAccountStore, RemoteRecord};
pub use engine::{SyncEngine, SyncOptions, FAVORITES_KEY};
pub use error::{Error, Result};
pub use guard::LogoutGuard;
pub use identity::DEFAULT_IDENTITY_KEY;
pub use intercept::{CookieWatcher, InterceptedStore, Mutation};
pub use merge::{union_merge, MergeOutcome, StorageEvent};
#[cfg(feature = "http")]
pub use rest::HttpAccountStore;
pub use snapshot::{CookieSnapshot, LocalSnapshot};
pub use store::{CookieJar, KeyValueStore, MemoryCookieJar, MemoryStore};

/// Type aliases for clarity
pub type UserId = String;
pub type PrefKey = String;
/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;
