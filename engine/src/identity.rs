//! Identity record resolution.
//!
//! The auth flow stores a JSON identity record under a reserved key, either
//! in persistent storage (remember me) or in session-scoped storage. The
//! engine only ever reads it; a missing or malformed record means
//! "not logged in", which is a legitimate state rather than an error.

use crate::error::{Error, Result};
use crate::store::KeyValueStore;
use crate::UserId;

/// Reserved storage key for the identity record.
pub const DEFAULT_IDENTITY_KEY: &str = "stash_user";

/// Extract the user id from a raw identity record.
pub fn parse_identity(raw: &str) -> Result<UserId> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|err| Error::InvalidIdentity(err.to_string()))?;
    value
        .get("id")
        .and_then(|id| id.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidIdentity("missing id field".to_string()))
}

/// Resolve the current user identity.
///
/// Persistent storage is checked first, then the session-scoped store.
/// Returns `None` when no readable identity record exists anywhere.
pub fn resolve_user_id(
    persistent: &(impl KeyValueStore + ?Sized),
    session: Option<&dyn KeyValueStore>,
    identity_key: &str,
) -> Option<UserId> {
    let raw = persistent
        .get(identity_key)
        .or_else(|| session.and_then(|s| s.get(identity_key)))?;

    match parse_identity(&raw) {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::debug!(error = %err, "unreadable identity record");
            None
        }
    }
}
