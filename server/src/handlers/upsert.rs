//! Upsert handler - processes the engine's push of both snapshots.

use crate::config::Config;
use crate::db;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use stash_engine::{CookieSnapshot, LocalSnapshot};

/// Request body for an account upsert.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    pub local_storage: LocalSnapshot,
    #[serde(default)]
    pub cookies: CookieSnapshot,
}

/// Response for an account upsert.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResponse {
    pub user_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Replace the stored snapshots for a user wholesale.
///
/// The engine never includes the identity record in a snapshot; a client
/// that does anyway is malformed and gets rejected rather than having an
/// identity blob persisted server-side. Snapshots over the configured
/// size cap are rejected too, since a push replaces the row wholesale.
pub async fn handle_upsert(
    pool: &PgPool,
    config: &Config,
    user_id: &str,
    request: UpsertRequest,
) -> Result<UpsertResponse> {
    validate(user_id, &request, &config.identity_key, config.max_snapshot_bytes)?;

    let updated_at =
        db::upsert_account(pool, user_id, &request.local_storage, &request.cookies).await?;

    tracing::debug!(
        user = user_id,
        keys = request.local_storage.len(),
        cookies = request.cookies.len(),
        "account snapshots upserted"
    );

    Ok(UpsertResponse {
        user_id: user_id.to_string(),
        updated_at,
    })
}

fn validate(
    user_id: &str,
    request: &UpsertRequest,
    identity_key: &str,
    max_bytes: usize,
) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(AppError::BadRequest("user id must not be empty".into()));
    }
    // Substring match, the same filter the engine applies client-side.
    if request
        .local_storage
        .iter()
        .any(|(key, _)| key.contains(identity_key))
    {
        return Err(AppError::BadRequest(
            "snapshot must not contain the identity record".into(),
        ));
    }

    let size = serialized_len(&request.local_storage)
        .saturating_add(serialized_len(&request.cookies));
    if size > max_bytes {
        return Err(AppError::SnapshotTooLarge { limit: max_bytes });
    }

    Ok(())
}

fn serialized_len<T: Serialize>(value: &T) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
}
