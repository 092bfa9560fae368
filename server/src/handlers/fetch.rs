//! Fetch handler - serves a user's stored snapshots to the engine's pull.

use crate::db;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use stash_engine::{CookieSnapshot, LocalSnapshot};

/// Response for an account fetch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub user_id: String,
    pub local_storage: LocalSnapshot,
    pub cookies: CookieSnapshot,
    pub updated_at: DateTime<Utc>,
}

/// Fetch the account record for a user. Absent rows are 404, which the
/// engine client maps to "no record yet".
pub async fn handle_fetch(pool: &PgPool, user_id: &str) -> Result<AccountResponse> {
    let stored = db::get_account(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no account data for user {}", user_id)))?;

    let updated_at = stored.updated_at;
    let record = stored
        .to_record()
        .map_err(|e| AppError::CorruptRecord(format!("user {}: {}", user_id, e)))?;

    Ok(AccountResponse {
        user_id: record.user_id,
        local_storage: record.local_storage,
        cookies: record.cookies,
        updated_at,
    })
}
