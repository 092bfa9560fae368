//! Database operations for the user_data table.
//!
//! One row per user identity, holding the two snapshot blobs the engine
//! pushes. `user_id` is the conflict key; upserts replace both blobs
//! wholesale (last-writer-wins at the row level).

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use stash_engine::{CookieSnapshot, LocalSnapshot, RemoteRecord};

/// A stored account row from the database.
#[derive(Debug)]
pub struct StoredAccount {
    pub user_id: String,
    pub local_storage: serde_json::Value,
    pub cookies: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredAccount {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredAccount {
            user_id: row.try_get("user_id")?,
            local_storage: row.try_get("local_storage")?,
            cookies: row.try_get("cookies")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredAccount {
    /// Convert the raw row into the engine's record type.
    pub fn to_record(&self) -> Result<RemoteRecord, String> {
        let local_storage: LocalSnapshot = serde_json::from_value(self.local_storage.clone())
            .map_err(|e| format!("invalid local_storage blob: {}", e))?;
        let cookies: CookieSnapshot = serde_json::from_value(self.cookies.clone())
            .map_err(|e| format!("invalid cookies blob: {}", e))?;

        Ok(RemoteRecord {
            user_id: self.user_id.clone(),
            local_storage,
            cookies,
        })
    }
}

/// Upsert the account row for a user, replacing both snapshots wholesale.
/// Returns the new updated_at timestamp.
pub async fn upsert_account(
    pool: &PgPool,
    user_id: &str,
    local_storage: &LocalSnapshot,
    cookies: &CookieSnapshot,
) -> Result<DateTime<Utc>, sqlx::Error> {
    let result: (DateTime<Utc>,) = sqlx::query_as(
        r#"
        INSERT INTO user_data (user_id, local_storage, cookies, updated_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (user_id) DO UPDATE SET
            local_storage = EXCLUDED.local_storage,
            cookies = EXCLUDED.cookies,
            updated_at = EXCLUDED.updated_at
        RETURNING updated_at
        "#,
    )
    .bind(user_id)
    .bind(sqlx::types::Json(local_storage))
    .bind(sqlx::types::Json(cookies))
    .fetch_one(pool)
    .await?;

    Ok(result.0)
}

/// Get the account row for a user, if any.
pub async fn get_account(
    pool: &PgPool,
    user_id: &str,
) -> Result<Option<StoredAccount>, sqlx::Error> {
    sqlx::query_as::<_, StoredAccount>(
        r#"
        SELECT user_id, local_storage, cookies, updated_at
        FROM user_data
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Delete the account row for a user. Returns whether a row existed.
pub async fn delete_account(pool: &PgPool, user_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM user_data WHERE user_id = $1"#)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
