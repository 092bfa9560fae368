//! Remove handler - deletes a user's account row entirely.

use crate::db;
use crate::error::{AppError, Result};
use serde::Serialize;
use sqlx::PgPool;

/// Response for an account deletion.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResponse {
    pub user_id: String,
    pub deleted: bool,
}

/// Delete the account row for a user (account closure, not logout; logout
/// only clears client-side state).
pub async fn handle_remove(pool: &PgPool, user_id: &str) -> Result<RemoveResponse> {
    let deleted = db::delete_account(pool, user_id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!(
            "no account data for user {}",
            user_id
        )));
    }

    Ok(RemoveResponse {
        user_id: user_id.to_string(),
        deleted,
    })
}
