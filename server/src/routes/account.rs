//! Account endpoint routes.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    handle_fetch, handle_remove, handle_upsert, AccountResponse, RemoveResponse, UpsertRequest,
    UpsertResponse,
};
use crate::AppState;

/// Create account routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/account/{user_id}",
        get(fetch_handler).put(upsert_handler).delete(remove_handler),
    )
}

/// GET /account/{user_id} - Fetch the stored snapshots.
async fn fetch_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<AccountResponse>> {
    let response = handle_fetch(&state.pool, &user_id).await?;
    Ok(Json(response))
}

/// PUT /account/{user_id} - Upsert both snapshots wholesale.
async fn upsert_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
    Json(request): Json<UpsertRequest>,
) -> Result<Json<UpsertResponse>> {
    let response = handle_upsert(&state.pool, &state.config, &user_id, request).await?;
    Ok(Json(response))
}

/// DELETE /account/{user_id} - Remove the account row.
async fn remove_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<RemoveResponse>> {
    let response = handle_remove(&state.pool, &user_id).await?;
    Ok(Json(response))
}
