//! HTTP route definitions.

mod account;
mod health;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new().merge(health::routes()).merge(account::routes())
}
