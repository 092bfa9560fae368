//! PostgreSQL connection pool.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub type Pool = PgPool;

/// Open a connection pool sized per configuration.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<Pool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Apply pending migrations from `server/migrations`.
pub async fn run_migrations(pool: &Pool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
