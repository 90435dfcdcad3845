use std::time::Duration;

use sqlx::{
    Error, PgPool,
    migrate::MigrateError,
    postgres::PgPoolOptions,
};
use thiserror::Error as ThisError;
use tracing::info;

pub mod models;

#[derive(Debug, ThisError)]
pub enum DBServiceError {
    #[error("database error: {0}")]
    Database(#[from] Error),
    #[error("migration error: {0}")]
    Migrate(#[from] MigrateError),
}

#[derive(Clone)]
pub struct DBService {
    pub pool: PgPool,
}

impl DBService {
    /// Connect to Postgres and bring the schema up to date.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<DBService, DBServiceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "Database pool ready, migrations applied");

        Ok(DBService { pool })
    }
}
