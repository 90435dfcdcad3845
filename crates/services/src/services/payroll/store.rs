use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::payroll_connection::{PayrollConnection, UpsertPayrollConnection};
use sqlx::PgPool;
use uuid::Uuid;

/// Persistence for provider connections; the Postgres implementation is used
/// in production and an in-memory one in tests.
#[async_trait]
pub trait PayrollConnectionStore: Send + Sync {
    async fn find(&self, organization_id: Uuid) -> Result<Option<PayrollConnection>, sqlx::Error>;

    async fn upsert(
        &self,
        organization_id: Uuid,
        data: &UpsertPayrollConnection,
    ) -> Result<PayrollConnection, sqlx::Error>;

    async fn update_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;
}

#[derive(Clone)]
pub struct PgPayrollConnectionStore {
    pool: PgPool,
}

impl PgPayrollConnectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PayrollConnectionStore for PgPayrollConnectionStore {
    async fn find(&self, organization_id: Uuid) -> Result<Option<PayrollConnection>, sqlx::Error> {
        PayrollConnection::find_by_organization_id(&self.pool, organization_id).await
    }

    async fn upsert(
        &self,
        organization_id: Uuid,
        data: &UpsertPayrollConnection,
    ) -> Result<PayrollConnection, sqlx::Error> {
        PayrollConnection::create_or_update(&self.pool, organization_id, data).await
    }

    async fn update_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        PayrollConnection::update_tokens(
            &self.pool,
            id,
            access_token,
            refresh_token,
            token_expires_at,
        )
        .await
    }
}
