use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Stored OAuth connection to an external payroll provider. Token columns hold
/// ciphertext; decrypting them is the caller's job.
#[derive(Debug, Clone, FromRow)]
pub struct PayrollConnection {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub provider: String,
    pub company_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertPayrollConnection {
    pub provider: String,
    pub company_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
}

impl PayrollConnection {
    pub async fn find_by_organization_id(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PayrollConnection>(
            r#"SELECT id, organization_id, provider, company_id, access_token, refresh_token,
                      token_expires_at, created_at, updated_at
            FROM payroll_connections
            WHERE organization_id = $1"#,
        )
        .bind(organization_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create_or_update(
        pool: &PgPool,
        organization_id: Uuid,
        data: &UpsertPayrollConnection,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, PayrollConnection>(
            r#"INSERT INTO payroll_connections
                (id, organization_id, provider, company_id, access_token, refresh_token, token_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (organization_id) DO UPDATE SET
                provider = excluded.provider,
                company_id = excluded.company_id,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_expires_at = excluded.token_expires_at,
                updated_at = now()
            RETURNING id, organization_id, provider, company_id, access_token, refresh_token,
                      token_expires_at, created_at, updated_at"#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(&data.provider)
        .bind(&data.company_id)
        .bind(&data.access_token)
        .bind(&data.refresh_token)
        .bind(data.token_expires_at)
        .fetch_one(pool)
        .await
    }

    /// Replace the token pair after a refresh
    pub async fn update_tokens(
        pool: &PgPool,
        id: Uuid,
        access_token: &str,
        refresh_token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE payroll_connections
            SET access_token = $2,
                refresh_token = $3,
                token_expires_at = $4,
                updated_at = now()
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(token_expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }
}
