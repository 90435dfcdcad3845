use sqlx::PgPool;
use uuid::Uuid;

pub struct Organization;

impl Organization {
    pub async fn find_all_ids(pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM organizations ORDER BY created_at")
            .fetch_all(pool)
            .await
    }
}

pub struct OrganizationMember;

impl OrganizationMember {
    /// User ids of members holding any of `roles`
    pub async fn find_user_ids_by_roles(
        pool: &PgPool,
        organization_id: Uuid,
        roles: &[&str],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        sqlx::query_scalar::<_, Uuid>(
            r#"SELECT user_id
            FROM organization_members
            WHERE organization_id = $1
              AND role = ANY($2)"#,
        )
        .bind(organization_id)
        .bind(roles)
        .fetch_all(pool)
        .await
    }
}
