//! In-memory [`PayrollConnectionStore`] used by tests across the workspace.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::payroll_connection::{PayrollConnection, UpsertPayrollConnection};
use uuid::Uuid;

use super::store::PayrollConnectionStore;

#[derive(Default)]
pub struct InMemoryPayrollStore {
    connections: Mutex<Vec<PayrollConnection>>,
}

impl InMemoryPayrollStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, connection: PayrollConnection) {
        self.connections.lock().unwrap().push(connection);
    }

    pub fn get(&self, organization_id: Uuid) -> Option<PayrollConnection> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.organization_id == organization_id)
            .cloned()
    }
}

#[async_trait]
impl PayrollConnectionStore for InMemoryPayrollStore {
    async fn find(&self, organization_id: Uuid) -> Result<Option<PayrollConnection>, sqlx::Error> {
        Ok(self.get(organization_id))
    }

    async fn upsert(
        &self,
        organization_id: Uuid,
        data: &UpsertPayrollConnection,
    ) -> Result<PayrollConnection, sqlx::Error> {
        let mut connections = self.connections.lock().unwrap();
        let now = Utc::now();
        let existing = connections
            .iter_mut()
            .find(|c| c.organization_id == organization_id);

        let connection = match existing {
            Some(connection) => {
                connection.provider = data.provider.clone();
                connection.company_id = data.company_id.clone();
                connection.access_token = data.access_token.clone();
                connection.refresh_token = data.refresh_token.clone();
                connection.token_expires_at = data.token_expires_at;
                connection.updated_at = now;
                connection.clone()
            }
            None => {
                let connection = PayrollConnection {
                    id: Uuid::new_v4(),
                    organization_id,
                    provider: data.provider.clone(),
                    company_id: data.company_id.clone(),
                    access_token: data.access_token.clone(),
                    refresh_token: data.refresh_token.clone(),
                    token_expires_at: data.token_expires_at,
                    created_at: now,
                    updated_at: now,
                };
                connections.push(connection.clone());
                connection
            }
        };
        Ok(connection)
    }

    async fn update_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let mut connections = self.connections.lock().unwrap();
        if let Some(connection) = connections.iter_mut().find(|c| c.id == id) {
            connection.access_token = access_token.to_string();
            connection.refresh_token = refresh_token.to_string();
            connection.token_expires_at = token_expires_at;
            connection.updated_at = Utc::now();
        }
        Ok(())
    }
}
