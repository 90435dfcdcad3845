//! Proxy to the organization's connected payroll provider.
//!
//! Every provider implements [`PayrollProvider`]; [`provider_for`] picks the
//! implementation from the provider name stored on the connection. Access
//! tokens are stored sealed by [`TokenCipher`] and refreshed shortly before
//! they expire.

pub mod gusto;
pub mod http;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod oauth;
pub mod quickbooks;
pub mod store;
pub mod token_cipher;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use db::models::payroll_connection::{PayrollConnection, UpsertPayrollConnection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

pub use self::{
    gusto::GustoProvider,
    http::ProviderHttp,
    quickbooks::QuickBooksProvider,
    store::{PayrollConnectionStore, PgPayrollConnectionStore},
    token_cipher::{TokenCipher, TokenCipherError},
};
use super::config::{OAuthClientConfig, PayrollConfig};

#[derive(Debug, Error)]
pub enum PayrollError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("token error: {0}")]
    Token(#[from] TokenCipherError),
    #[error("no payroll provider connected for this organization")]
    NotConnected,
    #[error("unknown payroll provider: {0}")]
    UnknownProvider(String),
    #[error("payroll provider {0} is not configured")]
    ProviderNotConfigured(ProviderKind),
    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: ProviderKind,
        operation: &'static str,
    },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("provider returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("provider rejected the access token")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("json error: {0}")]
    Serde(String),
}

impl PayrollError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// Whether the failure happened on the provider's side of the proxy
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Timeout
                | Self::Http { .. }
                | Self::Unauthorized
                | Self::RateLimited
                | Self::Serde(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    Gusto,
    #[serde(rename = "quickbooks")]
    #[strum(serialize = "quickbooks")]
    QuickBooks,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Result<Self, PayrollError> {
        name.trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| PayrollError::UnknownProvider(name.to_string()))
    }
}

#[async_trait]
pub trait PayrollProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn get_company(&self) -> Result<Value, PayrollError>;

    async fn get_employees(&self) -> Result<Value, PayrollError>;

    async fn get_payrolls(&self) -> Result<Value, PayrollError>;

    async fn create_payroll(&self, payload: Value) -> Result<Value, PayrollError>;

    async fn submit_payroll(&self, payroll_id: &str) -> Result<Value, PayrollError>;
}

/// One proxied provider operation
#[derive(Debug, Clone, PartialEq)]
pub enum PayrollAction {
    GetCompany,
    GetEmployees,
    GetPayrolls,
    CreatePayroll(Value),
    SubmitPayroll(String),
}

impl PayrollAction {
    /// Build an action from the wire names used by the web client
    pub fn from_parts(
        action: &str,
        payroll_id: Option<String>,
        payload: Option<Value>,
    ) -> Result<Self, PayrollError> {
        match action {
            "getCompany" => Ok(Self::GetCompany),
            "getEmployees" => Ok(Self::GetEmployees),
            "getPayrolls" => Ok(Self::GetPayrolls),
            "createPayroll" => payload
                .filter(|p| p.is_object())
                .map(Self::CreatePayroll)
                .ok_or_else(|| {
                    PayrollError::InvalidRequest("createPayroll requires an object payload".into())
                }),
            "submitPayroll" => payroll_id
                .filter(|id| !id.trim().is_empty())
                .map(Self::SubmitPayroll)
                .ok_or_else(|| {
                    PayrollError::InvalidRequest("submitPayroll requires payrollId".into())
                }),
            other => Err(PayrollError::InvalidRequest(format!(
                "unknown action: {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetCompany => "getCompany",
            Self::GetEmployees => "getEmployees",
            Self::GetPayrolls => "getPayrolls",
            Self::CreatePayroll(_) => "createPayroll",
            Self::SubmitPayroll(_) => "submitPayroll",
        }
    }

    pub async fn apply(self, provider: &dyn PayrollProvider) -> Result<Value, PayrollError> {
        match self {
            Self::GetCompany => provider.get_company().await,
            Self::GetEmployees => provider.get_employees().await,
            Self::GetPayrolls => provider.get_payrolls().await,
            Self::CreatePayroll(payload) => provider.create_payroll(payload).await,
            Self::SubmitPayroll(payroll_id) => provider.submit_payroll(&payroll_id).await,
        }
    }
}

/// OAuth client credentials per provider
#[derive(Debug, Default)]
pub struct ProviderClients {
    pub gusto: Option<OAuthClientConfig>,
    pub quickbooks: Option<OAuthClientConfig>,
}

impl ProviderClients {
    pub fn get(&self, kind: ProviderKind) -> Result<&OAuthClientConfig, PayrollError> {
        match kind {
            ProviderKind::Gusto => self.gusto.as_ref(),
            ProviderKind::QuickBooks => self.quickbooks.as_ref(),
        }
        .ok_or(PayrollError::ProviderNotConfigured(kind))
    }
}

/// Build the provider implementation named by a stored connection
pub fn provider_for(
    provider_name: &str,
    clients: &ProviderClients,
    http: ProviderHttp,
    company_id: String,
    access_token: String,
) -> Result<Box<dyn PayrollProvider>, PayrollError> {
    let kind = ProviderKind::parse(provider_name)?;
    let client = clients.get(kind)?;
    Ok(match kind {
        ProviderKind::Gusto => Box::new(GustoProvider::new(
            http,
            &client.api_base,
            company_id,
            access_token,
        )),
        ProviderKind::QuickBooks => Box::new(QuickBooksProvider::new(
            http,
            &client.api_base,
            company_id,
            access_token,
        )),
    })
}

/// Tokens this close to expiry are refreshed before use
pub fn refresh_margin() -> TimeDelta {
    TimeDelta::minutes(5)
}

pub fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at - now <= refresh_margin()
}

/// `now + seconds`, or `None` when the lifetime does not fit a timestamp
pub fn expiry_after(now: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(seconds).and_then(|lifetime| now.checked_add_signed(lifetime))
}

/// Body the web client posts after finishing a provider's OAuth consent flow
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPayroll {
    pub provider: String,
    pub company_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Connection details safe to return to clients
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PayrollConnectionInfo {
    pub organization_id: Uuid,
    pub provider: ProviderKind,
    pub company_id: String,
    pub token_expires_at: DateTime<Utc>,
}

pub struct PayrollService {
    store: Arc<dyn PayrollConnectionStore>,
    cipher: TokenCipher,
    http: ProviderHttp,
    clients: ProviderClients,
}

impl PayrollService {
    pub fn new(
        store: Arc<dyn PayrollConnectionStore>,
        config: PayrollConfig,
    ) -> Result<Self, PayrollError> {
        Ok(Self {
            store,
            cipher: TokenCipher::new(&config.token_encryption_key),
            http: ProviderHttp::new()?,
            clients: ProviderClients {
                gusto: config.gusto,
                quickbooks: config.quickbooks,
            },
        })
    }

    /// Store (or replace) the organization's provider connection
    pub async fn connect(
        &self,
        organization_id: Uuid,
        request: ConnectPayroll,
    ) -> Result<PayrollConnectionInfo, PayrollError> {
        let kind = ProviderKind::parse(&request.provider)?;
        self.clients.get(kind)?;
        if request.company_id.trim().is_empty() {
            return Err(PayrollError::InvalidRequest("companyId is required".into()));
        }
        if request.expires_in <= 0 {
            return Err(PayrollError::InvalidRequest(
                "expiresIn must be positive".into(),
            ));
        }

        let token_expires_at = expiry_after(Utc::now(), request.expires_in)
            .ok_or_else(|| PayrollError::InvalidRequest("expiresIn out of range".into()))?;

        let connection = self
            .store
            .upsert(
                organization_id,
                &UpsertPayrollConnection {
                    provider: kind.to_string(),
                    company_id: request.company_id,
                    access_token: self.cipher.encrypt(&request.access_token)?,
                    refresh_token: self.cipher.encrypt(&request.refresh_token)?,
                    token_expires_at,
                },
            )
            .await?;

        info!(
            organization_id = %organization_id,
            provider = %kind,
            "Payroll provider connected"
        );

        Ok(PayrollConnectionInfo {
            organization_id,
            provider: kind,
            company_id: connection.company_id,
            token_expires_at: connection.token_expires_at,
        })
    }

    /// Run `action` against the organization's connected provider
    pub async fn execute(
        &self,
        organization_id: Uuid,
        action: PayrollAction,
    ) -> Result<Value, PayrollError> {
        let connection = self
            .store
            .find(organization_id)
            .await?
            .ok_or(PayrollError::NotConnected)?;

        let access_token = self.access_token(&connection).await?;
        let provider = provider_for(
            &connection.provider,
            &self.clients,
            self.http.clone(),
            connection.company_id.clone(),
            access_token,
        )?;

        info!(
            organization_id = %organization_id,
            provider = %provider.kind(),
            action = action.name(),
            "Proxying payroll request"
        );

        action.apply(provider.as_ref()).await
    }

    /// Decrypted access token, refreshed first if it is about to expire
    async fn access_token(&self, connection: &PayrollConnection) -> Result<String, PayrollError> {
        if !needs_refresh(connection.token_expires_at, Utc::now()) {
            return Ok(self.cipher.decrypt(&connection.access_token)?);
        }

        let kind = ProviderKind::parse(&connection.provider)?;
        let refresh_token = self.cipher.decrypt(&connection.refresh_token)?;
        let tokens = oauth::refresh_tokens(
            &self.http,
            kind,
            self.clients.get(kind)?,
            &refresh_token,
        )
        .await?;

        let expires_at = expiry_after(Utc::now(), tokens.expires_in).ok_or_else(|| {
            PayrollError::Serde(format!("expires_in out of range: {}", tokens.expires_in))
        })?;
        // Providers may rotate the refresh token or keep the old one
        let next_refresh = tokens.refresh_token.as_deref().unwrap_or(&refresh_token);
        self.store
            .update_tokens(
                connection.id,
                &self.cipher.encrypt(&tokens.access_token)?,
                &self.cipher.encrypt(next_refresh)?,
                expires_at,
            )
            .await?;

        info!(
            organization_id = %connection.organization_id,
            provider = %kind,
            "Refreshed payroll provider access token"
        );

        Ok(tokens.access_token)
    }
}
