//! OAuth refresh-token grants for each provider.

use secrecy::ExposeSecret;
use serde::Deserialize;

use super::{PayrollError, ProviderHttp, ProviderKind};
use crate::services::config::OAuthClientConfig;

const QUICKBOOKS_TOKEN_URL: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent when the provider keeps the existing refresh token
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

pub fn token_url(kind: ProviderKind, client: &OAuthClientConfig) -> String {
    match kind {
        ProviderKind::Gusto => format!("{}/oauth/token", client.api_base),
        ProviderKind::QuickBooks => QUICKBOOKS_TOKEN_URL.to_string(),
    }
}

pub async fn refresh_tokens(
    http: &ProviderHttp,
    kind: ProviderKind,
    client: &OAuthClientConfig,
    refresh_token: &str,
) -> Result<TokenResponse, PayrollError> {
    let url = token_url(kind, client);
    let secret = client.client_secret.expose_secret();

    match kind {
        // Gusto takes the client credentials in the form body
        ProviderKind::Gusto => {
            http.post_form(
                &url,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", client.client_id.as_str()),
                    ("client_secret", secret),
                ],
                None,
            )
            .await
        }
        // Intuit expects them as HTTP basic auth
        ProviderKind::QuickBooks => {
            http.post_form(
                &url,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                ],
                Some((client.client_id.as_str(), secret)),
            )
            .await
        }
    }
}
