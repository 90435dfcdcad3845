//! Shared HTTP plumbing for payroll provider calls.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use super::PayrollError;

#[derive(Debug, Clone)]
pub struct ProviderHttp {
    http: Client,
}

impl ProviderHttp {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Result<Self, PayrollError> {
        // Already installed by the server at startup; tests reach here first.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("salon-insights/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PayrollError::Transport(e.to_string()))?;
        Ok(Self { http })
    }

    /// Bearer-authenticated JSON call. Transient failures of idempotent
    /// methods are retried; POSTs are sent once.
    pub async fn send_json(
        &self,
        method: Method,
        url: &str,
        access_token: &str,
        headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, PayrollError> {
        let idempotent = method != Method::POST;

        (|| {
            let method = method.clone();
            async move {
                let mut request = self
                    .http
                    .request(method, url)
                    .bearer_auth(access_token)
                    .header("accept", "application/json");
                for (name, value) in headers {
                    request = request.header(*name, *value);
                }
                if let Some(body) = body {
                    request = request.json(body);
                }
                send(request).await
            }
        })
        .retry(
            &ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(10))
                .with_max_times(3)
                .with_jitter(),
        )
        .when(|e: &PayrollError| idempotent && e.should_retry())
        .notify(|e, dur| {
            warn!(
                "Payroll provider call failed, retrying after {:.2}s: {}",
                dur.as_secs_f64(),
                e
            )
        })
        .await
    }

    /// OAuth token endpoint call (form encoded, optional basic auth)
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
        basic_auth: Option<(&str, &str)>,
    ) -> Result<T, PayrollError> {
        let mut request = self
            .http
            .post(url)
            .header("accept", "application/json")
            .form(form);
        if let Some((user, password)) = basic_auth {
            request = request.basic_auth(user, Some(password));
        }

        let value = send(request).await?;
        serde_json::from_value(value).map_err(|e| PayrollError::Serde(e.to_string()))
    }
}

async fn send(request: RequestBuilder) -> Result<Value, PayrollError> {
    let res = request.send().await.map_err(map_reqwest_error)?;

    match res.status() {
        s if s.is_success() => {
            let text = res.text().await.map_err(map_reqwest_error)?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| PayrollError::Serde(e.to_string()))
        }
        StatusCode::UNAUTHORIZED => Err(PayrollError::Unauthorized),
        StatusCode::TOO_MANY_REQUESTS => Err(PayrollError::RateLimited),
        s => {
            let status = s.as_u16();
            let body = res.text().await.unwrap_or_default();
            Err(PayrollError::Http { status, body })
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> PayrollError {
    if e.is_timeout() {
        PayrollError::Timeout
    } else {
        PayrollError::Transport(e.to_string())
    }
}
