use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::{PayrollError, PayrollProvider, ProviderHttp, ProviderKind};

const GUSTO_API_VERSION: &str = "2024-04-01";

/// Gusto REST API, scoped to one company
pub struct GustoProvider {
    http: ProviderHttp,
    api_base: String,
    company_id: String,
    access_token: String,
}

impl GustoProvider {
    pub fn new(http: ProviderHttp, api_base: &str, company_id: String, access_token: String) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            company_id,
            access_token,
        }
    }

    fn company_url(&self, suffix: &str) -> String {
        format!("{}/v1/companies/{}{}", self.api_base, self.company_id, suffix)
    }

    async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, PayrollError> {
        self.http
            .send_json(
                method,
                url,
                &self.access_token,
                &[("x-gusto-api-version", GUSTO_API_VERSION)],
                body,
            )
            .await
    }
}

#[async_trait]
impl PayrollProvider for GustoProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gusto
    }

    async fn get_company(&self) -> Result<Value, PayrollError> {
        self.call(Method::GET, &self.company_url(""), None).await
    }

    async fn get_employees(&self) -> Result<Value, PayrollError> {
        self.call(Method::GET, &self.company_url("/employees"), None)
            .await
    }

    async fn get_payrolls(&self) -> Result<Value, PayrollError> {
        self.call(Method::GET, &self.company_url("/payrolls"), None)
            .await
    }

    async fn create_payroll(&self, payload: Value) -> Result<Value, PayrollError> {
        self.call(Method::POST, &self.company_url("/payrolls"), Some(&payload))
            .await
    }

    async fn submit_payroll(&self, payroll_id: &str) -> Result<Value, PayrollError> {
        let url = self.company_url(&format!("/payrolls/{payroll_id}/submit"));
        self.call(Method::PUT, &url, None).await
    }
}
