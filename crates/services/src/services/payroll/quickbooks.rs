use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use url::Url;

use super::{PayrollError, PayrollProvider, ProviderHttp, ProviderKind};

const MINOR_VERSION: &str = "73";

/// QuickBooks Online accounting API. Company and employee data are available;
/// payroll runs are not exposed through this API.
pub struct QuickBooksProvider {
    http: ProviderHttp,
    api_base: String,
    realm_id: String,
    access_token: String,
}

impl QuickBooksProvider {
    pub fn new(http: ProviderHttp, api_base: &str, realm_id: String, access_token: String) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            realm_id,
            access_token,
        }
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<String, PayrollError> {
        let base = format!("{}/v3/company/{}{}", self.api_base, self.realm_id, path);
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("minorversion", MINOR_VERSION));
        Url::parse_with_params(&base, &query)
            .map(String::from)
            .map_err(|e| PayrollError::InvalidRequest(format!("bad QuickBooks url: {e}")))
    }

    async fn get(&self, url: &str) -> Result<Value, PayrollError> {
        self.http
            .send_json(Method::GET, url, &self.access_token, &[], None)
            .await
    }

    fn unsupported(operation: &'static str) -> PayrollError {
        PayrollError::Unsupported {
            provider: ProviderKind::QuickBooks,
            operation,
        }
    }
}

#[async_trait]
impl PayrollProvider for QuickBooksProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::QuickBooks
    }

    async fn get_company(&self) -> Result<Value, PayrollError> {
        let url = self.url(&format!("/companyinfo/{}", self.realm_id), &[])?;
        self.get(&url).await
    }

    async fn get_employees(&self) -> Result<Value, PayrollError> {
        let url = self.url("/query", &[("query", "select * from Employee")])?;
        self.get(&url).await
    }

    async fn get_payrolls(&self) -> Result<Value, PayrollError> {
        Err(Self::unsupported("getPayrolls"))
    }

    async fn create_payroll(&self, _payload: Value) -> Result<Value, PayrollError> {
        Err(Self::unsupported("createPayroll"))
    }

    async fn submit_payroll(&self, _payroll_id: &str) -> Result<Value, PayrollError> {
        Err(Self::unsupported("submitPayroll"))
    }
}
