use crate::{
    account::Account,
    client::graphql::{GraphQlRequest, GraphQlResponse, StreamAnalyticsData},
    client::AnalyticsApi,
    error::{ExporterError, Result},
    window::{AnalyticsWindow, Sample},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.cloudflare.com/client/v4/graphql/";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ACCOUNTS_PER_PAGE: u32 = 50;

#[derive(Debug, Clone)]
pub struct CloudflareClientConfig {
    pub api_token: Option<String>,
    pub api_base_url: String,
    pub graphql_endpoint: String,
    pub request_timeout: Duration,
    pub accounts_per_page: u32,
}

impl Default for CloudflareClientConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            graphql_endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            accounts_per_page: DEFAULT_ACCOUNTS_PER_PAGE,
        }
    }
}

/// Cloudflare REST + GraphQL implementation of [`AnalyticsApi`].
pub struct CloudflareClient {
    config: CloudflareClientConfig,
    http: reqwest::Client,
}

impl CloudflareClient {
    pub fn new(config: CloudflareClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("cfstream-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, http })
    }

    fn token(&self) -> Result<&str> {
        match self.config.api_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(ExporterError::Authentication(
                "no Cloudflare API token configured".to_string(),
            )),
        }
    }

    async fn fetch_accounts_page(&self, token: &str, page: u32) -> Result<ApiEnvelope<Vec<Account>>> {
        let url = format!("{}/accounts", self.config.api_base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("page", page), ("per_page", self.config.accounts_per_page)])
            .send()
            .await?;

        let status = response.status();
        let envelope: ApiEnvelope<Vec<Account>> = match response.json().await {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ExporterError::Remote(format!(
                    "account listing failed with status {}",
                    status
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if !status.is_success() || !envelope.success {
            return Err(ExporterError::Remote(format!(
                "account listing failed with status {}: {}",
                status,
                envelope.error_summary()
            )));
        }

        Ok(envelope)
    }
}

#[async_trait]
impl AnalyticsApi for CloudflareClient {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let token = self.token()?;
        let mut accounts = Vec::new();
        let mut page = 1;

        loop {
            let envelope = self.fetch_accounts_page(token, page).await?;
            let batch = envelope.result.unwrap_or_default();
            let total_pages = envelope.result_info.map(|info| info.total_pages).unwrap_or(1);

            debug!("Fetched account page {}/{} ({} accounts)", page, total_pages, batch.len());

            let exhausted = batch.is_empty();
            accounts.extend(batch);

            if exhausted || page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(accounts)
    }

    async fn fetch_window(
        &self,
        account_id: &str,
        window: &AnalyticsWindow,
    ) -> Result<Vec<Sample>> {
        let token = self.token()?;
        let request = GraphQlRequest::stream_minutes_viewed(account_id, window);

        let response = self
            .http
            .post(&self.config.graphql_endpoint)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExporterError::Remote(format!(
                "analytics query for account {} failed with status {}",
                account_id, status
            )));
        }

        let body: GraphQlResponse<StreamAnalyticsData> = response.json().await?;
        if body.has_errors() {
            return Err(ExporterError::Remote(format!(
                "analytics query for account {} failed: {}",
                account_id,
                body.error_summary()
            )));
        }

        let data = body.data.ok_or_else(|| {
            ExporterError::Remote(format!(
                "analytics query for account {} returned no data",
                account_id
            ))
        })?;

        Ok(data.into_samples())
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default = "first_page")]
    total_pages: u32,
}

fn first_page() -> u32 {
    1
}

impl<T> ApiEnvelope<T> {
    fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "no error details".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("[{}] {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
