use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::TransportError;

/// Query parameters for GET endpoints, already stripped of unset values.
pub type QueryParams = Vec<(String, String)>;

/// The HTTP capability the tools are written against.
///
/// Endpoints are relative (`search/spending_by_award/`) and resolve against
/// the implementation's base URL.
#[async_trait]
pub trait SpendingApi: Send + Sync {
    async fn get(&self, endpoint: &str, params: &QueryParams) -> Result<Value, TransportError>;

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, TransportError>;
}

/// `reqwest`-backed [`SpendingApi`] for the public USAspending API.
#[derive(Debug, Clone)]
pub struct UsaSpendingClient {
    client: Client,
    config: ClientConfig,
}

impl UsaSpendingClient {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/{}", endpoint.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: &'static str,
        url: String,
        request: RequestBuilder,
    ) -> Result<Value, TransportError> {
        tracing::debug!(method, %url, "sending request");

        let response = request.send().await.map_err(|err| {
            tracing::warn!(method, %url, error = %err, "request did not complete");
            TransportError::Network(err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                method,
                %url,
                status = status.as_u16(),
                "upstream returned error status"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))
    }
}

#[async_trait]
impl SpendingApi for UsaSpendingClient {
    async fn get(&self, endpoint: &str, params: &QueryParams) -> Result<Value, TransportError> {
        let url = self.endpoint_url(endpoint);
        let mut request = self.client.get(&url);
        if !params.is_empty() {
            request = request.query(params);
        }
        self.send("GET", url, request).await
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, TransportError> {
        let url = self.endpoint_url(endpoint);
        let request = self.client.post(&url).json(body);
        self.send("POST", url, request).await
    }
}
