use reqwest::header::IF_MATCH;
use reqwest::{Method, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::sync::Arc;

use super::auth::TokenCredential;
use super::common::{ArmErrorResponse, ListResult, QueryParams};
use super::error::ApiError;
use super::pool::{ConnectionConfig, ConnectionPoolManager, ConnectionStats};
use crate::config::API_VERSION;

/// Azure Resource Manager client scoped to one subscription
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    subscription_id: String,
    credential: Arc<dyn TokenCredential>,
    retry_config: RetryConfig,
    pool_manager: ConnectionPoolManager,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(
        endpoint: &str,
        subscription_id: &str,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, ApiError> {
        Self::with_config(
            endpoint,
            subscription_id,
            credential,
            RetryConfig::default(),
            ConnectionConfig::default(),
        )
    }

    /// Create a new API client with custom retry and connection settings
    pub fn with_config(
        endpoint: &str,
        subscription_id: &str,
        credential: Arc<dyn TokenCredential>,
        retry_config: RetryConfig,
        connection_config: ConnectionConfig,
    ) -> Result<Self, ApiError> {
        let parsed = url::Url::parse(endpoint)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                endpoint
            )));
        }

        let pool_config = ConnectionConfig {
            request_timeout: std::time::Duration::from_secs(retry_config.timeout_seconds),
            ..connection_config
        };
        let pool_manager = ConnectionPoolManager::new(pool_config);
        let http_client = pool_manager.build_client()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: endpoint.trim_end_matches('/').to_string(),
                subscription_id: subscription_id.to_string(),
                credential,
                retry_config,
                pool_manager,
            }),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.inner.subscription_id
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Shared HTTP client, reused for token requests.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.inner.http_client
    }

    fn url(&self, path: &str, params: &QueryParams) -> String {
        let mut url = format!(
            "{}{}?api-version={}",
            self.inner.base_url, path, API_VERSION
        );
        if !params.is_empty() {
            url.push('&');
            url.push_str(&params.encode());
        }
        url
    }

    /// Execute a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_with_params(path, &QueryParams::new()).await
    }

    /// Execute a GET request with query parameters
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
    ) -> Result<T, ApiError> {
        let url = self.url(path, params);
        self.send::<T, ()>(Method::GET, url, None, None, path).await
    }

    /// GET every page of a collection, following `nextLink`
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut next = Some(self.url(path, params));

        while let Some(url) = next.take() {
            let page: ListResult<T> = self.send::<_, ()>(Method::GET, url, None, None, path).await?;
            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(items)
    }

    /// Execute a PUT request
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &QueryParams::new());
        self.send(Method::PUT, url, Some(body), None, path).await
    }

    /// Execute a PUT request guarded by `If-Match`
    pub async fn put_with_if_match<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        if_match: &str,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &QueryParams::new());
        self.send(Method::PUT, url, Some(body), Some(if_match), path)
            .await
    }

    /// Execute a PUT request with query parameters
    pub async fn put_with_params<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        params: &QueryParams,
    ) -> Result<T, ApiError> {
        let url = self.url(path, params);
        self.send(Method::PUT, url, Some(body), None, path).await
    }

    /// Execute a PATCH request
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &QueryParams::new());
        self.send(Method::PATCH, url, Some(body), None, path).await
    }

    /// Execute a PATCH request guarded by `If-Match`
    pub async fn patch_with_if_match<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        if_match: &str,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &QueryParams::new());
        self.send(Method::PATCH, url, Some(body), Some(if_match), path)
            .await
    }

    /// Execute a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &QueryParams::new());
        self.send(Method::POST, url, Some(body), None, path).await
    }

    /// Execute a POST action without a body, such as `listSecrets`
    pub async fn post_action<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path, &QueryParams::new());
        self.send::<T, ()>(Method::POST, url, None, None, path).await
    }

    /// Execute a DELETE request
    pub async fn delete(&self, path: &str, params: &QueryParams) -> Result<(), ApiError> {
        let url = self.url(path, params);
        self.send::<IgnoredAny, ()>(Method::DELETE, url, None, None, path)
            .await
            .map(|_| ())
    }

    /// Execute a DELETE request guarded by `If-Match`
    pub async fn delete_with_if_match(
        &self,
        path: &str,
        params: &QueryParams,
        if_match: &str,
    ) -> Result<(), ApiError> {
        let url = self.url(path, params);
        self.send::<IgnoredAny, ()>(Method::DELETE, url, None, Some(if_match), path)
            .await
            .map(|_| ())
    }

    /// Get connection pool statistics
    pub async fn get_connection_stats(&self) -> ConnectionStats {
        self.inner.pool_manager.get_stats().await
    }

    pub fn services(&self) -> super::service::ServiceApi<'_> {
        super::service::ServiceApi::new(self)
    }

    pub fn deleted_services(&self) -> super::deleted_services::DeletedServicesApi<'_> {
        super::deleted_services::DeletedServicesApi::new(self)
    }

    pub fn portal_settings(&self) -> super::portal_settings::PortalSettingsApi<'_> {
        super::portal_settings::PortalSettingsApi::new(self)
    }

    pub fn apis(&self) -> super::apis::ApisApi<'_> {
        super::apis::ApisApi::new(self)
    }

    pub fn api_diagnostics(&self) -> super::api_diagnostics::ApiDiagnosticsApi<'_> {
        super::api_diagnostics::ApiDiagnosticsApi::new(self)
    }

    pub fn backends(&self) -> super::backends::BackendsApi<'_> {
        super::backends::BackendsApi::new(self)
    }

    pub fn loggers(&self) -> super::loggers::LoggersApi<'_> {
        super::loggers::LoggersApi::new(self)
    }

    pub fn identity_providers(&self) -> super::identity_providers::IdentityProvidersApi<'_> {
        super::identity_providers::IdentityProvidersApi::new(self)
    }

    pub fn named_values(&self) -> super::named_values::NamedValuesApi<'_> {
        super::named_values::NamedValuesApi::new(self)
    }

    pub fn workspaces(&self) -> super::workspaces::WorkspacesApi<'_> {
        super::workspaces::WorkspacesApi::new(self)
    }

    pub fn subscriptions(&self) -> super::subscriptions::SubscriptionsApi<'_> {
        super::subscriptions::SubscriptionsApi::new(self)
    }

    pub fn products(&self) -> super::products::ProductsApi<'_> {
        super::products::ProductsApi::new(self)
    }

    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: String,
        body: Option<&B>,
        if_match: Option<&str>,
        path: &str,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(
            || {
                tracing::debug!("{} request to: {}", method, url);

                let mut request = self.inner.http_client.request(method.clone(), &url);
                if let Some(body) = body {
                    request = request.json(body);
                }
                if let Some(etag) = if_match {
                    request = request.header(IF_MATCH, etag);
                }
                request
            },
            path,
        )
        .await
    }

    /// Execute request with retry logic
    async fn execute_with_retry<F, T>(&self, build_request: F, path: &str) -> Result<T, ApiError>
    where
        F: Fn() -> RequestBuilder,
        T: DeserializeOwned,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    self.inner.retry_config.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                    self.inner.retry_config.max_backoff_ms,
                );
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(backoff)).await;
            }

            let token = self.inner.credential.token().await?;

            match build_request().bearer_auth(&token.token).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        self.inner.pool_manager.record_request(true).await;
                        return self.parse_success_response(response).await;
                    }

                    self.inner.pool_manager.record_request(false).await;

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        let err = self.error_from_response(response).await;
                        return Err(ApiError::AuthError(err.to_string()));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() {
                        last_error = Some(self.error_from_response(response).await);
                    } else {
                        return Err(self.error_from_response(response).await);
                    }
                }
                Err(e) => {
                    self.inner.pool_manager.record_request(false).await;

                    if e.is_timeout() {
                        last_error =
                            Some(ApiError::Timeout(self.inner.retry_config.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response; an empty body reads as JSON `null`
    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        let body = if text.trim().is_empty() {
            "null"
        } else {
            text.as_str()
        };

        serde_json::from_str::<T>(body).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    async fn error_from_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match serde_json::from_str::<ArmErrorResponse>(&text) {
            Ok(envelope) => ApiError::Api {
                status: status.as_u16(),
                message: envelope.error.full_message(),
                code: envelope.error.code,
            },
            Err(_) => ApiError::Api {
                status: status.as_u16(),
                code: status
                    .canonical_reason()
                    .unwrap_or("Unknown")
                    .replace(' ', ""),
                message: text,
            },
        }
    }
}
