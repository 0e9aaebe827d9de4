//! Bearer tokens for Azure Resource Manager
//!
//! [`ClientSecretCredential`] runs the OAuth2 client-credentials flow against
//! the Microsoft identity platform and caches the token until it is close to
//! expiry. [`StaticTokenCredential`] serves a token obtained elsewhere.

use super::error::ApiError;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Tokens this close to expiry are refreshed before use.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: Instant::now() + expires_in,
        }
    }

    pub fn expires_within(&self, margin: Duration) -> bool {
        Instant::now() + margin >= self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn token(&self) -> Result<AccessToken, ApiError>;
}

pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn token(&self) -> Result<AccessToken, ApiError> {
        // static tokens are managed by whoever issued them
        Ok(AccessToken::new(
            self.token.clone(),
            Duration::from_secs(24 * 60 * 60),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct ClientSecretCredential {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cache: RwLock<Option<AccessToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        http_client: reqwest::Client,
        authority_host: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        resource_manager_endpoint: &str,
    ) -> Self {
        Self {
            http_client,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                authority_host.trim_end_matches('/'),
                tenant_id
            ),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: format!("{}/.default", resource_manager_endpoint.trim_end_matches('/')),
            cache: RwLock::new(None),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn request_token(&self) -> Result<AccessToken, ApiError> {
        tracing::debug!("Requesting access token from {}", self.token_url);

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<TokenErrorResponse>(&text) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => text,
            };
            return Err(ApiError::AuthError(format!(
                "token request returned HTTP {}: {}",
                status.as_u16(),
                reason
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::ParseError(format!("token response: {}", e)))?;

        Ok(AccessToken::new(
            parsed.access_token,
            Duration::from_secs(parsed.expires_in),
        ))
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn token(&self) -> Result<AccessToken, ApiError> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if !cached.expires_within(REFRESH_MARGIN) {
                return Ok(cached.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // another task may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref() {
            if !cached.expires_within(REFRESH_MARGIN) {
                return Ok(cached.clone());
            }
        }

        let token = self.request_token().await?;
        *cache = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn credential(server_url: &str) -> ClientSecretCredential {
        ClientSecretCredential::new(
            reqwest::Client::new(),
            server_url,
            "tenant-1",
            "client-1",
            "s3cret",
            "https://management.azure.com/",
        )
    }

    #[test]
    fn token_url_and_scope_are_derived() {
        let cred = credential("https://login.microsoftonline.com/");
        assert_eq!(
            cred.token_url(),
            "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/token"
        );
        assert_eq!(cred.scope, "https://management.azure.com/.default");
    }

    #[test]
    fn debug_redacts_token() {
        let token = AccessToken::new("very-secret", Duration::from_secs(60));
        assert!(!format!("{:?}", token).contains("very-secret"));
    }

    #[tokio::test]
    async fn fetches_and_caches_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "client-1".into()),
                Matcher::UrlEncoded(
                    "scope".into(),
                    "https://management.azure.com/.default".into(),
                ),
            ]))
            .with_status(200)
            .with_body(r#"{"token_type":"Bearer","expires_in":3599,"access_token":"tok-1"}"#)
            .expect(1)
            .create_async()
            .await;

        let cred = credential(&server.url());
        assert_eq!(cred.token().await.unwrap().token, "tok-1");
        assert_eq!(cred.token().await.unwrap().token, "tok-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn refreshes_token_close_to_expiry() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"expires_in":10,"access_token":"short-lived"}"#)
            .expect(2)
            .create_async()
            .await;

        let cred = credential(&server.url());
        cred.token().await.unwrap();
        cred.token().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn token_errors_are_auth_errors() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client","error_description":"bad secret"}"#)
            .create_async()
            .await;

        let err = credential(&server.url()).token().await.unwrap_err();
        match err {
            ApiError::AuthError(msg) => assert!(msg.contains("invalid_client: bad secret")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn static_credential_returns_token() {
        let cred = StaticTokenCredential::new("abc");
        let token = cred.token().await.unwrap();
        assert_eq!(token.token, "abc");
        assert!(!token.expires_within(REFRESH_MARGIN));
    }
}
