//! GitHub-compatible follow graph client
//!
//! The follow endpoints answer with bare status codes rather than bodies:
//! `204` means the edge exists (or the mutation was applied), `404` means it
//! does not (or the target is unknown). Both are successes; only `401` and
//! other statuses become errors.

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{GraphProfile, SocialGraphClient};
use crate::member::Credential;
use crate::types::{ExchangeError, Result};

/// Configuration for the graph client
#[derive(Debug, Clone)]
pub struct GraphClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Default for GraphClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            user_agent: "mutuals".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// REST client for the follow graph
pub struct GithubGraphClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
    avatar_url: Option<String>,
}

impl GithubGraphClient {
    pub fn new(config: GraphClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ExchangeError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn following_url(&self, target: &str) -> String {
        format!(
            "{}/user/following/{}",
            self.base_url,
            urlencoding::encode(target)
        )
    }

    fn auth_header(actor: &Credential) -> String {
        format!("token {}", actor.expose())
    }

    /// Issue a follow-endpoint request and normalize the status code
    async fn edge_request(&self, method: Method, actor: &Credential, target: &str) -> Result<bool> {
        let url = self.following_url(target);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(header::AUTHORIZATION, Self::auth_header(actor));
        if method == Method::PUT {
            // PUT without a body must still declare a zero length
            request = request.header(header::CONTENT_LENGTH, "0");
        }

        let response = request.send().await?;

        let status = response.status();
        debug!(method = %method, target = %target, status = %status, "Graph edge request");

        match status {
            StatusCode::NO_CONTENT => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::UNAUTHORIZED => Err(ExchangeError::CredentialInvalid(format!(
                "{} {} rejected the credential",
                method, url
            ))),
            other => Err(ExchangeError::ExternalCallFailed(format!(
                "{} {} returned HTTP {}",
                method, url, other
            ))),
        }
    }
}

#[async_trait]
impl SocialGraphClient for GithubGraphClient {
    async fn is_following(&self, actor: &Credential, target: &str) -> Result<bool> {
        self.edge_request(Method::GET, actor, target).await
    }

    async fn follow(&self, actor: &Credential, target: &str) -> Result<bool> {
        self.edge_request(Method::PUT, actor, target).await
    }

    async fn unfollow(&self, actor: &Credential, target: &str) -> Result<bool> {
        self.edge_request(Method::DELETE, actor, target).await
    }

    async fn whoami(&self, actor: &Credential) -> Result<GraphProfile> {
        let url = format!("{}/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, Self::auth_header(actor))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let user: UserResponse = response.json().await.map_err(|e| {
                    ExchangeError::ExternalCallFailed(format!("Invalid user payload: {}", e))
                })?;
                Ok(GraphProfile {
                    identity: user.login,
                    avatar_url: user.avatar_url,
                })
            }
            StatusCode::UNAUTHORIZED => Err(ExchangeError::CredentialInvalid(
                "GET /user rejected the credential".to_string(),
            )),
            other => Err(ExchangeError::ExternalCallFailed(format!(
                "GET {} returned HTTP {}",
                url, other
            ))),
        }
    }

    async fn profile_visible(&self, identity: &str) -> Result<bool> {
        // Sent without credentials: an account always sees its own hidden profile
        let url = format!("{}/users/{}", self.base_url, urlencoding::encode(identity));
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        debug!(identity = %identity, status = %status, "Public profile lookup");

        match status {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(ExchangeError::ExternalCallFailed(format!(
                "GET {} returned HTTP {}",
                url, other
            ))),
        }
    }
}
