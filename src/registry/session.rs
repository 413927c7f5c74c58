//! Authenticated session for registry calls.
//!
//! # Responsibilities
//! - Hand out a bearer token for each registry request
//! - Fetch tokens from an OpenID Connect token endpoint and cache them
//! - Refresh lazily once a cached token is within the refresh margin of expiry
//!
//! # Security Constraints
//! - Client secrets and tokens are never logged or printed by `Debug`

use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

use crate::registry::types::{RegistryError, RegistryResult};

const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// Token endpoint credentials.
#[derive(Clone)]
pub struct TokenEndpoint {
    pub url: Url,
    pub client_id: String,
    pub client_secret: String,
    /// Subject to impersonate via token exchange; plain client credentials when absent.
    pub requested_subject: Option<String>,
    /// Refresh a cached token this long before it expires.
    pub refresh_margin: Duration,
    pub timeout: Duration,
}

impl std::fmt::Debug for TokenEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEndpoint")
            .field("url", &self.url.as_str())
            .field("client_id", &self.client_id)
            .field("requested_subject", &self.requested_subject)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    300
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

enum Source {
    Fixed(String),
    Endpoint {
        endpoint: TokenEndpoint,
        http: reqwest::Client,
        cached: Mutex<Option<CachedToken>>,
    },
}

/// Source of bearer tokens shared by registry clients.
#[derive(Clone)]
pub struct Session {
    source: Arc<Source>,
}

impl Session {
    /// A session that always presents the same token.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: Arc::new(Source::Fixed(token.into())),
        }
    }

    /// A session backed by an OpenID Connect token endpoint.
    pub fn from_endpoint(endpoint: TokenEndpoint) -> RegistryResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .map_err(|e| RegistryError::Unauthorized(format!("failed to build token client: {}", e)))?;

        Ok(Self {
            source: Arc::new(Source::Endpoint {
                endpoint,
                http,
                cached: Mutex::new(None),
            }),
        })
    }

    /// Return a valid bearer token, fetching a new one if needed.
    pub async fn bearer(&self) -> RegistryResult<String> {
        match self.source.as_ref() {
            Source::Fixed(token) => Ok(token.clone()),
            Source::Endpoint { endpoint, http, cached } => {
                // Held across the fetch so concurrent callers share one refresh.
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.access_token.clone());
                    }
                }

                let fresh = fetch_token(http, endpoint).await?;
                let lifetime = Duration::from_secs(fresh.expires_in);
                let refresh_at = Instant::now() + lifetime.saturating_sub(endpoint.refresh_margin);
                tracing::debug!(expires_in = fresh.expires_in, "Obtained registry access token");

                let access_token = fresh.access_token.clone();
                *cached = Some(CachedToken {
                    access_token: fresh.access_token,
                    refresh_at,
                });
                Ok(access_token)
            }
        }
    }

    /// Drop any cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        if let Source::Endpoint { cached, .. } = self.source.as_ref() {
            cached.lock().await.take();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.source.as_ref() {
            Source::Fixed(_) => f.debug_struct("Session").field("kind", &"fixed").finish(),
            Source::Endpoint { endpoint, .. } => f
                .debug_struct("Session")
                .field("kind", &"endpoint")
                .field("endpoint", endpoint)
                .finish(),
        }
    }
}

async fn fetch_token(http: &reqwest::Client, endpoint: &TokenEndpoint) -> RegistryResult<TokenResponse> {
    let mut form: Vec<(&str, &str)> = vec![
        ("client_id", endpoint.client_id.as_str()),
        ("client_secret", endpoint.client_secret.as_str()),
    ];
    match endpoint.requested_subject.as_deref() {
        Some(subject) => {
            form.push(("grant_type", TOKEN_EXCHANGE_GRANT));
            form.push(("requested_subject", subject));
        }
        None => form.push(("grant_type", "client_credentials")),
    }

    let res = http
        .post(endpoint.url.clone())
        .form(&form)
        .send()
        .await
        .map_err(|e| RegistryError::Unauthorized(format!("token request failed: {}", e)))?;

    let status = res.status();
    if !status.is_success() {
        return Err(RegistryError::Unauthorized(format!(
            "token endpoint returned status {}",
            status
        )));
    }

    res.json::<TokenResponse>()
        .await
        .map_err(|e| RegistryError::Unauthorized(format!("invalid token response: {}", e)))
}
