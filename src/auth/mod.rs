pub mod cached;
pub mod credentials;
mod error;
pub mod metadata;
pub mod oauth;
pub mod service_account;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TokenConfig;
pub use error::Error;

/// OAuth2 token endpoint used both as JWT audience and exchange target.
pub const TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";

/// Scope granting access to the Pub/Sub API.
pub const PUBSUB_SCOPE: &str = "https://www.googleapis.com/auth/pubsub";

/// Bearer credential with its validity window, counted from issuance.
/// The token value is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "access_token")]
    pub token: String,
    #[serde(rename = "expires_in")]
    pub expires_in_seconds: i64,
}

/// Source of bearer tokens for outgoing requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, Error>;
}

pub(crate) fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .unwrap()
}

/// Builds the provider the producer/consumer constructors use: service
/// account credentials when resolvable, the instance metadata endpoint
/// otherwise, always wrapped in a self-refreshing cache driven by
/// `config.refresh_interval`.
pub async fn default_token_provider(config: &TokenConfig) -> Result<Arc<dyn TokenProvider>, Error> {
    let inner: Arc<dyn TokenProvider> = match credentials::CredentialsFile::new().await {
        Ok(cred) => Arc::new(service_account::ServiceAccountTokenProvider::new(&cred)?),
        Err(_) => Arc::new(metadata::InstanceMetadataTokenProvider::new()),
    };
    let cached = cached::CachedTokenProvider::with_interval(inner, config.refresh_interval, config).await?;
    Ok(Arc::new(cached))
}
