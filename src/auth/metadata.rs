use async_trait::async_trait;

use crate::auth::error::Error;
use crate::auth::{default_http_client, AccessToken, TokenProvider};

pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
pub const METADATA_GOOGLE_HOST: &str = "metadata.google.internal";
pub const METADATA_FLAVOR_KEY: &str = "Metadata-Flavor";
pub const METADATA_GOOGLE: &str = "Google";

/// Token provider for workloads on GCE: tokens for the default service
/// account come from the local instance metadata endpoint.
#[derive(Debug)]
pub struct InstanceMetadataTokenProvider {
    token_url: String,
    client: reqwest::Client,
}

impl Default for InstanceMetadataTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceMetadataTokenProvider {
    pub fn new() -> InstanceMetadataTokenProvider {
        let host = match std::env::var(METADATA_HOST_ENV) {
            Ok(s) => s,
            Err(_e) => METADATA_GOOGLE_HOST.to_string(),
        };
        InstanceMetadataTokenProvider {
            token_url: format!("http://{host}/computeMetadata/v1/instance/service-accounts/default/token"),
            client: default_http_client(),
        }
    }
}

#[async_trait]
impl TokenProvider for InstanceMetadataTokenProvider {
    async fn access_token(&self) -> Result<AccessToken, Error> {
        let response = self
            .client
            .get(self.token_url.as_str())
            .header(METADATA_FLAVOR_KEY, METADATA_GOOGLE)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UnexpectedTokenResponse(status, body));
        }
        Ok(response.json::<AccessToken>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};

    #[tokio::test]
    #[serial_test::serial]
    async fn test_metadata_token() {
        let app = Router::new().route(
            "/computeMetadata/v1/instance/service-accounts/default/token",
            get(|headers: HeaderMap| async move {
                assert_eq!(headers.get(METADATA_FLAVOR_KEY).unwrap(), METADATA_GOOGLE);
                Json(serde_json::json!({
                    "access_token": "metadata-token",
                    "token_type": "Bearer",
                    "expires_in": 1800,
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let token = temp_env::async_with_vars([(METADATA_HOST_ENV, Some(host))], async {
            InstanceMetadataTokenProvider::new().access_token().await
        })
        .await
        .unwrap();
        assert_eq!(token.token, "metadata-token");
        assert_eq!(token.expires_in_seconds, 1800);
    }
}
