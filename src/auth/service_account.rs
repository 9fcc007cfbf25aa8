use async_trait::async_trait;

use crate::auth::credentials::CredentialsFile;
use crate::auth::error::Error;
use crate::auth::oauth::Oauth2Signer;
use crate::auth::{AccessToken, TokenProvider, PUBSUB_SCOPE};

/// Token provider backed by a service account key: every call signs a fresh
/// assertion and exchanges it at the token endpoint.
#[derive(Debug)]
pub struct ServiceAccountTokenProvider {
    signer: Oauth2Signer,
}

impl ServiceAccountTokenProvider {
    /// Uses the Pub/Sub scope.
    pub fn new(cred: &CredentialsFile) -> Result<ServiceAccountTokenProvider, Error> {
        Self::with_scopes(cred, PUBSUB_SCOPE)
    }

    /// `scopes` is a space-delimited scope string.
    pub fn with_scopes(cred: &CredentialsFile, scopes: &str) -> Result<ServiceAccountTokenProvider, Error> {
        Ok(ServiceAccountTokenProvider {
            signer: Oauth2Signer::new(cred, scopes)?,
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<AccessToken, Error> {
        self.signer.access_token().await.ok_or(Error::NoTokenReturned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth::tests::test_credentials;
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Deserialize)]
    struct TokenForm {
        grant_type: String,
        assertion: String,
    }

    async fn spawn_token_endpoint(response: serde_json::Value) -> (String, Arc<Mutex<Vec<(String, String)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_for_handler = seen.clone();
        let app = Router::new().route(
            "/token",
            post(move |Form(form): Form<TokenForm>| {
                let seen = seen_for_handler.clone();
                let response = response.clone();
                async move {
                    seen.lock().unwrap().push((form.grant_type, form.assertion));
                    Json(response)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/token", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (url, seen)
    }

    #[tokio::test]
    async fn test_access_token_exchange() {
        let (url, seen) = spawn_token_endpoint(serde_json::json!({
            "access_token": "exchanged-token",
            "token_type": "Bearer",
            "expires_in": 3600,
        }))
        .await;

        let provider = ServiceAccountTokenProvider::new(&test_credentials(&url)).unwrap();
        let token = provider.access_token().await.unwrap();
        assert_eq!(token.token, "exchanged-token");
        assert_eq!(token.expires_in_seconds, 3600);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "urn:ietf:params:oauth:grant-type:jwt-bearer");
        // three dot-separated segments of a signed JWT
        assert_eq!(seen[0].1.split('.').count(), 3);
    }

    #[tokio::test]
    async fn test_exchange_failure_is_absent_token() {
        // nothing listens on the target port, so the exchange fails
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/token", listener.local_addr().unwrap());
        drop(listener);

        let provider = ServiceAccountTokenProvider::new(&test_credentials(&url)).unwrap();
        let result = provider.access_token().await;
        assert!(matches!(result, Err(Error::NoTokenReturned)));
    }

    #[tokio::test]
    async fn test_rejected_exchange_is_absent_token() {
        use axum::http::StatusCode;
        let app = Router::new().route(
            "/token",
            post(|Form(_): Form<HashMap<String, String>>| async { (StatusCode::FORBIDDEN, "denied") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/token", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let provider = ServiceAccountTokenProvider::new(&test_credentials(&url)).unwrap();
        assert!(matches!(provider.access_token().await, Err(Error::NoTokenReturned)));
    }
}
