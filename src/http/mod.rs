pub mod entity;
pub mod publisher_client;
pub mod subscriber_client;

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;

use crate::auth::TokenProvider;
use crate::error::Error;
use crate::http::entity::ErrorResponse;

pub(crate) const NO_ACK_IDS_MESSAGE: &str = "No ack ids specified.";

/// `{scheme}://{host}:{port}`, HTTPS iff the port is 443. Any other port is
/// plain HTTP so a local emulator works without TLS.
pub(crate) fn base_url(host: &str, port: u16) -> String {
    let scheme = if port == 443 { "https" } else { "http" };
    format!("{scheme}://{host}:{port}")
}

/// Attaches the bearer credential to outgoing requests, or nothing at all
/// against the emulator.
#[derive(Clone)]
pub enum Authorizer {
    Bearer(Arc<dyn TokenProvider>),
    NoAuth,
}

impl Authorizer {
    /// The bearer variant sets exactly one `Authorization: Bearer <token>`
    /// header, replacing any present value.
    pub async fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, crate::auth::Error> {
        match self {
            Authorizer::Bearer(provider) => {
                let token = provider.access_token().await?;
                let bearer = format!("Bearer {}", token.token);
                match HeaderValue::from_str(&bearer) {
                    Ok(value) => {
                        // RequestBuilder::headers replaces per key, so exactly
                        // one Authorization header goes out
                        let mut headers = HeaderMap::new();
                        headers.insert(AUTHORIZATION, value);
                        Ok(builder.headers(headers))
                    }
                    // a malformed token value surfaces as the send() error
                    Err(_) => Ok(builder.header(AUTHORIZATION, bearer)),
                }
            }
            Authorizer::NoAuth => Ok(builder),
        }
    }
}

/// Classifies a non-2xx subscriber response body.
pub(crate) async fn classify_error(response: reqwest::Response) -> Error {
    let body = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => return Error::HttpClient(err),
    };
    match serde_json::from_slice::<ErrorResponse>(&body) {
        Ok(parsed) if parsed.error.message == NO_ACK_IDS_MESSAGE => Error::NoAckIds,
        Ok(parsed) => Error::Unknown(parsed),
        Err(_) => Error::UnparseableBody(String::from_utf8_lossy(&body).into_owned()),
    }
}
