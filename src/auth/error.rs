#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GOOGLE_APPLICATION_CREDENTIALS or default credentials is required: {0}")]
    CredentialsIO(#[from] std::io::Error),

    #[error("no credentials file found")]
    NoCredentialsFileFound,

    #[error("private key is required")]
    NoPrivateKeyFound,

    #[error("oauth token exchange returned no token")]
    NoTokenReturned,

    #[error("unexpected token response: status={0} body={1}")]
    UnexpectedTokenResponse(u16, String),
}
