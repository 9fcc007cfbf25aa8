use crate::codec::BoxError;
use crate::http::entity::ErrorResponse;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The broker rejected an acknowledge/modifyAckDeadline call because the
    /// ack id list was empty. Seeing this means an empty batch escaped the
    /// batcher.
    #[error("no ack ids specified")]
    NoAckIds,

    /// The broker returned a well-formed error body that the client has no
    /// special handling for.
    #[error("unexpected error response: code={} status={} message={}", .0.error.code, .0.error.status, .0.error.message)]
    Unknown(ErrorResponse),

    /// The broker returned a non-2xx response whose body is not the standard
    /// error shape.
    #[error("unparseable error body: {0}")]
    UnparseableBody(String),

    /// A publish request failed; carries the HTTP status and raw body.
    #[error("publish request failed: status={0} body={1}")]
    FailedRequest(u16, String),

    /// The publish response did not carry a message id for the record.
    #[error("publish response did not contain a message id")]
    MissingMessageId,

    #[error(transparent)]
    Auth(#[from] crate::auth::Error),

    #[error(transparent)]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message encoding failed: {0}")]
    Encode(#[source] BoxError),

    #[error("message decoding failed: {0}")]
    Decode(#[source] BoxError),
}
