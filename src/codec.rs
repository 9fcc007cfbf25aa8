/// Error type produced by caller-supplied codecs.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Turns an outbound record payload into bytes before it is base64-wrapped
/// onto the wire. A failed encode aborts the publish batch it belongs to.
pub trait MessageEncoder<A>: Send + Sync {
    fn encode(&self, value: &A) -> Result<Vec<u8>, BoxError>;
}

/// Turns the decoded `data` bytes of a received message into a payload.
pub trait MessageDecoder<A>: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<A, BoxError>;
}

/// Passthrough codec for raw byte payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl MessageEncoder<Vec<u8>> for RawCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, BoxError> {
        Ok(value.clone())
    }
}

impl MessageDecoder<Vec<u8>> for RawCodec {
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, BoxError> {
        Ok(data.to_vec())
    }
}
