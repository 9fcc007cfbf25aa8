use std::sync::Arc;
use std::time::Duration;

use crate::auth::AccessToken;

const DEFAULT_HOST: &str = "pubsub.googleapis.com";
const DEFAULT_PORT: u16 = 443;

/// OAuth token cache behavior shared by the producer and the consumer.
#[derive(Clone)]
pub struct TokenConfig {
    /// Fixed-rate cadence of the background token refresh.
    pub refresh_interval: Duration,
    /// First delay after a failed refresh.
    pub failure_retry_delay: Duration,
    /// Produces each following retry delay from the previous one.
    pub failure_retry_next_delay: Arc<dyn Fn(Duration) -> Duration + Send + Sync>,
    /// Retries per refresh round before the failure is swallowed until the
    /// next round.
    pub failure_retry_max_attempts: usize,
    pub on_refresh_success: Option<Arc<dyn Fn(&AccessToken) + Send + Sync>>,
    pub on_refresh_error: Option<Arc<dyn Fn(&crate::auth::Error) + Send + Sync>>,
    pub on_retries_exhausted: Option<Arc<dyn Fn(&crate::auth::Error) + Send + Sync>>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30 * 60),
            failure_retry_delay: Duration::from_secs(1),
            failure_retry_next_delay: Arc::new(|delay| delay * 2),
            failure_retry_max_attempts: 3,
            on_refresh_success: None,
            on_refresh_error: None,
            on_retries_exhausted: None,
        }
    }
}

/// Options recognized by [`crate::subscriber::Subscriber`].
#[derive(Clone)]
pub struct ConsumerConfig {
    pub host: String,
    pub port: u16,
    /// Skips token acquisition entirely; requests carry no Authorization
    /// header.
    pub is_emulator: bool,
    /// `maxMessages` sent on every pull.
    pub read_max_messages: i32,
    /// `returnImmediately` sent on every pull.
    pub read_return_immediately: bool,
    /// Number of concurrent pull loops. Above 1, ordering across pulls is
    /// unspecified.
    pub read_concurrency: usize,
    /// An ack/nack batch closes at this many ids..
    pub acknowledge_batch_size: usize,
    /// ..or this long after its first id, whichever comes first.
    pub acknowledge_batch_latency: Duration,
    pub token: TokenConfig,
    /// Invoked when a fatal pull failure terminates the stream.
    pub on_failed_terminate: Option<Arc<dyn Fn(&crate::error::Error) + Send + Sync>>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            is_emulator: false,
            read_max_messages: 1000,
            read_return_immediately: false,
            read_concurrency: 1,
            acknowledge_batch_size: 100,
            acknowledge_batch_latency: Duration::from_millis(100),
            token: TokenConfig::default(),
            on_failed_terminate: None,
        }
    }
}

impl ConsumerConfig {
    /// Plain-HTTP unauthenticated configuration for a local emulator.
    pub fn emulator(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            is_emulator: true,
            ..Self::default()
        }
    }
}

/// Options recognized by [`crate::publisher::Publisher`].
#[derive(Clone)]
pub struct ProducerConfig {
    pub host: String,
    pub port: u16,
    pub is_emulator: bool,
    pub token: TokenConfig,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            is_emulator: false,
            token: TokenConfig::default(),
        }
    }
}

impl ProducerConfig {
    pub fn emulator(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            is_emulator: true,
            ..Self::default()
        }
    }
}
