use std::cmp::max;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::error::Error;
use crate::auth::{AccessToken, TokenProvider};
use crate::config::TokenConfig;
use crate::refresh::{RefreshConfig, Refreshable};

/// Wraps another provider behind a [`Refreshable`] cell: `access_token`
/// returns the last cached token without touching the network, while a
/// background task keeps the cache fresh.
pub struct CachedTokenProvider {
    refreshable: Refreshable<AccessToken>,
}

impl CachedTokenProvider {
    /// Refreshes on a wall-clock cadence. The initial token is fetched
    /// before this returns; a failure there fails the construction.
    pub async fn with_interval(
        inner: Arc<dyn TokenProvider>,
        interval: Duration,
        config: &TokenConfig,
    ) -> Result<CachedTokenProvider, Error> {
        Self::start(inner, RefreshConfig::fixed_rate(interval), config).await
    }

    /// Refreshes when the cached token approaches expiry: after each
    /// successful refresh the next attempt is scheduled at
    /// `max(retry_delay, expires_in - safety_period)`. A token already
    /// within the safety period of expiry is treated as still valid; the
    /// retry machinery handles the eventual failure.
    pub async fn with_safety_period(
        inner: Arc<dyn TokenProvider>,
        safety_period: Duration,
        config: &TokenConfig,
    ) -> Result<CachedTokenProvider, Error> {
        let retry_delay = config.failure_retry_delay;
        let refresh_config = RefreshConfig::after_each(move |token: &AccessToken| {
            let expires_in = Duration::from_secs(token.expires_in_seconds.max(0) as u64);
            max(retry_delay, expires_in.saturating_sub(safety_period))
        });
        Self::start(inner, refresh_config, config).await
    }

    async fn start(
        inner: Arc<dyn TokenProvider>,
        mut refresh_config: RefreshConfig<AccessToken, Error>,
        config: &TokenConfig,
    ) -> Result<CachedTokenProvider, Error> {
        refresh_config = refresh_config.with_retry(
            config.failure_retry_delay,
            config.failure_retry_next_delay.clone(),
            config.failure_retry_max_attempts,
        );
        refresh_config.on_refresh_success = config.on_refresh_success.clone();
        refresh_config.on_refresh_error = config.on_refresh_error.clone();
        refresh_config.on_retries_exhausted = config.on_retries_exhausted.clone();

        let refresh = move || {
            let inner = inner.clone();
            async move { inner.access_token().await }
        };
        let refreshable = Refreshable::spawn(refresh, refresh_config).await?;
        Ok(CachedTokenProvider { refreshable })
    }

    /// Stops the refresh task. Also happens on drop.
    pub fn stop(&self) {
        self.refreshable.stop();
    }
}

#[async_trait]
impl TokenProvider for CachedTokenProvider {
    async fn access_token(&self) -> Result<AccessToken, Error> {
        Ok(self.refreshable.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

    #[derive(Debug)]
    struct SequenceTokenProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TokenProvider for SequenceTokenProvider {
        async fn access_token(&self) -> Result<AccessToken, Error> {
            let n = self.calls.fetch_add(1, SeqCst) + 1;
            Ok(AccessToken {
                token: format!("token-{n}"),
                expires_in_seconds: 3600,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_reads_do_not_call_inner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedTokenProvider::with_interval(
            Arc::new(SequenceTokenProvider { calls: calls.clone() }),
            Duration::from_secs(1800),
            &TokenConfig::default(),
        )
        .await
        .unwrap();

        for _ in 0..50 {
            assert_eq!(provider.access_token().await.unwrap().token, "token-1");
        }
        assert_eq!(calls.load(SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_period_schedule() {
        let calls = Arc::new(AtomicUsize::new(0));
        // expires_in 3600s, safety period 240s: refresh at t = 3360s
        let provider = CachedTokenProvider::with_safety_period(
            Arc::new(SequenceTokenProvider { calls: calls.clone() }),
            Duration::from_secs(240),
            &TokenConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(provider.access_token().await.unwrap().token, "token-1");

        tokio::time::sleep(Duration::from_secs(3359)).await;
        assert_eq!(provider.access_token().await.unwrap().token, "token-1");

        tokio::time::sleep(Duration::from_secs(2)).await;
        let refreshed = provider.access_token().await.unwrap();
        assert_eq!(refreshed.token, "token-2");
        assert!(refreshed.expires_in_seconds > 0);
        assert_eq!(calls.load(SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_lived_token_schedules_at_retry_delay() {
        #[derive(Debug)]
        struct ShortLived {
            calls: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl TokenProvider for ShortLived {
            async fn access_token(&self) -> Result<AccessToken, Error> {
                self.calls.fetch_add(1, SeqCst);
                Ok(AccessToken {
                    token: "short".to_string(),
                    // already inside the safety period
                    expires_in_seconds: 10,
                })
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let config = TokenConfig {
            failure_retry_delay: Duration::from_secs(5),
            ..TokenConfig::default()
        };
        let provider = CachedTokenProvider::with_safety_period(
            Arc::new(ShortLived { calls: calls.clone() }),
            Duration::from_secs(240),
            &config,
        )
        .await
        .unwrap();

        // refresh cadence degrades to the retry delay, not zero
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(calls.load(SeqCst) <= 4);
        assert!(provider.access_token().await.unwrap().token == "short");
    }
}
