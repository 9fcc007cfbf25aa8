use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// When the background task attempts the next refresh.
#[derive(Clone)]
pub enum Schedule<A> {
    /// Wall-clock cadence independent of how long each refresh takes.
    /// Backlogged ticks are coalesced; at most one refresh runs at a time.
    FixedRate(Duration),
    /// Delay derived from the value stored after the previous round.
    AfterEach(Arc<dyn Fn(&A) -> Duration + Send + Sync>),
}

/// Retry and hook parameters for a [`Refreshable`].
///
/// A failed refresh is retried up to `retry_max_attempts` times with delays
/// `retry_delay, retry_next_delay(retry_delay), ..`. Exhausting the retries
/// swallows the error so the next scheduled round gets another try. Absent
/// hooks are no-ops.
#[derive(Clone)]
pub struct RefreshConfig<A, E> {
    pub schedule: Schedule<A>,
    pub retry_delay: Duration,
    pub retry_next_delay: Arc<dyn Fn(Duration) -> Duration + Send + Sync>,
    pub retry_max_attempts: usize,
    pub on_refresh_success: Option<Arc<dyn Fn(&A) + Send + Sync>>,
    pub on_refresh_error: Option<Arc<dyn Fn(&E) + Send + Sync>>,
    pub on_retries_exhausted: Option<Arc<dyn Fn(&E) + Send + Sync>>,
}

impl<A, E> RefreshConfig<A, E> {
    pub fn new(schedule: Schedule<A>) -> Self {
        Self {
            schedule,
            retry_delay: Duration::from_secs(1),
            retry_next_delay: Arc::new(|delay| delay * 2),
            retry_max_attempts: 3,
            on_refresh_success: None,
            on_refresh_error: None,
            on_retries_exhausted: None,
        }
    }

    pub fn fixed_rate(interval: Duration) -> Self {
        Self::new(Schedule::FixedRate(interval))
    }

    pub fn after_each(next: impl Fn(&A) -> Duration + Send + Sync + 'static) -> Self {
        Self::new(Schedule::AfterEach(Arc::new(next)))
    }

    pub fn with_retry(
        mut self,
        delay: Duration,
        next_delay: Arc<dyn Fn(Duration) -> Duration + Send + Sync>,
        max_attempts: usize,
    ) -> Self {
        self.retry_delay = delay;
        self.retry_next_delay = next_delay;
        self.retry_max_attempts = max_attempts;
        self
    }

    pub fn with_on_refresh_success(mut self, hook: Arc<dyn Fn(&A) + Send + Sync>) -> Self {
        self.on_refresh_success = Some(hook);
        self
    }

    pub fn with_on_refresh_error(mut self, hook: Arc<dyn Fn(&E) + Send + Sync>) -> Self {
        self.on_refresh_error = Some(hook);
        self
    }

    pub fn with_on_retries_exhausted(mut self, hook: Arc<dyn Fn(&E) + Send + Sync>) -> Self {
        self.on_retries_exhausted = Some(hook);
        self
    }
}

/// A cached value kept fresh by a background task.
///
/// The cell is seeded synchronously during [`Refreshable::spawn`]; from then
/// until [`Refreshable::stop`] (or drop) a value is always present and
/// [`Refreshable::value`] is a constant-time read. The cell has a single
/// writer (the refresh task), so a read after a successful refresh never
/// observes an older value.
pub struct Refreshable<A> {
    cell: Arc<RwLock<A>>,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl<A> Refreshable<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Evaluates `refresh` once to seed the cell (an initial error fails the
    /// construction), then starts the scheduled refresh task.
    pub async fn spawn<E, F, Fut>(refresh: F, config: RefreshConfig<A, E>) -> Result<Refreshable<A>, E>
    where
        E: Display + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A, E>> + Send + 'static,
    {
        let initial = refresh().await?;
        let cell = Arc::new(RwLock::new(initial));
        let cancel = CancellationToken::new();

        let task_cell = cell.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            run_refresh_loop(task_cell, task_cancel, refresh, config).await;
        });

        Ok(Refreshable {
            cell,
            cancel,
            _task: task,
        })
    }

    /// Most recently stored value. Non-blocking aside from the uncontended
    /// read lock.
    pub fn value(&self) -> A {
        self.cell.read().unwrap().clone()
    }

    /// Cancels the refresh task, interrupting any in-flight refresh or
    /// sleep. The stored value stays readable.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl<A> Drop for Refreshable<A> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_refresh_loop<A, E, F, Fut>(
    cell: Arc<RwLock<A>>,
    cancel: CancellationToken,
    refresh: F,
    config: RefreshConfig<A, E>,
) where
    A: Clone + Send + Sync + 'static,
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<A, E>>,
{
    match config.schedule.clone() {
        Schedule::FixedRate(period) => {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                refresh_round(&cell, &cancel, &refresh, &config).await;
            }
        }
        Schedule::AfterEach(next_delay) => loop {
            let delay = next_delay(&cell.read().unwrap());
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(delay) => {}
            }
            refresh_round(&cell, &cancel, &refresh, &config).await;
        },
    }
}

/// One scheduled round: the refresh plus its bounded retries.
async fn refresh_round<A, E, F, Fut>(
    cell: &Arc<RwLock<A>>,
    cancel: &CancellationToken,
    refresh: &F,
    config: &RefreshConfig<A, E>,
) where
    A: Clone + Send + Sync + 'static,
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<A, E>>,
{
    let mut failures = 0;
    let mut delay = config.retry_delay;
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = refresh() => result,
        };
        match result {
            Ok(value) => {
                *cell.write().unwrap() = value.clone();
                tracing::debug!("refresh success");
                if let Some(hook) = &config.on_refresh_success {
                    hook(&value);
                }
                return;
            }
            Err(err) => {
                if let Some(hook) = &config.on_refresh_error {
                    hook(&err);
                }
                failures += 1;
                if failures > config.retry_max_attempts {
                    tracing::error!(error = %err, "refresh retries exhausted; keeping previous value");
                    if let Some(hook) = &config.on_retries_exhausted {
                        hook(&err);
                    }
                    return;
                }
                tracing::warn!(error = %err, attempt = failures, "refresh failed; retrying");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep(delay) => {}
                }
                delay = (config.retry_next_delay)(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

    #[ctor::ctor]
    fn init() {
        let filter = tracing_subscriber::EnvFilter::from_default_env();
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    fn counting_refresh(counter: Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<Result<usize, std::io::Error>> {
        move || std::future::ready(Ok(counter.fetch_add(1, SeqCst) + 1))
    }

    #[tokio::test]
    async fn test_initial_failure_fails_construction() {
        let refresh = || std::future::ready(Err::<usize, _>(std::io::Error::other("boom")));
        let result = Refreshable::spawn(refresh, RefreshConfig::fixed_rate(Duration::from_secs(1))).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_rate_refresh() {
        let counter = Arc::new(AtomicUsize::new(0));
        let refreshable = Refreshable::spawn(
            counting_refresh(counter.clone()),
            RefreshConfig::fixed_rate(Duration::from_secs(10)),
        )
        .await
        .unwrap();

        // seeded synchronously
        assert_eq!(refreshable.value(), 1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(refreshable.value(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(refreshable.value(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_derived_schedule() {
        let counter = Arc::new(AtomicUsize::new(0));
        // delay grows with the stored value: 10s after 1, 20s after 2, ..
        let refreshable = Refreshable::spawn(
            counting_refresh(counter.clone()),
            RefreshConfig::after_each(|v: &usize| Duration::from_secs(10 * *v as u64)),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(refreshable.value(), 2);

        // next round is 20s out, so nothing at +11s..+19s
        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(refreshable.value(), 2);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(refreshable.value(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let attempts_for_refresh = attempts.clone();
        // seed succeeds; the first scheduled round fails twice, then succeeds
        let refresh = move || {
            let n = attempts_for_refresh.fetch_add(1, SeqCst) + 1;
            std::future::ready(if n == 2 || n == 3 {
                Err(std::io::Error::other("transient"))
            } else {
                Ok(n)
            })
        };
        let errors_for_hook = errors.clone();
        let config = RefreshConfig::fixed_rate(Duration::from_secs(60))
            .with_retry(Duration::from_secs(1), Arc::new(|d| d * 2), 3)
            .with_on_refresh_error(Arc::new(move |_err: &std::io::Error| {
                errors_for_hook.fetch_add(1, SeqCst);
            }));
        let refreshable = Refreshable::spawn(refresh, config).await.unwrap();
        assert_eq!(refreshable.value(), 1);

        // round at 60s: fail, retry at +1s: fail, retry at +2s more: success
        tokio::time::sleep(Duration::from_secs(64)).await;
        assert_eq!(refreshable.value(), 4);
        assert_eq!(errors.load(SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_keeps_previous_value() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let exhausted = Arc::new(AtomicUsize::new(0));
        let attempts_for_refresh = attempts.clone();
        let refresh = move || {
            let n = attempts_for_refresh.fetch_add(1, SeqCst) + 1;
            std::future::ready(if n == 1 {
                Ok(n)
            } else {
                Err(std::io::Error::other("permanent"))
            })
        };
        let exhausted_for_hook = exhausted.clone();
        let config = RefreshConfig::fixed_rate(Duration::from_secs(30))
            .with_retry(Duration::from_secs(1), Arc::new(|d| d), 2)
            .with_on_retries_exhausted(Arc::new(move |_err: &std::io::Error| {
                exhausted_for_hook.fetch_add(1, SeqCst);
            }));
        let refreshable = Refreshable::spawn(refresh, config).await.unwrap();

        tokio::time::sleep(Duration::from_secs(40)).await;
        // initial + 1 round of (1 attempt + 2 retries), error swallowed
        assert_eq!(exhausted.load(SeqCst), 1);
        assert_eq!(attempts.load(SeqCst), 4);
        assert_eq!(refreshable.value(), 1);

        // the next fixed-rate round tries again
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(exhausted.load(SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_refresh() {
        let counter = Arc::new(AtomicUsize::new(0));
        let refreshable = Refreshable::spawn(
            counting_refresh(counter.clone()),
            RefreshConfig::fixed_rate(Duration::from_secs(5)),
        )
        .await
        .unwrap();
        assert_eq!(refreshable.value(), 1);

        refreshable.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(SeqCst), 1);
        assert_eq!(refreshable.value(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_never_observe_absence() {
        let counter = Arc::new(AtomicUsize::new(0));
        let refreshable = Arc::new(
            Refreshable::spawn(
                counting_refresh(counter.clone()),
                RefreshConfig::fixed_rate(Duration::from_millis(1)),
            )
            .await
            .unwrap(),
        );

        let mut tasks = Vec::with_capacity(100);
        for _ in 0..100 {
            let refreshable = refreshable.clone();
            tokio::time::sleep(Duration::from_millis(1)).await;
            tasks.push(tokio::spawn(async move { refreshable.value() }));
        }
        for task in tasks {
            assert!(task.await.unwrap() >= 1);
        }
    }
}
