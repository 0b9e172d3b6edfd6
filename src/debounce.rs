use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Duration;

pub type ExecutorFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type Executor = Arc<dyn Fn() -> ExecutorFuture + Send + Sync>;

/// Runs `executor` once after `delay` has passed without another `trigger`.
///
/// Superseded timers notice the generation moved on and exit; an executor that
/// has already started is never interrupted.
#[derive(Clone)]
pub struct Debouncer {
    state: Arc<DebounceState>,
}

struct DebounceState {
    delay: Duration,
    generation: AtomicU64,
    pending: AtomicBool,
    executor: Executor,
}

impl Debouncer {
    pub fn new(delay: Duration, executor: Executor) -> Self {
        Self {
            state: Arc::new(DebounceState {
                delay,
                generation: AtomicU64::new(0),
                pending: AtomicBool::new(false),
                executor,
            }),
        }
    }

    /// Must be called from within a Tokio runtime.
    pub fn trigger(&self) {
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.pending.store(true, Ordering::SeqCst);

        let state = self.state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(state.delay).await;
            if state.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if !state.pending.swap(false, Ordering::SeqCst) {
                return;
            }
            (state.executor)().await;
        });
    }

    /// Runs a pending execution now. Returns whether anything was pending.
    pub async fn flush(&self) -> bool {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        if !self.state.pending.swap(false, Ordering::SeqCst) {
            return false;
        }
        (self.state.executor)().await;
        true
    }

    pub fn cancel(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        self.state.pending.store(false, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.state.pending.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::{Debouncer, Executor, ExecutorFuture};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Duration;

    fn counting_executor() -> (Executor, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let executor: Executor = {
            let count = count.clone();
            Arc::new(move || {
                let count = count.clone();
                let future: ExecutorFuture = Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                });
                future
            })
        };
        (executor, count)
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_coalesce_into_one_execution() {
        let (executor, count) = counting_executor();
        let debouncer = Debouncer::new(Duration::from_millis(500), executor);

        for _ in 0..5 {
            debouncer.trigger();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_pending_work_immediately() {
        let (executor, count) = counting_executor();
        let debouncer = Debouncer::new(Duration::from_millis(500), executor);

        assert!(!debouncer.flush().await);
        debouncer.trigger();
        assert!(debouncer.flush().await);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_work() {
        let (executor, count) = counting_executor();
        let debouncer = Debouncer::new(Duration::from_millis(500), executor);

        debouncer.trigger();
        debouncer.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
