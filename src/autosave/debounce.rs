use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type BoxedAction = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Collapses bursts of [`Debouncer::schedule`] calls into one trailing run of an async action.
///
/// Runs never overlap: a timer that fires while the previous run is still in
/// flight waits for it to finish. [`Debouncer::cancel`] drops the pending
/// timer and refuses further scheduling; a run already under way completes.
pub struct Debouncer {
    delay: Duration,
    action: BoxedAction,
    runtime: Handle,
    state: Arc<Mutex<TimerState>>,
    run_lock: Arc<tokio::sync::Mutex<()>>,
}

#[derive(Debug, Default)]
struct TimerState {
    generation: u64,
    pending: Option<JoinHandle<()>>,
    cancelled: bool,
}

impl Debouncer {
    /// Must be called from within a tokio runtime; timers are spawned onto it.
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            delay,
            action: Arc::new(move || -> Pin<Box<dyn Future<Output = ()> + Send>> {
                Box::pin(action())
            }),
            runtime: Handle::current(),
            state: Arc::new(Mutex::new(TimerState::default())),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Re-arms the timer. The action runs once `delay` passes with no further calls.
    pub fn schedule(&self) {
        let mut state = self.state.lock();
        if state.cancelled {
            return;
        }
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        state.generation += 1;
        let generation = state.generation;

        let delay = self.delay;
        let action = self.action.clone();
        let timer_state = self.state.clone();
        let run_lock = self.run_lock.clone();
        state.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut timer = timer_state.lock();
                if timer.cancelled || timer.generation != generation {
                    return;
                }
                // Detach so a later schedule() cannot abort the run itself.
                timer.pending = None;
            }
            let _running = run_lock.lock().await;
            action().await;
        }));
        tracing::trace!(generation, "debounce timer armed");
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        if let Some(pending) = state.pending.take() {
            pending.abort();
            tracing::debug!("pending debounced run cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
