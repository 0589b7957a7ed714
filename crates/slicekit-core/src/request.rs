//! The request contract and its stock implementations.
//!
//! A [`Request`] stands for a computation that may still be running. Callers
//! either block on [`Request::wait`] or register a completion callback with
//! [`Request::notify`]. The executor is not part of the contract: a request
//! may be resolved on a worker thread ([`spawn_request`]), by hand through a
//! [`Promise`], or be complete from the start ([`ReadyRequest`]).

use crate::error::RequestError;
use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Keyword metadata attached to a completion callback.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Completion callback. Receives the outcome and the metadata it was
/// registered with.
pub type Callback<T> = Box<dyn FnOnce(Result<&T, &RequestError>, &Metadata) + Send>;

/// A pending or completed computation.
///
/// Both `wait` and `notify` are required:
///
/// ```compile_fail,E0046
/// use slicekit_core::{Request, RequestError};
///
/// struct Blocking(u32);
///
/// impl Request for Blocking {
///     type Output = u32;
///
///     fn wait(&self) -> Result<u32, RequestError> {
///         Ok(self.0)
///     }
/// }
/// ```
///
/// ```compile_fail,E0277
/// use slicekit_core::Request;
///
/// fn takes_request<R: Request>(_: &R) {}
///
/// struct Handle;
///
/// impl Handle {
///     fn wait(&self) -> u32 { 0 }
/// }
///
/// takes_request(&Handle);
/// ```
pub trait Request: Send + Sync {
    /// Value produced on success.
    type Output: Send + 'static;

    /// Block until the computation finishes and return its outcome.
    fn wait(&self) -> Result<Self::Output, RequestError>;

    /// Run `callback` once the computation finishes.
    ///
    /// If it already has, the callback runs immediately on the calling thread.
    fn notify(&self, callback: Callback<Self::Output>, metadata: Metadata);

    /// Shorthand for [`notify`](Self::notify) with a closure and no metadata.
    fn on_complete<F>(&self, callback: F)
    where
        Self: Sized,
        F: FnOnce(Result<&Self::Output, &RequestError>, &Metadata) + Send + 'static,
    {
        self.notify(Box::new(callback), Metadata::new());
    }
}

// =============================================================================
// ReadyRequest
// =============================================================================

/// A request whose outcome is known up front.
#[derive(Debug, Clone)]
pub struct ReadyRequest<T> {
    outcome: Result<T, RequestError>,
}

impl<T> ReadyRequest<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self { outcome: Ok(value) }
    }

    #[must_use]
    pub const fn failed(error: RequestError) -> Self {
        Self {
            outcome: Err(error),
        }
    }
}

impl<T> Request for ReadyRequest<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    fn wait(&self) -> Result<T, RequestError> {
        self.outcome.clone()
    }

    fn notify(&self, callback: Callback<T>, metadata: Metadata) {
        callback(self.outcome.as_ref(), &metadata);
    }
}

// =============================================================================
// Promise / PendingRequest
// =============================================================================

struct State<T> {
    outcome: Option<Arc<Result<T, RequestError>>>,
    callbacks: Vec<(Callback<T>, Metadata)>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    done: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The write side of a [`PendingRequest`].
///
/// Completes the request exactly once. Dropping an unresolved promise
/// rejects the request with [`RequestError::Abandoned`].
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

/// The read side of a [`Promise`]. Cheap to clone; all clones observe the
/// same outcome.
pub struct PendingRequest<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Promise<T> {
    /// Create a linked promise / request pair.
    #[allow(clippy::new_ret_no_self)]
    #[must_use]
    pub fn new() -> (Self, PendingRequest<T>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                outcome: None,
                callbacks: Vec::new(),
            }),
            done: Condvar::new(),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            PendingRequest { shared },
        )
    }

    /// Complete with a value. Returns `false` if already completed.
    pub fn resolve(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Complete with an error. Returns `false` if already completed.
    pub fn reject(&self, error: RequestError) -> bool {
        self.complete(Err(error))
    }

    /// Complete with an outcome. Returns `false` if already completed.
    pub fn complete(&self, outcome: Result<T, RequestError>) -> bool {
        let (outcome, callbacks) = {
            let mut state = self.shared.lock();
            if state.outcome.is_some() {
                return false;
            }
            let outcome = Arc::new(outcome);
            state.outcome = Some(Arc::clone(&outcome));
            (outcome, std::mem::take(&mut state.callbacks))
        };
        self.shared.done.notify_all();

        if let Err(err) = outcome.as_ref() {
            debug!(error = %err, "request rejected");
        }
        // Callbacks run outside the lock so they may touch the request again.
        for (callback, metadata) in callbacks {
            callback(Result::as_ref(&outcome), &metadata);
        }
        true
    }

    /// Whether the request has been completed.
    pub fn is_completed(&self) -> bool {
        self.shared.lock().outcome.is_some()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.is_completed() {
            self.reject(RequestError::Abandoned);
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl<T> PendingRequest<T> {
    /// Whether the outcome is available without blocking.
    pub fn is_ready(&self) -> bool {
        self.shared.lock().outcome.is_some()
    }

    fn wait_outcome(&self, timeout: Option<Duration>) -> Option<Arc<Result<T, RequestError>>> {
        let guard = self.shared.lock();
        let guard = match timeout {
            Some(timeout) => {
                self.shared
                    .done
                    .wait_timeout_while(guard, timeout, |state| state.outcome.is_none())
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => self
                .shared
                .done
                .wait_while(guard, |state| state.outcome.is_none())
                .unwrap_or_else(PoisonError::into_inner),
        };
        guard.outcome.clone()
    }
}

impl<T: Clone> PendingRequest<T> {
    /// Like [`Request::wait`] but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, RequestError> {
        self.wait_outcome(Some(timeout))
            .map_or(Err(RequestError::Timeout), |outcome| (*outcome).clone())
    }
}

impl<T> Clone for PendingRequest<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for PendingRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl<T> Request for PendingRequest<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    fn wait(&self) -> Result<T, RequestError> {
        self.wait_outcome(None)
            .map_or(Err(RequestError::Abandoned), |outcome| (*outcome).clone())
    }

    fn notify(&self, callback: Callback<T>, metadata: Metadata) {
        let outcome = {
            let mut state = self.shared.lock();
            match &state.outcome {
                Some(outcome) => Arc::clone(outcome),
                None => {
                    state.callbacks.push((callback, metadata));
                    return;
                }
            }
        };
        callback(Result::as_ref(&outcome), &metadata);
    }
}

// =============================================================================
// spawn_request
// =============================================================================

/// Run `work` on a new thread and return a request for its outcome.
///
/// Every call starts its own OS thread. Use a [`RequestPool`] when the number
/// of outstanding requests is not bounded by the caller.
///
/// A panic inside `work` rejects the request with [`RequestError::Failed`].
pub fn spawn_request<T, F>(work: F) -> PendingRequest<T>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> Result<T, RequestError> + Send + 'static,
{
    let (promise, request) = Promise::new();
    let spawned = thread::Builder::new()
        .name("slicekit-request".to_string())
        .spawn(move || promise.complete(run_caught(work)));
    if let Err(err) = spawned {
        // The closure (and the promise inside it) is dropped, which abandons
        // the request.
        warn!(error = %err, "failed to spawn request thread");
    }
    request
}

fn run_caught<T, F>(work: F) -> Result<T, RequestError>
where
    F: FnOnce() -> Result<T, RequestError>,
{
    panic::catch_unwind(AssertUnwindSafe(work))
        .unwrap_or_else(|payload| Err(RequestError::Failed(panic_message(&*payload))))
}

// =============================================================================
// RequestPool
// =============================================================================

type Job = Box<dyn FnOnce() + Send>;

#[derive(Debug)]
struct PoolState {
    queue: mpsc::Sender<Job>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    threads: usize,
}

/// Fixed-size set of worker threads resolving requests in FIFO order.
///
/// Workers start on demand, up to `max_threads`, and stay alive until the
/// pool is dropped. Jobs queued when the pool is dropped still run.
#[derive(Debug)]
pub struct RequestPool {
    max_threads: usize,
    state: Mutex<PoolState>,
}

impl Default for RequestPool {
    /// One worker per available core.
    fn default() -> Self {
        Self::new(thread::available_parallelism().map_or(4, NonZeroUsize::get))
    }
}

impl RequestPool {
    /// A pool of at most `max_threads` workers (at least one).
    #[must_use]
    pub fn new(max_threads: usize) -> Self {
        let (queue, jobs) = mpsc::channel();
        Self {
            max_threads: max_threads.max(1),
            state: Mutex::new(PoolState {
                queue,
                jobs: Arc::new(Mutex::new(jobs)),
                threads: 0,
            }),
        }
    }

    #[must_use]
    pub const fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Workers started so far.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.lock().threads
    }

    /// Queue `work` and return a request for its outcome.
    ///
    /// A panic inside `work` rejects the request with
    /// [`RequestError::Failed`] and leaves the worker running.
    pub fn spawn<T, F>(&self, work: F) -> PendingRequest<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, RequestError> + Send + 'static,
    {
        let (promise, request) = Promise::new();
        let job: Job = Box::new(move || {
            promise.complete(run_caught(work));
        });
        let mut state = self.lock();
        if state.threads < self.max_threads {
            let jobs = Arc::clone(&state.jobs);
            let spawned = thread::Builder::new()
                .name(format!("slicekit-pool-{}", state.threads))
                .spawn(move || worker_loop(&jobs));
            match spawned {
                Ok(_) => state.threads += 1,
                Err(err) => warn!(error = %err, "failed to spawn pool worker"),
            }
        }
        if state.threads == 0 {
            // Nothing would ever run the job; dropping it abandons the request.
            return request;
        }
        if state.queue.send(job).is_err() {
            warn!("request pool queue closed");
        }
        request
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn worker_loop(jobs: &Mutex<mpsc::Receiver<Job>>) {
    loop {
        let next = jobs.lock().unwrap_or_else(PoisonError::into_inner).recv();
        match next {
            Ok(job) => job(),
            Err(mpsc::RecvError) => {
                debug!("request pool closed, worker exiting");
                return;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}
