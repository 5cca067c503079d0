//! Provider polling a remote backend on a dedicated thread.
//!
//! Responsibilities:
//! - Fetch the remote declaration at a fixed interval and publish changes.
//! - Optionally block construction until the first fetch (bounded by a timeout).
//! - Serve forced refreshes from blocking and async callers.
//!
//! Does NOT handle:
//! - HTTP details (see `backend`).
//!
//! Invariants:
//! - Exactly one poller thread per provider; it owns a current-thread tokio
//!   runtime and is the only thread performing fetches.
//! - A failed fetch keeps the previous snapshot and never stops the loop.
//! - Change callbacks run on the poller thread.
//! - Construction never fails because the backend is unreachable.

use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use variables_config::{Settings, VariableConfig};

use crate::backend::ConfigBackend;
use crate::error::{Result, VariablesError};
use crate::metrics;
use crate::notifier::ChangeCallback;
use crate::provider::{Provider, ProviderCore};
use crate::store::Snapshot;

const POLLER_THREAD_NAME: &str = "variables-poller";

/// Retry delay for a failed first fetch while a blocking constructor waits.
const FIRST_FETCH_RETRY: Duration = Duration::from_millis(100);

/// Lifecycle of a remote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// The poller has not attempted a fetch yet.
    NotStarted,
    /// The first fetch is in flight or has only failed so far.
    Fetching,
    /// At least one fetch succeeded.
    Ready,
    /// The first fetch did not succeed in time; code defaults are served.
    ReadyWithDefaults,
}

/// Polling and blocking behavior of a `RemoteProvider`.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    pub poll_interval: Duration,
    pub block_before_first_resolve: bool,
    pub block_timeout: Duration,
    pub refresh_timeout: Duration,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl RemoteOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.poll_interval,
            block_before_first_resolve: settings.block_before_first_resolve,
            block_timeout: settings.block_timeout,
            refresh_timeout: settings.refresh_timeout,
        }
    }

    /// Builder method to set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builder method to control blocking on the first fetch.
    pub fn with_block_before_first_resolve(mut self, block: bool) -> Self {
        self.block_before_first_resolve = block;
        self
    }

    /// Builder method to bound the initial blocking wait.
    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = timeout;
        self
    }

    /// Builder method to bound synchronous forced refreshes.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }
}

enum Command {
    Refresh { force: bool, reply: Reply },
    Shutdown,
}

enum Reply {
    Blocking(mpsc::SyncSender<Result<()>>),
    Async(oneshot::Sender<Result<()>>),
}

impl Reply {
    fn send(self, result: Result<()>) {
        // The requester may have timed out and gone away.
        match self {
            Reply::Blocking(tx) => {
                let _ = tx.send(result);
            }
            Reply::Async(tx) => {
                let _ = tx.send(result);
            }
        }
    }
}

struct StateCell {
    state: ProviderState,
    last_attempt: Option<Instant>,
}

struct Shared {
    core: ProviderCore,
    backend: Arc<dyn ConfigBackend>,
    poll_interval: Duration,
    block_deadline: Option<Instant>,
    state: Mutex<StateCell>,
    state_changed: Condvar,
    poller_thread: OnceLock<ThreadId>,
}

impl Shared {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, StateCell> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> ProviderState {
        self.lock_state().state
    }

    /// Delay between attempts: `FIRST_FETCH_RETRY` while construction is
    /// still blocked on the first fetch, otherwise the poll interval.
    fn retry_interval(&self, cell: &StateCell) -> Duration {
        let blocking = cell.state == ProviderState::Fetching
            && self
                .block_deadline
                .is_some_and(|deadline| Instant::now() < deadline);
        if blocking {
            self.poll_interval.min(FIRST_FETCH_RETRY)
        } else {
            self.poll_interval
        }
    }

    fn is_due(&self) -> bool {
        let cell = self.lock_state();
        cell.last_attempt
            .is_none_or(|at| at.elapsed() >= self.retry_interval(&cell))
    }

    fn next_poll_in(&self) -> Duration {
        let cell = self.lock_state();
        match cell.last_attempt {
            Some(at) => self.retry_interval(&cell).saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    fn on_poller_thread(&self) -> bool {
        self.poller_thread.get() == Some(&thread::current().id())
    }

    /// Fetch once and publish the result.
    fn poll(&self, runtime: &tokio::runtime::Runtime) -> Result<()> {
        {
            let mut cell = self.lock_state();
            if cell.state == ProviderState::NotStarted {
                cell.state = ProviderState::Fetching;
            }
        }

        let result = runtime.block_on(self.backend.fetch());

        match result {
            Ok(config) => {
                let publication = self.core.store().replace_all(&config);
                // Callbacks registered once construction returns must not see this swap.
                if self.core.announce(&publication) {
                    debug!(changed = ?publication.changed, "Applied remote changes");
                }
                {
                    let mut cell = self.lock_state();
                    cell.last_attempt = Some(Instant::now());
                    if cell.state != ProviderState::Ready {
                        info!(variables = config.len(), "Remote variables ready");
                    }
                    cell.state = ProviderState::Ready;
                }
                self.state_changed.notify_all();
                Ok(())
            }
            Err(e) => {
                metrics::record_fetch_failure(&e);
                {
                    let mut cell = self.lock_state();
                    cell.last_attempt = Some(Instant::now());
                    let past_deadline = self
                        .block_deadline
                        .is_none_or(|deadline| Instant::now() >= deadline);
                    if cell.state == ProviderState::Fetching && past_deadline {
                        cell.state = ProviderState::ReadyWithDefaults;
                    }
                }
                self.state_changed.notify_all();
                warn!(error = %e, "Failed to fetch remote variables; keeping previous snapshot");
                Err(e)
            }
        }
    }
}

fn run_poller(shared: Arc<Shared>, commands: mpsc::Receiver<Command>) {
    let _ = shared.poller_thread.set(thread::current().id());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start poller runtime; serving code defaults");
            shared.lock_state().state = ProviderState::ReadyWithDefaults;
            shared.state_changed.notify_all();
            return;
        }
    };

    loop {
        match commands.recv_timeout(shared.next_poll_in()) {
            Ok(Command::Refresh { force, reply }) => {
                let result = if force || shared.is_due() {
                    shared.poll(&runtime)
                } else {
                    debug!("Refresh skipped; poll interval not elapsed");
                    Ok(())
                };
                reply.send(result);
            }
            Err(RecvTimeoutError::Timeout) => {
                let _ = shared.poll(&runtime);
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Poller stopped");
}

/// Provider whose snapshots come from a `ConfigBackend`, refreshed by polling.
pub struct RemoteProvider {
    shared: Arc<Shared>,
    commands: Mutex<Option<mpsc::Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    refresh_timeout: Duration,
}

impl fmt::Debug for RemoteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProvider")
            .field("state", &self.state())
            .field("poll_interval", &self.shared.poll_interval)
            .finish()
    }
}

impl RemoteProvider {
    /// Start polling `backend`.
    ///
    /// With `block_before_first_resolve`, waits up to `block_timeout` for the
    /// first successful fetch; on expiry logs a warning and continues with
    /// code defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFetch` only if the poller thread cannot be spawned.
    pub fn new(backend: Arc<dyn ConfigBackend>, options: RemoteOptions) -> Result<Self> {
        let block_deadline = options
            .block_before_first_resolve
            .then(|| Instant::now() + options.block_timeout);
        let shared = Arc::new(Shared {
            core: ProviderCore::default(),
            backend,
            poll_interval: options.poll_interval,
            block_deadline,
            state: Mutex::new(StateCell {
                state: ProviderState::NotStarted,
                last_attempt: None,
            }),
            state_changed: Condvar::new(),
            poller_thread: OnceLock::new(),
        });

        let (tx, rx) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(POLLER_THREAD_NAME.to_string())
            .spawn(move || run_poller(worker_shared, rx))
            .map_err(|e| VariablesError::fetch(format!("failed to spawn poller thread: {e}")))?;

        let provider = Self {
            shared,
            commands: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            refresh_timeout: options.refresh_timeout,
        };

        if options.block_before_first_resolve && !provider.wait_until_ready(options.block_timeout) {
            warn!(
                timeout_ms = options.block_timeout.as_millis() as u64,
                "Timed out waiting for remote variables; serving code defaults"
            );
            let mut cell = provider.shared.lock_state();
            if cell.state != ProviderState::Ready {
                cell.state = ProviderState::ReadyWithDefaults;
            }
        }
        Ok(provider)
    }

    pub fn state(&self) -> ProviderState {
        self.shared.state()
    }

    /// Wait until a fetch has succeeded. Returns whether it did within `timeout`.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let cell = self.shared.lock_state();
        let (cell, _) = self
            .shared
            .state_changed
            .wait_timeout_while(cell, timeout, |cell| cell.state != ProviderState::Ready)
            .unwrap_or_else(PoisonError::into_inner);
        cell.state == ProviderState::Ready
    }

    fn send(&self, command: Command) -> Result<()> {
        let commands = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        match commands.as_ref() {
            Some(tx) => tx.send(command).map_err(|_| VariablesError::ProviderClosed),
            None => Err(VariablesError::ProviderClosed),
        }
    }
}

impl Provider for RemoteProvider {
    fn current_snapshot(&self, name: &str) -> Option<Arc<VariableConfig>> {
        self.shared.core.store().get(name)
    }

    fn resolve_alias(&self, name: &str) -> Option<String> {
        self.shared.core.store().resolve_alias(name)
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.core.store().load()
    }

    fn force_refresh(&self, name: Option<&str>, force: bool) -> Result<()> {
        if self.shared.on_poller_thread() {
            debug!(variable = ?name, "Refresh requested from a change callback; skipping");
            return Ok(());
        }

        let (tx, rx) = mpsc::sync_channel(1);
        self.send(Command::Refresh {
            force,
            reply: Reply::Blocking(tx),
        })?;

        match rx.recv_timeout(self.refresh_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    variable = ?name,
                    timeout_ms = self.refresh_timeout.as_millis() as u64,
                    "Timed out waiting for refresh; continuing with current snapshot"
                );
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => Err(VariablesError::ProviderClosed),
        }
    }

    fn force_refresh_async(&self, name: Option<&str>, force: bool) -> BoxFuture<'static, Result<()>> {
        let (tx, rx) = oneshot::channel();
        let sent = self.send(Command::Refresh {
            force,
            reply: Reply::Async(tx),
        });
        let name = name.map(str::to_string);
        Box::pin(async move {
            sent?;
            debug!(variable = ?name, "Awaiting refresh");
            rx.await.map_err(|_| VariablesError::ProviderClosed)?
        })
    }

    fn on_change(&self, name: &str, callback: ChangeCallback) {
        self.shared.core.notifier().register(name, callback);
    }

    fn close(&self) {
        let sender = self
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            return;
        };
        let _ = sender.send(Command::Shutdown);
        drop(sender);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if self.shared.on_poller_thread() {
                return;
            }
            if worker.join().is_err() {
                error!("Poller thread panicked");
            }
        }
        debug!("Remote provider closed");
    }
}

impl Drop for RemoteProvider {
    fn drop(&mut self) {
        self.close();
    }
}
