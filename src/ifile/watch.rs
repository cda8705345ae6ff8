//! Long-running regeneration of an ifile in response to filesystem events.
//!
//! A [`WatchJob`] owns one blocking event loop. Event coalescing is done by
//! `notify-debouncer-mini`: its callback delivers already-debounced batches,
//! and the loop multiplexes those with [`WatchJob::shutdown`] over a single
//! channel. Walks are serialised by construction: they run inline on the
//! loop thread, and batches that queue up behind an in-flight walk are
//! merged into at most one follow-up walk.

use crate::ifile::error::HookKind;
use crate::ifile::{Error, Ifile, Mode};
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default debounce window between an event burst and the walk it triggers.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Default tolerance for consecutive walk failures before a job gives up.
pub const DEFAULT_FAIL_AFTER: Duration = Duration::from_secs(30);

/// Lifecycle state of a [`WatchJob`]. `Failed` and `Stopped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Running,
    Failed,
    Stopped,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot of a job's status and accumulated walk errors.
#[derive(Debug, Clone)]
pub struct WatchJobInfo {
    pub status: Status,
    pub errors: Vec<String>,
}

/// A callback run before or after each walk.
pub type Hook = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// The walk a [`WatchJob`] repeats. Implemented by [`IfileWalker`] for real
/// trees; tests substitute their own to observe or inject walk outcomes.
pub trait Walker: Send + Sync {
    /// Performs one end-to-end regeneration of the ifile.
    ///
    /// # Errors
    ///
    /// Returns whatever the underlying walk or writeout returns.
    fn walk(&self) -> Result<(), Error>;
}

/// The default walker: a fresh [`Ifile`] per pass, so every walk recompiles
/// the ignore files and replaces the target from scratch.
pub struct IfileWalker {
    ifile: PathBuf,
    scan_path: PathBuf,
    mode: Mode,
}

impl IfileWalker {
    #[must_use]
    pub fn new(ifile: impl Into<PathBuf>, scan_path: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            ifile: ifile.into(),
            scan_path: scan_path.into(),
            mode,
        }
    }
}

impl Walker for IfileWalker {
    fn walk(&self) -> Result<(), Error> {
        Ifile::new(&self.ifile, self.mode).generate(&self.scan_path)
    }
}

enum Signal {
    Events(DebounceEventResult),
    Shutdown,
}

struct JobState {
    status: Status,
    errors: Vec<String>,
}

/// Keeps an ifile continuously in sync with its scan tree.
///
/// Constructed idle; [`run`](Self::run) blocks until shutdown or failure.
/// All reader operations are safe to call from other threads.
pub struct WatchJob {
    ifile: PathBuf,
    scan_path: PathBuf,
    mode: Mode,
    walker: Box<dyn Walker>,
    pre_hook: Option<Hook>,
    post_hook: Option<Hook>,
    debounce: Duration,
    fail_after: Duration,
    state: Mutex<JobState>,
    tx: Sender<Signal>,
    rx: Mutex<Option<Receiver<Signal>>>,
}

impl WatchJob {
    /// Creates a job that regenerates `ifile` from `scan_path` on change.
    #[must_use]
    pub fn new(ifile: impl Into<PathBuf>, scan_path: impl Into<PathBuf>, mode: Mode) -> Self {
        let ifile = ifile.into();
        let scan_path = scan_path.into();
        let walker = IfileWalker::new(&ifile, &scan_path, mode);
        Self::with_walker(ifile, scan_path, mode, Box::new(walker))
    }

    /// Like [`new`](Self::new) but with a caller-supplied walk
    /// implementation.
    #[must_use]
    pub fn with_walker(
        ifile: impl Into<PathBuf>,
        scan_path: impl Into<PathBuf>,
        mode: Mode,
        walker: Box<dyn Walker>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            ifile: ifile.into(),
            scan_path: scan_path.into(),
            mode,
            walker,
            pre_hook: None,
            post_hook: None,
            debounce: DEFAULT_DEBOUNCE,
            fail_after: DEFAULT_FAIL_AFTER,
            state: Mutex::new(JobState {
                status: Status::Idle,
                errors: Vec::new(),
            }),
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Sets a hook run before every walk. A failing pre-hook aborts the walk
    /// and counts as a walk error.
    #[must_use]
    pub fn pre_hook(mut self, hook: Hook) -> Self {
        self.pre_hook = Some(hook);
        self
    }

    /// Sets a hook run after every walk. A failing post-hook is recorded but
    /// the walk still counts as successful: the ifile was already emitted.
    #[must_use]
    pub fn post_hook(mut self, hook: Hook) -> Self {
        self.post_hook = Some(hook);
        self
    }

    /// Overrides the debounce window handed to the event debouncer.
    #[must_use]
    pub const fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Overrides the failure budget: how long walks may keep failing, with
    /// no success in between, before the job turns `Failed`.
    #[must_use]
    pub const fn fail_after(mut self, budget: Duration) -> Self {
        self.fail_after = budget;
        self
    }

    #[must_use]
    pub fn ifile(&self) -> &Path {
        &self.ifile
    }

    #[must_use]
    pub fn scan_path(&self) -> &Path {
        &self.scan_path
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.state.lock().expect("watch state lock poisoned").status
    }

    /// Status plus the ordered list of recorded walk errors.
    #[must_use]
    pub fn info(&self) -> WatchJobInfo {
        let state = self.state.lock().expect("watch state lock poisoned");
        WatchJobInfo {
            status: state.status,
            errors: state.errors.clone(),
        }
    }

    /// Requests shutdown. Idempotent; late calls after the loop has exited
    /// are no-ops. `run` returns once the in-flight walk (if any) completes.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Signal::Shutdown);
    }

    /// Runs the job: one initial walk, then a debounced event loop until
    /// [`shutdown`](Self::shutdown) or the failure budget is exhausted.
    /// Blocks the calling thread for the lifetime of the job.
    ///
    /// # Errors
    ///
    /// Returns immediately with the walk error if the initial walk fails,
    /// [`Error::Notify`] if the event subscription cannot be established,
    /// and [`Error::JobFailed`] when consecutive walk errors outlast the
    /// failure budget. In every error case the status is `Failed`.
    pub fn run(&self) -> Result<(), Error> {
        let rx = self
            .rx
            .lock()
            .expect("watch receiver lock poisoned")
            .take()
            .ok_or_else(|| Error::Io(io::Error::other("watch job already ran")))?;

        // The initial walk runs before any events are consumed; its failure
        // is fatal to the whole job.
        if let Err(err) = self.walk_once() {
            self.record_error(&err);
            self.set_status(Status::Failed);
            return Err(err);
        }

        let tx = self.tx.clone();
        let mut debouncer = match new_debouncer(self.debounce, move |result: DebounceEventResult| {
            let _ = tx.send(Signal::Events(result));
        }) {
            Ok(debouncer) => debouncer,
            Err(err) => {
                self.set_status(Status::Failed);
                return Err(Error::Notify(err));
            }
        };
        if let Err(err) = debouncer
            .watcher()
            .watch(&self.scan_path, RecursiveMode::Recursive)
        {
            self.set_status(Status::Failed);
            return Err(Error::Notify(err));
        }

        self.set_status(Status::Running);
        info!(
            scan_path = %self.scan_path.display(),
            ifile = %self.ifile.display(),
            "watch job running"
        );

        let mut failing_since: Option<Instant> = None;

        loop {
            let Ok(first) = rx.recv() else { break };

            // Batches that queued up while the previous walk ran are merged
            // here, so a burst triggers at most one follow-up walk.
            let mut walk_needed = false;
            let mut shutdown = false;
            for signal in std::iter::once(first).chain(rx.try_iter()) {
                match signal {
                    Signal::Shutdown => {
                        shutdown = true;
                        break;
                    }
                    Signal::Events(Ok(events)) => {
                        // Writing the ifile inside the scan tree raises
                        // events for the ifile and its staging file;
                        // reacting to them would regenerate forever.
                        if events.iter().any(|e| !self.is_own_write(&e.path)) {
                            walk_needed = true;
                        }
                    }
                    Signal::Events(Err(err)) => {
                        warn!(%err, "event subscription error");
                        self.record_error(&Error::Notify(err));
                    }
                }
            }

            if shutdown {
                debug!(ifile = %self.ifile.display(), "shutdown requested");
                self.set_status(Status::Stopped);
                break;
            }
            if !walk_needed {
                continue;
            }

            match self.walk_once() {
                Ok(()) => failing_since = None,
                Err(err) => {
                    warn!(%err, "walk failed");
                    self.record_error(&err);
                    match failing_since {
                        Some(since) if since.elapsed() > self.fail_after => {
                            self.set_status(Status::Failed);
                            return Err(Error::JobFailed(self.fail_after));
                        }
                        Some(_) => {}
                        None => failing_since = Some(Instant::now()),
                    }
                }
            }
        }

        Ok(())
    }

    /// Whether an event path is the ifile itself or the temporary file its
    /// atomic writeout stages next to it.
    fn is_own_write(&self, path: &Path) -> bool {
        if path == self.ifile {
            return true;
        }
        path.parent() == self.ifile.parent()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(".tmp"))
    }

    fn walk_once(&self) -> Result<(), Error> {
        if let Some(hook) = &self.pre_hook {
            hook().map_err(|err| Error::Hook {
                kind: HookKind::Pre,
                message: format!("{err:#}"),
            })?;
        }

        self.walker.walk()?;

        if let Some(hook) = &self.post_hook {
            if let Err(err) = hook() {
                let err = Error::Hook {
                    kind: HookKind::Post,
                    message: format!("{err:#}"),
                };
                warn!(%err, "post-walk hook failed");
                self.record_error(&err);
            }
        }
        Ok(())
    }

    fn set_status(&self, status: Status) {
        let mut state = self.state.lock().expect("watch state lock poisoned");
        // Terminal states are sticky.
        if matches!(state.status, Status::Failed | Status::Stopped) {
            return;
        }
        state.status = status;
    }

    fn record_error(&self, err: &Error) {
        let mut state = self.state.lock().expect("watch state lock poisoned");
        state.errors.push(err.to_string());
    }
}
