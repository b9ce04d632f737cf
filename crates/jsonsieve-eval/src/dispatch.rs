//! Bounded-concurrency fan-out of work units over an input tree.
//!
//! A single coordinating thread walks the input tree depth-first. For each
//! discovered unit it bumps the `assigned` counter, waits for one of the
//! concurrency slots, and hands the unit to a blocking worker. Workers bump
//! `completed` and release their slot when they finish, whether they succeed,
//! fail, or panic. Once discovery is sealed the run is done exactly when
//! `completed == assigned`; the waiter is woken through a [`Notify`] rather
//! than polling.
//!
//! The first worker error stops discovery; workers already in flight are
//! allowed to finish before the error is returned.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use walkdir::WalkDir;

use crate::error::{EvalError, Result};

// =============================================================================
// Work units
// =============================================================================

/// Whether a processor wants whole files or individual lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    File,
    Line,
}

/// One unit of work, owned by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
    File { path: PathBuf },
    /// A non-empty line without its terminator; `line` is 1-based. The
    /// bytes are not checked for UTF-8 here, so a bad line reaches the
    /// processor like any other malformed record.
    Line {
        path: PathBuf,
        line: usize,
        bytes: Vec<u8>,
    },
}

impl WorkUnit {
    pub fn path(&self) -> &Path {
        match self {
            WorkUnit::File { path } | WorkUnit::Line { path, .. } => path,
        }
    }
}

/// Per-unit work of a run mode.
pub trait UnitProcessor: Send + Sync + 'static {
    fn granularity(&self) -> Granularity;

    /// Process one unit. Called concurrently from several worker threads.
    fn process(&self, unit: WorkUnit) -> Result<()>;
}

// =============================================================================
// Completion tracking
// =============================================================================

/// Assigned and completed unit counts of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchCounters {
    pub assigned: u64,
    pub completed: u64,
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of units processed.
    pub units: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct TrackerState {
    counters: DispatchCounters,
    sealed: bool,
    error: Option<EvalError>,
}

#[derive(Debug, Default)]
struct Tracker {
    state: Mutex<TrackerState>,
    idle: Notify,
}

impl Tracker {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn assign(&self) {
        let mut state = self.lock();
        state.counters.assigned += 1;
    }

    fn complete(&self) {
        let mut state = self.lock();
        state.counters.completed += 1;
        debug_assert!(state.counters.completed <= state.counters.assigned);
        if state.sealed && state.counters.completed == state.counters.assigned {
            self.idle.notify_one();
        }
    }

    /// Mark discovery as finished. No unit is assigned after this.
    fn seal(&self) {
        let mut state = self.lock();
        state.sealed = true;
        if state.counters.completed == state.counters.assigned {
            self.idle.notify_one();
        }
    }

    fn is_idle(&self) -> bool {
        let state = self.lock();
        state.sealed && state.counters.completed == state.counters.assigned
    }

    async fn wait_idle(&self) {
        while !self.is_idle() {
            self.idle.notified().await;
        }
    }

    fn fail(&self, err: EvalError) {
        let mut state = self.lock();
        if state.error.is_none() {
            state.error = Some(err);
        } else {
            debug!("dropping secondary worker error: {err}");
        }
    }

    fn has_failed(&self) -> bool {
        self.lock().error.is_some()
    }

    fn take_error(&self) -> Option<EvalError> {
        self.lock().error.take()
    }

    fn counters(&self) -> DispatchCounters {
        self.lock().counters
    }
}

/// Held by a worker for the lifetime of one unit. Dropping it, including
/// during a panic unwind, records completion and frees the slot.
struct CompletionGuard {
    tracker: Arc<Tracker>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.tracker
                .fail(EvalError::Worker("a worker panicked".to_string()));
        }
        self.tracker.complete();
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Fans units out to at most `concurrency` simultaneous workers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(EvalError::InvalidConfig(
                "maximum number of workers must be greater than 0".to_string(),
            ));
        }
        Ok(Dispatcher { concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Discover every unit under `root` and process it with `processor`.
    ///
    /// Must be called from within a multi-threaded tokio runtime.
    pub async fn run<P: UnitProcessor>(&self, root: &Path, processor: Arc<P>) -> Result<DispatchReport> {
        let started = Instant::now();
        let tracker = Arc::new(Tracker::default());

        let coordinator = Coordinator {
            root: root.to_path_buf(),
            slots: Arc::new(Semaphore::new(self.concurrency)),
            tracker: Arc::clone(&tracker),
            processor,
            handle: Handle::current(),
        };

        let discovered = tokio::task::spawn_blocking(move || coordinator.discover())
            .await
            .map_err(|e| EvalError::Worker(format!("discovery task failed: {e}")));

        tracker.seal();
        tracker.wait_idle().await;

        // A discovery error takes precedence; it is what stopped the walk.
        discovered??;
        if let Some(err) = tracker.take_error() {
            return Err(err);
        }

        let counters = tracker.counters();
        debug_assert_eq!(counters.assigned, counters.completed);
        Ok(DispatchReport {
            units: counters.completed,
            elapsed: started.elapsed(),
        })
    }
}

/// Lines of `reader` as raw bytes, without the `\n` or `\r\n` terminator.
pub(crate) fn byte_lines<R: BufRead>(reader: R) -> impl Iterator<Item = std::io::Result<Vec<u8>>> {
    reader.split(b'\n').map(|line| {
        line.map(|mut bytes| {
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            bytes
        })
    })
}

struct Coordinator<P> {
    root: PathBuf,
    slots: Arc<Semaphore>,
    tracker: Arc<Tracker>,
    processor: Arc<P>,
    handle: Handle,
}

impl<P: UnitProcessor> Coordinator<P> {
    fn discover(&self) -> Result<()> {
        let granularity = self.processor.granularity();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            if self.tracker.has_failed() {
                break;
            }
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            match granularity {
                Granularity::File => self.dispatch(WorkUnit::File {
                    path: entry.into_path(),
                })?,
                Granularity::Line => self.dispatch_lines(entry.path())?,
            }
        }
        Ok(())
    }

    fn dispatch_lines(&self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| EvalError::io(path, e))?;
        for (index, line) in byte_lines(BufReader::new(file)).enumerate() {
            let bytes = line.map_err(|e| EvalError::io(path, e))?;
            if bytes.is_empty() {
                continue;
            }
            if self.tracker.has_failed() {
                break;
            }
            self.dispatch(WorkUnit::Line {
                path: path.to_path_buf(),
                line: index + 1,
                bytes,
            })?;
        }
        Ok(())
    }

    fn dispatch(&self, unit: WorkUnit) -> Result<()> {
        self.tracker.assign();

        // Blocks this (coordinating) thread only until a slot frees up.
        let permit = match self.handle.block_on(Arc::clone(&self.slots).acquire_owned()) {
            Ok(permit) => permit,
            Err(e) => {
                self.tracker.complete();
                return Err(EvalError::Worker(format!("concurrency slots unavailable: {e}")));
            }
        };

        let guard = CompletionGuard {
            tracker: Arc::clone(&self.tracker),
            _permit: permit,
        };
        let processor = Arc::clone(&self.processor);

        match &unit {
            WorkUnit::File { path } => debug!("dispatching {}", path.display()),
            WorkUnit::Line { path, line, .. } => {
                debug!("dispatching line {line} of {}", path.display())
            }
        }

        self.handle.spawn_blocking(move || {
            let guard = guard;
            if let Err(err) = processor.process(unit) {
                warn!("worker failed: {err}");
                guard.tracker.fail(err);
            }
        });
        Ok(())
    }
}
