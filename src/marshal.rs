//! Command marshaller: the facade every public operation goes through.
//!
//! In inline mode an operation simply runs on the caller's thread. In threaded
//! mode it is boxed into a [`Command`], pushed onto the queue, and the caller
//! blocks on that command's own completion channel:
//!
//! ```text
//! caller thread                         owning thread (snap-owner)
//! ─────────────                         ──────────────────────────
//! execute(op)
//!   ├─ bounded(1) completion channel
//!   ├─ queue.push(cmd) ───────────────→ try_pop → cmd()
//!   │                                     └─ op() → done_tx.send(result)
//!   └─ done_rx.recv() ←────────────────────────────┘
//! ```
//!
//! Calls made from the owning thread itself run inline, so commands may call
//! back into the public API without deadlocking.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::channel::{Command, CommandQueue, Worker};
use crate::config::Backoff;
use crate::error::{Error, Result};

/// How often a blocked caller re-checks that the worker is still alive.
const LIVENESS_CHECK: Duration = Duration::from_millis(50);

pub struct Marshaller {
    queue: Arc<CommandQueue>,
    worker: Mutex<Option<Worker>>,
    owner: Option<ThreadId>,
    stopped: AtomicBool,
}

impl Marshaller {
    /// Marshaller that runs everything on the caller's thread.
    pub fn inline() -> Self {
        Self {
            queue: Arc::new(CommandQueue::new()),
            worker: Mutex::new(None),
            owner: None,
            stopped: AtomicBool::new(false),
        }
    }

    /// Marshaller backed by a dedicated owning thread.
    pub fn threaded<F>(idle: F, backoff: Backoff) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let queue = Arc::new(CommandQueue::new());
        let worker = Worker::spawn(queue.clone(), idle, backoff)?;
        let owner = Some(worker.thread_id());
        Ok(Self {
            queue,
            worker: Mutex::new(Some(worker)),
            owner,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn is_threaded(&self) -> bool {
        self.owner.is_some()
    }

    /// True on the thread allowed to touch toolkit state. In inline mode that
    /// is whichever thread is calling.
    pub fn is_owner_thread(&self) -> bool {
        match self.owner {
            Some(owner) => thread::current().id() == owner,
            None => true,
        }
    }

    /// Coarse "queue drained" flag maintained by the worker.
    pub fn is_drained(&self) -> bool {
        self.queue.is_drained()
    }

    /// Run `op` on the owning thread and return its result.
    pub fn execute<F, R>(&self, op: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_owner_thread() {
            return run_inline(op);
        }
        if self.stopped.load(Ordering::Acquire) {
            return Err(Error::WorkerStopped);
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let cmd: Command = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(op));
            let _ = done_tx.send(outcome);
        });
        self.queue.push(cmd);

        loop {
            match done_rx.recv_timeout(LIVENESS_CHECK) {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(payload)) => {
                    tracing::error!(reason = panic_message(&*payload), "command panicked on owning thread");
                    return Err(Error::CommandPanicked);
                }
                Err(RecvTimeoutError::Disconnected) => return Err(Error::WorkerStopped),
                Err(RecvTimeoutError::Timeout) => {
                    if self.stopped.load(Ordering::Acquire) {
                        // Queued commands will never run now. Dropping them
                        // disconnects their callers; a command already in
                        // flight still completes and reports normally.
                        let dropped = std::iter::from_fn(|| self.queue.try_pop()).count();
                        if dropped > 0 {
                            tracing::debug!(dropped, "discarded commands queued after stop");
                        }
                    }
                }
            }
        }
    }

    /// Run commands queued by other threads. Only does anything when called
    /// on the owning thread of a threaded marshaller.
    pub fn run_pending(&self) -> usize {
        if self.owner.is_some() && self.is_owner_thread() {
            self.queue.run_pending()
        } else {
            0
        }
    }

    /// Stop and join the worker. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut worker) = worker {
            worker.stop();
        }
    }
}

impl Drop for Marshaller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_inline<F, R>(op: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(op)).map_err(|payload| {
        tracing::error!(reason = panic_message(&*payload), "inline command panicked");
        Error::CommandPanicked
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
