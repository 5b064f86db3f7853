//! Owning-thread worker.
//!
//! One dedicated thread drains the [`CommandQueue`] and runs each command.
//! When the queue is empty it raises the drained flag, runs the idle hook
//! (the application uses it to pump notifications) and backs off:
//!
//! ```text
//! loop until done:
//!   try_pop ── Some(cmd) ──→ run (panics swallowed) ──→ reset idle count
//!      │
//!      └──── None ──→ mark drained → idle hook → spin / yield / sleep
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use super::queue::{CommandQueue, run_command};
use crate::config::Backoff;
use crate::error::{Error, Result};

pub struct Worker {
    handle: Option<JoinHandle<()>>,
    done: Arc<AtomicBool>,
    thread_id: ThreadId,
}

impl Worker {
    /// Spawn the worker thread.
    ///
    /// - `queue`: commands to execute
    /// - `idle`: called on the worker thread whenever the queue is empty
    /// - `backoff`: idle strategy between empty polls
    pub fn spawn<F>(queue: Arc<CommandQueue>, idle: F, backoff: Backoff) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let done = Arc::new(AtomicBool::new(false));
        let done_clone = done.clone();

        let handle = thread::Builder::new()
            .name("snap-owner".to_string())
            .spawn(move || Self::run_loop(queue, done_clone, idle, backoff))
            .map_err(Error::Spawn)?;

        let thread_id = handle.thread().id();
        tracing::debug!(?thread_id, "owning-thread worker started");

        Ok(Self {
            handle: Some(handle),
            done,
            thread_id,
        })
    }

    fn run_loop<F: FnMut()>(queue: Arc<CommandQueue>, done: Arc<AtomicBool>, mut idle: F, backoff: Backoff) {
        let mut idle_count: u32 = 0;

        while !done.load(Ordering::Acquire) {
            if let Some(cmd) = queue.try_pop() {
                run_command(cmd);
                idle_count = 0;
                continue;
            }

            queue.mark_drained();
            idle();
            idle_count = idle_count.saturating_add(1);
            backoff.snooze(idle_count);
        }

        // Commands still queued are dropped; their callers observe WorkerStopped.
        let dropped = std::iter::from_fn(|| queue.try_pop()).count();
        if dropped > 0 {
            tracing::warn!(dropped, "worker stopped with commands still queued");
        }
    }

    /// Thread id of the owning thread.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.done.load(Ordering::Acquire)
    }

    /// Ask the worker to exit after its in-flight command and join it.
    ///
    /// Called from the worker thread itself the join is skipped; the loop
    /// exits as soon as the current command returns.
    pub fn stop(&mut self) {
        self.done.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return;
        };
        if thread::current().id() == self.thread_id {
            tracing::warn!("worker stop requested from the owning thread; not joining");
            return;
        }
        if handle.join().is_err() {
            tracing::error!("owning-thread worker panicked");
        }
        tracing::debug!("owning-thread worker joined");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
