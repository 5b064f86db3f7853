//! Command queue: multi-producer FIFO of deferred actions.
//!
//! Any thread may `push`. Only the owning thread is meant to `try_pop` and run
//! what it gets. The queue also carries the coarse "drained" flag the worker
//! raises whenever it finds nothing to do.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// A deferred zero-argument unit of work, run exactly once on the owning thread.
pub type Command = Box<dyn FnOnce() + Send + 'static>;

pub struct CommandQueue {
    tx: Sender<Command>,
    rx: Receiver<Command>,
    drained: AtomicBool,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            drained: AtomicBool::new(true),
        }
    }

    /// Append a command. Never blocks.
    pub fn push(&self, cmd: Command) {
        self.drained.store(false, Ordering::Release);
        // The queue owns a receiver, so the channel cannot be disconnected.
        let _ = self.tx.send(cmd);
    }

    /// Remove the oldest command, if any.
    pub fn try_pop(&self) -> Option<Command> {
        match self.rx.try_recv() {
            Ok(cmd) => Some(cmd),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Set by the worker when a poll found the queue empty.
    pub fn mark_drained(&self) {
        self.drained.store(true, Ordering::Release);
    }

    /// Point-in-time view of the drained flag. Not a completion signal.
    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }

    /// Run every command queued right now, on the calling thread.
    ///
    /// Must only be called from the owning thread.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Some(cmd) = self.try_pop() {
            run_command(cmd);
            ran += 1;
        }
        ran
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a command, swallowing (and logging) a panic instead of unwinding into
/// the worker loop.
pub fn run_command(cmd: Command) {
    if panic::catch_unwind(AssertUnwindSafe(cmd)).is_err() {
        tracing::error!("marshalled command panicked; worker continues");
    }
}
