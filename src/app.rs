//! Application: process-side stand-in for the toolkit's application object.
//!
//! Owns the notification stream, the command marshaller (and with it the
//! owning-thread worker in threaded mode) and, optionally, the terminal input
//! source.
//!
//! - `Application::start(config)` builds a private application.
//! - `acquire` / `release` manage the process-wide one used by the handle API:
//!   created on the first `acquire`, shut down when the last reference is
//!   released. Its threaded mode is fixed at creation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::marshal::Marshaller;
use crate::toolkit::{Notification, NotificationStream, TerminalSource};

pub struct Application {
    config: Config,
    stream: Arc<NotificationStream>,
    marshaller: Marshaller,
    terminal: Mutex<Option<TerminalSource>>,
    shutting_down: AtomicBool,
}

impl Application {
    /// Start an application. In threaded mode this spawns the owning thread,
    /// which pumps the stream whenever it has no command to run. With
    /// `discard_stale_input` off it leaves the stream alone between calls so
    /// queued input survives until the next wait.
    pub fn start(config: Config) -> Result<Arc<Self>> {
        let stream = Arc::new(NotificationStream::new());

        let marshaller = if config.threaded {
            let idle_stream = stream.clone();
            let pump_idle = config.discard_stale_input;
            Marshaller::threaded(
                move || {
                    if pump_idle {
                        idle_stream.pump(Duration::ZERO);
                    }
                },
                config.backoff,
            )?
        } else {
            Marshaller::inline()
        };

        tracing::info!(threaded = config.threaded, "application started");
        let app = Arc::new(Self {
            config,
            stream,
            marshaller,
            terminal: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
        });
        if app.config.terminal_input {
            app.attach_terminal()?;
        }
        Ok(app)
    }

    /// Start feeding keyboard and mouse input from the controlling terminal.
    /// Does nothing if a terminal is already attached.
    pub fn attach_terminal(&self) -> Result<()> {
        let mut terminal = self.terminal.lock().unwrap_or_else(PoisonError::into_inner);
        if terminal.is_none() {
            *terminal = Some(TerminalSource::spawn(
                self.stream.poster(),
                self.config.double_click_window,
            )?);
        }
        Ok(())
    }

    pub fn has_terminal(&self) -> bool {
        self.terminal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_threaded(&self) -> bool {
        self.marshaller.is_threaded()
    }

    pub fn stream(&self) -> &Arc<NotificationStream> {
        &self.stream
    }

    pub fn is_owner_thread(&self) -> bool {
        self.marshaller.is_owner_thread()
    }

    /// Coarse drained flag of the command queue.
    pub fn is_drained(&self) -> bool {
        self.marshaller.is_drained()
    }

    /// Run `op` on the owning thread (or inline) and return its result.
    pub fn execute<F, R>(&self, op: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_shutting_down() {
            return Err(Error::WorkerStopped);
        }
        self.marshaller.execute(op)
    }

    /// One owning-thread pump step: run commands queued by other threads,
    /// then pump the notification stream for at most `max_wait`.
    pub fn pump(&self, max_wait: Duration) -> usize {
        let commands = self.marshaller.run_pending();
        let wait = if commands > 0 { Duration::ZERO } else { max_wait };
        commands + self.stream.pump(wait)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Post `Quit`, stop the owning thread and join it. Idempotent.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stream.post(Notification::Quit);
        let terminal = self
            .terminal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(terminal);
        self.marshaller.shutdown();
        tracing::info!("application shut down");
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// PROCESS-WIDE SINGLETON
// =============================================================================

struct Shared {
    app: Arc<Application>,
    refs: usize,
}

static GLOBAL: Mutex<Option<Shared>> = Mutex::new(None);

/// Take a reference on the process-wide application, starting it if needed.
pub fn acquire(config: Config) -> Result<Arc<Application>> {
    let mut global = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(shared) = global.as_mut() {
        if shared.app.config.threaded != config.threaded {
            tracing::warn!(
                requested = config.threaded,
                active = shared.app.config.threaded,
                "threaded mode is fixed by the first initialize; reusing the running application"
            );
        }
        shared.refs += 1;
        return Ok(shared.app.clone());
    }

    let app = Application::start(config)?;
    *global = Some(Shared {
        app: app.clone(),
        refs: 1,
    });
    Ok(app)
}

/// Drop a reference; the last one shuts the application down.
pub fn release() {
    let finished = {
        let mut global = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
        match global.as_mut() {
            Some(shared) if shared.refs > 1 => {
                shared.refs -= 1;
                None
            }
            Some(_) => global.take().map(|shared| shared.app),
            None => None,
        }
    };
    if let Some(app) = finished {
        app.shutdown();
    }
}

/// The running process-wide application, if any.
pub fn current() -> Option<Arc<Application>> {
    GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|shared| shared.app.clone())
}
