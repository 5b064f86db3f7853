//! Library instance: the root object of one initialized session.
//!
//! An instance owns its event registry and open views. Every operation that
//! touches them is marshalled onto the application's owning thread.
//!
//! # API
//!
//! - `Instance::create(app)` - New instance on an application
//! - `register_event` / `register_event_with_params` / `lookup_event` /
//!   `unregister_event` - Named events
//! - `fire_event` / `fire_event_by_id` - Record a firing and wake waits
//! - `open_view` / `close_view` / `views` / `refresh_views` - View lifecycle
//! - `wait_for_input` - Block until an input source fires
//! - `terminate` - Unblock waits and release everything
//!
//! # Example
//!
//! ```ignore
//! let app = Application::start(Config::default())?;
//! let inst = Instance::create(app);
//! let go = inst.register_event("go")?;
//! inst.fire_event(go, None, None)?;
//! let result = inst.wait_for_input(SourceMask::USER, None)?;
//! assert_eq!(result.payload, go.raw());
//! ```

pub mod registry;
pub mod views;

pub use registry::{Event, EventRegistry, FiredEvent};
pub use views::{View, ViewKind, ViewRegistry};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::app::Application;
use crate::error::{Error, Result};
use crate::toolkit::Notification;
use crate::types::{EventHandle, InstanceHandle, SourceMask, ViewHandle};
use crate::wait::{WaitResult, WaitSpec, multiplexer};

pub struct Instance {
    handle: InstanceHandle,
    app: Arc<Application>,
    registry: Arc<Mutex<EventRegistry>>,
    views: Mutex<ViewRegistry>,
    closing: AtomicBool,
}

impl Instance {
    pub fn create(app: Arc<Application>) -> Arc<Self> {
        let handle = InstanceHandle::allocate();
        tracing::info!(instance = %handle, threaded = app.is_threaded(), "instance created");
        Arc::new(Self {
            handle,
            app,
            registry: Arc::new(Mutex::new(EventRegistry::new())),
            views: Mutex::new(ViewRegistry::new()),
            closing: AtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> InstanceHandle {
        self.handle
    }

    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    pub fn is_threaded(&self) -> bool {
        self.app.is_threaded()
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub(crate) fn registry(&self) -> &Arc<Mutex<EventRegistry>> {
        &self.registry
    }

    fn events(&self) -> MutexGuard<'_, EventRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn view_list(&self) -> MutexGuard<'_, ViewRegistry> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` against this instance on the owning thread.
    fn marshal<F, R>(self: &Arc<Self>, op: F) -> Result<R>
    where
        F: FnOnce(&Instance) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_closing() {
            return Err(Error::InstanceClosed);
        }
        let this = self.clone();
        self.app.execute(move || {
            if this.is_closing() {
                return Err(Error::InstanceClosed);
            }
            op(&this)
        })?
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn register_event(self: &Arc<Self>, id: &str) -> Result<EventHandle> {
        self.register_event_with_params(id, None, None)
    }

    /// Register `id` with the parameters a firing falls back to when it
    /// passes none of its own.
    pub fn register_event_with_params(
        self: &Arc<Self>,
        id: &str,
        param: Option<String>,
        param_ex: Option<u64>,
    ) -> Result<EventHandle> {
        let id = id.to_owned();
        self.marshal(move |inst| Ok(inst.events().register_with_params(&id, param, param_ex)))
    }

    pub fn lookup_event(self: &Arc<Self>, id: &str) -> Result<Option<EventHandle>> {
        let id = id.to_owned();
        self.marshal(move |inst| Ok(inst.events().lookup(&id)))
    }

    pub fn unregister_event(self: &Arc<Self>, event: EventHandle) -> Result<()> {
        self.marshal(move |inst| inst.events().unregister(event).map(|_| ()))
    }

    /// Record a firing of `event` and wake any wait on this instance.
    pub fn fire_event(
        self: &Arc<Self>,
        event: EventHandle,
        param: Option<String>,
        param_ex: Option<u64>,
    ) -> Result<()> {
        self.marshal(move |inst| {
            inst.events().fire(event, param, param_ex)?;
            inst.wake_waits();
            Ok(())
        })
    }

    pub fn fire_event_by_id(
        self: &Arc<Self>,
        id: &str,
        param: Option<String>,
        param_ex: Option<u64>,
    ) -> Result<()> {
        let id = id.to_owned();
        self.marshal(move |inst| {
            inst.events().fire_by_id(&id, param, param_ex)?;
            inst.wake_waits();
            Ok(())
        })
    }

    /// Id of a still-undelivered firing of `event`.
    pub fn fired_id(self: &Arc<Self>, event: EventHandle) -> Result<Option<String>> {
        self.marshal(move |inst| Ok(inst.events().fired_id(event).map(str::to_owned)))
    }

    pub fn pending_events(self: &Arc<Self>) -> Result<usize> {
        self.marshal(|inst| Ok(inst.events().pending()))
    }

    // Registry lock is released before posting.
    fn wake_waits(&self) {
        self.app.stream().post(Notification::UserEvent {
            instance: self.handle,
        });
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn open_view(self: &Arc<Self>, kind: ViewKind, id: &str) -> Result<ViewHandle> {
        let id = id.to_owned();
        self.marshal(move |inst| Ok(inst.view_list().open(kind, &id)))
    }

    /// Close a view. Any wait running on this instance returns.
    pub fn close_view(self: &Arc<Self>, view: ViewHandle) -> Result<()> {
        self.marshal(move |inst| {
            inst.view_list().close(view)?;
            inst.app.stream().post(Notification::Close {
                instance: inst.handle,
                view,
            });
            Ok(())
        })
    }

    pub fn views(self: &Arc<Self>) -> Result<Vec<View>> {
        self.marshal(|inst| Ok(inst.view_list().list()))
    }

    pub fn refresh_views(self: &Arc<Self>) -> Result<()> {
        self.marshal(|inst| {
            inst.refresh_views_local();
            Ok(())
        })
    }

    pub(crate) fn refresh_views_local(&self) {
        self.view_list().refresh();
    }

    // =========================================================================
    // Wait
    // =========================================================================

    /// Block until one of `sources` fires. See [`WaitSpec`] for filters.
    pub fn wait_for_input(
        self: &Arc<Self>,
        sources: SourceMask,
        spec: Option<WaitSpec>,
    ) -> Result<WaitResult> {
        let spec = spec.unwrap_or_default();
        self.marshal(move |inst| multiplexer::run(inst, sources, spec))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Terminate the instance. A wait running on it returns with
    /// `WaitSource::None`; later calls fail with `InstanceClosed`.
    pub fn terminate(self: &Arc<Self>) -> Result<()> {
        if self.closing.swap(true, Ordering::AcqRel) {
            return Err(Error::InstanceClosed);
        }
        // Posted straight from the calling thread so a wait occupying the
        // owning thread sees it.
        self.app.stream().post(Notification::Shutdown {
            instance: self.handle,
        });

        let this = self.clone();
        match self.app.execute(move || this.release_resources()) {
            Ok(()) => {}
            Err(Error::WorkerStopped) => self.release_resources(),
            Err(e) => return Err(e),
        }
        tracing::info!(instance = %self.handle, "instance terminated");
        Ok(())
    }

    fn release_resources(&self) {
        let closed = self.view_list().drain();
        let mut events = self.events();
        tracing::debug!(
            instance = %self.handle,
            views = closed.len(),
            events = events.len(),
            undelivered = events.pending(),
            "releasing instance resources"
        );
        events.clear();
    }
}
