//! Flat handle API.
//!
//! Instances and events are addressed by plain handles. Nothing here returns
//! an [`Error`](crate::error::Error): failures fold into a [`Status`] or a
//! null handle, and are logged.
//!
//! The first `initialize` starts the process-wide application (threaded or
//! not, plus any `SNAP_RELAY_*` overrides); the last `terminate` shuts it down.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::app;
use crate::config::Config;
use crate::error::{Result, Status};
use crate::instance::Instance;
use crate::types::{EventHandle, InstanceHandle, SourceMask};
use crate::wait::{WaitResult, WaitSpec};

static INSTANCES: Mutex<BTreeMap<InstanceHandle, Arc<Instance>>> = Mutex::new(BTreeMap::new());
static EVENT_OWNERS: Mutex<BTreeMap<EventHandle, InstanceHandle>> = Mutex::new(BTreeMap::new());

fn instances() -> MutexGuard<'static, BTreeMap<InstanceHandle, Arc<Instance>>> {
    INSTANCES.lock().unwrap_or_else(PoisonError::into_inner)
}

fn event_owners() -> MutexGuard<'static, BTreeMap<EventHandle, InstanceHandle>> {
    EVENT_OWNERS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolve a live instance. The table lock is released before returning.
pub fn instance(handle: InstanceHandle) -> Option<Arc<Instance>> {
    instances().get(&handle).cloned()
}

fn owner_of(event: EventHandle) -> Option<Arc<Instance>> {
    let owner = event_owners().get(&event).copied()?;
    instance(owner)
}

fn report<T>(op: &'static str, result: &Result<T>) -> Status {
    if let Err(err) = result {
        tracing::warn!(op, error = %err, "call failed");
    }
    Status::from(result)
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Create an instance. Returns [`InstanceHandle::NULL`] if the application
/// could not be started.
pub fn initialize(threaded: bool) -> InstanceHandle {
    let config = Config::from_env().with_threaded(threaded);
    match app::acquire(config) {
        Ok(app) => {
            let inst = Instance::create(app);
            let handle = inst.handle();
            instances().insert(handle, inst);
            handle
        }
        Err(err) => {
            tracing::error!(error = %err, "initialize failed");
            InstanceHandle::NULL
        }
    }
}

/// Terminate an instance and release its reference on the application.
pub fn terminate(handle: InstanceHandle) -> Status {
    let Some(inst) = instances().remove(&handle) else {
        return Status::InvalidHandle;
    };
    event_owners().retain(|_, owner| *owner != handle);
    let status = report("terminate", &inst.terminate());
    drop(inst);
    app::release();
    status
}

// =============================================================================
// Events
// =============================================================================

pub fn register_event(handle: InstanceHandle, id: &str) -> EventHandle {
    register_event_with_params(handle, id, None, None)
}

/// Register `id` with default firing parameters.
pub fn register_event_with_params(
    handle: InstanceHandle,
    id: &str,
    param: Option<&str>,
    param_ex: Option<u64>,
) -> EventHandle {
    let Some(inst) = instance(handle) else {
        return EventHandle::NULL;
    };
    let result = inst.register_event_with_params(id, param.map(str::to_owned), param_ex);
    report("register_event", &result);
    match result {
        Ok(event) => {
            event_owners().insert(event, handle);
            event
        }
        Err(_) => EventHandle::NULL,
    }
}

/// First event registered under `id`, or [`EventHandle::NULL`].
pub fn lookup_event(handle: InstanceHandle, id: &str) -> EventHandle {
    let Some(inst) = instance(handle) else {
        return EventHandle::NULL;
    };
    let result = inst.lookup_event(id);
    report("lookup_event", &result);
    result.ok().flatten().unwrap_or(EventHandle::NULL)
}

pub fn unregister_event(event: EventHandle) -> Status {
    let Some(inst) = owner_of(event) else {
        return Status::InvalidHandle;
    };
    let result = inst.unregister_event(event);
    if result.is_ok() {
        event_owners().remove(&event);
    }
    report("unregister_event", &result)
}

pub fn fire_event(event: EventHandle, param: Option<&str>, param_ex: Option<u64>) -> Status {
    let Some(inst) = owner_of(event) else {
        return Status::InvalidHandle;
    };
    report(
        "fire_event",
        &inst.fire_event(event, param.map(str::to_owned), param_ex),
    )
}

pub fn fire_event_by_id(
    handle: InstanceHandle,
    id: &str,
    param: Option<&str>,
    param_ex: Option<u64>,
) -> Status {
    let Some(inst) = instance(handle) else {
        return Status::InvalidHandle;
    };
    report(
        "fire_event_by_id",
        &inst.fire_event_by_id(id, param.map(str::to_owned), param_ex),
    )
}

// =============================================================================
// Wait
// =============================================================================

/// Block until input arrives. An error status means no result was produced.
pub fn wait_for_input(
    handle: InstanceHandle,
    sources: SourceMask,
    spec: Option<WaitSpec>,
) -> std::result::Result<WaitResult, Status> {
    let Some(inst) = instance(handle) else {
        return Err(Status::InvalidHandle);
    };
    let result = inst.wait_for_input(sources, spec);
    let status = report("wait_for_input", &result);
    result.map_err(|_| status)
}
