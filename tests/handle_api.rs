//! The flat handle API and the process-wide application it manages.
//!
//! These tests share one global application, so they run one at a time.

mod common;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use snap_relay::{EventHandle, InstanceHandle, SourceMask, Status, WaitSource, WaitSpec, api, app};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    common::init_tracing();
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

#[test]
fn test_initialize_and_terminate() {
    let _guard = serial();
    let inst = api::initialize(false);
    assert!(!inst.is_null());
    assert!(app::current().is_some());

    assert_eq!(api::terminate(inst), Status::Ok);
    assert_eq!(api::terminate(inst), Status::InvalidHandle);
    assert!(app::current().is_none());
}

#[test]
fn test_instances_share_one_application() {
    let _guard = serial();
    let first = api::initialize(true);
    // Mode is fixed by the first initialize.
    let second = api::initialize(false);

    let a = api::instance(first).unwrap();
    let b = api::instance(second).unwrap();
    assert!(Arc::ptr_eq(a.app(), b.app()));
    assert!(b.is_threaded());
    drop((a, b));

    assert_eq!(api::terminate(first), Status::Ok);
    assert!(app::current().is_some());
    assert_eq!(api::terminate(second), Status::Ok);
    assert!(app::current().is_none());
}

#[test]
fn test_events_through_handles() {
    let _guard = serial();
    let inst = api::initialize(false);

    let go = api::register_event(inst, "go");
    let dup = api::register_event(inst, "go");
    assert!(!go.is_null());
    assert_ne!(go, dup);
    assert_eq!(api::lookup_event(inst, "go"), go);
    assert_eq!(api::lookup_event(inst, "missing"), EventHandle::NULL);

    assert_eq!(api::fire_event(dup, Some("p"), Some(3)), Status::Ok);
    assert_eq!(api::fire_event_by_id(inst, "go", None, None), Status::Ok);
    assert_eq!(api::fire_event_by_id(inst, "missing", None, None), Status::UnknownEvent);

    let first = api::wait_for_input(inst, SourceMask::USER, None).unwrap();
    assert_eq!(first.payload, dup.raw());
    let fired = first.fired.unwrap();
    assert_eq!(fired.param.as_deref(), Some("p"));
    assert_eq!(fired.param_ex, Some(3));

    let second = api::wait_for_input(inst, SourceMask::USER, None).unwrap();
    assert_eq!(second.payload, go.raw());

    assert_eq!(api::unregister_event(go), Status::Ok);
    assert_eq!(api::fire_event(go, None, None), Status::InvalidHandle);
    assert_eq!(api::lookup_event(inst, "go"), dup);

    assert_eq!(api::terminate(inst), Status::Ok);
    assert_eq!(api::fire_event(dup, None, None), Status::InvalidHandle);
}

#[test]
fn test_invalid_handles() {
    let _guard = serial();
    let bogus = InstanceHandle::from_raw(u64::MAX);
    assert_eq!(api::register_event(InstanceHandle::NULL, "x"), EventHandle::NULL);
    assert_eq!(api::lookup_event(bogus, "x"), EventHandle::NULL);
    assert_eq!(api::fire_event_by_id(bogus, "x", None, None), Status::InvalidHandle);
    assert_eq!(api::unregister_event(EventHandle::NULL), Status::InvalidHandle);
    assert_eq!(
        api::wait_for_input(InstanceHandle::NULL, SourceMask::ANY, None).unwrap_err(),
        Status::InvalidHandle
    );
}

#[test]
fn test_threaded_go_scenario() {
    let _guard = serial();
    let inst = api::initialize(true);
    let go = api::register_event(inst, "go");

    let waiter = thread::spawn(move || {
        let start = Instant::now();
        let spec = WaitSpec::new()
            .with_user_id("go")
            .with_timeout(Duration::from_millis(5000));
        (api::wait_for_input(inst, SourceMask::USER, Some(spec)), start.elapsed())
    });
    thread::sleep(Duration::from_millis(50));
    let firer = thread::spawn(move || api::fire_event_by_id(inst, "go", None, None));
    assert_eq!(firer.join().unwrap(), Status::Ok);

    let (result, elapsed) = waiter.join().unwrap();
    let result = result.unwrap();
    assert_eq!(result.source, WaitSource::User);
    assert_eq!(result.payload, go.raw());
    assert!(elapsed < Duration::from_millis(2000));

    assert_eq!(api::terminate(inst), Status::Ok);
}

#[test]
fn test_terminate_during_wait() {
    let _guard = serial();
    let inst = api::initialize(true);
    let waiter = thread::spawn(move || api::wait_for_input(inst, SourceMask::KEYBOARD, None));
    thread::sleep(Duration::from_millis(100));

    assert_eq!(api::terminate(inst), Status::Ok);
    let result = waiter.join().unwrap().unwrap();
    assert!(result.is_none());
    assert!(app::current().is_none());
}
