//! The wait loop. Runs on the owning thread (inside a marshalled command in
//! threaded mode, inline otherwise) and keeps pumping that thread while it
//! waits, so the UI stays alive and commands from other threads still run.
//!
//! ```text
//! Idle -> Armed -> Polling -> Matched -> TornDown -> Returned
//! ```
//!
//! The listener and timer are guards: they are released on every path out
//! of `Armed`, including early returns and unwinding.

use std::time::{Duration, Instant};

use crossbeam_channel::TryRecvError;

use super::filter::WaitFilter;
use super::options::{WaitResult, WaitSpec};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::types::{MAX_WAIT_EVENTS, SourceMask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitPhase {
    Idle,
    Armed,
    Polling,
    Matched,
    TornDown,
    Returned,
}

fn enter(phase: WaitPhase) {
    tracing::trace!(?phase, "wait phase");
}

/// Block until one of `sources` fires (subject to `spec`), the timeout
/// elapses, or the instance or application goes away.
pub(crate) fn run(instance: &Instance, sources: SourceMask, spec: WaitSpec) -> Result<WaitResult> {
    enter(WaitPhase::Idle);
    if instance.handle().is_null() {
        return Err(Error::InvalidHandle);
    }
    if instance.is_closing() {
        return Err(Error::InstanceClosed);
    }

    let app = instance.app();
    let config = app.config();

    if !spec.user_ids_valid() && sources.contains(SourceMask::USER) {
        tracing::warn!(
            count = spec.user_ids.len(),
            max = MAX_WAIT_EVENTS,
            "too many user-event ids; the user source will never match"
        );
    }

    if config.discard_stale_input {
        // Input that arrived before the call is not an answer to it.
        app.stream().pump(Duration::ZERO);
    }
    instance.refresh_views_local();

    let timer_interval = match spec.timeout {
        Some(timeout) => Some(timeout),
        None if sources.contains(SourceMask::USER) => Some(config.user_poll_interval),
        None => None,
    };

    let (tx, rx) = crossbeam_channel::bounded(1);
    let armed_at = Instant::now();
    let deadline = spec.timeout.map(|t| armed_at + t);
    let mut filter = WaitFilter::new(instance.handle(), sources, spec, instance.registry().clone(), tx);

    enter(WaitPhase::Armed);
    let timer = timer_interval.map(|interval| app.stream().start_timer(interval));
    if let Some(timer) = &timer {
        filter = filter.with_timer(timer.id(), deadline);
    }
    let early = filter.scan_user();
    let listener = app.stream().install(filter);

    let result = match early {
        Some(found) => found,
        None => {
            enter(WaitPhase::Polling);
            loop {
                match rx.try_recv() {
                    Ok(found) => break found,
                    Err(TryRecvError::Disconnected) => break WaitResult::none(),
                    Err(TryRecvError::Empty) => {}
                }
                if instance.is_closing() || app.is_shutting_down() {
                    tracing::debug!(instance = %instance.handle(), "wait ended by termination");
                    break WaitResult::none();
                }
                app.pump(config.pump_slice);
            }
        }
    };
    enter(WaitPhase::Matched);

    drop(listener);
    drop(timer);
    enter(WaitPhase::TornDown);

    tracing::debug!(
        instance = %instance.handle(),
        source = ?result.source,
        payload = result.payload,
        elapsed_ms = armed_at.elapsed().as_millis() as u64,
        "wait returned"
    );
    enter(WaitPhase::Returned);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::app::Application;
    use crate::config::Config;
    use crate::toolkit::Notification;
    use crate::types::{WaitSource, vkey};

    fn instance() -> Arc<Instance> {
        Instance::create(Application::start(Config::default()).unwrap())
    }

    fn assert_released(inst: &Instance) {
        let stream = inst.app().stream();
        assert_eq!(stream.listener_count(), 0, "listener left installed");
        assert_eq!(stream.timer_count(), 0, "timer left running");
    }

    /// Run a wait on another thread and return its result once it ends.
    fn wait_in_background(
        inst: &Arc<Instance>,
        sources: SourceMask,
        spec: WaitSpec,
    ) -> thread::JoinHandle<Result<WaitResult>> {
        let inst = inst.clone();
        thread::spawn(move || run(&inst, sources, spec))
    }

    fn wait_armed(inst: &Instance) {
        let start = Instant::now();
        while inst.app().stream().listener_count() == 0 {
            assert!(start.elapsed() < Duration::from_secs(2), "wait never armed");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_released_after_match() {
        let inst = instance();
        let spec = WaitSpec::new().with_timeout(Duration::from_secs(5));
        let waiter = wait_in_background(&inst, SourceMask::KEYBOARD | SourceMask::TIMER, spec);
        wait_armed(&inst);
        assert_eq!(inst.app().stream().timer_count(), 1);

        inst.app().stream().post(Notification::key(vkey::ENTER));
        let result = waiter.join().unwrap().unwrap();
        assert_eq!(result.source, WaitSource::Keyboard);
        assert_released(&inst);
    }

    #[test]
    fn test_released_after_early_user_match() {
        let inst = instance();
        let go = inst.register_event("go").unwrap();
        inst.fire_event(go, None, None).unwrap();

        let result = run(&inst, SourceMask::USER, WaitSpec::new()).unwrap();
        assert_eq!(result.payload, go.raw());
        assert_released(&inst);
    }

    #[test]
    fn test_released_after_timeout() {
        let inst = instance();
        let spec = WaitSpec::new().with_timeout(Duration::from_millis(20));
        let result = run(&inst, SourceMask::TIMER, spec).unwrap();
        assert_eq!(result.source, WaitSource::Timer);
        assert_released(&inst);
    }

    #[test]
    fn test_released_after_terminate() {
        let inst = instance();
        let waiter = wait_in_background(&inst, SourceMask::USER, WaitSpec::new());
        wait_armed(&inst);

        inst.terminate().unwrap();
        assert!(waiter.join().unwrap().unwrap().is_none());
        assert_released(&inst);
    }

    #[test]
    fn test_released_after_application_shutdown() {
        let inst = instance();
        let spec = WaitSpec::new().with_timeout(Duration::from_secs(5));
        let waiter = wait_in_background(&inst, SourceMask::ANY, spec);
        wait_armed(&inst);

        inst.app().shutdown();
        assert!(waiter.join().unwrap().unwrap().is_none());
        assert_released(&inst);
    }
}
