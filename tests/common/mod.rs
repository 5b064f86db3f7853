//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

use snap_relay::{Application, Config, Instance};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (filter with `RUST_LOG`).
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn instance_with(config: Config) -> Arc<Instance> {
    init_tracing();
    Instance::create(Application::start(config).expect("application start"))
}

pub fn inline_instance() -> Arc<Instance> {
    instance_with(Config::default())
}

pub fn threaded_instance() -> Arc<Instance> {
    instance_with(Config::default().with_threaded(true))
}

/// Run `test` once against an inline and once against a threaded instance.
pub fn both_modes(test: impl Fn(Arc<Instance>)) {
    test(inline_instance());
    test(threaded_instance());
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}
