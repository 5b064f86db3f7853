//! Runtime configuration.
//!
//! `Config::default()` is what the handle API uses, overlaid with any
//! `SNAP_RELAY_*` environment variables by [`Config::from_env`].

use std::env;
use std::time::Duration;

use crate::types::DEFAULT_USER_POLL;

// =============================================================================
// Backoff
// =============================================================================

/// Idle strategy of the owning-thread worker: spin, then yield, then sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub spin_limit: u32,
    pub yield_limit: u32,
    pub sleep: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            spin_limit: 64,
            yield_limit: 256,
            sleep: Duration::from_micros(50),
        }
    }
}

impl Backoff {
    /// Back off once. `idle_count` is the number of consecutive empty polls.
    pub fn snooze(&self, idle_count: u32) {
        if idle_count < self.spin_limit {
            std::hint::spin_loop();
        } else if idle_count < self.yield_limit {
            std::thread::yield_now();
        } else {
            std::thread::sleep(self.sleep);
        }
    }
}

// =============================================================================
// Config
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Relay every call onto a dedicated owning thread.
    pub threaded: bool,
    /// Longest single blocking pump inside a wait.
    pub pump_slice: Duration,
    /// Rescan timer for user-only waits without a timeout.
    pub user_poll_interval: Duration,
    /// Drop notifications queued before a wait arms. When off, the threaded
    /// owning thread also stops pumping between calls, so input queued while
    /// no wait runs reaches the next one in either mode.
    pub discard_stale_input: bool,
    /// Worker idle strategy.
    pub backoff: Backoff,
    /// Two presses of the same button within this window form a double click.
    pub double_click_window: Duration,
    /// Feed keyboard and mouse input from the controlling terminal.
    pub terminal_input: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threaded: false,
            pump_slice: Duration::from_millis(2),
            user_poll_interval: DEFAULT_USER_POLL,
            discard_stale_input: true,
            backoff: Backoff::default(),
            double_click_window: Duration::from_millis(400),
            terminal_input: false,
        }
    }
}

impl Config {
    /// Defaults overlaid with `SNAP_RELAY_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| env::var(key).ok())
    }

    /// Apply overrides from a key lookup. Unparseable values are ignored.
    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("SNAP_RELAY_THREADED").and_then(|v| parse_bool(&v)) {
            self.threaded = v;
        }
        if let Some(ms) = lookup("SNAP_RELAY_PUMP_SLICE_MS").and_then(|v| v.trim().parse().ok()) {
            self.pump_slice = Duration::from_millis(ms);
        }
        if let Some(ms) = lookup("SNAP_RELAY_USER_POLL_MS").and_then(|v| v.trim().parse().ok()) {
            self.user_poll_interval = Duration::from_millis(ms);
        }
        if let Some(v) = lookup("SNAP_RELAY_DISCARD_STALE").and_then(|v| parse_bool(&v)) {
            self.discard_stale_input = v;
        }
        if let Some(v) = lookup("SNAP_RELAY_TERMINAL").and_then(|v| parse_bool(&v)) {
            self.terminal_input = v;
        }
        self
    }

    pub fn with_threaded(mut self, threaded: bool) -> Self {
        self.threaded = threaded;
        self
    }

    pub fn with_pump_slice(mut self, slice: Duration) -> Self {
        self.pump_slice = slice;
        self
    }

    pub fn with_user_poll_interval(mut self, interval: Duration) -> Self {
        self.user_poll_interval = interval;
        self
    }

    pub fn with_discard_stale_input(mut self, discard: bool) -> Self {
        self.discard_stale_input = discard;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_double_click_window(mut self, window: Duration) -> Self {
        self.double_click_window = window;
        self
    }

    pub fn with_terminal_input(mut self, enabled: bool) -> Self {
        self.terminal_input = enabled;
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
