//! # snap-relay
//!
//! Cross-thread call relay and blocking input wait for toolkit-bound views.
//!
//! Every toolkit call must run on one owning thread. In threaded mode each
//! public operation is marshalled onto that thread and the caller blocks until
//! its own command has run; otherwise everything runs inline.
//!
//! The centrepiece is [`Instance::wait_for_input`]: it blocks the caller while
//! pumping the owning thread, and returns the first of a key press, mouse
//! press, timer expiry or fired named event that passes the caller's filters.
//!
//! ## Architecture
//!
//! ```text
//! caller threads ──execute──▶ CommandQueue ──▶ owning thread (Worker)
//!                                               │
//!   fire_event ─▶ EventRegistry ─UserEvent─▶ NotificationStream ─▶ WaitFilter
//!   terminal (crossterm) ──Key/Mouse───────▶        │ timers
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Handles, source masks, modifiers, key and mouse codes
//! - [`config`] - Runtime configuration (`SNAP_RELAY_*` overrides)
//! - [`channel`] - Command queue and owning-thread worker
//! - [`marshal`] - Per-command completion marshaller
//! - [`toolkit`] - Notifications, notification stream, terminal backend
//! - [`app`] - Application object and the process-wide singleton
//! - [`instance`] - Instances, event registry, views
//! - [`wait`] - The input wait
//! - [`api`] - Flat handle API
//! - [`ffi`] - C ABI

pub mod api;
pub mod app;
pub mod channel;
pub mod config;
pub mod error;
pub mod ffi;
pub mod instance;
pub mod marshal;
pub mod toolkit;
pub mod types;
pub mod wait;

// Re-export commonly used items
pub use types::*;

pub use app::Application;
pub use config::{Backoff, Config};
pub use error::{Error, Result, Status};
pub use instance::{Event, EventRegistry, FiredEvent, Instance, View, ViewKind};
pub use marshal::Marshaller;
pub use toolkit::{Notification, NotificationStream, TerminalSource};
pub use wait::{ModifierFilter, WaitResult, WaitSpec};
