//! Command channel and the owning-thread worker that drains it.

pub mod queue;
pub mod worker;

pub use queue::{Command, CommandQueue};
pub use worker::Worker;
