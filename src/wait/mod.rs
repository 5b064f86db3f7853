//! Blocking, multi-source, filterable input wait.

mod filter;
pub(crate) mod multiplexer;
pub mod options;

pub use options::{ModifierFilter, WaitResult, WaitSpec};
