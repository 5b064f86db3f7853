//! Wait input and output descriptors.

use std::time::Duration;

use crate::instance::FiredEvent;
use crate::types::{KeyCode, MAX_WAIT_EVENTS, Modifiers, MouseCode, WaitSource};

/// Which modifier keys must be held for a key or mouse press to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModifierFilter {
    #[default]
    Any,
    /// Every listed modifier must be held (others may be too).
    Require(Modifiers),
    /// No modifier may be held.
    NoneHeld,
}

impl ModifierFilter {
    pub fn accepts(self, held: Modifiers) -> bool {
        match self {
            ModifierFilter::Any => true,
            ModifierFilter::Require(required) => held.contains(required),
            ModifierFilter::NoneHeld => held.is_empty(),
        }
    }
}

/// Filters and bound for one wait. Every field is optional; the default
/// accepts anything from the requested sources and never times out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitSpec {
    pub timeout: Option<Duration>,
    pub key: Option<KeyCode>,
    pub mouse: Option<MouseCode>,
    pub modifiers: ModifierFilter,
    /// User-event ids to watch for; empty means any fired event.
    pub user_ids: Vec<String>,
}

impl WaitSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_key(mut self, key: KeyCode) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_mouse(mut self, code: MouseCode) -> Self {
        self.mouse = Some(code);
        self
    }

    pub fn with_modifiers(mut self, filter: ModifierFilter) -> Self {
        self.modifiers = filter;
        self
    }

    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.user_ids.push(id.into());
        self
    }

    pub fn with_user_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// More than [`MAX_WAIT_EVENTS`] ids can never be satisfied.
    pub fn user_ids_valid(&self) -> bool {
        self.user_ids.len() <= MAX_WAIT_EVENTS
    }
}

/// Outcome of a wait.
///
/// `payload` depends on `source`: the virtual-key code for keyboard, the
/// [`MouseCode`] for mouse, zero for timer, and the raw [`EventHandle`] of the
/// fired event for user. A wait ended by timeout without the timer source, or
/// by termination, reports `WaitSource::None` with a zero payload.
///
/// [`EventHandle`]: crate::types::EventHandle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitResult {
    pub source: WaitSource,
    pub payload: u64,
    pub modifiers: Modifiers,
    pub fired: Option<FiredEvent>,
}

impl WaitResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn keyboard(code: KeyCode, modifiers: Modifiers) -> Self {
        Self {
            source: WaitSource::Keyboard,
            payload: u64::from(code),
            modifiers,
            fired: None,
        }
    }

    pub fn mouse(code: MouseCode, modifiers: Modifiers) -> Self {
        Self {
            source: WaitSource::Mouse,
            payload: code as u64,
            modifiers,
            fired: None,
        }
    }

    pub fn timer() -> Self {
        Self {
            source: WaitSource::Timer,
            ..Self::default()
        }
    }

    pub fn user(fired: FiredEvent) -> Self {
        Self {
            source: WaitSource::User,
            payload: fired.handle.raw(),
            modifiers: Modifiers::empty(),
            fired: Some(fired),
        }
    }

    pub fn is_none(&self) -> bool {
        self.source == WaitSource::None
    }

    /// Id of the user event that satisfied the wait.
    pub fn fired_id(&self) -> Option<&str> {
        self.fired.as_ref().map(|f| f.id.as_str())
    }
}
