//! Core types for snap-relay.
//!
//! Handles, source masks, modifier flags and the small code tables the wait
//! operation reports in its payload.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bitflags::bitflags;

// =============================================================================
// Limits and defaults
// =============================================================================

/// Maximum number of user-event ids a single wait may watch for.
pub const MAX_WAIT_EVENTS: usize = 16;

/// Rescan interval for user-only waits that carry no timeout.
pub const DEFAULT_USER_POLL: Duration = Duration::from_millis(20);

// =============================================================================
// Handles
// =============================================================================

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique, non-zero handle value.
fn next_handle() -> u64 {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// The null sentinel.
            pub const NULL: Self = Self(0);

            pub(crate) fn allocate() -> Self {
                Self(next_handle())
            }

            /// Rebuild a handle from its raw value (as seen across the C ABI).
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u64 {
                self.0
            }

            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle_type!(
    /// Identity of a library instance.
    InstanceHandle
);
handle_type!(
    /// Identity of a registered event.
    EventHandle
);
handle_type!(
    /// Identity of an open view window.
    ViewHandle
);
handle_type!(
    /// Identity of a periodic timer on a notification stream.
    TimerId
);

// =============================================================================
// Source mask
// =============================================================================

bitflags! {
    /// Which input sources a wait listens to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SourceMask: u32 {
        const KEYBOARD = 0x0001;
        const MOUSE    = 0x0002;
        const TIMER    = 0x0004;
        const USER     = 0x0008;
        const ANY      = Self::KEYBOARD.bits()
            | Self::MOUSE.bits()
            | Self::TIMER.bits()
            | Self::USER.bits();
    }
}

// =============================================================================
// Modifiers
// =============================================================================

bitflags! {
    /// Modifier keys held while a key or mouse button was pressed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const CTRL  = 0x0001;
        const ALT   = 0x0002;
        const SHIFT = 0x0004;
        const META  = 0x0010;
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Native virtual-key code.
pub type KeyCode = u32;

/// Virtual-key codes with special meaning to the wait filter.
pub mod vkey {
    use super::KeyCode;

    pub const BACKSPACE: KeyCode = 8;
    pub const TAB: KeyCode = 9;
    pub const ENTER: KeyCode = 13;
    pub const SHIFT: KeyCode = 16;
    pub const CTRL: KeyCode = 17;
    pub const ALT: KeyCode = 18;
    pub const ESCAPE: KeyCode = 27;
    pub const SPACE: KeyCode = 32;
    pub const PAGE_UP: KeyCode = 33;
    pub const PAGE_DOWN: KeyCode = 34;
    pub const END: KeyCode = 35;
    pub const HOME: KeyCode = 36;
    pub const LEFT: KeyCode = 37;
    pub const UP: KeyCode = 38;
    pub const RIGHT: KeyCode = 39;
    pub const DOWN: KeyCode = 40;
    pub const INSERT: KeyCode = 45;
    pub const DELETE: KeyCode = 46;
    pub const F1: KeyCode = 112;

    /// Shift, Ctrl and Alt on their own never satisfy a keyboard wait.
    pub fn is_modifier(code: KeyCode) -> bool {
        matches!(code, SHIFT | CTRL | ALT)
    }
}

// =============================================================================
// Mouse
// =============================================================================

/// Physical mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Logical mouse event reported in a wait payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u64)]
pub enum MouseCode {
    #[default]
    None = 0,
    LeftClick = 1,
    RightClick = 2,
    LeftDoubleClick = 3,
    RightDoubleClick = 4,
}

impl MouseCode {
    /// Classify a press. Middle-button presses have no logical code.
    pub fn from_press(button: MouseButton, double: bool) -> Self {
        match (button, double) {
            (MouseButton::Left, false) => MouseCode::LeftClick,
            (MouseButton::Right, false) => MouseCode::RightClick,
            (MouseButton::Left, true) => MouseCode::LeftDoubleClick,
            (MouseButton::Right, true) => MouseCode::RightDoubleClick,
            (MouseButton::Middle, _) => MouseCode::None,
        }
    }

    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(MouseCode::None),
            1 => Some(MouseCode::LeftClick),
            2 => Some(MouseCode::RightClick),
            3 => Some(MouseCode::LeftDoubleClick),
            4 => Some(MouseCode::RightDoubleClick),
            _ => None,
        }
    }
}

// =============================================================================
// Wait source tag
// =============================================================================

/// Which source satisfied a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum WaitSource {
    #[default]
    None = 0,
    Mouse = 1,
    Keyboard = 2,
    Timer = 3,
    User = 4,
}
