//! Tagged notifications flowing through the owning thread's stream.
//!
//! Every kind of input the wait operation can react to has its own variant,
//! so listeners never have to guess what a generic wake-up meant.

use crate::types::{InstanceHandle, KeyCode, Modifiers, MouseButton, TimerId, ViewHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A key went down.
    Key { code: KeyCode, modifiers: Modifiers },
    /// A mouse button went down, possibly as the second half of a double click.
    Mouse {
        button: MouseButton,
        double: bool,
        modifiers: Modifiers,
    },
    /// A periodic timer on the stream ticked.
    Timer { timer: TimerId },
    /// A named event was fired on an instance.
    UserEvent { instance: InstanceHandle },
    /// A view window of an instance was closed.
    Close {
        instance: InstanceHandle,
        view: ViewHandle,
    },
    /// An instance is being terminated.
    Shutdown { instance: InstanceHandle },
    /// The whole application is quitting.
    Quit,
    /// Anything else (resize, focus, paste...).
    Other,
}

impl Notification {
    pub fn key(code: KeyCode) -> Self {
        Notification::Key {
            code,
            modifiers: Modifiers::empty(),
        }
    }

    pub fn click(button: MouseButton) -> Self {
        Notification::Mouse {
            button,
            double: false,
            modifiers: Modifiers::empty(),
        }
    }

    pub fn double_click(button: MouseButton) -> Self {
        Notification::Mouse {
            button,
            double: true,
            modifiers: Modifiers::empty(),
        }
    }

    /// Whether this notification ends any wait running for `instance`.
    pub fn terminates(&self, instance: InstanceHandle) -> bool {
        match self {
            Notification::Quit => true,
            Notification::Shutdown { instance: target } => *target == instance,
            Notification::Close { instance: target, .. } => *target == instance,
            _ => false,
        }
    }
}

/// What a listener did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filtered {
    /// Swallowed; no further handling.
    Consumed,
    /// Left for the next listener / default handling.
    Passed,
}

/// A transient listener installed on a stream.
///
/// Filters run on the owning thread while the stream is pumping and must not
/// install listeners or timers on the same stream.
pub trait NotificationFilter: Send {
    fn filter(&mut self, notification: &Notification) -> Filtered;
}

impl<F> NotificationFilter for F
where
    F: FnMut(&Notification) -> Filtered + Send,
{
    fn filter(&mut self, notification: &Notification) -> Filtered {
        self(notification)
    }
}
