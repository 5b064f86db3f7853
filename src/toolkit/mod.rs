//! The windowing-toolkit side: tagged notifications, the owning thread's
//! notification stream, and the crossterm terminal backend.

pub mod notification;
pub mod stream;
pub mod terminal;

pub use notification::{Filtered, Notification, NotificationFilter};
pub use stream::{ListenerGuard, NotificationStream, Poster, TimerGuard};
pub use terminal::{TerminalSource, Translator};
