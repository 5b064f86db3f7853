//! Terminal backend: crossterm input as stream notifications.
//!
//! Bridges crossterm's event system with the notification stream.
//!
//! # API
//!
//! - `key_code` - Map a crossterm `KeyCode` to a virtual-key code
//! - `convert_modifiers` - Map crossterm `KeyModifiers` to our `Modifiers`
//! - `Translator` - Stateful event conversion (double-click promotion, Ctrl+C)
//! - `TerminalSource` - Reader thread posting translated events into a stream
//!
//! # Example
//!
//! ```ignore
//! use snap_relay::toolkit::terminal::TerminalSource;
//!
//! let source = TerminalSource::spawn(app.stream().poster(), config.double_click_window)?;
//! // ... waits now see terminal keys and clicks ...
//! drop(source); // stops the reader, restores the terminal
//! ```

use std::io::stdout;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event as CrosstermEvent, KeyCode as CtKeyCode,
    KeyEvent as CrosstermKeyEvent, KeyEventKind, KeyModifiers, ModifierKeyCode,
    MouseButton as CrosstermMouseButton, MouseEventKind,
};
use crossterm::{execute, terminal};

use super::notification::Notification;
use super::stream::Poster;
use crate::error::{Error, Result};
use crate::types::{KeyCode, Modifiers, MouseButton, vkey};

/// How long the reader blocks in `poll` before re-checking its stop flag.
const READ_POLL: Duration = Duration::from_millis(50);

// =============================================================================
// KEY CONVERSION
// =============================================================================

/// Map a crossterm key to a virtual-key code. Keys without one return `None`.
pub fn key_code(code: CtKeyCode) -> Option<KeyCode> {
    let vk = match code {
        CtKeyCode::Char(c) if c.is_ascii_alphabetic() => c.to_ascii_uppercase() as KeyCode,
        CtKeyCode::Char(' ') => vkey::SPACE,
        CtKeyCode::Char(c) => c as KeyCode,
        CtKeyCode::Backspace => vkey::BACKSPACE,
        CtKeyCode::Tab | CtKeyCode::BackTab => vkey::TAB,
        CtKeyCode::Enter => vkey::ENTER,
        CtKeyCode::Esc => vkey::ESCAPE,
        CtKeyCode::PageUp => vkey::PAGE_UP,
        CtKeyCode::PageDown => vkey::PAGE_DOWN,
        CtKeyCode::End => vkey::END,
        CtKeyCode::Home => vkey::HOME,
        CtKeyCode::Left => vkey::LEFT,
        CtKeyCode::Up => vkey::UP,
        CtKeyCode::Right => vkey::RIGHT,
        CtKeyCode::Down => vkey::DOWN,
        CtKeyCode::Insert => vkey::INSERT,
        CtKeyCode::Delete => vkey::DELETE,
        CtKeyCode::F(n) if (1..=24).contains(&n) => vkey::F1 + KeyCode::from(n - 1),
        CtKeyCode::Modifier(m) => match m {
            ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift => vkey::SHIFT,
            ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl => vkey::CTRL,
            ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt => vkey::ALT,
            _ => return None,
        },
        _ => return None,
    };
    Some(vk)
}

/// Convert crossterm KeyModifiers to our Modifiers
pub fn convert_modifiers(mods: KeyModifiers) -> Modifiers {
    let mut out = Modifiers::empty();
    out.set(Modifiers::CTRL, mods.contains(KeyModifiers::CONTROL));
    out.set(Modifiers::ALT, mods.contains(KeyModifiers::ALT));
    out.set(Modifiers::SHIFT, mods.contains(KeyModifiers::SHIFT));
    out.set(Modifiers::META, mods.intersects(KeyModifiers::META | KeyModifiers::SUPER));
    out
}

fn convert_mouse_button(btn: CrosstermMouseButton) -> MouseButton {
    match btn {
        CrosstermMouseButton::Left => MouseButton::Left,
        CrosstermMouseButton::Right => MouseButton::Right,
        CrosstermMouseButton::Middle => MouseButton::Middle,
    }
}

fn is_interrupt(key: &CrosstermKeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, CtKeyCode::Char('c' | 'C'))
}

// =============================================================================
// CLICK TRACKING
// =============================================================================

/// Promotes a second press of the same button at the same cell within the
/// window to a double click. Terminals never report double clicks themselves.
#[derive(Debug)]
pub struct ClickTracker {
    window: Duration,
    last: Option<(MouseButton, u16, u16, Instant)>,
}

impl ClickTracker {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Record a press; returns true if it completes a double click.
    pub fn press(&mut self, button: MouseButton, column: u16, row: u16, at: Instant) -> bool {
        let double = matches!(
            self.last,
            Some((b, c, r, t)) if b == button && c == column && r == row
                && at.saturating_duration_since(t) <= self.window
        );
        // A completed double click does not seed a triple.
        self.last = if double { None } else { Some((button, column, row, at)) };
        double
    }
}

// =============================================================================
// TRANSLATOR
// =============================================================================

/// Stateful crossterm → notification conversion.
#[derive(Debug)]
pub struct Translator {
    clicks: ClickTracker,
}

impl Translator {
    pub fn new(double_click_window: Duration) -> Self {
        Self {
            clicks: ClickTracker::new(double_click_window),
        }
    }

    /// Translate one event. Releases, moves, drags and scrolls produce nothing.
    pub fn translate(&mut self, event: CrosstermEvent, at: Instant) -> Option<Notification> {
        match event {
            CrosstermEvent::Key(key) => {
                if key.kind == KeyEventKind::Release {
                    return None;
                }
                if is_interrupt(&key) {
                    return Some(Notification::Quit);
                }
                key_code(key.code).map(|code| Notification::Key {
                    code,
                    modifiers: convert_modifiers(key.modifiers),
                })
            }
            CrosstermEvent::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Down(btn) => {
                    let button = convert_mouse_button(btn);
                    let double = self.clicks.press(button, mouse.column, mouse.row, at);
                    Some(Notification::Mouse {
                        button,
                        double,
                        modifiers: convert_modifiers(mouse.modifiers),
                    })
                }
                _ => None,
            },
            CrosstermEvent::Resize(_, _) => Some(Notification::Other),
            _ => None,
        }
    }
}

// =============================================================================
// READER THREAD
// =============================================================================

/// Dedicated terminal reader.
///
/// Puts the terminal in raw mode with mouse capture, then polls crossterm
/// with a short timeout so it can stop cooperatively. Restores the terminal
/// when stopped.
pub struct TerminalSource {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl TerminalSource {
    pub fn spawn(poster: Poster, double_click_window: Duration) -> Result<Self> {
        terminal::enable_raw_mode().map_err(Error::Terminal)?;
        if let Err(e) = execute!(stdout(), EnableMouseCapture) {
            let _ = terminal::disable_raw_mode();
            return Err(Error::Terminal(e));
        }

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = thread::Builder::new()
            .name("snap-terminal".to_string())
            .spawn(move || Self::read_loop(poster, running_clone, Translator::new(double_click_window)))
            .map_err(|e| {
                restore_terminal();
                Error::Spawn(e)
            })?;

        tracing::debug!("terminal source started");
        Ok(Self {
            handle: Some(handle),
            running,
        })
    }

    fn read_loop(poster: Poster, running: Arc<AtomicBool>, mut translator: Translator) {
        while running.load(Ordering::Acquire) {
            match event::poll(READ_POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "terminal poll failed; reader exiting");
                    break;
                }
            }
            match event::read() {
                Ok(ev) => {
                    if let Some(notification) = translator.translate(ev, Instant::now()) {
                        poster.post(notification);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "terminal read failed; reader exiting");
                    break;
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the reader thread and restore the terminal.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            restore_terminal();
            tracing::debug!("terminal source stopped");
        }
    }
}

impl Drop for TerminalSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn restore_terminal() {
    let _ = execute!(stdout(), DisableMouseCapture);
    let _ = terminal::disable_raw_mode();
}

// =============================================================================
// TESTS
// =============================================================================
