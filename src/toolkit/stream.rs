//! Notification stream: the owning thread's event queue.
//!
//! Any thread may `post`. Only the owning thread `pump`s: pending
//! notifications (plus ticks of any due timers) are offered to the installed
//! listeners, newest first, and whatever nobody consumes gets default
//! handling (logged and dropped).
//!
//! Listeners and timers are scoped: [`ListenerGuard`] and [`TimerGuard`]
//! remove them when dropped, on every exit path.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::notification::{Filtered, Notification, NotificationFilter};
use crate::types::TimerId;

// =============================================================================
// Poster
// =============================================================================

/// Cloneable, thread-safe handle for posting into a stream.
#[derive(Clone)]
pub struct Poster {
    tx: Sender<Notification>,
}

impl Poster {
    /// Post a notification. Never blocks; silently dropped once the stream is gone.
    pub fn post(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

// =============================================================================
// Stream
// =============================================================================

struct TimerSlot {
    id: TimerId,
    interval: Duration,
    next_due: Instant,
}

#[derive(Default)]
struct PumpState {
    listeners: Vec<(u64, Box<dyn NotificationFilter>)>,
    timers: Vec<TimerSlot>,
    next_listener: u64,
}

pub struct NotificationStream {
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
    state: Mutex<PumpState>,
}

impl NotificationStream {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            state: Mutex::new(PumpState::default()),
        }
    }

    pub fn poster(&self) -> Poster {
        Poster { tx: self.tx.clone() }
    }

    /// Post from any thread.
    pub fn post(&self, notification: Notification) {
        // The stream owns the receiver, so the send cannot fail.
        let _ = self.tx.send(notification);
    }

    /// Number of notifications posted but not yet pumped.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    fn state(&self) -> MutexGuard<'_, PumpState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a listener until the returned guard is dropped.
    pub fn install(self: &Arc<Self>, filter: impl NotificationFilter + 'static) -> ListenerGuard {
        let mut state = self.state();
        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.push((id, Box::new(filter)));
        tracing::trace!(listener = id, "listener installed");
        ListenerGuard {
            stream: self.clone(),
            id,
        }
    }

    /// Start a periodic timer until the returned guard is dropped.
    pub fn start_timer(self: &Arc<Self>, interval: Duration) -> TimerGuard {
        let id = TimerId::allocate();
        let interval = interval.max(Duration::from_millis(1));
        self.state().timers.push(TimerSlot {
            id,
            interval,
            next_due: Instant::now() + interval,
        });
        tracing::trace!(timer = %id, ?interval, "timer started");
        TimerGuard {
            stream: self.clone(),
            id,
        }
    }

    /// Pump pending notifications, blocking at most `max_wait` (less if a
    /// timer falls due sooner) when nothing is pending. Returns how many
    /// notifications were dispatched.
    pub fn pump(&self, max_wait: Duration) -> usize {
        let mut batch: Vec<Notification> = self.rx.try_iter().collect();

        if batch.is_empty() {
            let wait = self.next_timer_in().map_or(max_wait, |due| due.min(max_wait));
            if !wait.is_zero() {
                match self.rx.recv_timeout(wait) {
                    Ok(first) => {
                        batch.push(first);
                        batch.extend(self.rx.try_iter());
                    }
                    Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
                }
            }
        }

        let mut state = self.state();
        collect_due_timers(&mut state.timers, Instant::now(), &mut batch);

        let count = batch.len();
        for notification in batch {
            dispatch(&mut state.listeners, &notification);
        }
        count
    }

    fn next_timer_in(&self) -> Option<Duration> {
        let now = Instant::now();
        self.state()
            .timers
            .iter()
            .map(|t| t.next_due.saturating_duration_since(now))
            .min()
    }

    fn remove_listener(&self, id: u64) {
        self.state().listeners.retain(|(lid, _)| *lid != id);
        tracing::trace!(listener = id, "listener removed");
    }

    fn stop_timer(&self, id: TimerId) {
        self.state().timers.retain(|t| t.id != id);
        tracing::trace!(timer = %id, "timer stopped");
    }

    /// Listeners currently installed.
    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    /// Timers currently running.
    pub fn timer_count(&self) -> usize {
        self.state().timers.len()
    }
}

impl Default for NotificationStream {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_due_timers(timers: &mut [TimerSlot], now: Instant, batch: &mut Vec<Notification>) {
    for timer in timers.iter_mut().filter(|t| t.next_due <= now) {
        batch.push(Notification::Timer { timer: timer.id });
        timer.next_due += timer.interval;
        if timer.next_due <= now {
            // Missed ticks coalesce into one.
            timer.next_due = now + timer.interval;
        }
    }
}

fn dispatch(listeners: &mut [(u64, Box<dyn NotificationFilter>)], notification: &Notification) {
    for (_, listener) in listeners.iter_mut().rev() {
        if listener.filter(notification) == Filtered::Consumed {
            return;
        }
    }
    tracing::trace!(?notification, "default handling");
}

// =============================================================================
// Guards
// =============================================================================

/// Removes its listener from the stream when dropped.
pub struct ListenerGuard {
    stream: Arc<NotificationStream>,
    id: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.stream.remove_listener(self.id);
    }
}

/// Stops its timer when dropped.
pub struct TimerGuard {
    stream: Arc<NotificationStream>,
    id: TimerId,
}

impl TimerGuard {
    pub fn id(&self) -> TimerId {
        self.id
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.stream.stop_timer(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn recorder(log: Arc<Mutex<Vec<Notification>>>, consume: bool) -> impl NotificationFilter {
        move |n: &Notification| {
            log.lock().unwrap().push(n.clone());
            if consume { Filtered::Consumed } else { Filtered::Passed }
        }
    }

    #[test]
    fn test_pump_empty_returns_zero() {
        let stream = NotificationStream::new();
        assert_eq!(stream.pump(Duration::ZERO), 0);
    }

    #[test]
    fn test_post_and_pump_in_order() {
        let stream = Arc::new(NotificationStream::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let _guard = stream.install(recorder(log.clone(), true));

        stream.post(Notification::key(65));
        stream.post(Notification::Other);
        stream.poster().post(Notification::Quit);
        assert_eq!(stream.pending(), 3);

        assert_eq!(stream.pump(Duration::ZERO), 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec![Notification::key(65), Notification::Other, Notification::Quit]
        );
        assert_eq!(stream.pending(), 0);
    }

    #[test]
    fn test_newest_listener_first_and_consumption() {
        let stream = Arc::new(NotificationStream::new());
        let older = Arc::new(Mutex::new(Vec::new()));
        let newer = Arc::new(Mutex::new(Vec::new()));

        let _g1 = stream.install(recorder(older.clone(), false));
        let g2 = stream.install(recorder(newer.clone(), true));

        stream.post(Notification::key(1));
        stream.pump(Duration::ZERO);
        assert_eq!(newer.lock().unwrap().len(), 1);
        assert!(older.lock().unwrap().is_empty());

        drop(g2);
        stream.post(Notification::key(2));
        stream.pump(Duration::ZERO);
        assert_eq!(older.lock().unwrap().len(), 1);
        assert_eq!(newer.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_guards_remove_on_drop() {
        let stream = Arc::new(NotificationStream::new());
        {
            let _listener = stream.install(|_: &Notification| Filtered::Passed);
            let _timer = stream.start_timer(Duration::from_millis(10));
            assert_eq!(stream.listener_count(), 1);
            assert_eq!(stream.timer_count(), 1);
        }
        assert_eq!(stream.listener_count(), 0);
        assert_eq!(stream.timer_count(), 0);
    }

    #[test]
    fn test_timer_ticks() {
        let stream = Arc::new(NotificationStream::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let _guard = stream.install(recorder(log.clone(), true));
        let timer = stream.start_timer(Duration::from_millis(10));

        let start = Instant::now();
        while log.lock().unwrap().is_empty() && start.elapsed() < Duration::from_secs(2) {
            stream.pump(Duration::from_millis(50));
        }

        assert!(start.elapsed() >= Duration::from_millis(9));
        assert_eq!(log.lock().unwrap()[0], Notification::Timer { timer: timer.id() });
    }

    #[test]
    fn test_pump_wakes_on_cross_thread_post() {
        let stream = Arc::new(NotificationStream::new());
        let poster = stream.poster();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            poster.post(Notification::key(13));
        });

        let start = Instant::now();
        let mut total = 0;
        while total == 0 && start.elapsed() < Duration::from_secs(2) {
            total += stream.pump(Duration::from_millis(500));
        }
        handle.join().unwrap();
        assert_eq!(total, 1);
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
