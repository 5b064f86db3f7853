//! The listener a wait installs on the notification stream.
//!
//! Every notification is classified by its tag; nothing falls through from
//! one source to another. The first match is sent to the waiting loop and
//! later notifications are passed on untouched. User wake-ups always pass on,
//! so every wait on the instance gets to rescan.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crossbeam_channel::Sender;

use super::options::{WaitResult, WaitSpec};
use crate::instance::EventRegistry;
use crate::toolkit::{Filtered, Notification, NotificationFilter};
use crate::types::{InstanceHandle, KeyCode, Modifiers, MouseButton, MouseCode, SourceMask, TimerId, vkey};

pub(crate) struct WaitFilter {
    instance: InstanceHandle,
    sources: SourceMask,
    spec: WaitSpec,
    user_enabled: bool,
    registry: Arc<Mutex<EventRegistry>>,
    timer: Option<TimerId>,
    deadline: Option<Instant>,
    tx: Sender<WaitResult>,
    matched: bool,
}

impl WaitFilter {
    pub(crate) fn new(
        instance: InstanceHandle,
        sources: SourceMask,
        spec: WaitSpec,
        registry: Arc<Mutex<EventRegistry>>,
        tx: Sender<WaitResult>,
    ) -> Self {
        let user_enabled = sources.contains(SourceMask::USER) && spec.user_ids_valid();
        Self {
            instance,
            sources,
            spec,
            user_enabled,
            registry,
            timer: None,
            deadline: None,
            tx,
            matched: false,
        }
    }

    /// Tie the filter to the wait's own timer and its deadline (if any).
    pub(crate) fn with_timer(mut self, timer: TimerId, deadline: Option<Instant>) -> Self {
        self.timer = Some(timer);
        self.deadline = deadline;
        self
    }

    /// Consume the oldest matching fired record, if the user source is on.
    pub(crate) fn scan_user(&self) -> Option<WaitResult> {
        if !self.user_enabled {
            return None;
        }
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.take_matching(&self.spec.user_ids).map(WaitResult::user)
    }

    fn classify(&self, notification: &Notification, now: Instant) -> Option<WaitResult> {
        match notification {
            n if n.terminates(self.instance) => Some(WaitResult::none()),
            Notification::Key { code, modifiers } => self.match_key(*code, *modifiers),
            Notification::Mouse {
                button,
                double,
                modifiers,
            } => self.match_mouse(*button, *double, *modifiers),
            Notification::Timer { timer } if Some(*timer) == self.timer => {
                let expired = self.deadline.is_some_and(|d| now >= d);
                // A user record beats a timeout landing on the same tick.
                match self.scan_user() {
                    Some(found) => Some(found),
                    None if expired && self.sources.contains(SourceMask::TIMER) => {
                        Some(WaitResult::timer())
                    }
                    None if expired => Some(WaitResult::none()),
                    None => None,
                }
            }
            Notification::UserEvent { instance } if *instance == self.instance => self.scan_user(),
            _ => None,
        }
    }

    fn match_key(&self, code: KeyCode, modifiers: Modifiers) -> Option<WaitResult> {
        if !self.sources.contains(SourceMask::KEYBOARD) || vkey::is_modifier(code) {
            return None;
        }
        if self.spec.key.is_some_and(|want| want != code) {
            return None;
        }
        if !self.spec.modifiers.accepts(modifiers) {
            return None;
        }
        Some(WaitResult::keyboard(code, modifiers))
    }

    fn match_mouse(&self, button: MouseButton, double: bool, modifiers: Modifiers) -> Option<WaitResult> {
        if !self.sources.contains(SourceMask::MOUSE) {
            return None;
        }
        let code = MouseCode::from_press(button, double);
        if code == MouseCode::None || self.spec.mouse.is_some_and(|want| want != code) {
            return None;
        }
        if !self.spec.modifiers.accepts(modifiers) {
            return None;
        }
        Some(WaitResult::mouse(code, modifiers))
    }

    fn owns(&self, notification: &Notification) -> bool {
        matches!(notification, Notification::Timer { timer } if Some(*timer) == self.timer)
    }

    /// Notifications every listener must see, matched or not.
    fn broadcast(&self, notification: &Notification) -> bool {
        notification.terminates(self.instance) || matches!(notification, Notification::UserEvent { .. })
    }
}

impl NotificationFilter for WaitFilter {
    fn filter(&mut self, notification: &Notification) -> Filtered {
        if self.matched {
            return Filtered::Passed;
        }
        match self.classify(notification, Instant::now()) {
            Some(result) => {
                self.matched = true;
                tracing::trace!(?notification, source = ?result.source, "wait matched");
                let _ = self.tx.try_send(result);
                if self.broadcast(notification) {
                    Filtered::Passed
                } else {
                    Filtered::Consumed
                }
            }
            // Our own timer ticks stop here either way.
            None if self.owns(notification) => Filtered::Consumed,
            None => Filtered::Passed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ViewHandle, WaitSource};
    use crate::wait::options::ModifierFilter;
    use crossbeam_channel::Receiver;
    use std::time::Duration;

    const ME: InstanceHandle = InstanceHandle::from_raw(100);

    fn filter(sources: SourceMask, spec: WaitSpec) -> (WaitFilter, Receiver<WaitResult>, Arc<Mutex<EventRegistry>>) {
        let registry = Arc::new(Mutex::new(EventRegistry::new()));
        let (tx, rx) = crossbeam_channel::bounded(1);
        (WaitFilter::new(ME, sources, spec, registry.clone(), tx), rx, registry)
    }

    #[test]
    fn test_key_filter() {
        let (mut f, rx, _) = filter(SourceMask::KEYBOARD, WaitSpec::new().with_key('K' as KeyCode));
        assert_eq!(f.filter(&Notification::key('J' as KeyCode)), Filtered::Passed);
        assert!(rx.try_recv().is_err());
        assert_eq!(f.filter(&Notification::key('K' as KeyCode)), Filtered::Consumed);
        let result = rx.try_recv().unwrap();
        assert_eq!(result.source, WaitSource::Keyboard);
        assert_eq!(result.payload, 'K' as u64);
    }

    #[test]
    fn test_modifier_keys_never_match() {
        let (mut f, rx, _) = filter(SourceMask::KEYBOARD, WaitSpec::new());
        for code in [vkey::SHIFT, vkey::CTRL, vkey::ALT] {
            assert_eq!(f.filter(&Notification::key(code)), Filtered::Passed);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_source_mask_respected() {
        let (mut f, rx, _) = filter(SourceMask::MOUSE, WaitSpec::new());
        assert_eq!(f.filter(&Notification::key(vkey::ENTER)), Filtered::Passed);
        assert_eq!(f.filter(&Notification::double_click(MouseButton::Left)), Filtered::Consumed);
        let result = rx.try_recv().unwrap();
        assert_eq!(result.source, WaitSource::Mouse);
        assert_eq!(result.payload, MouseCode::LeftDoubleClick as u64);
    }

    #[test]
    fn test_mouse_and_modifier_filters() {
        let spec = WaitSpec::new()
            .with_mouse(MouseCode::RightClick)
            .with_modifiers(ModifierFilter::Require(Modifiers::CTRL));
        let (mut f, rx, _) = filter(SourceMask::MOUSE, spec);

        assert_eq!(f.filter(&Notification::click(MouseButton::Left)), Filtered::Passed);
        assert_eq!(f.filter(&Notification::click(MouseButton::Right)), Filtered::Passed);
        assert_eq!(f.filter(&Notification::click(MouseButton::Middle)), Filtered::Passed);
        assert!(rx.try_recv().is_err());

        let held = Notification::Mouse {
            button: MouseButton::Right,
            double: false,
            modifiers: Modifiers::CTRL | Modifiers::SHIFT,
        };
        assert_eq!(f.filter(&held), Filtered::Consumed);
        assert_eq!(rx.try_recv().unwrap().modifiers, Modifiers::CTRL | Modifiers::SHIFT);
    }

    #[test]
    fn test_user_event_consumes_record() {
        let (mut f, rx, registry) = filter(SourceMask::USER, WaitSpec::new().with_user_id("go"));
        let (stop, go) = {
            let mut reg = registry.lock().unwrap();
            (reg.register("stop"), reg.register("go"))
        };
        registry.lock().unwrap().fire(stop, None, None).unwrap();
        assert_eq!(f.filter(&Notification::UserEvent { instance: ME }), Filtered::Passed);
        assert!(rx.try_recv().is_err());

        registry.lock().unwrap().fire(go, None, None).unwrap();
        assert_eq!(f.filter(&Notification::UserEvent { instance: ME }), Filtered::Passed);
        let result = rx.try_recv().unwrap();
        assert_eq!(result.source, WaitSource::User);
        assert_eq!(result.payload, go.raw());
        assert_eq!(registry.lock().unwrap().pending(), 1);
    }

    #[test]
    fn test_user_event_of_other_instance_passes() {
        let (mut f, _rx, _) = filter(SourceMask::USER, WaitSpec::new());
        let other = InstanceHandle::from_raw(101);
        assert_eq!(f.filter(&Notification::UserEvent { instance: other }), Filtered::Passed);
    }

    #[test]
    fn test_user_wakeup_reaches_older_wait() {
        let registry = Arc::new(Mutex::new(EventRegistry::new()));
        let (tx_a, rx_a) = crossbeam_channel::bounded(1);
        let (tx_b, rx_b) = crossbeam_channel::bounded(1);
        let mut older = WaitFilter::new(ME, SourceMask::USER, WaitSpec::new().with_user_id("a"), registry.clone(), tx_a);
        let mut newer = WaitFilter::new(ME, SourceMask::USER, WaitSpec::new().with_user_id("b"), registry.clone(), tx_b);
        let a = registry.lock().unwrap().register("a");
        registry.lock().unwrap().fire(a, None, None).unwrap();

        // Dispatch order is newest first: the newer wait must not swallow it.
        let wake = Notification::UserEvent { instance: ME };
        assert_eq!(newer.filter(&wake), Filtered::Passed);
        assert!(rx_b.try_recv().is_err());
        older.filter(&wake);
        assert_eq!(rx_a.try_recv().unwrap().payload, a.raw());
    }

    #[test]
    fn test_own_timer_tick_consumed() {
        let timer = TimerId::from_raw(9);
        let (f, _rx, _) = filter(SourceMask::TIMER, WaitSpec::new());
        let mut f = f.with_timer(timer, Some(Instant::now() + Duration::from_secs(60)));
        assert_eq!(f.filter(&Notification::Timer { timer }), Filtered::Consumed);
        assert_eq!(f.filter(&Notification::Timer { timer: TimerId::from_raw(10) }), Filtered::Passed);
    }

    #[test]
    fn test_too_many_ids_never_match() {
        let spec = WaitSpec::new().with_user_ids((0..=crate::types::MAX_WAIT_EVENTS).map(|i| format!("e{i}")));
        let (mut f, rx, registry) = filter(SourceMask::USER, spec);
        let e0 = registry.lock().unwrap().register("e0");
        registry.lock().unwrap().fire(e0, None, None).unwrap();
        f.filter(&Notification::UserEvent { instance: ME });
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.lock().unwrap().pending(), 1);
    }

    #[test]
    fn test_timer_deadline() {
        let timer = TimerId::from_raw(5);
        let deadline = Instant::now() + Duration::from_secs(60);
        let (f, _rx, _) = filter(SourceMask::TIMER, WaitSpec::new());
        let f = f.with_timer(timer, Some(deadline));

        assert!(f.classify(&Notification::Timer { timer }, Instant::now()).is_none());
        let late = f.classify(&Notification::Timer { timer }, deadline).unwrap();
        assert_eq!(late.source, WaitSource::Timer);
        assert_eq!(late.payload, 0);
        // Someone else's timer is not ours.
        assert!(f.classify(&Notification::Timer { timer: TimerId::from_raw(6) }, deadline).is_none());
    }

    #[test]
    fn test_timeout_without_timer_source() {
        let timer = TimerId::from_raw(7);
        let deadline = Instant::now();
        let (f, _rx, _) = filter(SourceMask::USER, WaitSpec::new());
        let f = f.with_timer(timer, Some(deadline));
        let result = f.classify(&Notification::Timer { timer }, deadline).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_termination_matches_and_passes() {
        let (mut f, rx, _) = filter(SourceMask::KEYBOARD, WaitSpec::new());
        let close = Notification::Close {
            instance: ME,
            view: ViewHandle::from_raw(1),
        };
        assert_eq!(f.filter(&close), Filtered::Passed);
        assert!(rx.try_recv().unwrap().is_none());

        // Already matched: everything passes from now on.
        assert_eq!(f.filter(&Notification::key(vkey::SPACE)), Filtered::Passed);
    }
}
