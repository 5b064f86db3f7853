//! Event registry: named events of one instance and their fired records.
//!
//! Registration never merges: registering the same id twice yields two
//! independent events and `lookup` returns the older one. Firing copies the
//! event into the fired list, where the record waits (FIFO) until a wait
//! watching for it consumes it.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::types::EventHandle;

/// A registered named event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub handle: EventHandle,
    pub id: String,
    pub param: Option<String>,
    pub param_ex: Option<u64>,
}

/// A delivered but not yet consumed occurrence of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredEvent {
    pub handle: EventHandle,
    pub id: String,
    pub param: Option<String>,
    pub param_ex: Option<u64>,
}

#[derive(Debug, Default)]
pub struct EventRegistry {
    events: Vec<Event>,
    fired: VecDeque<FiredEvent>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &str) -> EventHandle {
        self.register_with_params(id, None, None)
    }

    /// Register `id` with default parameters, used by firings that pass none.
    pub fn register_with_params(
        &mut self,
        id: &str,
        param: Option<String>,
        param_ex: Option<u64>,
    ) -> EventHandle {
        let handle = EventHandle::allocate();
        if self.events.iter().any(|e| e.id == id) {
            tracing::debug!(id, "duplicate event id registered");
        }
        self.events.push(Event {
            handle,
            id: id.to_owned(),
            param,
            param_ex,
        });
        handle
    }

    /// First event registered under `id`.
    pub fn lookup(&self, id: &str) -> Option<EventHandle> {
        self.events.iter().find(|e| e.id == id).map(|e| e.handle)
    }

    pub fn get(&self, handle: EventHandle) -> Option<&Event> {
        self.events.iter().find(|e| e.handle == handle)
    }

    pub fn contains(&self, handle: EventHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Forget a registered event. Already fired records stay deliverable.
    pub fn unregister(&mut self, handle: EventHandle) -> Result<Event> {
        let pos = self
            .events
            .iter()
            .position(|e| e.handle == handle)
            .ok_or(Error::InvalidHandle)?;
        Ok(self.events.remove(pos))
    }

    /// Append a fired record for `handle`. Parameters not given fall back to
    /// the ones stored on the event.
    pub fn fire(
        &mut self,
        handle: EventHandle,
        param: Option<String>,
        param_ex: Option<u64>,
    ) -> Result<FiredEvent> {
        let event = self.get(handle).ok_or(Error::InvalidHandle)?;
        let record = FiredEvent {
            handle,
            id: event.id.clone(),
            param: param.or_else(|| event.param.clone()),
            param_ex: param_ex.or(event.param_ex),
        };
        self.fired.push_back(record.clone());
        tracing::debug!(id = %record.id, pending = self.fired.len(), "event fired");
        Ok(record)
    }

    pub fn fire_by_id(
        &mut self,
        id: &str,
        param: Option<String>,
        param_ex: Option<u64>,
    ) -> Result<FiredEvent> {
        let handle = self
            .lookup(id)
            .ok_or_else(|| Error::UnknownEvent(id.to_owned()))?;
        self.fire(handle, param, param_ex)
    }

    /// Remove and return the oldest fired record among `ids`, or the oldest
    /// one overall when `ids` is empty.
    pub fn take_matching(&mut self, ids: &[String]) -> Option<FiredEvent> {
        let pos = if ids.is_empty() {
            if self.fired.is_empty() { None } else { Some(0) }
        } else {
            self.fired.iter().position(|r| ids.contains(&r.id))
        }?;
        self.fired.remove(pos)
    }

    /// Id of a still-pending fired record for `handle`.
    pub fn fired_id(&self, handle: EventHandle) -> Option<&str> {
        self.fired
            .iter()
            .find(|r| r.handle == handle)
            .map(|r| r.id.as_str())
    }

    pub fn pending(&self) -> usize {
        self.fired.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.fired.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = EventRegistry::new();
        let go = reg.register("go");
        let stop = reg.register("stop");
        assert_ne!(go, stop);
        assert_eq!(reg.lookup("go"), Some(go));
        assert_eq!(reg.lookup("stop"), Some(stop));
        assert_eq!(reg.lookup("missing"), None);
    }

    #[test]
    fn test_duplicate_registration_is_independent() {
        let mut reg = EventRegistry::new();
        let first = reg.register("go");
        let second = reg.register("go");
        assert_ne!(first, second);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.lookup("go"), Some(first));

        reg.unregister(first).unwrap();
        assert_eq!(reg.lookup("go"), Some(second));
    }

    #[test]
    fn test_fire_persists_until_taken() {
        let mut reg = EventRegistry::new();
        let go = reg.register("go");
        reg.fire(go, Some("a".into()), None).unwrap();
        reg.fire(go, Some("b".into()), Some(9)).unwrap();
        assert_eq!(reg.pending(), 2);
        assert_eq!(reg.fired_id(go), Some("go"));

        let first = reg.take_matching(&ids(&["go"])).unwrap();
        assert_eq!(first.param.as_deref(), Some("a"));
        let second = reg.take_matching(&[]).unwrap();
        assert_eq!(second.param.as_deref(), Some("b"));
        assert_eq!(second.param_ex, Some(9));
        assert!(reg.take_matching(&[]).is_none());
        assert_eq!(reg.fired_id(go), None);
    }

    #[test]
    fn test_fire_falls_back_to_registered_params() {
        let mut reg = EventRegistry::new();
        let save = reg.register_with_params("save", Some("draft.txt".into()), Some(3));
        assert_eq!(reg.get(save).unwrap().param.as_deref(), Some("draft.txt"));

        let defaults = reg.fire(save, None, None).unwrap();
        assert_eq!(defaults.param.as_deref(), Some("draft.txt"));
        assert_eq!(defaults.param_ex, Some(3));

        let overridden = reg.fire(save, Some("final.txt".into()), None).unwrap();
        assert_eq!(overridden.param.as_deref(), Some("final.txt"));
        assert_eq!(overridden.param_ex, Some(3));
    }

    #[test]
    fn test_take_matching_skips_other_ids() {
        let mut reg = EventRegistry::new();
        let go = reg.register("go");
        let stop = reg.register("stop");
        reg.fire(stop, None, None).unwrap();
        reg.fire(go, None, None).unwrap();

        let taken = reg.take_matching(&ids(&["go"])).unwrap();
        assert_eq!(taken.handle, go);
        assert_eq!(reg.pending(), 1);
        assert!(reg.take_matching(&ids(&["nope"])).is_none());
        assert_eq!(reg.take_matching(&[]).unwrap().handle, stop);
    }

    #[test]
    fn test_fire_by_unknown_id() {
        let mut reg = EventRegistry::new();
        assert!(matches!(
            reg.fire_by_id("ghost", None, None),
            Err(Error::UnknownEvent(id)) if id == "ghost"
        ));
        assert_eq!(reg.pending(), 0);
    }

    #[test]
    fn test_unregister_keeps_fired_records() {
        let mut reg = EventRegistry::new();
        let go = reg.register("go");
        reg.fire(go, None, None).unwrap();
        reg.unregister(go).unwrap();

        assert!(matches!(reg.fire(go, None, None), Err(Error::InvalidHandle)));
        assert!(matches!(reg.unregister(go), Err(Error::InvalidHandle)));
        assert_eq!(reg.take_matching(&ids(&["go"])).unwrap().handle, go);
    }
}
