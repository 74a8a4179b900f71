//! Store change notification.
//!
//! Single-threaded: observers are plain `Fn(&LayerEvent)` closures run
//! synchronously by the mutating store call, after the new snapshot is
//! installed. Every event is also queued for hosts that prefer to `drain()`
//! once per frame instead of reacting inline.
//!
//! An observer must not borrow the store that is emitting (it is mid-call);
//! read the event, or drain the queue later.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use log::{trace, warn};

use crate::entities::LayerEvent;

/// Queued events kept when nobody drains; oldest go first.
const MAX_QUEUE_LEN: usize = 1000;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Rc<dyn Fn(&LayerEvent)>;

#[derive(Default)]
struct BusState {
    next_id: u64,
    observers: Vec<(SubscriptionId, Observer)>,
    queue: VecDeque<LayerEvent>,
}

/// Shared observer list plus event queue. Clones share both.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Rc<RefCell<BusState>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventBus")
            .field("observers", &state.observers.len())
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Observers run in subscription order.
    pub fn subscribe(&self, observer: impl Fn(&LayerEvent) + 'static) -> SubscriptionId {
        let mut state = self.state.borrow_mut();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.observers.push((id, Rc::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.observers.len();
        state.observers.retain(|(sid, _)| *sid != id);
        state.observers.len() != before
    }

    /// Queue `event` and run every observer on it.
    pub fn emit(&self, event: impl Into<LayerEvent>) {
        let event = event.into();
        // Observers are collected first so they may subscribe or drain
        let observers: Vec<Observer> = {
            let mut state = self.state.borrow_mut();
            if state.queue.len() >= MAX_QUEUE_LEN {
                warn!("Event queue full ({} events), dropping oldest", state.queue.len());
                state.queue.pop_front();
            }
            state.queue.push_back(event.clone());
            state.observers.iter().map(|(_, o)| Rc::clone(o)).collect()
        };
        trace!("Emit {:?} to {} observers", event, observers.len());
        for observer in observers {
            observer(&event);
        }
    }

    /// Take all events queued since the last drain.
    pub fn drain(&self) -> Vec<LayerEvent> {
        self.state.borrow_mut().queue.drain(..).collect()
    }

    pub fn queue_len(&self) -> usize {
        self.state.borrow().queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{CurrentLayerChangedEvent, LayerId, LayersChangedEvent};
    use std::cell::Cell;

    fn layers_changed(revision: u64) -> LayersChangedEvent {
        LayersChangedEvent { revision, count: 1 }
    }

    #[test]
    fn test_observers_run_in_order() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            bus.subscribe(move |e| seen.borrow_mut().push((tag, e.revision())));
        }

        bus.emit(layers_changed(3));
        assert_eq!(*seen.borrow(), vec![("first", 3), ("second", 3)]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let id = bus.subscribe(move |_| h.set(h.get() + 1));

        bus.emit(layers_changed(1));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(layers_changed(2));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_drain_returns_events_in_order() {
        let bus = EventBus::new();
        let (a, b) = (LayerId::new(), LayerId::new());
        bus.emit(layers_changed(1));
        bus.emit(CurrentLayerChangedEvent { revision: 2, old: a, new: b });

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LayerEvent::LayersChanged(_)));
        assert!(matches!(&events[1], LayerEvent::CurrentChanged(e) if e.new == b));
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_observer_may_drain_reentrantly() {
        let bus = EventBus::new();
        let inner = bus.clone();
        let drained = Rc::new(Cell::new(0));
        let d = Rc::clone(&drained);
        bus.subscribe(move |_| d.set(d.get() + inner.drain().len()));

        bus.emit(layers_changed(1));
        bus.emit(layers_changed(2));
        assert_eq!(drained.get(), 2);
        assert_eq!(bus.queue_len(), 0);
    }

    #[test]
    fn test_queue_drops_oldest_when_full() {
        let bus = EventBus::new();
        for revision in 0..=(MAX_QUEUE_LEN as u64) {
            bus.emit(layers_changed(revision));
        }
        let events = bus.drain();
        assert_eq!(events.len(), MAX_QUEUE_LEN);
        assert_eq!(events[0].revision(), 1);
    }
}
