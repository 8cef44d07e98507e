//! Synchronous observer primitive.
//!
//! A [`Signal`] keeps an ordered list of subscribers and calls each of them,
//! in subscription order, every time an event is emitted. Dispatch happens
//! on the emitting thread before `emit` returns; there is no queueing.
//!
//! Handles are cheap to clone and share the subscriber list, so a component
//! can hand out a clone of its signal while keeping the right to emit.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Identifies one subscription on one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Slot<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct Subscribers<E> {
    next_id: u64,
    slots: Vec<(SubscriptionId, Slot<E>)>,
}

/// Ordered synchronous event dispatcher.
pub struct Signal<E> {
    inner: Rc<RefCell<Subscribers<E>>>,
}

impl<E> Signal<E> {
    /// Creates a signal without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Subscribers {
                next_id: 0,
                slots: Vec::new(),
            })),
        }
    }

    /// Registers `handler`; it is called for every later emission.
    pub fn subscribe(&self, handler: impl FnMut(&E) + 'static) -> SubscriptionId {
        let mut subs = self.inner.borrow_mut();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.slots.push((id, Rc::new(RefCell::new(handler))));
        id
    }

    /// Removes a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.inner.borrow_mut();
        let before = subs.slots.len();
        subs.slots.retain(|(sid, _)| *sid != id);
        subs.slots.len() != before
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    /// Calls every subscriber with `event`, in subscription order.
    ///
    /// Subscribers added or removed by a handler take effect from the next
    /// emission. A handler that re-entrantly emits on a signal it is
    /// currently handling is skipped for the nested emission.
    pub fn emit(&self, event: &E) {
        let slots: Vec<Slot<E>> = self
            .inner
            .borrow()
            .slots
            .iter()
            .map(|(_, slot)| Rc::clone(slot))
            .collect();
        for slot in slots {
            if let Ok(mut handler) = slot.try_borrow_mut() {
                handler(event);
            }
        }
    }
}

impl<E> Clone for Signal<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Test helper that records every event it receives.
///
/// ```
/// use voxstack_core::signal::{Recorder, Signal};
///
/// let signal = Signal::new();
/// let recorder = Recorder::attach(&signal);
/// signal.emit(&3);
/// assert_eq!(recorder.take(), vec![3]);
/// ```
#[derive(Debug)]
pub struct Recorder<E> {
    events: Rc<RefCell<Vec<E>>>,
}

impl<E: Clone + 'static> Recorder<E> {
    /// Subscribes a new recorder to `signal`.
    #[must_use]
    pub fn attach(signal: &Signal<E>) -> Self {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        signal.subscribe(move |e: &E| sink.borrow_mut().push(e.clone()));
        Self { events }
    }

    /// Returns and clears the recorded events.
    #[must_use]
    pub fn take(&self) -> Vec<E> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_in_subscription_order() {
        let signal = Signal::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let log = Rc::clone(&log);
            signal.subscribe(move |v: &i32| log.borrow_mut().push(format!("{tag}{v}")));
        }
        signal.emit(&1);
        assert_eq!(*log.borrow(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_unsubscribe() {
        let signal: Signal<u8> = Signal::new();
        let recorder = Recorder::attach(&signal);
        let id = signal.subscribe(|_| {});
        assert_eq!(signal.subscriber_count(), 2);
        assert!(signal.unsubscribe(id));
        assert!(!signal.unsubscribe(id));
        signal.emit(&7);
        assert_eq!(recorder.take(), vec![7]);
    }

    #[test]
    fn test_clone_shares_subscribers() {
        let signal = Signal::new();
        let handle = signal.clone();
        let recorder = Recorder::attach(&handle);
        signal.emit(&"x");
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_reentrant_emit_is_skipped() {
        let signal: Signal<u32> = Signal::new();
        let count = Rc::new(RefCell::new(0));
        let inner = signal.clone();
        let c = Rc::clone(&count);
        signal.subscribe(move |v| {
            *c.borrow_mut() += 1;
            if *v == 0 {
                inner.emit(&1);
            }
        });
        signal.emit(&0);
        assert_eq!(*count.borrow(), 1);
    }
}
