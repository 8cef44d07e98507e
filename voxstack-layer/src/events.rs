//! Layer change notifications.
//!
//! Every layer owns one [`LayerEvents`] bus. Property setters emit the
//! specific event describing what changed; the bus then emits
//! [`LayerEvent::Changed`] right after it. Subscribers that only care that
//! *something* changed listen for `Changed` and see exactly one per state
//! change, whichever property it touched.

use voxstack_core::{Signal, SubscriptionId, ValueRange};

/// A change notification emitted by a layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerEvent {
    /// Aggregate event following every other variant.
    Changed,
    VisibleChanged(bool),
    OpacityChanged(f64),
    NameChanged(String),
    /// Explicit layer id; `None` means the id follows the name.
    LayerIdChanged(Option<String>),
    ChannelChanged(usize),
    NumberOfChannelsChanged(usize),
    /// Active normalization range of a datasource slot.
    NormalizeChanged { slot: usize, range: ValueRange },
    /// Display (slider) range of a datasource slot.
    RangeChanged { slot: usize, range: ValueRange },
    ColorTableChanged,
    TintColorChanged,
}

impl LayerEvent {
    /// Returns true if dispatching this event must be followed by `Changed`.
    #[must_use]
    pub fn implies_changed(&self) -> bool {
        !matches!(self, Self::Changed)
    }
}

/// Event bus of one layer.
///
/// Clones share subscribers, which lets layer components (normalization,
/// color table) emit on their owner's bus.
#[derive(Debug, Clone, Default)]
pub struct LayerEvents {
    signal: Signal<LayerEvent>,
}

impl LayerEvents {
    /// Creates a bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for every event, including `Changed`.
    pub fn subscribe(&self, handler: impl FnMut(&LayerEvent) + 'static) -> SubscriptionId {
        self.signal.subscribe(handler)
    }

    /// Registers a handler for the aggregate `Changed` event only.
    pub fn on_changed(&self, mut handler: impl FnMut() + 'static) -> SubscriptionId {
        self.signal.subscribe(move |event| {
            if *event == LayerEvent::Changed {
                handler();
            }
        })
    }

    /// Removes a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.signal.unsubscribe(id)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }

    /// Dispatches `event`, then `Changed` if the event implies it.
    pub(crate) fn emit(&self, event: LayerEvent) {
        let implies_changed = event.implies_changed();
        self.signal.emit(&event);
        if implies_changed {
            self.signal.emit(&LayerEvent::Changed);
        }
    }

    /// Underlying signal, for attaching a [`voxstack_core::Recorder`].
    #[must_use]
    pub fn signal(&self) -> &Signal<LayerEvent> {
        &self.signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxstack_core::Recorder;

    #[test]
    fn test_specific_event_is_followed_by_changed() {
        let bus = LayerEvents::new();
        let recorder = Recorder::attach(bus.signal());
        bus.emit(LayerEvent::OpacityChanged(0.5));
        assert_eq!(
            recorder.take(),
            vec![LayerEvent::OpacityChanged(0.5), LayerEvent::Changed]
        );
    }

    #[test]
    fn test_on_changed_filters() {
        let bus = LayerEvents::new();
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let c = std::rc::Rc::clone(&count);
        bus.on_changed(move || c.set(c.get() + 1));
        bus.emit(LayerEvent::VisibleChanged(false));
        bus.emit(LayerEvent::ColorTableChanged);
        assert_eq!(count.get(), 2);
    }
}
