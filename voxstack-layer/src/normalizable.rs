//! Per-slot normalization of layers backed by data sources.

use voxstack_core::{Error, Result, SourceHandle, ValueRange};

use crate::bounds::{BoundsTracker, SampleRequest, SampleTicket};
use crate::layer::{Layer, LayerProps};
use crate::normalize::{Mode, NormalizationPolicy, Normalize};
use crate::{LayerEvent, LayerEvents, LayerOptions};

/// Variant-specific construction defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlotDefaults {
    /// Normalization used when the options leave a slot unset.
    pub normalize: Normalize,
    /// Display range used when the options leave a slot unset; falls back
    /// to the element type's default range.
    pub display: Option<ValueRange>,
}

#[derive(Debug)]
struct Slot {
    tracker: Option<BoundsTracker>,
    policy: NormalizationPolicy,
    /// False while the slot was built with [`Normalize::Off`].
    enabled: bool,
}

/// Normalization state of every datasource slot of one layer.
///
/// Owns one [`BoundsTracker`] per present source and one
/// [`NormalizationPolicy`] per slot. Mutations emit `NormalizeChanged` or
/// `RangeChanged` (each followed by `Changed`) on the owning layer's bus.
#[derive(Debug)]
pub struct Normalization {
    slots: Vec<Slot>,
    events: LayerEvents,
}

impl Normalization {
    /// Builds the slots for `datasources` without sampling them.
    ///
    /// # Errors
    /// [`Error::PreconditionViolation`] if a source cannot report bounds.
    pub fn new(
        datasources: &[Option<SourceHandle>],
        options: &LayerOptions,
        defaults: SlotDefaults,
        events: LayerEvents,
    ) -> Result<Self> {
        let mut slots = Vec::with_capacity(datasources.len());
        for (i, source) in datasources.iter().enumerate() {
            let initial = match source {
                Some(src) => {
                    if !src.capabilities().bounds {
                        return Err(Error::PreconditionViolation(format!(
                            "datasource {i} cannot report bounds"
                        )));
                    }
                    src.element_type().default_range()
                }
                None => ValueRange::unit(),
            };
            let display = options
                .range_for(i)
                .or(defaults.display)
                .unwrap_or(initial);
            let normalize = options.normalize_for(i).unwrap_or(defaults.normalize);
            let (policy, enabled) = match normalize {
                Normalize::Auto => (NormalizationPolicy::auto(initial, display), true),
                Normalize::Manual(range) => (NormalizationPolicy::manual(range, display), true),
                Normalize::Off => (NormalizationPolicy::manual(initial, display), false),
            };
            slots.push(Slot {
                tracker: source.clone().map(BoundsTracker::new),
                policy,
                enabled,
            });
        }
        Ok(Self { slots, events })
    }

    /// Number of datasource slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, slot: usize) -> Result<&Slot> {
        self.slots.get(slot).ok_or(Error::IndexOutOfRange {
            index: slot,
            len: self.slots.len(),
        })
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut Slot> {
        let len = self.slots.len();
        self.slots
            .get_mut(slot)
            .ok_or(Error::IndexOutOfRange { index: slot, len })
    }

    /// Active normalization range, `None` while normalization is off.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] for an unknown slot.
    pub fn normalize(&self, slot: usize) -> Result<Option<ValueRange>> {
        let s = self.slot(slot)?;
        Ok(s.enabled.then(|| s.policy.active_range()))
    }

    /// Current mode of `slot`. A slot with normalization off reports `Manual`.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] for an unknown slot.
    pub fn mode(&self, slot: usize) -> Result<Mode> {
        Ok(self.slot(slot)?.policy.mode())
    }

    /// Display (slider) range of `slot`.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] for an unknown slot.
    pub fn range(&self, slot: usize) -> Result<ValueRange> {
        Ok(self.slot(slot)?.policy.display_range())
    }

    /// Bounds tracker of `slot`, `None` for an empty slot.
    #[must_use]
    pub fn tracker(&self, slot: usize) -> Option<&BoundsTracker> {
        self.slots.get(slot).and_then(|s| s.tracker.as_ref())
    }

    /// Sets the display range of `slot`.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] for an unknown slot.
    pub fn set_range(&mut self, slot: usize, range: ValueRange) -> Result<()> {
        if self.slot_mut(slot)?.policy.set_display_range(range) {
            self.events.emit(LayerEvent::RangeChanged { slot, range });
        }
        Ok(())
    }

    /// Fixes the range of `slot` (`Some`) or returns it to auto mode (`None`).
    ///
    /// Switching to auto adopts the tracker's bounds, sampling the source if
    /// the cache is stale. If that sample fails the slot still switches to
    /// auto with the last known bounds and the sampling error is returned.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] for an unknown slot, or the sampling error.
    pub fn set_normalize(&mut self, slot: usize, range: Option<ValueRange>) -> Result<()> {
        let s = self.slot_mut(slot)?;
        let was_enabled = s.enabled;
        let mut sample_error = None;
        let changed = match range {
            Some(range) => s.policy.set_manual(range),
            None => {
                let bounds = match s.tracker.as_mut() {
                    Some(tracker) => match tracker.sample() {
                        Ok(bounds) => Some(bounds),
                        Err(e) => {
                            let cached = tracker.cached_bounds();
                            sample_error = Some(e);
                            cached
                        }
                    },
                    None => None,
                };
                s.policy.set_auto(bounds)
            }
        };
        s.enabled = true;
        let mode = s.policy.mode();
        let active = s.policy.active_range();
        if changed || !was_enabled {
            log::debug!("slot {slot}: normalize {mode:?} {active}");
            self.events.emit(LayerEvent::NormalizeChanged {
                slot,
                range: active,
            });
        }
        sample_error.map_or(Ok(()), Err)
    }

    /// Feeds new observed bounds of `slot` into its policy.
    fn on_bounds_changed(&mut self, slot: usize, bounds: ValueRange) {
        let Some(s) = self.slots.get_mut(slot) else {
            return;
        };
        if s.policy.on_bounds_changed(bounds) && s.enabled {
            self.events
                .emit(LayerEvent::NormalizeChanged { slot, range: bounds });
        }
    }

    /// Samples `slot` if its cache is stale and applies changed bounds.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] for an unknown slot, or the sampling error.
    /// The active range is unchanged on error.
    pub fn refresh_bounds(&mut self, slot: usize) -> Result<()> {
        let changed = match self.slot_mut(slot)?.tracker.as_mut() {
            Some(tracker) => tracker.refresh()?,
            None => None,
        };
        if let Some(bounds) = changed {
            self.on_bounds_changed(slot, bounds);
        }
        Ok(())
    }

    /// Refreshes every slot; returns the first error after trying all.
    ///
    /// # Errors
    /// The first sampling error encountered.
    pub fn refresh_all(&mut self) -> Result<()> {
        let mut first = None;
        for slot in 0..self.slots.len() {
            if let Err(e) = self.refresh_bounds(slot) {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Marks the source of `slot` as possibly changed.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] for an unknown slot.
    pub fn mark_dirty(&mut self, slot: usize) -> Result<()> {
        if let Some(tracker) = self.slot_mut(slot)?.tracker.as_mut() {
            tracker.mark_dirty();
        }
        Ok(())
    }

    /// Issues sample requests for every stale slot.
    pub fn request_samples(&mut self) -> Vec<(usize, SampleRequest)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| {
                let tracker = s.tracker.as_mut()?;
                tracker.is_stale().then(|| (i, tracker.begin_sample()))
            })
            .collect()
    }

    /// Applies the result of a request returned by
    /// [`request_samples`](Self::request_samples).
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] for an unknown slot, or the sampling error.
    pub fn apply_sample(
        &mut self,
        slot: usize,
        ticket: SampleTicket,
        generation: u64,
        result: Result<ValueRange>,
    ) -> Result<()> {
        let changed = match self.slot_mut(slot)?.tracker.as_mut() {
            Some(tracker) => tracker.complete(ticket, generation, result)?,
            None => None,
        };
        if let Some(bounds) = changed {
            self.on_bounds_changed(slot, bounds);
        }
        Ok(())
    }
}

/// Layers whose datasource values are normalized before display.
pub trait Normalizable: Layer {
    fn normalization(&self) -> &Normalization;

    fn normalization_mut(&mut self) -> &mut Normalization;

    /// See [`Normalization::set_normalize`].
    ///
    /// # Errors
    /// As [`Normalization::set_normalize`].
    fn set_normalize(&mut self, slot: usize, range: Option<ValueRange>) -> Result<()> {
        self.normalization_mut().set_normalize(slot, range)
    }

    /// See [`Normalization::set_range`].
    ///
    /// # Errors
    /// As [`Normalization::set_range`].
    fn set_range(&mut self, slot: usize, range: ValueRange) -> Result<()> {
        self.normalization_mut().set_range(slot, range)
    }

    /// Samples all stale slots.
    ///
    /// # Errors
    /// The first sampling error.
    fn refresh_bounds(&mut self) -> Result<()> {
        self.normalization_mut().refresh_all()
    }
}

/// A layer normalizing one or more data sources.
///
/// [`NormalizableLayer::grayscale`] is the single-source form.
#[derive(Debug)]
pub struct NormalizableLayer {
    props: LayerProps,
    normalization: Normalization,
    kind: &'static str,
}

impl NormalizableLayer {
    /// Creates a layer over `datasources`.
    ///
    /// # Errors
    /// [`Error::PreconditionViolation`] if a source cannot report bounds.
    pub fn new(datasources: Vec<Option<SourceHandle>>, options: &LayerOptions) -> Result<Self> {
        Self::with_defaults(datasources, options, SlotDefaults::default(), "normalizable")
    }

    /// Creates a single-source grayscale layer.
    ///
    /// # Errors
    /// [`Error::PreconditionViolation`] if the source cannot report bounds.
    pub fn grayscale(source: SourceHandle, options: &LayerOptions) -> Result<Self> {
        Self::with_defaults(
            vec![Some(source)],
            options,
            SlotDefaults::default(),
            "grayscale",
        )
    }

    pub(crate) fn with_defaults(
        datasources: Vec<Option<SourceHandle>>,
        options: &LayerOptions,
        defaults: SlotDefaults,
        kind: &'static str,
    ) -> Result<Self> {
        let props = LayerProps::new(datasources, options);
        let normalization = Normalization::new(
            props.datasources(),
            options,
            defaults,
            props.events().clone(),
        )?;
        Ok(Self {
            props,
            normalization,
            kind,
        })
    }
}

impl Layer for NormalizableLayer {
    fn props(&self) -> &LayerProps {
        &self.props
    }

    fn props_mut(&mut self) -> &mut LayerProps {
        &mut self.props
    }

    fn kind(&self) -> &'static str {
        self.kind
    }

    fn as_normalizable(&self) -> Option<&dyn Normalizable> {
        Some(self)
    }

    fn as_normalizable_mut(&mut self) -> Option<&mut dyn Normalizable> {
        Some(self)
    }
}

impl Normalizable for NormalizableLayer {
    fn normalization(&self) -> &Normalization {
        &self.normalization
    }

    fn normalization_mut(&mut self) -> &mut Normalization {
        &mut self.normalization
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array5;
    use std::sync::Arc;
    use voxstack_core::{
        ArraySource, Capabilities, DataSource, ElementType, Recorder, Roi, Shape5,
    };

    fn range(lo: f64, hi: f64) -> ValueRange {
        ValueRange::new(lo, hi).unwrap()
    }

    fn u8_source(values: Vec<f64>) -> Arc<ArraySource> {
        let n = values.len();
        Arc::new(ArraySource::from_vec(ElementType::U8, Shape5::new(1, n, 1, 1, 1), values).unwrap())
    }

    #[derive(Debug)]
    struct Opaque;

    impl DataSource for Opaque {
        fn element_type(&self) -> ElementType {
            ElementType::U8
        }
        fn shape(&self) -> Shape5 {
            Shape5::new(1, 1, 1, 1, 1)
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                bounds: false,
                read: true,
            }
        }
        fn sample_bounds(&self) -> Result<ValueRange> {
            Err(Error::SourceUnavailable("opaque".into()))
        }
        fn read(&self, _roi: &Roi) -> Result<Array5<f64>> {
            Ok(Array5::zeros((1, 1, 1, 1, 1)))
        }
    }

    #[test]
    fn test_defaults_by_element_type() {
        let src = u8_source(vec![2.0, 250.0]);
        let layer = NormalizableLayer::grayscale(src, &LayerOptions::default()).unwrap();
        let n = layer.normalization();
        assert_eq!(n.mode(0).unwrap(), Mode::Auto);
        assert_eq!(n.normalize(0).unwrap(), Some(range(0.0, 255.0)));
        assert_eq!(n.range(0).unwrap(), range(0.0, 255.0));
    }

    #[test]
    fn test_empty_slot_uses_unit_range() {
        let layer = NormalizableLayer::new(vec![None], &LayerOptions::default()).unwrap();
        assert_eq!(layer.normalization().normalize(0).unwrap(), Some(ValueRange::unit()));
        assert!(layer.normalization().tracker(0).is_none());
    }

    #[test]
    fn test_missing_bounds_capability_rejected() {
        let src: SourceHandle = Arc::new(Opaque);
        let err = NormalizableLayer::grayscale(src, &LayerOptions::default()).unwrap_err();
        assert!(matches!(err, Error::PreconditionViolation(_)));
    }

    #[test]
    fn test_refresh_follows_bounds_once() {
        let src = u8_source(vec![2.0, 250.0]);
        let mut layer = NormalizableLayer::grayscale(src.clone(), &LayerOptions::default()).unwrap();
        let rec = Recorder::attach(layer.events().signal());

        layer.refresh_bounds().unwrap();
        src.mark_dirty();
        layer.refresh_bounds().unwrap();

        assert_eq!(
            rec.take(),
            vec![
                LayerEvent::NormalizeChanged {
                    slot: 0,
                    range: range(2.0, 250.0)
                },
                LayerEvent::Changed,
            ]
        );
    }

    #[test]
    fn test_manual_ignores_bounds() {
        let src = u8_source(vec![0.0, 99.0]);
        let opts = LayerOptions::new().with_normalize(0, Normalize::Manual(range(10.0, 20.0)));
        let mut layer = NormalizableLayer::grayscale(src, &opts).unwrap();
        let rec = Recorder::attach(layer.events().signal());
        layer.refresh_bounds().unwrap();
        assert!(rec.is_empty());
        assert_eq!(layer.normalization().normalize(0).unwrap(), Some(range(10.0, 20.0)));
    }

    #[test]
    fn test_set_normalize_round_trip() {
        let src = u8_source(vec![3.0, 7.0]);
        let mut layer = NormalizableLayer::grayscale(src, &LayerOptions::default()).unwrap();
        layer.set_normalize(0, Some(range(1.0, 2.0))).unwrap();
        assert_eq!(layer.normalization().mode(0).unwrap(), Mode::Manual);

        let rec = Recorder::attach(layer.events().signal());
        layer.set_normalize(0, Some(range(1.0, 2.0))).unwrap();
        assert!(rec.is_empty());

        layer.set_normalize(0, None).unwrap();
        assert_eq!(layer.normalization().mode(0).unwrap(), Mode::Auto);
        assert_eq!(layer.normalization().normalize(0).unwrap(), Some(range(3.0, 7.0)));
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn test_off_until_enabled() {
        let src = u8_source(vec![3.0, 7.0]);
        let opts = LayerOptions::new().with_normalize(0, Normalize::Off);
        let mut layer = NormalizableLayer::grayscale(src, &opts).unwrap();
        layer.refresh_bounds().unwrap();
        assert_eq!(layer.normalization().normalize(0).unwrap(), None);

        let rec = Recorder::attach(layer.events().signal());
        layer.set_normalize(0, None).unwrap();
        assert_eq!(layer.normalization().normalize(0).unwrap(), Some(range(3.0, 7.0)));
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn test_failed_auto_switch_commits_last_known() {
        let src = u8_source(vec![3.0, 7.0]);
        let opts = LayerOptions::new().with_normalize(0, Normalize::Manual(range(0.0, 1.0)));
        let mut layer = NormalizableLayer::grayscale(src.clone(), &opts).unwrap();
        src.replace_data(Array5::from_elem((1, 0, 1, 1, 1), 0.0)).unwrap();

        let err = layer.set_normalize(0, None).unwrap_err();
        assert_eq!(err, Error::EmptySource);
        assert_eq!(layer.normalization().mode(0).unwrap(), Mode::Auto);
        assert_eq!(layer.normalization().normalize(0).unwrap(), Some(range(0.0, 1.0)));
    }

    #[test]
    fn test_set_range_emits_once() {
        let src = u8_source(vec![0.0]);
        let mut layer = NormalizableLayer::grayscale(src, &LayerOptions::default()).unwrap();
        let rec = Recorder::attach(layer.events().signal());
        layer.set_range(0, range(0.0, 100.0)).unwrap();
        layer.set_range(0, range(0.0, 100.0)).unwrap();
        assert_eq!(
            rec.take(),
            vec![
                LayerEvent::RangeChanged {
                    slot: 0,
                    range: range(0.0, 100.0)
                },
                LayerEvent::Changed,
            ]
        );
    }

    #[test]
    fn test_unknown_slot() {
        let mut layer = NormalizableLayer::new(vec![None], &LayerOptions::default()).unwrap();
        assert_eq!(
            layer.set_range(3, ValueRange::unit()).unwrap_err(),
            Error::IndexOutOfRange { index: 3, len: 1 }
        );
    }

    #[test]
    fn test_deferred_samples_apply_in_ticket_order() {
        let src = u8_source(vec![1.0, 5.0]);
        let mut layer = NormalizableLayer::grayscale(src, &LayerOptions::default()).unwrap();
        let requests = layer.normalization_mut().request_samples();
        assert_eq!(requests.len(), 1);
        let (slot, req) = &requests[0];
        let result = req.run();
        layer
            .normalization_mut()
            .apply_sample(*slot, req.ticket, req.generation, result)
            .unwrap();
        assert_eq!(layer.normalization().normalize(0).unwrap(), Some(range(1.0, 5.0)));
        assert!(layer.normalization_mut().request_samples().is_empty());
    }
}
