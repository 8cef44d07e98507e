//! Ordered collection of layers with selection.

use std::ops::{Deref, DerefMut};

use voxstack_core::{Error, Result, Signal, SubscriptionId};

use crate::layer::Layer;
use crate::sampler::{BoundsSampler, SampleResult};
use crate::LayerEvent;

/// Routing key for background samples: `(member key, slot)`.
///
/// Member keys are assigned by the stack on insertion and never reused, so
/// a result reaches the layer that requested it even if ids change while
/// the sample is in flight.
pub type SampleKey = (u64, usize);

/// Structural and forwarded notifications of a [`LayerStack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEvent {
    Inserted { index: usize, id: String },
    Removed { index: usize, id: String },
    Moved { from: usize, to: usize, id: String },
    SelectionChanged {
        previous: Option<usize>,
        current: Option<usize>,
    },
    /// A member layer emitted `Changed`.
    LayerChanged { id: String },
}

#[derive(Debug)]
struct Entry {
    key: u64,
    layer: Box<dyn Layer>,
    forward: SubscriptionId,
}

/// Layers in display order, unique by layer id, with at most one selected.
///
/// Every member's `Changed` event is re-published as
/// [`StackEvent::LayerChanged`]. Selecting a layer calls
/// [`Layer::set_active`] on the previous and the new selection.
#[derive(Debug, Default)]
pub struct LayerStack {
    entries: Vec<Entry>,
    selected: Option<usize>,
    next_key: u64,
    events: Signal<StackEvent>,
}

impl LayerStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn subscribe(&self, handler: impl FnMut(&StackEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Underlying signal, for attaching a [`voxstack_core::Recorder`].
    #[must_use]
    pub fn signal(&self) -> &Signal<StackEvent> {
        &self.events
    }

    fn out_of_range(&self, index: usize) -> Error {
        Error::IndexOutOfRange {
            index,
            len: self.entries.len(),
        }
    }

    /// True if a member other than `index` has id `id`.
    fn clashes(&self, index: usize, id: &str) -> bool {
        self.entries
            .iter()
            .enumerate()
            .any(|(i, e)| i != index && e.layer.layer_id() == id)
    }

    /// Subscribes a forwarder that re-publishes the layer's `Changed` under
    /// its current id.
    fn forward(&self, layer: &dyn Layer) -> SubscriptionId {
        let props = layer.props();
        let mut name = props.name().to_string();
        let mut explicit = props.explicit_layer_id().map(str::to_string);
        let stack = self.events.clone();
        layer.events().subscribe(move |event| match event {
            LayerEvent::NameChanged(n) => n.clone_into(&mut name),
            LayerEvent::LayerIdChanged(id) => explicit.clone_from(id),
            LayerEvent::Changed => stack.emit(&StackEvent::LayerChanged {
                id: explicit.clone().unwrap_or_else(|| name.clone()),
            }),
            _ => {}
        })
    }

    /// Inserts `layer` at `index`; later layers shift down.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] if `index > len`, [`Error::DuplicateLayer`]
    /// if a member already has the same id.
    pub fn insert(&mut self, index: usize, layer: Box<dyn Layer>) -> Result<()> {
        if index > self.entries.len() {
            return Err(self.out_of_range(index));
        }
        let id = layer.layer_id().to_string();
        if self.find(&id).is_some() {
            return Err(Error::DuplicateLayer(id));
        }
        let forward = self.forward(layer.as_ref());
        let key = self.next_key;
        self.next_key += 1;
        self.entries.insert(
            index,
            Entry {
                key,
                layer,
                forward,
            },
        );
        if let Some(sel) = self.selected.as_mut() {
            if *sel >= index {
                *sel += 1;
            }
        }
        log::debug!("inserted layer '{id}' at {index}");
        self.events.emit(&StackEvent::Inserted { index, id });
        Ok(())
    }

    /// Inserts `layer` at the bottom.
    ///
    /// # Errors
    /// [`Error::DuplicateLayer`] if a member already has the same id.
    pub fn append(&mut self, layer: Box<dyn Layer>) -> Result<()> {
        self.insert(self.entries.len(), layer)
    }

    /// Removes and returns the layer at `index`, deactivating it if selected.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] if `index >= len`.
    pub fn remove(&mut self, index: usize) -> Result<Box<dyn Layer>> {
        if index >= self.entries.len() {
            return Err(self.out_of_range(index));
        }
        let Entry {
            mut layer, forward, ..
        } = self.entries.remove(index);
        layer.events().unsubscribe(forward);
        let was_selected = self.selected == Some(index);
        match self.selected {
            Some(sel) if sel == index => {
                layer.set_active(false);
                self.selected = None;
            }
            Some(sel) if sel > index => self.selected = Some(sel - 1),
            _ => {}
        }
        let id = layer.layer_id().to_string();
        log::debug!("removed layer '{id}' from {index}");
        self.events.emit(&StackEvent::Removed { index, id });
        if was_selected {
            self.events.emit(&StackEvent::SelectionChanged {
                previous: Some(index),
                current: None,
            });
        }
        Ok(layer)
    }

    /// Moves the layer at `from` to position `to`; the selection follows
    /// the layer it refers to.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] if either index is `>= len`.
    pub fn move_layer(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.entries.len();
        if from >= len {
            return Err(self.out_of_range(from));
        }
        if to >= len {
            return Err(self.out_of_range(to));
        }
        if from == to {
            return Ok(());
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        if let Some(sel) = self.selected {
            self.selected = Some(if sel == from {
                to
            } else if from < sel && sel <= to {
                sel - 1
            } else if to <= sel && sel < from {
                sel + 1
            } else {
                sel
            });
        }
        let id = self.entries[to].layer.layer_id().to_string();
        self.events.emit(&StackEvent::Moved { from, to, id });
        Ok(())
    }

    /// Changes the selection, deactivating the old and activating the new
    /// layer. Selecting the current selection does nothing.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] if `index` is `Some` and `>= len`.
    pub fn select(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(i) = index {
            if i >= self.entries.len() {
                return Err(self.out_of_range(i));
            }
        }
        let previous = self.selected;
        if previous == index {
            return Ok(());
        }
        if let Some(p) = previous {
            self.entries[p].layer.set_active(false);
        }
        self.selected = index;
        if let Some(i) = index {
            self.entries[i].layer.set_active(true);
        }
        self.events.emit(&StackEvent::SelectionChanged {
            previous,
            current: index,
        });
        Ok(())
    }

    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn selected_layer(&self) -> Option<&dyn Layer> {
        self.selected.and_then(|i| self.get(i))
    }

    /// Position of the layer with `id`.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.layer.layer_id() == id)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&dyn Layer> {
        self.entries.get(index).map(|e| e.layer.as_ref())
    }

    /// Mutable access to a member.
    ///
    /// If the layer's id ends up equal to another member's when the guard
    /// drops, its name and explicit id are restored. Use [`Self::rename`] or
    /// [`Self::set_layer_id`] to get the clash reported as an error instead.
    pub fn get_mut(&mut self, index: usize) -> Option<LayerMut<'_>> {
        let props = self.entries.get(index)?.layer.props();
        let name = props.name().to_string();
        let explicit = props.explicit_layer_id().map(str::to_string);
        Some(LayerMut {
            stack: self,
            index,
            name,
            explicit,
        })
    }

    /// Renames the layer at `index`.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] if `index >= len`, [`Error::DuplicateLayer`]
    /// if the id follows the name and another member already has it.
    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let Some(entry) = self.entries.get(index) else {
            return Err(self.out_of_range(index));
        };
        if entry.layer.props().explicit_layer_id().is_none() && self.clashes(index, &name) {
            return Err(Error::DuplicateLayer(name));
        }
        self.entries[index].layer.props_mut().set_name(name);
        Ok(())
    }

    /// Sets or clears the explicit id of the layer at `index`.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] if `index >= len`, [`Error::DuplicateLayer`]
    /// if the resulting id belongs to another member.
    pub fn set_layer_id(&mut self, index: usize, id: Option<String>) -> Result<()> {
        let Some(entry) = self.entries.get(index) else {
            return Err(self.out_of_range(index));
        };
        let effective = id.as_deref().unwrap_or(entry.layer.props().name());
        if self.clashes(index, effective) {
            return Err(Error::DuplicateLayer(effective.to_string()));
        }
        self.entries[index].layer.props_mut().set_layer_id(id);
        Ok(())
    }

    /// Layers from top to bottom.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Layer> {
        self.entries.iter().map(|e| e.layer.as_ref())
    }

    /// Samples every stale slot of every normalizable member on the
    /// calling thread.
    ///
    /// # Errors
    /// The first sampling error; all layers are still refreshed.
    pub fn refresh_bounds(&mut self) -> Result<()> {
        let mut first = None;
        for entry in &mut self.entries {
            if let Some(layer) = entry.layer.as_normalizable_mut() {
                if let Err(e) = layer.refresh_bounds() {
                    first.get_or_insert(e);
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Submits every stale slot to `sampler`; returns the number submitted.
    pub fn request_bounds(&mut self, sampler: &mut BoundsSampler<SampleKey>) -> usize {
        let mut submitted = 0;
        for entry in &mut self.entries {
            if let Some(layer) = entry.layer.as_normalizable_mut() {
                for (slot, request) in layer.normalization_mut().request_samples() {
                    sampler.submit((entry.key, slot), request);
                    submitted += 1;
                }
            }
        }
        submitted
    }

    /// Hands sampler results back to their layers. Results for layers no
    /// longer in the stack are discarded.
    ///
    /// # Errors
    /// The first sampling error; all results are still applied.
    pub fn apply_bounds(&mut self, results: Vec<SampleResult<SampleKey>>) -> Result<()> {
        let mut first = None;
        for SampleResult {
            key: (key, slot),
            ticket,
            generation,
            result,
            ..
        } in results
        {
            let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) else {
                log::warn!("discarding bounds sample for removed layer #{key}");
                continue;
            };
            let Some(layer) = entry.layer.as_normalizable_mut() else {
                continue;
            };
            if let Err(e) = layer
                .normalization_mut()
                .apply_sample(slot, ticket, generation, result)
            {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

/// Mutable handle to a stack member, returned by [`LayerStack::get_mut`].
#[derive(Debug)]
pub struct LayerMut<'a> {
    stack: &'a mut LayerStack,
    index: usize,
    name: String,
    explicit: Option<String>,
}

impl Deref for LayerMut<'_> {
    type Target = dyn Layer;

    fn deref(&self) -> &Self::Target {
        self.stack.entries[self.index].layer.as_ref()
    }
}

impl DerefMut for LayerMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stack.entries[self.index].layer.as_mut()
    }
}

impl Drop for LayerMut<'_> {
    fn drop(&mut self) {
        let id = self.stack.entries[self.index].layer.layer_id().to_string();
        if !self.stack.clashes(self.index, &id) {
            return;
        }
        log::warn!("layer id '{id}' is taken by another member; restoring '{}'", self.name);
        let props = self.stack.entries[self.index].layer.props_mut();
        props.set_layer_id(self.explicit.take());
        props.set_name(std::mem::take(&mut self.name));
    }
}
