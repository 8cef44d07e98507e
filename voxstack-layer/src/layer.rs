//! Shared layer properties and the `Layer` capability trait.
//!
//! Every variant embeds one [`LayerProps`], which owns the properties all
//! layers have in common and the layer's [`LayerEvents`] bus. Setters are
//! the only write path. A setter called with the current value does
//! nothing; an actual change emits its specific event followed by one
//! `Changed`.

use std::fmt;

use voxstack_core::{Error, Result, SourceHandle};

use crate::{ColorTabled, LayerEvent, LayerEvents, LayerOptions, Normalizable};

/// Name given to layers that were never named.
pub const DEFAULT_LAYER_NAME: &str = "Unnamed Layer";

/// Screen rectangle of a rendered tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    #[must_use]
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Cumulative moving average of tile render times.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TileTiming {
    tiles: u64,
    average: f64,
}

impl TileTiming {
    /// Adds one measurement.
    ///
    /// Uses `avg += (t - avg) / k`, the incremental form of
    /// `avg_k = (t + (k - 1) * avg_{k-1}) / k`.
    #[allow(clippy::cast_precision_loss)]
    pub fn record(&mut self, time_sec: f64) {
        self.tiles = self.tiles.saturating_add(1);
        self.average += (time_sec - self.average) / self.tiles as f64;
    }

    /// Number of measured tiles.
    #[must_use]
    pub fn tiles(&self) -> u64 {
        self.tiles
    }

    /// Average seconds per tile, `0.0` before the first measurement.
    #[must_use]
    pub fn average(&self) -> f64 {
        self.average
    }
}

/// Properties shared by every layer variant.
#[derive(Debug)]
pub struct LayerProps {
    name: String,
    visible: bool,
    opacity: f64,
    channel: usize,
    number_of_channels: usize,
    layer_id: Option<String>,
    datasources: Vec<Option<SourceHandle>>,
    direct: bool,
    timing: TileTiming,
    tool_tip: String,
    events: LayerEvents,
}

impl LayerProps {
    /// Default properties over `datasources`.
    #[must_use]
    pub fn new(datasources: Vec<Option<SourceHandle>>, options: &LayerOptions) -> Self {
        Self {
            name: DEFAULT_LAYER_NAME.to_string(),
            visible: true,
            opacity: 1.0,
            channel: 0,
            number_of_channels: 1,
            layer_id: None,
            datasources,
            direct: options.direct,
            timing: TileTiming::default(),
            tool_tip: String::new(),
            events: LayerEvents::new(),
        }
    }

    /// The layer's event bus.
    #[must_use]
    pub fn events(&self) -> &LayerEvents {
        &self.events
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.name == name {
            return;
        }
        self.name.clone_from(&name);
        self.events.emit(LayerEvent::NameChanged(name));
    }

    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        self.events.emit(LayerEvent::VisibleChanged(visible));
    }

    pub fn toggle_visible(&mut self) {
        self.set_visible(!self.visible);
    }

    #[must_use]
    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Sets the opacity.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] if `opacity` is NaN or outside `[0, 1]`.
    #[allow(clippy::float_cmp)]
    pub fn set_opacity(&mut self, opacity: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(Error::invalid(format!(
                "opacity must be within [0, 1], got {opacity}"
            )));
        }
        if self.opacity == opacity {
            return Ok(());
        }
        self.opacity = opacity;
        self.events.emit(LayerEvent::OpacityChanged(opacity));
        Ok(())
    }

    #[must_use]
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Selects the displayed channel.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] if `channel >= number_of_channels`.
    pub fn set_channel(&mut self, channel: usize) -> Result<()> {
        if self.channel == channel {
            return Ok(());
        }
        if channel >= self.number_of_channels {
            return Err(Error::invalid(format!(
                "channel {channel} must be less than the number of channels ({})",
                self.number_of_channels
            )));
        }
        self.channel = channel;
        self.events.emit(LayerEvent::ChannelChanged(channel));
        Ok(())
    }

    #[must_use]
    pub fn number_of_channels(&self) -> usize {
        self.number_of_channels
    }

    /// Resizes the channel count, clamping the selected channel.
    ///
    /// Both fields are updated before any event is dispatched, so handlers
    /// never observe `channel >= number_of_channels`. If the channel moved,
    /// `ChannelChanged` is emitted before `NumberOfChannelsChanged`.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] if `n < 1`.
    pub fn set_number_of_channels(&mut self, n: usize) -> Result<()> {
        if n < 1 {
            return Err(Error::invalid(
                "number of channels must be greater or equal 1",
            ));
        }
        if self.number_of_channels == n {
            return Ok(());
        }
        let clamped = self.channel >= n;
        if clamped {
            self.channel = n - 1;
        }
        self.number_of_channels = n;
        if clamped {
            self.events.emit(LayerEvent::ChannelChanged(self.channel));
        }
        self.events.emit(LayerEvent::NumberOfChannelsChanged(n));
        Ok(())
    }

    /// Identifier within a stack; falls back to the name.
    #[must_use]
    pub fn layer_id(&self) -> &str {
        self.layer_id.as_deref().unwrap_or(&self.name)
    }

    /// Explicit id, if one was set.
    #[must_use]
    pub fn explicit_layer_id(&self) -> Option<&str> {
        self.layer_id.as_deref()
    }

    /// Sets an explicit id; `None` reverts to the name.
    pub fn set_layer_id(&mut self, id: Option<String>) {
        if self.layer_id == id {
            return;
        }
        self.layer_id.clone_from(&id);
        self.events.emit(LayerEvent::LayerIdChanged(id));
    }

    /// Datasources in slot order; `None` marks an empty slot.
    #[must_use]
    pub fn datasources(&self) -> &[Option<SourceHandle>] {
        &self.datasources
    }

    /// Whether per-tile timing is recorded.
    #[must_use]
    pub fn direct(&self) -> bool {
        self.direct
    }

    #[must_use]
    pub fn tool_tip(&self) -> &str {
        &self.tool_tip
    }

    pub fn set_tool_tip(&mut self, tip: impl Into<String>) {
        let tip = tip.into();
        if self.tool_tip != tip {
            self.tool_tip = tip;
        }
    }

    /// Reports that rendering `tile` took `time_sec` seconds.
    ///
    /// Ignored unless the layer was created with `direct` set.
    pub fn time_per_tile(&mut self, time_sec: f64, tile: TileRect) {
        if !self.direct {
            return;
        }
        self.timing.record(time_sec);
        log::trace!(
            "{}: tile {tile:?} took {time_sec}s (avg {})",
            self.layer_id(),
            self.timing.average()
        );
    }

    /// Average render time per tile; `None` unless `direct`.
    #[must_use]
    pub fn average_time_per_tile(&self) -> Option<f64> {
        self.direct.then_some(self.timing.average())
    }

    /// Timing statistics; `None` unless `direct`.
    #[must_use]
    pub fn tile_timing(&self) -> Option<&TileTiming> {
        self.direct.then_some(&self.timing)
    }
}

/// Capability set shared by all layer variants.
///
/// Optional capabilities are discovered through the `as_*` accessors so a
/// heterogeneous [`LayerStack`](crate::LayerStack) can reach them.
pub trait Layer: fmt::Debug {
    fn props(&self) -> &LayerProps;

    fn props_mut(&mut self) -> &mut LayerProps;

    /// Short variant name, e.g. `"grayscale"`.
    fn kind(&self) -> &'static str;

    /// Called when the user selects (`true`) or deselects the layer.
    fn set_active(&mut self, _active: bool) {}

    fn as_normalizable(&self) -> Option<&dyn Normalizable> {
        None
    }

    fn as_normalizable_mut(&mut self) -> Option<&mut dyn Normalizable> {
        None
    }

    fn as_color_tabled(&self) -> Option<&dyn ColorTabled> {
        None
    }

    fn as_color_tabled_mut(&mut self) -> Option<&mut dyn ColorTabled> {
        None
    }

    fn events(&self) -> &LayerEvents {
        self.props().events()
    }

    fn layer_id(&self) -> &str {
        self.props().layer_id()
    }
}

/// A layer with only the shared properties.
#[derive(Debug)]
pub struct PlainLayer {
    props: LayerProps,
}

impl PlainLayer {
    #[must_use]
    pub fn new(options: &LayerOptions) -> Self {
        Self::with_datasources(Vec::new(), options)
    }

    #[must_use]
    pub fn with_datasources(datasources: Vec<Option<SourceHandle>>, options: &LayerOptions) -> Self {
        Self {
            props: LayerProps::new(datasources, options),
        }
    }
}

impl Default for PlainLayer {
    fn default() -> Self {
        Self::new(&LayerOptions::default())
    }
}

impl Layer for PlainLayer {
    fn props(&self) -> &LayerProps {
        &self.props
    }

    fn props_mut(&mut self) -> &mut LayerProps {
        &mut self.props
    }

    fn kind(&self) -> &'static str {
        "plain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use voxstack_core::Recorder;

    fn recorded(layer: &PlainLayer) -> Recorder<LayerEvent> {
        Recorder::attach(layer.events().signal())
    }

    #[test]
    fn test_default_state() {
        let layer = PlainLayer::default();
        let p = layer.props();
        assert!(p.visible());
        assert_relative_eq!(p.opacity(), 1.0);
        assert_eq!(p.channel(), 0);
        assert_eq!(p.number_of_channels(), 1);
        assert_eq!(p.name(), DEFAULT_LAYER_NAME);
        assert_eq!(p.layer_id(), DEFAULT_LAYER_NAME);
        assert!(p.datasources().is_empty());
        assert_eq!(p.tool_tip(), "");
    }

    #[test]
    fn test_visible_then_changed() {
        let mut layer = PlainLayer::default();
        let rec = recorded(&layer);
        layer.props_mut().set_visible(false);
        assert_eq!(
            rec.take(),
            vec![LayerEvent::VisibleChanged(false), LayerEvent::Changed]
        );
        layer.props_mut().toggle_visible();
        assert!(layer.props().visible());
    }

    #[test]
    fn test_setters_are_idempotent() {
        let mut layer = PlainLayer::default();
        let rec = recorded(&layer);
        let p = layer.props_mut();
        p.set_visible(true);
        p.set_opacity(1.0).unwrap();
        p.set_name(DEFAULT_LAYER_NAME);
        p.set_channel(0).unwrap();
        p.set_number_of_channels(1).unwrap();
        p.set_tool_tip("");
        assert!(rec.is_empty());
    }

    #[test]
    fn test_opacity_validation() {
        let mut layer = PlainLayer::default();
        let rec = recorded(&layer);
        assert!(matches!(
            layer.props_mut().set_opacity(1.5),
            Err(Error::InvalidArgument(_))
        ));
        assert!(layer.props_mut().set_opacity(f64::NAN).is_err());
        assert!(rec.is_empty());
        layer.props_mut().set_opacity(0.25).unwrap();
        assert_eq!(
            rec.take(),
            vec![LayerEvent::OpacityChanged(0.25), LayerEvent::Changed]
        );
    }

    #[test]
    fn test_channel_bounds() {
        let mut layer = PlainLayer::default();
        assert!(matches!(
            layer.props_mut().set_channel(1),
            Err(Error::InvalidArgument(_))
        ));
        layer.props_mut().set_number_of_channels(3).unwrap();
        layer.props_mut().set_channel(2).unwrap();
        assert_eq!(layer.props().channel(), 2);
    }

    #[test]
    fn test_shrinking_channels_clamps_atomically() {
        let mut layer = PlainLayer::default();
        layer.props_mut().set_number_of_channels(5).unwrap();
        layer.props_mut().set_channel(4).unwrap();

        let rec = recorded(&layer);
        layer.props_mut().set_number_of_channels(2).unwrap();
        assert_eq!(layer.props().channel(), 1);
        assert_eq!(
            rec.take(),
            vec![
                LayerEvent::ChannelChanged(1),
                LayerEvent::Changed,
                LayerEvent::NumberOfChannelsChanged(2),
                LayerEvent::Changed,
            ]
        );
    }

    #[test]
    fn test_zero_channels_rejected() {
        let mut layer = PlainLayer::default();
        layer.props_mut().set_number_of_channels(3).unwrap();
        layer.props_mut().set_channel(2).unwrap();
        let rec = recorded(&layer);
        assert!(matches!(
            layer.props_mut().set_number_of_channels(0),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(layer.props().number_of_channels(), 3);
        assert_eq!(layer.props().channel(), 2);
        assert!(rec.is_empty());
    }

    #[test]
    fn test_layer_id_falls_back_to_name() {
        let mut layer = PlainLayer::default();
        layer.props_mut().set_name("raw");
        assert_eq!(layer.layer_id(), "raw");
        layer.props_mut().set_layer_id(Some("raw#1".into()));
        assert_eq!(layer.layer_id(), "raw#1");
        layer.props_mut().set_layer_id(None);
        assert_eq!(layer.layer_id(), "raw");
    }

    #[test]
    fn test_set_layer_id_notifies_once() {
        let mut layer = PlainLayer::default();
        let rec = recorded(&layer);
        layer.props_mut().set_layer_id(Some("fixed".into()));
        layer.props_mut().set_layer_id(Some("fixed".into()));
        assert_eq!(layer.props().explicit_layer_id(), Some("fixed"));
        assert_eq!(
            rec.take(),
            vec![
                LayerEvent::LayerIdChanged(Some("fixed".into())),
                LayerEvent::Changed
            ]
        );
    }

    #[test]
    fn test_tile_timing_requires_direct() {
        let mut layer = PlainLayer::default();
        layer.props_mut().time_per_tile(0.5, TileRect::new(0, 0, 256, 256));
        assert_eq!(layer.props().average_time_per_tile(), None);

        let mut direct = PlainLayer::new(&LayerOptions::new().with_direct(true));
        let tile = TileRect::new(0, 0, 256, 256);
        direct.props_mut().time_per_tile(1.0, tile);
        direct.props_mut().time_per_tile(2.0, tile);
        direct.props_mut().time_per_tile(6.0, tile);
        assert_relative_eq!(direct.props().average_time_per_tile().unwrap(), 3.0);
        assert_eq!(direct.props().tile_timing().unwrap().tiles(), 3);
    }

    #[test]
    fn test_tile_timing_million_samples() {
        let mut timing = TileTiming::default();
        for i in 0..1_000_000u32 {
            timing.record(if i % 2 == 0 { 0.01 } else { 0.03 });
        }
        assert_eq!(timing.tiles(), 1_000_000);
        assert_relative_eq!(timing.average(), 0.02, epsilon = 1e-9);
    }
}
