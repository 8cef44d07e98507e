//! Layer composing up to four single-channel sources into RGBA.

use std::fmt;
use std::str::FromStr;

use ndarray::Array5;
use voxstack_core::{Error, Result, Roi, SourceHandle};

use crate::layer::{Layer, LayerProps};
use crate::normalizable::{Normalizable, NormalizableLayer, Normalization, SlotDefaults};
use crate::LayerOptions;

/// Output channel of an [`RgbaLayer`], also its datasource slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RgbaChannel {
    Red = 0,
    Green = 1,
    Blue = 2,
    Alpha = 3,
}

impl RgbaChannel {
    pub const ALL: [Self; 4] = [Self::Red, Self::Green, Self::Blue, Self::Alpha];

    /// Datasource slot of the channel.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Alpha => "alpha",
        }
    }
}

impl fmt::Display for RgbaChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RgbaChannel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid(format!("unknown RGBA channel '{s}'")))
    }
}

/// Layer with optional red, green, blue and alpha sources.
///
/// Each present channel is normalized independently. Reading an absent
/// channel yields a constant block of the configured missing value.
#[derive(Debug)]
pub struct RgbaLayer {
    base: NormalizableLayer,
    color_missing_value: i64,
    alpha_missing_value: i64,
}

impl RgbaLayer {
    /// # Errors
    /// [`Error::PreconditionViolation`] if a present source cannot report bounds.
    pub fn new(channels: [Option<SourceHandle>; 4], options: &LayerOptions) -> Result<Self> {
        Ok(Self {
            base: NormalizableLayer::with_defaults(
                channels.into(),
                options,
                SlotDefaults::default(),
                "rgba",
            )?,
            color_missing_value: options.color_missing_value,
            alpha_missing_value: options.alpha_missing_value,
        })
    }

    #[must_use]
    pub fn color_missing_value(&self) -> i64 {
        self.color_missing_value
    }

    #[must_use]
    pub fn alpha_missing_value(&self) -> i64 {
        self.alpha_missing_value
    }

    /// Fill value used when `channel` has no source.
    #[must_use]
    pub fn missing_value(&self, channel: RgbaChannel) -> i64 {
        match channel {
            RgbaChannel::Alpha => self.alpha_missing_value,
            _ => self.color_missing_value,
        }
    }

    /// Source of `channel`, if present.
    #[must_use]
    pub fn source(&self, channel: RgbaChannel) -> Option<&SourceHandle> {
        self.props()
            .datasources()
            .get(channel.index())
            .and_then(Option::as_ref)
    }

    /// Reads `roi` from `channel`, or fills it with the missing value.
    ///
    /// # Errors
    /// Propagates the source's read error.
    #[allow(clippy::cast_precision_loss)]
    pub fn read_channel(&self, channel: RgbaChannel, roi: &Roi) -> Result<Array5<f64>> {
        match self.source(channel) {
            Some(source) => source.read(roi),
            None => Ok(Array5::from_elem(
                roi.shape().0,
                self.missing_value(channel) as f64,
            )),
        }
    }
}

impl Layer for RgbaLayer {
    fn props(&self) -> &LayerProps {
        self.base.props()
    }

    fn props_mut(&mut self) -> &mut LayerProps {
        self.base.props_mut()
    }

    fn kind(&self) -> &'static str {
        "rgba"
    }

    fn as_normalizable(&self) -> Option<&dyn Normalizable> {
        Some(self)
    }

    fn as_normalizable_mut(&mut self) -> Option<&mut dyn Normalizable> {
        Some(self)
    }
}

impl Normalizable for RgbaLayer {
    fn normalization(&self) -> &Normalization {
        self.base.normalization()
    }

    fn normalization_mut(&mut self) -> &mut Normalization {
        self.base.normalization_mut()
    }
}
