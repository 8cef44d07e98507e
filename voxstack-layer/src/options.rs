//! Construction-time layer configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use voxstack_core::ValueRange;

use crate::Normalize;

/// Options accepted by every layer constructor.
///
/// `range` and `normalize` are indexed by datasource slot; a missing or
/// `None` entry selects the variant's default for that slot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayerOptions {
    /// Record per-tile render timings.
    pub direct: bool,
    /// Display range per slot.
    pub range: Vec<Option<ValueRange>>,
    /// Normalization per slot.
    pub normalize: Vec<Option<Normalize>>,
    /// Fill value for absent red, green and blue channels.
    pub color_missing_value: i64,
    /// Fill value for an absent alpha channel.
    pub alpha_missing_value: i64,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            direct: false,
            range: Vec::new(),
            normalize: Vec::new(),
            color_missing_value: 0,
            alpha_missing_value: 255,
        }
    }
}

impl LayerOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables per-tile timing.
    #[must_use]
    pub fn with_direct(mut self, direct: bool) -> Self {
        self.direct = direct;
        self
    }

    /// Sets the display range of `slot`.
    #[must_use]
    pub fn with_range(mut self, slot: usize, range: ValueRange) -> Self {
        set_slot(&mut self.range, slot, range);
        self
    }

    /// Sets the normalization of `slot`.
    #[must_use]
    pub fn with_normalize(mut self, slot: usize, normalize: Normalize) -> Self {
        set_slot(&mut self.normalize, slot, normalize);
        self
    }

    /// Sets the fill value of absent color channels.
    #[must_use]
    pub fn with_color_missing_value(mut self, value: i64) -> Self {
        self.color_missing_value = value;
        self
    }

    /// Sets the fill value of an absent alpha channel.
    #[must_use]
    pub fn with_alpha_missing_value(mut self, value: i64) -> Self {
        self.alpha_missing_value = value;
        self
    }

    /// Display range configured for `slot`.
    #[must_use]
    pub fn range_for(&self, slot: usize) -> Option<ValueRange> {
        self.range.get(slot).copied().flatten()
    }

    /// Normalization configured for `slot`.
    #[must_use]
    pub fn normalize_for(&self, slot: usize) -> Option<Normalize> {
        self.normalize.get(slot).copied().flatten()
    }
}

fn set_slot<T>(values: &mut Vec<Option<T>>, slot: usize, value: T) {
    if values.len() <= slot {
        values.resize_with(slot + 1, || None);
    }
    values[slot] = Some(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = LayerOptions::default();
        assert!(!opts.direct);
        assert_eq!(opts.color_missing_value, 0);
        assert_eq!(opts.alpha_missing_value, 255);
        assert_eq!(opts.range_for(0), None);
        assert_eq!(opts.normalize_for(3), None);
    }

    #[test]
    fn test_per_slot_builders() {
        let r = ValueRange::new(1.0, 2.0).unwrap();
        let opts = LayerOptions::new()
            .with_range(2, r)
            .with_normalize(1, Normalize::Off);
        assert_eq!(opts.range.len(), 3);
        assert_eq!(opts.range_for(2), Some(r));
        assert_eq!(opts.range_for(0), None);
        assert_eq!(opts.normalize_for(1), Some(Normalize::Off));
    }
}
