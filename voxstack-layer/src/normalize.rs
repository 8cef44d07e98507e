//! Auto/manual normalization state machine.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use voxstack_core::ValueRange;

/// How the active range of a slot is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Follows the observed bounds of the slot's source.
    Auto,
    /// Fixed by the user until cleared.
    Manual,
}

/// Construction-time normalization choice for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Normalize {
    /// Track the observed bounds.
    #[default]
    Auto,
    /// Use a fixed range.
    Manual(ValueRange),
    /// Display raw values; normalization can be enabled later.
    Off,
}

/// Per-slot normalization policy.
///
/// In [`Mode::Auto`] the active range mirrors the latest bounds reported by
/// the slot's tracker; in [`Mode::Manual`] it only changes through
/// [`set_manual`](Self::set_manual). Every transition method returns
/// whether the observable state `(mode, active_range)` changed, so the
/// owner can emit exactly one notification per real change.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationPolicy {
    mode: Mode,
    active: ValueRange,
    display: ValueRange,
}

impl NormalizationPolicy {
    /// Auto policy starting from `initial` until the first bounds arrive.
    #[must_use]
    pub fn auto(initial: ValueRange, display: ValueRange) -> Self {
        Self {
            mode: Mode::Auto,
            active: initial,
            display,
        }
    }

    /// Manual policy fixed at `range`.
    #[must_use]
    pub fn manual(range: ValueRange, display: ValueRange) -> Self {
        Self {
            mode: Mode::Manual,
            active: range,
            display,
        }
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Range currently used to normalize values.
    #[must_use]
    pub fn active_range(&self) -> ValueRange {
        self.active
    }

    /// Full representable domain, used for range sliders.
    #[must_use]
    pub fn display_range(&self) -> ValueRange {
        self.display
    }

    /// Switches to manual mode at `range`.
    pub fn set_manual(&mut self, range: ValueRange) -> bool {
        let changed = self.mode != Mode::Manual || self.active != range;
        self.mode = Mode::Manual;
        self.active = range;
        changed
    }

    /// Switches to auto mode, adopting `bounds` when known.
    ///
    /// Without bounds the current range is kept until a sample arrives.
    pub fn set_auto(&mut self, bounds: Option<ValueRange>) -> bool {
        let next = bounds.unwrap_or(self.active);
        let changed = self.mode != Mode::Auto || self.active != next;
        self.mode = Mode::Auto;
        self.active = next;
        changed
    }

    /// Reacts to new observed bounds; manual ranges are sticky.
    pub fn on_bounds_changed(&mut self, bounds: ValueRange) -> bool {
        if self.mode == Mode::Manual || self.active == bounds {
            return false;
        }
        self.active = bounds;
        true
    }

    /// Replaces the display range.
    pub fn set_display_range(&mut self, range: ValueRange) -> bool {
        if self.display == range {
            return false;
        }
        self.display = range;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(lo: f64, hi: f64) -> ValueRange {
        ValueRange::new(lo, hi).unwrap()
    }

    #[test]
    fn test_auto_tracks_bounds() {
        let mut policy = NormalizationPolicy::auto(range(0.0, 255.0), range(0.0, 255.0));
        assert!(policy.on_bounds_changed(range(2.0, 250.0)));
        assert!(!policy.on_bounds_changed(range(2.0, 250.0)));
        assert_eq!(policy.active_range(), range(2.0, 250.0));
    }

    #[test]
    fn test_manual_is_sticky() {
        let mut policy = NormalizationPolicy::manual(range(10.0, 20.0), range(0.0, 255.0));
        assert!(!policy.on_bounds_changed(range(0.0, 99.0)));
        assert_eq!(policy.active_range(), range(10.0, 20.0));
        assert_eq!(policy.mode(), Mode::Manual);
    }

    #[test]
    fn test_transitions() {
        let mut policy = NormalizationPolicy::auto(range(0.0, 1.0), range(0.0, 1.0));
        assert!(policy.set_manual(range(0.0, 1.0)));
        assert!(!policy.set_manual(range(0.0, 1.0)));
        assert!(policy.set_auto(Some(range(3.0, 4.0))));
        assert_eq!(policy.mode(), Mode::Auto);
        assert!(!policy.set_auto(None));
        assert_eq!(policy.active_range(), range(3.0, 4.0));
    }
}
