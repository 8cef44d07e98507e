//! Element types and the intensity ranges derived from them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Scalar element type of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ElementType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ElementType {
    /// Size of one element in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Returns true for integer element types.
    #[must_use]
    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Returns true for floating point element types.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Largest value representable by an integer type, `None` for floats.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn integer_max(self) -> Option<f64> {
        let max = match self {
            Self::U8 => f64::from(u8::MAX),
            Self::U16 => f64::from(u16::MAX),
            Self::U32 => f64::from(u32::MAX),
            Self::U64 => u64::MAX as f64,
            Self::I8 => f64::from(i8::MAX),
            Self::I16 => f64::from(i16::MAX),
            Self::I32 => f64::from(i32::MAX),
            Self::I64 => i64::MAX as f64,
            Self::F32 | Self::F64 => return None,
        };
        Some(max)
    }

    /// Best-guess display range for data of this type.
    ///
    /// | type     | range            |
    /// |----------|------------------|
    /// | integers | `(0, T::MAX)`    |
    /// | floats   | `(0, 255)`       |
    #[must_use]
    pub fn default_range(self) -> ValueRange {
        let hi = self.integer_max().unwrap_or(255.0);
        ValueRange { lo: 0.0, hi }
    }

    /// Short lowercase name, e.g. `"u16"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let ty = match s.to_ascii_lowercase().as_str() {
            "u8" | "uint8" => Self::U8,
            "u16" | "uint16" => Self::U16,
            "u32" | "uint32" => Self::U32,
            "u64" | "uint64" => Self::U64,
            "i8" | "int8" => Self::I8,
            "i16" | "int16" => Self::I16,
            "i32" | "int32" => Self::I32,
            "i64" | "int64" => Self::I64,
            "f32" | "float32" => Self::F32,
            "f64" | "float64" => Self::F64,
            other => return Err(Error::invalid(format!("unknown element type '{other}'"))),
        };
        Ok(ty)
    }
}

/// A closed numeric interval `[lo, hi]` with `lo <= hi`.
///
/// Used both for observed data bounds and for normalization and display
/// ranges. Equality is exact: two ranges are equal only if both endpoints
/// compare equal as `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "[f64; 2]", into = "[f64; 2]")
)]
pub struct ValueRange {
    lo: f64,
    hi: f64,
}

impl ValueRange {
    /// Creates a range, rejecting NaN endpoints and `lo > hi`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the endpoints are not ordered.
    pub fn new(lo: f64, hi: f64) -> Result<Self> {
        if lo.is_nan() || hi.is_nan() {
            return Err(Error::invalid("range endpoints must not be NaN"));
        }
        if lo > hi {
            return Err(Error::invalid(format!("range lower bound {lo} exceeds upper bound {hi}")));
        }
        Ok(Self { lo, hi })
    }

    /// The unit range `(0, 1)`.
    #[must_use]
    pub const fn unit() -> Self {
        Self { lo: 0.0, hi: 1.0 }
    }

    /// Lower endpoint.
    #[inline]
    #[must_use]
    pub fn lo(&self) -> f64 {
        self.lo
    }

    /// Upper endpoint.
    #[inline]
    #[must_use]
    pub fn hi(&self) -> f64 {
        self.hi
    }

    /// `hi - lo`.
    #[inline]
    #[must_use]
    pub fn span(&self) -> f64 {
        self.hi - self.lo
    }

    /// Maps `value` linearly from this range onto `[0, 1]`, clamping.
    ///
    /// A degenerate range maps everything at or above `lo` to `1.0`.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 {
            return if value >= self.lo { 1.0 } else { 0.0 };
        }
        ((value - self.lo) / span).clamp(0.0, 1.0)
    }

    /// Returns true if `value` lies within the range.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }
}

impl TryFrom<[f64; 2]> for ValueRange {
    type Error = Error;

    fn try_from(value: [f64; 2]) -> Result<Self> {
        Self::new(value[0], value[1])
    }
}

impl TryFrom<(f64, f64)> for ValueRange {
    type Error = Error;

    fn try_from(value: (f64, f64)) -> Result<Self> {
        Self::new(value.0, value.1)
    }
}

impl From<ValueRange> for [f64; 2] {
    fn from(range: ValueRange) -> Self {
        [range.lo, range.hi]
    }
}

impl std::fmt::Display for ValueRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lo, self.hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_range_table() {
        assert_eq!(ElementType::U8.default_range(), ValueRange::new(0.0, 255.0).unwrap());
        assert_eq!(ElementType::U16.default_range().hi(), 65535.0);
        assert_eq!(ElementType::I8.default_range().hi(), 127.0);
        assert_eq!(ElementType::I32.default_range().hi(), f64::from(i32::MAX));
        assert_eq!(ElementType::F32.default_range(), ValueRange::new(0.0, 255.0).unwrap());
        assert_eq!(ElementType::F64.default_range(), ValueRange::new(0.0, 255.0).unwrap());
    }

    #[test]
    fn test_element_type_parse() {
        assert_eq!("uint16".parse::<ElementType>().unwrap(), ElementType::U16);
        assert_eq!("F32".parse::<ElementType>().unwrap(), ElementType::F32);
        assert!(matches!(
            "complex64".parse::<ElementType>(),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(ElementType::I64.size(), 8);
    }

    #[test]
    fn test_value_range_validation() {
        assert!(ValueRange::new(1.0, 1.0).is_ok());
        assert!(ValueRange::new(2.0, 1.0).is_err());
        assert!(ValueRange::new(f64::NAN, 1.0).is_err());
        assert!(ValueRange::try_from([5.0, 4.0]).is_err());
    }

    #[test]
    fn test_value_range_normalize() {
        let r = ValueRange::new(10.0, 20.0).unwrap();
        assert_relative_eq!(r.normalize(15.0), 0.5);
        assert_relative_eq!(r.normalize(0.0), 0.0);
        assert_relative_eq!(r.normalize(99.0), 1.0);

        let flat = ValueRange::new(3.0, 3.0).unwrap();
        assert_relative_eq!(flat.normalize(3.0), 1.0);
        assert_relative_eq!(flat.normalize(2.0), 0.0);
    }
}
