//! Five-dimensional shapes and regions of interest.
//!
//! All sources use the axis order `(t, x, y, z, c)`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of axes of every data source.
pub const NDIM: usize = 5;

/// Index of the channel axis.
pub const CHANNEL_AXIS: usize = 4;

/// Extent of a data source along `(t, x, y, z, c)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shape5(pub [usize; NDIM]);

impl Shape5 {
    /// Creates a shape from its five extents.
    #[must_use]
    pub fn new(t: usize, x: usize, y: usize, z: usize, c: usize) -> Self {
        Self([t, x, y, z, c])
    }

    /// Total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.iter().product()
    }

    /// Returns true if any axis has zero extent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.contains(&0)
    }

    /// Number of channels (extent of the `c` axis).
    #[must_use]
    pub fn channels(&self) -> usize {
        self.0[CHANNEL_AXIS]
    }

    /// ROI covering the whole shape.
    #[must_use]
    pub fn full_roi(&self) -> Roi {
        Roi {
            start: [0; NDIM],
            stop: self.0,
        }
    }

    /// Row-major flat offset of an index.
    #[must_use]
    pub fn offset(&self, index: [usize; NDIM]) -> usize {
        index
            .iter()
            .zip(self.0.iter())
            .fold(0, |acc, (&i, &extent)| acc * extent + i)
    }
}

impl std::fmt::Display for Shape5 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [t, x, y, z, c] = self.0;
        write!(f, "(t={t}, x={x}, y={y}, z={z}, c={c})")
    }
}

impl std::str::FromStr for Shape5 {
    type Err = Error;

    /// Parses `"t,x,y,z,c"`.
    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<usize>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::invalid(format!("bad shape '{s}': {e}")))?;
        let extents: [usize; NDIM] = parts
            .try_into()
            .map_err(|_| Error::invalid(format!("shape '{s}' must have {NDIM} extents")))?;
        Ok(Self(extents))
    }
}

/// Half-open box `[start, stop)` in five dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "[[usize; NDIM]; 2]", into = "[[usize; NDIM]; 2]")
)]
pub struct Roi {
    start: [usize; NDIM],
    stop: [usize; NDIM],
}

impl Roi {
    /// Creates a region, requiring `start <= stop` on every axis.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if any axis is inverted.
    pub fn new(start: [usize; NDIM], stop: [usize; NDIM]) -> Result<Self> {
        if start.iter().zip(stop.iter()).any(|(a, b)| a > b) {
            return Err(Error::invalid(format!(
                "roi start {start:?} exceeds stop {stop:?}"
            )));
        }
        Ok(Self { start, stop })
    }

    /// Inclusive start index per axis.
    #[must_use]
    pub fn start(&self) -> [usize; NDIM] {
        self.start
    }

    /// Exclusive stop index per axis.
    #[must_use]
    pub fn stop(&self) -> [usize; NDIM] {
        self.stop
    }

    /// Extent of the region.
    #[must_use]
    pub fn shape(&self) -> Shape5 {
        let mut extents = [0; NDIM];
        for (axis, extent) in extents.iter_mut().enumerate() {
            *extent = self.stop[axis] - self.start[axis];
        }
        Shape5(extents)
    }

    /// Checks the region against a source shape.
    ///
    /// # Errors
    /// Returns [`Error::RoiOutOfBounds`] if the region exceeds `shape`.
    pub fn check_within(&self, shape: &Shape5) -> Result<()> {
        if self.stop.iter().zip(shape.0.iter()).any(|(s, e)| s > e) {
            return Err(Error::RoiOutOfBounds {
                roi: format!("{:?}..{:?}", self.start, self.stop),
                shape: shape.to_string(),
            });
        }
        Ok(())
    }
}

impl TryFrom<[[usize; NDIM]; 2]> for Roi {
    type Error = Error;

    fn try_from(value: [[usize; NDIM]; 2]) -> Result<Self> {
        Self::new(value[0], value[1])
    }
}

impl From<Roi> for [[usize; NDIM]; 2] {
    fn from(roi: Roi) -> Self {
        [roi.start, roi.stop]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_basics() {
        let shape = Shape5::new(1, 4, 3, 2, 1);
        assert_eq!(shape.len(), 24);
        assert!(!shape.is_empty());
        assert_eq!(shape.channels(), 1);
        assert_eq!(shape.offset([0, 1, 0, 0, 0]), 6);
        assert!(Shape5::new(1, 0, 3, 2, 1).is_empty());
    }

    #[test]
    fn test_shape_parse() {
        let shape: Shape5 = "1, 64,64,10,3".parse().unwrap();
        assert_eq!(shape, Shape5::new(1, 64, 64, 10, 3));
        assert!("1,2,3".parse::<Shape5>().is_err());
        assert!("1,2,x,4,5".parse::<Shape5>().is_err());
    }

    #[test]
    fn test_roi_checks() {
        let shape = Shape5::new(1, 4, 4, 1, 1);
        let roi = Roi::new([0, 1, 1, 0, 0], [1, 3, 4, 1, 1]).unwrap();
        assert_eq!(roi.shape(), Shape5::new(1, 2, 3, 1, 1));
        assert!(roi.check_within(&shape).is_ok());

        let too_big = Roi::new([0; NDIM], [1, 5, 4, 1, 1]).unwrap();
        assert!(matches!(
            too_big.check_within(&shape),
            Err(Error::RoiOutOfBounds { .. })
        ));
        assert!(Roi::new([0, 2, 0, 0, 0], [1, 1, 1, 1, 1]).is_err());
    }

    #[test]
    fn test_roi_conversion_validates() {
        let inverted = Roi::try_from([[0, 2, 0, 0, 0], [1, 1, 1, 1, 1]]);
        assert!(matches!(inverted, Err(Error::InvalidArgument(_))));

        let roi = Roi::try_from([[0, 1, 0, 0, 0], [1, 3, 1, 1, 1]]).unwrap();
        assert_eq!(roi.start(), [0, 1, 0, 0, 0]);
        assert_eq!(roi.stop(), [1, 3, 1, 1, 1]);
        assert_eq!(<[[usize; NDIM]; 2]>::from(roi), [roi.start(), roi.stop()]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_roi_deserialize_rejects_inverted() {
        assert!(serde_json::from_str::<Roi>("[[0,2,0,0,0],[1,1,1,1,1]]").is_err());
        let roi: Roi = serde_json::from_str("[[0,0,0,0,0],[1,2,2,1,1]]").unwrap();
        assert_eq!(roi.shape(), Shape5::new(1, 2, 2, 1, 1));
    }
}
