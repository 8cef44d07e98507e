//! Data source traits and the in-memory array source.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use ndarray::{s, Array5};
use rayon::prelude::*;

use crate::{ElementType, Error, Result, Roi, Shape5, ValueRange};

/// Shared, read-only handle to a data source.
///
/// One source may back several layers at once (for example a raw volume
/// shown both as grayscale and through a color table).
pub type SourceHandle = Arc<dyn DataSource>;

/// Optional features a data source may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The source can report the bounds of its values.
    pub bounds: bool,
    /// The source can materialize regions of its data.
    pub read: bool,
}

impl Capabilities {
    /// Every capability.
    pub const ALL: Self = Self {
        bounds: true,
        read: true,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

/// A lazily evaluated 5-D array owned by the data-computation layer.
///
/// Implementations must be safe to query from a background thread; the
/// layer model only ever reads from them.
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Element type of the underlying data.
    fn element_type(&self) -> ElementType;

    /// Extent along `(t, x, y, z, c)`.
    fn shape(&self) -> Shape5;

    /// Features supported by this source.
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    /// Computes the `(min, max)` of the finite values of the source.
    ///
    /// This may evaluate the whole underlying computation and block for a
    /// long time.
    ///
    /// # Errors
    /// [`Error::EmptySource`] when the source holds no finite element,
    /// [`Error::SourceUnavailable`] when the data cannot be produced.
    fn sample_bounds(&self) -> Result<ValueRange>;

    /// Materializes a region as `f64` values.
    ///
    /// # Errors
    /// [`Error::RoiOutOfBounds`] when `roi` exceeds the shape, or a source
    /// specific error when the data cannot be produced.
    fn read(&self, roi: &Roi) -> Result<Array5<f64>>;

    /// Monotonic counter bumped every time the data may have changed.
    ///
    /// Consumers that cached a derived value at generation `g` may keep
    /// using it as long as this still returns `g`.
    fn generation(&self) -> u64 {
        0
    }
}

/// Min/max over the finite values of a parallel iterator.
///
/// # Errors
/// Returns [`Error::EmptySource`] if no finite value was seen.
pub fn par_bounds<I>(values: I) -> Result<ValueRange>
where
    I: ParallelIterator<Item = f64>,
{
    let empty = || (f64::INFINITY, f64::NEG_INFINITY);
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold(empty, |(lo, hi), v| (lo.min(v), hi.max(v)))
        .reduce(empty, |a, b| (a.0.min(b.0), a.1.max(b.1)));
    if lo > hi {
        return Err(Error::EmptySource);
    }
    ValueRange::new(lo, hi)
}

/// In-memory data source backed by an `ndarray::Array5<f64>`.
///
/// Values are stored as `f64` and tagged with the element type they
/// represent, which drives default display ranges.
#[derive(Debug)]
pub struct ArraySource {
    element_type: ElementType,
    data: RwLock<Array5<f64>>,
    generation: AtomicU64,
}

impl ArraySource {
    /// Wraps an existing array.
    #[must_use]
    pub fn new(element_type: ElementType, data: Array5<f64>) -> Self {
        Self {
            element_type,
            data: RwLock::new(data),
            generation: AtomicU64::new(0),
        }
    }

    /// Builds a source from row-major values.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if `values.len()` does not match `shape`.
    pub fn from_vec(element_type: ElementType, shape: Shape5, values: Vec<f64>) -> Result<Self> {
        let data = Array5::from_shape_vec(shape.0, values)
            .map_err(|e| Error::invalid(format!("values do not fit shape {shape}: {e}")))?;
        Ok(Self::new(element_type, data))
    }

    /// Builds a source where every element equals `value`.
    #[must_use]
    pub fn filled(element_type: ElementType, shape: Shape5, value: f64) -> Self {
        Self::new(element_type, Array5::from_elem(shape.0, value))
    }

    /// Convenience wrapper returning a shared handle.
    #[must_use]
    pub fn into_handle(self) -> SourceHandle {
        Arc::new(self)
    }

    /// Replaces the data and bumps the generation.
    ///
    /// # Errors
    /// Returns [`Error::SourceUnavailable`] if the lock is poisoned.
    pub fn replace_data(&self, data: Array5<f64>) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| Error::SourceUnavailable("array lock poisoned".to_string()))?;
        *guard = data;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Marks the data as possibly changed without replacing it.
    pub fn mark_dirty(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn with_data<T>(&self, f: impl FnOnce(&Array5<f64>) -> Result<T>) -> Result<T> {
        let guard = self
            .data
            .read()
            .map_err(|_| Error::SourceUnavailable("array lock poisoned".to_string()))?;
        f(&guard)
    }
}

impl DataSource for ArraySource {
    fn element_type(&self) -> ElementType {
        self.element_type
    }

    fn shape(&self) -> Shape5 {
        self.with_data(|data| {
            let dims = data.dim();
            Ok(Shape5::new(dims.0, dims.1, dims.2, dims.3, dims.4))
        })
        .unwrap_or(Shape5([0; 5]))
    }

    fn sample_bounds(&self) -> Result<ValueRange> {
        self.with_data(|data| match data.as_slice_memory_order() {
            Some(values) => par_bounds(values.par_iter().copied()),
            None => {
                let values: Vec<f64> = data.iter().copied().collect();
                par_bounds(values.into_par_iter())
            }
        })
    }

    fn read(&self, roi: &Roi) -> Result<Array5<f64>> {
        self.with_data(|data| {
            let dims = data.dim();
            roi.check_within(&Shape5::new(dims.0, dims.1, dims.2, dims.3, dims.4))?;
            let (a, b) = (roi.start(), roi.stop());
            let view = data.slice(s![
                a[0]..b[0],
                a[1]..b[1],
                a[2]..b[2],
                a[3]..b[3],
                a[4]..b[4]
            ]);
            Ok(view.to_owned())
        })
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
