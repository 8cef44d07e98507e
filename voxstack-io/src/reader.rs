//! Memory-mapped raw volume source.
//!

use crate::codec::decode;
use crate::{Error, Result};
use memmap2::Mmap;
use ndarray::Array5;
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use voxstack_core::{par_bounds, DataSource, ElementType, Roi, Shape5, ValueRange};

/// A headerless little-endian volume exposed as a data source.
///
/// Uses memmap2 to access the file contents without loading the
/// entire volume into memory. Elements are stored row-major in
/// `(t, x, y, z, c)` order starting at `offset`.
#[derive(Debug)]
pub struct MappedArraySource {
    mmap: Mmap,
    path: PathBuf,
    element_type: ElementType,
    shape: Shape5,
    offset: usize,
    generation: AtomicU64,
}

impl MappedArraySource {
    /// Opens a raw volume whose data starts at the beginning of the file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or is too small for `shape`.
    pub fn open<P: AsRef<Path>>(path: P, element_type: ElementType, shape: Shape5) -> Result<Self> {
        Self::open_with_offset(path, element_type, shape, 0)
    }

    /// Opens a raw volume whose data starts `offset` bytes into the file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or is too small for `shape`.
    pub fn open_with_offset<P: AsRef<Path>>(
        path: P,
        element_type: ElementType,
        shape: Shape5,
        offset: usize,
    ) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only. Concurrent external writes are
        // announced through `mark_dirty`, matching the usual mmap contract.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        let needed = shape
            .len()
            .checked_mul(element_type.size())
            .and_then(|n| n.checked_add(offset))
            .ok_or_else(|| Error::InvalidFormat(format!("shape {shape} overflows")))?;
        if mmap.len() < needed {
            return Err(Error::InvalidFormat(format!(
                "{} holds {} bytes, {} {} elements of shape {} need {}",
                path.as_ref().display(),
                mmap.len(),
                shape.len(),
                element_type,
                shape,
                needed
            )));
        }
        log::debug!(
            "mapped {} as {} {}",
            path.as_ref().display(),
            element_type,
            shape
        );

        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
            element_type,
            shape,
            offset,
            generation: AtomicU64::new(0),
        })
    }

    /// Path of the mapped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Announces that the file was rewritten in place.
    pub fn mark_dirty(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn payload(&self) -> &[u8] {
        let len = self.shape.len() * self.element_type.size();
        &self.mmap[self.offset..self.offset + len]
    }

    fn value_at(&self, index: [usize; 5]) -> f64 {
        let size = self.element_type.size();
        let start = self.shape.offset(index) * size;
        decode(self.element_type, &self.payload()[start..start + size])
    }
}

impl DataSource for MappedArraySource {
    fn element_type(&self) -> ElementType {
        self.element_type
    }

    fn shape(&self) -> Shape5 {
        self.shape
    }

    fn sample_bounds(&self) -> voxstack_core::Result<ValueRange> {
        let ty = self.element_type;
        par_bounds(
            self.payload()
                .par_chunks_exact(ty.size())
                .map(move |bytes| decode(ty, bytes)),
        )
    }

    fn read(&self, roi: &Roi) -> voxstack_core::Result<Array5<f64>> {
        roi.check_within(&self.shape)?;
        let s = roi.start();
        Ok(Array5::from_shape_fn(roi.shape().0, |(t, x, y, z, c)| {
            self.value_at([s[0] + t, s[1] + x, s[2] + y, s[3] + z, s[4] + c])
        }))
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
