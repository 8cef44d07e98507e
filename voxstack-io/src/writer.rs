//! Raw volume writer.

use crate::codec::encode;
use crate::Result;
use ndarray::Array5;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use voxstack_core::ElementType;

/// Writer for headerless little-endian volumes.
///
/// Produces files readable by [`MappedArraySource`](crate::MappedArraySource).
pub struct RawVolumeWriter {
    writer: BufWriter<File>,
}

impl RawVolumeWriter {
    /// Creates a new file writer.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes `data` in row-major `(t, x, y, z, c)` order as `element_type`.
    ///
    /// Integer types round to the nearest value and saturate at the type limits.
    pub fn write_array(&mut self, data: &Array5<f64>, element_type: ElementType) -> Result<()> {
        let mut buf = Vec::with_capacity(data.len() * element_type.size());
        for &value in data {
            encode(element_type, value, &mut buf);
        }
        self.writer.write_all(&buf)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
