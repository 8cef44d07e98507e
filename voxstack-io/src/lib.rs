//! voxstack-io: Memory-mapped raw volume sources for voxstack.
//!
//! This crate provides a [`DataSource`](voxstack_core::DataSource) over
//! headerless little-endian volume files using memory-mapped files via
//! memmap2, and a matching writer.
//!

mod codec;
mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::MappedArraySource;
pub use writer::RawVolumeWriter;
