//! voxstack-core: Core traits and types for the voxstack layer model.
//!
//! This crate provides the foundational abstractions shared by every other
//! voxstack crate: element types and value ranges, 5-D shapes, the
//! [`DataSource`] capability with an in-memory implementation, and the
//! synchronous [`Signal`] observer used for change notification.
//!

pub mod element;
pub mod error;
pub mod shape;
pub mod signal;
pub mod source;

pub use element::{ElementType, ValueRange};
pub use error::{Error, Result};
pub use shape::{Roi, Shape5, CHANNEL_AXIS, NDIM};
pub use signal::{Recorder, Signal, SubscriptionId};
pub use source::{par_bounds, ArraySource, Capabilities, DataSource, SourceHandle};
