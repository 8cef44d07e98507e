//! Error types for voxstack-core.

use thiserror::Error;

/// Result type alias for voxstack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for voxstack operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A value outside the accepted domain was passed to a setter or constructor.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Color generation was requested for a color model that is not implemented.
    #[error("unknown color model '{0}'")]
    UnsupportedColorModel(String),

    /// A data source lacks a capability required by the caller.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// The data source could not produce data.
    #[error("data source unavailable: {0}")]
    SourceUnavailable(String),

    /// Bounds were requested from a source without any finite element.
    #[error("cannot compute bounds of a source without finite elements")]
    EmptySource,

    /// A region of interest does not fit the source shape.
    #[error("region {roi} is outside shape {shape}")]
    RoiOutOfBounds { roi: String, shape: String },

    /// A layer with the same id is already part of the stack.
    #[error("duplicate layer id '{0}'")]
    DuplicateLayer(String),

    /// A stack position does not exist.
    #[error("index {index} out of range for {len} layers")]
    IndexOutOfRange { index: usize, len: usize },
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
