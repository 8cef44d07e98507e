//! voxstack-layer: Reactive layers over shared data sources.
//!
//! This crate provides the display-side model of voxstack:
//! - **Bounds tracking** - cached `(min, max)` per source, resampled on change
//! - **Normalization** - per-slot auto/manual policies driven by the bounds
//! - **Layers** - shared properties plus grayscale, tinted, colortable,
//!   clickable and RGBA variants
//! - **Stack** - ordered, selectable layer collection
//!
//! All mutation and notification happens on one owner thread; only bounds
//! sampling may be moved to worker threads through [`BoundsSampler`].

pub mod bounds;
pub mod colortable;
mod events;
pub mod interpreter;
pub mod layer;
pub mod normalizable;
pub mod normalize;
mod options;
pub mod rgba;
pub mod sampler;
pub mod stack;
pub mod variants;

pub use bounds::{BoundsTracker, SampleRequest, SampleTicket};
pub use colortable::{generate_random_colors, Color, ColorTable, ColorTabled};
pub use events::{LayerEvent, LayerEvents};
pub use interpreter::{
    ClickBinding, ClickInterpreter, EventSwitch, Interpreter, MouseButton, PointerEvent,
    SharedEventSwitch,
};
pub use layer::{Layer, LayerProps, PlainLayer, TileRect, TileTiming, DEFAULT_LAYER_NAME};
pub use normalizable::{Normalizable, NormalizableLayer, Normalization, SlotDefaults};
pub use normalize::{Mode, NormalizationPolicy, Normalize};
pub use options::LayerOptions;
pub use rgba::{RgbaChannel, RgbaLayer};
pub use sampler::{BoundsSampler, SampleResult};
pub use stack::{LayerMut, LayerStack, SampleKey, StackEvent};
pub use variants::{
    AlphaModulatedLayer, Clickable, ClickableColortableLayer, ClickableLayer, ColortableLayer,
};

// Re-export the core types every layer API mentions
pub use voxstack_core::{Error, Result, SourceHandle, ValueRange};
