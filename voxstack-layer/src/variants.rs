//! Tinted, colortable and clickable layer variants.

use voxstack_core::{ElementType, Result, SourceHandle, ValueRange};

use crate::colortable::{Color, ColorTable, ColorTabled};
use crate::interpreter::{ClickBinding, ClickHandler, ClickInterpreter, SharedEventSwitch};
use crate::layer::{Layer, LayerProps};
use crate::normalizable::{Normalizable, NormalizableLayer, Normalization, SlotDefaults};
use crate::normalize::Normalize;
use crate::{LayerEvent, LayerOptions};

/// Display range of alpha-modulated layers unless overridden: `(0, 255)`.
#[must_use]
pub fn alpha_modulated_range() -> ValueRange {
    ElementType::U8.default_range()
}

/// Implements [`Layer`] and [`Normalizable`] by delegating to a `base`
/// [`NormalizableLayer`] field.
macro_rules! delegate_normalizable {
    ($ty:ty, $kind:literal $(, $($extra:tt)+)?) => {
        impl Layer for $ty {
            fn props(&self) -> &LayerProps {
                self.base.props()
            }

            fn props_mut(&mut self) -> &mut LayerProps {
                self.base.props_mut()
            }

            fn kind(&self) -> &'static str {
                $kind
            }

            fn as_normalizable(&self) -> Option<&dyn Normalizable> {
                Some(self)
            }

            fn as_normalizable_mut(&mut self) -> Option<&mut dyn Normalizable> {
                Some(self)
            }

            $($($extra)+)?
        }

        impl Normalizable for $ty {
            fn normalization(&self) -> &Normalization {
                self.base.normalization()
            }

            fn normalization_mut(&mut self) -> &mut Normalization {
                self.base.normalization_mut()
            }
        }
    };
}

/// Single-source layer displayed as a tint color modulated by value.
#[derive(Debug)]
pub struct AlphaModulatedLayer {
    base: NormalizableLayer,
    tint_color: Color,
}

impl AlphaModulatedLayer {
    /// Creates a red-tinted layer with display range `(0, 255)` unless the
    /// options say otherwise.
    ///
    /// # Errors
    /// [`voxstack_core::Error::PreconditionViolation`] if the source cannot
    /// report bounds.
    pub fn new(source: SourceHandle, options: &LayerOptions) -> Result<Self> {
        let defaults = SlotDefaults {
            normalize: Normalize::Auto,
            display: Some(alpha_modulated_range()),
        };
        Ok(Self {
            base: NormalizableLayer::with_defaults(
                vec![Some(source)],
                options,
                defaults,
                "alpha-modulated",
            )?,
            tint_color: Color::RED,
        })
    }

    #[must_use]
    pub fn with_tint_color(mut self, color: Color) -> Self {
        self.tint_color = color;
        self
    }

    #[must_use]
    pub fn tint_color(&self) -> Color {
        self.tint_color
    }

    pub fn set_tint_color(&mut self, color: Color) {
        if self.tint_color == color {
            return;
        }
        self.tint_color = color;
        self.base.props().events().emit(LayerEvent::TintColorChanged);
    }
}

delegate_normalizable!(AlphaModulatedLayer, "alpha-modulated");

/// Single-source layer mapping values through a color table.
///
/// Normalization is off unless requested through the options, in which
/// case values are scaled onto the table length.
#[derive(Debug)]
pub struct ColortableLayer {
    base: NormalizableLayer,
    table: ColorTable,
}

impl ColortableLayer {
    /// # Errors
    /// [`voxstack_core::Error::PreconditionViolation`] if the source cannot
    /// report bounds.
    pub fn new(source: SourceHandle, colors: Vec<u32>, options: &LayerOptions) -> Result<Self> {
        let defaults = SlotDefaults {
            normalize: Normalize::Off,
            display: None,
        };
        let base =
            NormalizableLayer::with_defaults(vec![Some(source)], options, defaults, "colortable")?;
        let table = ColorTable::new(colors, base.props().events().clone());
        Ok(Self { base, table })
    }
}

delegate_normalizable!(
    ColortableLayer,
    "colortable",
    fn as_color_tabled(&self) -> Option<&dyn ColorTabled> {
        Some(self)
    }
    fn as_color_tabled_mut(&mut self) -> Option<&mut dyn ColorTabled> {
        Some(self)
    }
);

impl ColorTabled for ColortableLayer {
    fn color_table(&self) -> &ColorTable {
        &self.table
    }

    fn color_table_mut(&mut self) -> &mut ColorTable {
        &mut self.table
    }
}

/// Layers that intercept clicks while selected.
pub trait Clickable: Layer {
    fn click_binding(&self) -> &ClickBinding;

    /// Whether the layer's interpreter is currently installed.
    fn is_click_active(&self) -> bool {
        self.click_binding().is_active()
    }
}

/// A layer that installs a [`ClickInterpreter`] while selected.
#[derive(Debug)]
pub struct ClickableLayer {
    props: LayerProps,
    binding: ClickBinding,
}

impl ClickableLayer {
    /// `right` selects the right mouse button, otherwise the left one.
    #[must_use]
    pub fn new(
        switch: SharedEventSwitch,
        on_click: ClickHandler,
        right: bool,
        options: &LayerOptions,
    ) -> Self {
        Self {
            props: LayerProps::new(Vec::new(), options),
            binding: ClickBinding::new(switch, ClickInterpreter::new(right, on_click)),
        }
    }
}

impl Layer for ClickableLayer {
    fn props(&self) -> &LayerProps {
        &self.props
    }

    fn props_mut(&mut self) -> &mut LayerProps {
        &mut self.props
    }

    fn kind(&self) -> &'static str {
        "clickable"
    }

    fn set_active(&mut self, active: bool) {
        self.binding.set_active(active);
    }
}

impl Clickable for ClickableLayer {
    fn click_binding(&self) -> &ClickBinding {
        &self.binding
    }
}

/// A clickable layer showing one source through a color table.
#[derive(Debug)]
pub struct ClickableColortableLayer {
    props: LayerProps,
    binding: ClickBinding,
    table: ColorTable,
}

impl ClickableColortableLayer {
    #[must_use]
    pub fn new(
        switch: SharedEventSwitch,
        on_click: ClickHandler,
        right: bool,
        source: SourceHandle,
        colors: Vec<u32>,
        options: &LayerOptions,
    ) -> Self {
        let props = LayerProps::new(vec![Some(source)], options);
        let table = ColorTable::new(colors, props.events().clone());
        Self {
            props,
            binding: ClickBinding::new(switch, ClickInterpreter::new(right, on_click)),
            table,
        }
    }
}

impl Layer for ClickableColortableLayer {
    fn props(&self) -> &LayerProps {
        &self.props
    }

    fn props_mut(&mut self) -> &mut LayerProps {
        &mut self.props
    }

    fn kind(&self) -> &'static str {
        "clickable-colortable"
    }

    fn set_active(&mut self, active: bool) {
        self.binding.set_active(active);
    }

    fn as_color_tabled(&self) -> Option<&dyn ColorTabled> {
        Some(self)
    }

    fn as_color_tabled_mut(&mut self) -> Option<&mut dyn ColorTabled> {
        Some(self)
    }
}

impl Clickable for ClickableColortableLayer {
    fn click_binding(&self) -> &ClickBinding {
        &self.binding
    }
}

impl ColorTabled for ClickableColortableLayer {
    fn color_table(&self) -> &ColorTable {
        &self.table
    }

    fn color_table_mut(&mut self) -> &mut ColorTable {
        &mut self.table
    }
}
