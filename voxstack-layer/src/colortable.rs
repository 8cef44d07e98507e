//! Color tables and random color generation.

use rand::Rng;

use voxstack_core::{Error, Result};

use crate::layer::Layer;
use crate::{LayerEvent, LayerEvents};

/// The only color model understood by [`generate_random_colors`].
pub const HSV: &str = "hsv";

/// Fully transparent black, used for entry 0 of label tables.
pub const TRANSPARENT: u32 = 0x0000_0000;

/// An RGBA color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const RED: Self = Self::rgb(255, 0, 0);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Packs the color as `0xAARRGGBB`.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn to_argb(self) -> u32 {
        ((self.a as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Unpacks a `0xAARRGGBB` value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    /// Converts HSV components in `[0, 1]` to an opaque color.
    #[must_use]
    pub fn from_hsv(h: f64, s: f64, v: f64) -> Self {
        let (r, g, b) = hsv_to_rgb(h, s, v);
        Self::rgb(to_byte(r), to_byte(g), to_byte(b))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_byte(c: f64) -> u8 {
    (c * 255.0).clamp(0.0, 255.0).round() as u8
}

/// Six-sector HSV to RGB conversion, all components in `[0, 1]`.
#[must_use]
#[allow(
    clippy::many_single_char_names,
    clippy::cast_possible_truncation,
    clippy::float_cmp
)]
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Inverse of [`hsv_to_rgb`].
#[must_use]
#[allow(clippy::many_single_char_names, clippy::float_cmp)]
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    if min == max {
        return (0.0, 0.0, v);
    }
    let delta = max - min;
    let s = delta / max;
    let rc = (max - r) / delta;
    let gc = (max - g) / delta;
    let bc = (max - b) / delta;
    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0).rem_euclid(1.0), s, v)
}

/// Generates `len` random colors packed as `0xAARRGGBB`.
///
/// Each entry draws its components uniformly from `[0, 1)`; components
/// named in `clamp` (by their letter in `model`, e.g. `('v', 1.0)`) are
/// fixed to the given value instead. With `zero_is_transparent` entry 0 is
/// [`TRANSPARENT`].
///
/// # Errors
/// [`Error::UnsupportedColorModel`] unless `model` is `"hsv"`;
/// [`Error::InvalidArgument`] for a clamp key that is not a component of
/// the model.
pub fn generate_random_colors<R: Rng + ?Sized>(
    len: usize,
    model: &str,
    clamp: &[(char, f64)],
    zero_is_transparent: bool,
    rng: &mut R,
) -> Result<Vec<u32>> {
    if model != HSV {
        return Err(Error::UnsupportedColorModel(model.to_string()));
    }
    let mut fixed = [None; 3];
    for &(key, value) in clamp {
        let idx = model.find(key).ok_or_else(|| {
            Error::invalid(format!("'{key}' is not a component of color model '{model}'"))
        })?;
        fixed[idx] = Some(value);
    }

    let colors = (0..len)
        .map(|i| {
            let mut hsv = [rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()];
            for (c, f) in hsv.iter_mut().zip(fixed) {
                if let Some(value) = f {
                    *c = value;
                }
            }
            if zero_is_transparent && i == 0 {
                TRANSPARENT
            } else {
                Color::from_hsv(hsv[0], hsv[1], hsv[2]).to_argb()
            }
        })
        .collect();
    Ok(colors)
}

/// Color table state shared by the colortable layer variants.
#[derive(Debug)]
pub struct ColorTable {
    colors: Vec<u32>,
    /// The table was produced by [`ColorTable::randomize`].
    pub colortable_is_random: bool,
    /// Entry 0 is rendered transparent.
    pub zero_is_transparent: bool,
    events: LayerEvents,
}

impl ColorTable {
    #[must_use]
    pub fn new(colors: Vec<u32>, events: LayerEvents) -> Self {
        Self {
            colors,
            colortable_is_random: false,
            zero_is_transparent: false,
            events,
        }
    }

    /// Packed `0xAARRGGBB` entries.
    #[must_use]
    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    pub fn set_colors(&mut self, colors: Vec<u32>) {
        if self.colors == colors {
            return;
        }
        self.colors = colors;
        self.events.emit(LayerEvent::ColorTableChanged);
    }

    /// Replaces the table with random colors of full value and a
    /// transparent entry 0, keeping its length.
    ///
    /// # Errors
    /// Propagates [`generate_random_colors`] failures; the table is left
    /// unchanged.
    pub fn randomize(&mut self) -> Result<()> {
        self.randomize_with(&mut rand::thread_rng())
    }

    /// As [`randomize`](Self::randomize) with an explicit generator.
    ///
    /// # Errors
    /// See [`randomize`](Self::randomize).
    pub fn randomize_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let colors = generate_random_colors(self.colors.len(), HSV, &[('v', 1.0)], true, rng)?;
        self.colortable_is_random = true;
        self.zero_is_transparent = true;
        self.set_colors(colors);
        Ok(())
    }
}

/// Layers that map values through a color table.
pub trait ColorTabled: Layer {
    fn color_table(&self) -> &ColorTable;

    fn color_table_mut(&mut self) -> &mut ColorTable;

    fn set_color_table(&mut self, colors: Vec<u32>) {
        self.color_table_mut().set_colors(colors);
    }

    /// # Errors
    /// See [`ColorTable::randomize`].
    fn randomize_colors(&mut self) -> Result<()> {
        self.color_table_mut().randomize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use voxstack_core::Recorder;

    #[test]
    fn test_pack_unpack() {
        let c = Color::rgba(0x12, 0x34, 0x56, 0x78);
        assert_eq!(c.to_argb(), 0x7812_3456);
        assert_eq!(Color::from_argb(0x7812_3456), c);
        assert_eq!(Color::RED.to_argb(), 0xFFFF_0000);
    }

    #[test]
    fn test_hsv_sectors() {
        assert_eq!(Color::from_hsv(0.0, 1.0, 1.0), Color::rgb(255, 0, 0));
        assert_eq!(Color::from_hsv(1.0 / 3.0, 1.0, 1.0), Color::rgb(0, 255, 0));
        assert_eq!(Color::from_hsv(2.0 / 3.0, 1.0, 1.0), Color::rgb(0, 0, 255));
        assert_eq!(Color::from_hsv(0.5, 0.0, 0.5), Color::rgb(128, 128, 128));
    }

    #[test]
    fn test_rgb_hsv_inverse() {
        let (h, s, v) = rgb_to_hsv(0.2, 0.4, 0.8);
        let (r, g, b) = hsv_to_rgb(h, s, v);
        assert_relative_eq!(r, 0.2, epsilon = 1e-12);
        assert_relative_eq!(g, 0.4, epsilon = 1e-12);
        assert_relative_eq!(b, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_generate_unknown_model() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = generate_random_colors(4, "lab", &[], false, &mut rng).unwrap_err();
        assert_eq!(err, Error::UnsupportedColorModel("lab".into()));
    }

    #[test]
    fn test_generate_bad_clamp_key() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = generate_random_colors(4, HSV, &[('x', 1.0)], false, &mut rng).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_generate_clamped_value() {
        let mut rng = StdRng::seed_from_u64(7);
        let colors = generate_random_colors(64, HSV, &[('v', 1.0)], true, &mut rng).unwrap();
        assert_eq!(colors.len(), 64);
        assert_eq!(colors[0], TRANSPARENT);
        for &argb in &colors[1..] {
            let c = Color::from_argb(argb);
            assert_eq!(c.a, 255);
            assert_eq!(c.r.max(c.g).max(c.b), 255);
        }
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = generate_random_colors(8, HSV, &[], false, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = generate_random_colors(8, HSV, &[], false, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_set_colors_idempotent() {
        let events = LayerEvents::new();
        let rec = Recorder::attach(events.signal());
        let mut table = ColorTable::new(vec![1, 2, 3], events);
        table.set_colors(vec![1, 2, 3]);
        assert!(rec.is_empty());
        table.set_colors(vec![3, 2, 1]);
        assert_eq!(rec.take(), vec![LayerEvent::ColorTableChanged, LayerEvent::Changed]);
    }

    #[test]
    fn test_randomize_keeps_length() {
        let mut table = ColorTable::new(vec![0xFF00_0000; 16], LayerEvents::new());
        table.randomize_with(&mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(table.colors().len(), 16);
        assert_eq!(table.colors()[0], TRANSPARENT);
        assert!(table.colortable_is_random);
        assert!(table.zero_is_transparent);
    }
}
