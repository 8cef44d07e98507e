//! JSON scene descriptions.
//!
//! A scene names raw-file sources and the layers built on them:
//!
//! ```json
//! {
//!   "sources": {
//!     "raw": { "path": "raw.u8", "dtype": "u8", "shape": [1, 64, 64, 1, 1] }
//!   },
//!   "layers": [
//!     { "kind": "grayscale", "name": "raw", "source": "raw", "opacity": 0.8 },
//!     { "kind": "colortable", "source": "raw", "colors": 16 }
//!   ],
//!   "selected": 0
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use voxstack_core::{ElementType, Shape5, SourceHandle};
use voxstack_io::MappedArraySource;
use voxstack_layer::{
    generate_random_colors, AlphaModulatedLayer, Color, ColorTabled, ColortableLayer, Layer,
    LayerOptions, LayerStack, NormalizableLayer, RgbaLayer,
};

use crate::{CliError, Result};

/// A raw little-endian volume on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Relative paths are resolved against the scene file's directory.
    pub path: PathBuf,
    pub dtype: ElementType,
    pub shape: Shape5,
    #[serde(default)]
    pub offset: usize,
}

/// Color table of a colortable layer: explicit entries or a random table
/// of the given length.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorsConfig {
    Random(usize),
    Table(Vec<u32>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LayerKindConfig {
    Grayscale {
        source: String,
    },
    AlphaModulated {
        source: String,
        #[serde(default)]
        tint: Option<[u8; 3]>,
    },
    Colortable {
        source: String,
        colors: ColorsConfig,
    },
    Rgba {
        #[serde(default)]
        red: Option<String>,
        #[serde(default)]
        green: Option<String>,
        #[serde(default)]
        blue: Option<String>,
        #[serde(default)]
        alpha: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub options: LayerOptions,
    #[serde(flatten)]
    pub kind: LayerKindConfig,
}

fn default_visible() -> bool {
    true
}

fn default_opacity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
    #[serde(default)]
    pub selected: Option<usize>,
}

impl SceneConfig {
    /// Reads a scene from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Maps every source, resolving relative paths against `base`.
    pub fn open_sources(&self, base: &Path) -> Result<BTreeMap<String, SourceHandle>> {
        let mut opened = BTreeMap::new();
        for (name, cfg) in &self.sources {
            let path = if cfg.path.is_absolute() {
                cfg.path.clone()
            } else {
                base.join(&cfg.path)
            };
            log::debug!("opening source '{name}' from {}", path.display());
            let source =
                MappedArraySource::open_with_offset(&path, cfg.dtype, cfg.shape, cfg.offset)?;
            let handle: SourceHandle = Arc::new(source);
            opened.insert(name.clone(), handle);
        }
        Ok(opened)
    }

    /// Builds the layer stack; `rng` fills random color tables.
    pub fn build<R: Rng + ?Sized>(
        &self,
        sources: &BTreeMap<String, SourceHandle>,
        rng: &mut R,
    ) -> Result<LayerStack> {
        let mut stack = LayerStack::new();
        for cfg in &self.layers {
            stack.append(build_layer(cfg, sources, rng)?)?;
        }
        stack.select(self.selected)?;
        Ok(stack)
    }
}

fn lookup(sources: &BTreeMap<String, SourceHandle>, name: &str) -> Result<SourceHandle> {
    sources
        .get(name)
        .cloned()
        .ok_or_else(|| CliError::UnknownSource(name.to_string()))
}

fn lookup_opt(
    sources: &BTreeMap<String, SourceHandle>,
    name: Option<&String>,
) -> Result<Option<SourceHandle>> {
    name.map(|n| lookup(sources, n)).transpose()
}

fn build_layer<R: Rng + ?Sized>(
    cfg: &LayerConfig,
    sources: &BTreeMap<String, SourceHandle>,
    rng: &mut R,
) -> Result<Box<dyn Layer>> {
    let opts = &cfg.options;
    let mut layer: Box<dyn Layer> = match &cfg.kind {
        LayerKindConfig::Grayscale { source } => {
            Box::new(NormalizableLayer::grayscale(lookup(sources, source)?, opts)?)
        }
        LayerKindConfig::AlphaModulated { source, tint } => {
            let layer = AlphaModulatedLayer::new(lookup(sources, source)?, opts)?;
            match tint {
                Some([r, g, b]) => Box::new(layer.with_tint_color(Color::rgb(*r, *g, *b))),
                None => Box::new(layer),
            }
        }
        LayerKindConfig::Colortable { source, colors } => {
            let (table, random) = match colors {
                ColorsConfig::Random(len) => (
                    generate_random_colors(*len, "hsv", &[('v', 1.0)], true, rng)?,
                    true,
                ),
                ColorsConfig::Table(table) => (table.clone(), false),
            };
            let mut layer = ColortableLayer::new(lookup(sources, source)?, table, opts)?;
            if random {
                let ct = layer.color_table_mut();
                ct.colortable_is_random = true;
                ct.zero_is_transparent = true;
            }
            Box::new(layer)
        }
        LayerKindConfig::Rgba {
            red,
            green,
            blue,
            alpha,
        } => Box::new(RgbaLayer::new(
            [
                lookup_opt(sources, red.as_ref())?,
                lookup_opt(sources, green.as_ref())?,
                lookup_opt(sources, blue.as_ref())?,
                lookup_opt(sources, alpha.as_ref())?,
            ],
            opts,
        )?),
    };

    let props = layer.props_mut();
    if let Some(name) = &cfg.name {
        props.set_name(name.clone());
    }
    props.set_layer_id(cfg.id.clone());
    props.set_visible(cfg.visible);
    props.set_opacity(cfg.opacity)?;
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;
    use voxstack_layer::{Normalize, ValueRange};

    fn write_raw(dir: &Path, name: &str, bytes: &[u8]) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(bytes).unwrap();
    }

    #[test]
    fn test_parse_scene() {
        let json = r#"{
            "sources": { "raw": { "path": "raw.u8", "dtype": "u8", "shape": [1, 2, 2, 1, 1] } },
            "layers": [
                { "kind": "grayscale", "name": "raw", "source": "raw",
                  "options": { "normalize": [{ "manual": [0.0, 10.0] }] } },
                { "kind": "colortable", "source": "raw", "colors": 8, "visible": false },
                { "kind": "rgba", "red": "raw", "options": { "alpha_missing_value": 128 } }
            ],
            "selected": 1
        }"#;
        let scene: SceneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(scene.layers.len(), 3);
        assert_eq!(
            scene.layers[0].options.normalize_for(0),
            Some(Normalize::Manual(ValueRange::new(0.0, 10.0).unwrap()))
        );
        assert!(matches!(
            scene.layers[1].kind,
            LayerKindConfig::Colortable {
                colors: ColorsConfig::Random(8),
                ..
            }
        ));
        assert!(!scene.layers[1].visible);
        assert_eq!(scene.layers[2].options.alpha_missing_value, 128);
    }

    #[test]
    fn test_build_scene() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path(), "raw.u8", &[3, 9, 27, 81]);
        let json = r#"{
            "sources": { "raw": { "path": "raw.u8", "dtype": "u8", "shape": [1, 2, 2, 1, 1] } },
            "layers": [
                { "kind": "grayscale", "name": "raw", "source": "raw", "opacity": 0.5 },
                { "kind": "colortable", "name": "labels", "source": "raw", "colors": 4 }
            ],
            "selected": 0
        }"#;
        let scene: SceneConfig = serde_json::from_str(json).unwrap();
        let sources = scene.open_sources(dir.path()).unwrap();
        let mut stack = scene
            .build(&sources, &mut StdRng::seed_from_u64(1))
            .unwrap();
        stack.refresh_bounds().unwrap();

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.selected(), Some(0));
        let raw = stack.get(0).unwrap();
        assert_eq!(raw.props().opacity(), 0.5);
        assert_eq!(
            raw.as_normalizable()
                .unwrap()
                .normalization()
                .normalize(0)
                .unwrap(),
            Some(ValueRange::new(3.0, 81.0).unwrap())
        );
        let labels = stack.get(1).unwrap().as_color_tabled().unwrap();
        assert_eq!(labels.color_table().colors().len(), 4);
        assert!(labels.color_table().colortable_is_random);
    }

    #[test]
    fn test_unknown_source() {
        let json = r#"{ "layers": [ { "kind": "grayscale", "source": "missing" } ] }"#;
        let scene: SceneConfig = serde_json::from_str(json).unwrap();
        let err = scene
            .build(&BTreeMap::new(), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, CliError::UnknownSource(name) if name == "missing"));
    }
}
